//! VDV435 message catalogue.
//!
//! Field names and defaults follow the partner protocol's schema: wire
//! field names in `PascalCase`, attributes as `@`-prefixed keys, netex
//! vehicle references as an attributed text element. Optional fields are
//! omitted from the wire entirely when absent. Numeric fields accept both
//! JSON numbers and the string form the XML syntax delivers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock;
use crate::model::VehiclePosition;

/// Protocol version stamped into the `@version` attribute.
pub const WIRE_VERSION: &str = "1.0";
/// Version wildcard for netex references.
pub const ANY_VERSION: &str = "any";
/// Namespace of the netex vehicle reference element.
pub const NETEX_NAMESPACE: &str = "http://www.netex.org.uk/netex";
/// `CommonResponseCode` value signalling acceptance.
pub const RESPONSE_CODE_OK: &str = "ok";

fn wire_version() -> String {
    WIRE_VERSION.to_string()
}

fn any_version() -> String {
    ANY_VERSION.to_string()
}

fn netex_namespace() -> String {
    NETEX_NAMESPACE.to_string()
}

fn response_code_ok() -> String {
    RESPONSE_CODE_OK.to_string()
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Closed set of messages that travel the exchange topics.
///
/// The wire identifies each variant by its type name (see
/// [`IomMessage::wire_name`]); the registration table in the registry is
/// the single source of truth for that mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum IomMessage {
    TechnicalVehicleLogOnRequest(TechnicalVehicleLogOnRequest),
    TechnicalVehicleLogOnResponse(TechnicalVehicleLogOnResponse),
    TechnicalVehicleLogOffRequest(TechnicalVehicleLogOffRequest),
    TechnicalVehicleLogOffResponse(TechnicalVehicleLogOffResponse),
    GnssPhysicalPositionData(GnssPhysicalPositionData),
    InvalidMessageResponse(InvalidMessageResponse),
}

/// netex reference: version attribute plus the reference text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRef {
    #[serde(rename = "@version", default = "any_version")]
    pub version: String,
    #[serde(rename = "#text")]
    pub value: String,
}

impl VehicleRef {
    pub fn new(value: impl Into<String>) -> Self {
        VehicleRef {
            version: any_version(),
            value: value.into(),
        }
    }
}

/// Registers a vehicle session with the remote ITCS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalVehicleLogOnRequest {
    #[serde(rename = "@version", default = "wire_version")]
    pub version: String,
    #[serde(rename = "@xmlns:netex", default = "netex_namespace")]
    pub netex_namespace: String,
    #[serde(rename = "Timestamp", default = "crate::clock::iso_now")]
    pub timestamp: String,
    #[serde(rename = "MessageId", default = "new_message_id")]
    pub message_id: String,
    #[serde(rename = "netex:VehicleRef")]
    pub vehicle_ref: VehicleRef,
    #[serde(
        rename = "OnBoardUnitId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub onboard_unit_id: Option<String>,
    #[serde(
        rename = "BaseVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub base_version: Option<String>,
}

impl TechnicalVehicleLogOnRequest {
    pub fn new(vehicle_ref: impl Into<String>) -> Self {
        TechnicalVehicleLogOnRequest {
            version: wire_version(),
            netex_namespace: netex_namespace(),
            timestamp: clock::iso_now(),
            message_id: new_message_id(),
            vehicle_ref: VehicleRef::new(vehicle_ref),
            onboard_unit_id: None,
            base_version: None,
        }
    }
}

/// Empty acknowledgement body of a successful logon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalVehicleLogOnResponseData {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalVehicleLogOnResponseError {
    #[serde(rename = "TechnicalVehicleLogOnResponseCode")]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalVehicleLogOnResponse {
    #[serde(rename = "@version", default = "wire_version")]
    pub version: String,
    #[serde(rename = "Timestamp", default = "crate::clock::iso_now")]
    pub timestamp: String,
    #[serde(rename = "MessageId", default = "new_message_id")]
    pub message_id: String,
    #[serde(
        rename = "MessageIdRef",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id_ref: Option<String>,
    #[serde(rename = "CommonResponseCode", default = "response_code_ok")]
    pub common_response_code: String,
    #[serde(
        rename = "TechnicalVehicleLogOnResponseData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<TechnicalVehicleLogOnResponseData>,
    #[serde(
        rename = "TechnicalVehicleLogOnResponseError",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<TechnicalVehicleLogOnResponseError>,
}

impl TechnicalVehicleLogOnResponse {
    /// Successful logon answering `request_id`.
    pub fn acknowledge(request_id: impl Into<String>) -> Self {
        TechnicalVehicleLogOnResponse {
            version: wire_version(),
            timestamp: clock::iso_now(),
            message_id: new_message_id(),
            message_id_ref: Some(request_id.into()),
            common_response_code: response_code_ok(),
            data: Some(TechnicalVehicleLogOnResponseData {}),
            error: None,
        }
    }

    /// Rejection answering `request_id` with a typed logon error code.
    pub fn reject(request_id: impl Into<String>, code: impl Into<String>) -> Self {
        TechnicalVehicleLogOnResponse {
            version: wire_version(),
            timestamp: clock::iso_now(),
            message_id: new_message_id(),
            message_id_ref: Some(request_id.into()),
            common_response_code: response_code_ok(),
            data: None,
            error: Some(TechnicalVehicleLogOnResponseError { code: code.into() }),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.common_response_code == RESPONSE_CODE_OK && self.error.is_none()
    }

    /// The most specific rejection code, if the response is not an
    /// acceptance: the typed error code when present, the common response
    /// code otherwise.
    pub fn rejection_code(&self) -> Option<&str> {
        if let Some(error) = &self.error {
            return Some(error.code.as_str());
        }
        (self.common_response_code != RESPONSE_CODE_OK)
            .then_some(self.common_response_code.as_str())
    }
}

/// Closes a vehicle session with the remote ITCS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalVehicleLogOffRequest {
    #[serde(rename = "@version", default = "wire_version")]
    pub version: String,
    #[serde(rename = "@xmlns:netex", default = "netex_namespace")]
    pub netex_namespace: String,
    #[serde(rename = "Timestamp", default = "crate::clock::iso_now")]
    pub timestamp: String,
    #[serde(rename = "MessageId", default = "new_message_id")]
    pub message_id: String,
    #[serde(rename = "netex:VehicleRef")]
    pub vehicle_ref: VehicleRef,
    #[serde(
        rename = "OnBoardUnitId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub onboard_unit_id: Option<String>,
}

impl TechnicalVehicleLogOffRequest {
    pub fn new(vehicle_ref: impl Into<String>) -> Self {
        TechnicalVehicleLogOffRequest {
            version: wire_version(),
            netex_namespace: netex_namespace(),
            timestamp: clock::iso_now(),
            message_id: new_message_id(),
            vehicle_ref: VehicleRef::new(vehicle_ref),
            onboard_unit_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalVehicleLogOffResponseData {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalVehicleLogOffResponseError {
    #[serde(rename = "TechnicalVehicleLogOffResponseCode")]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalVehicleLogOffResponse {
    #[serde(rename = "@version", default = "wire_version")]
    pub version: String,
    #[serde(rename = "Timestamp", default = "crate::clock::iso_now")]
    pub timestamp: String,
    #[serde(rename = "MessageId", default = "new_message_id")]
    pub message_id: String,
    #[serde(
        rename = "MessageIdRef",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id_ref: Option<String>,
    #[serde(rename = "CommonResponseCode", default = "response_code_ok")]
    pub common_response_code: String,
    #[serde(
        rename = "TechnicalVehicleLogOffResponseData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<TechnicalVehicleLogOffResponseData>,
    #[serde(
        rename = "TechnicalVehicleLogOffResponseError",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<TechnicalVehicleLogOffResponseError>,
}

impl TechnicalVehicleLogOffResponse {
    pub fn acknowledge(request_id: impl Into<String>) -> Self {
        TechnicalVehicleLogOffResponse {
            version: wire_version(),
            timestamp: clock::iso_now(),
            message_id: new_message_id(),
            message_id_ref: Some(request_id.into()),
            common_response_code: response_code_ok(),
            data: Some(TechnicalVehicleLogOffResponseData {}),
            error: None,
        }
    }

    pub fn reject(request_id: impl Into<String>, code: impl Into<String>) -> Self {
        TechnicalVehicleLogOffResponse {
            version: wire_version(),
            timestamp: clock::iso_now(),
            message_id: new_message_id(),
            message_id_ref: Some(request_id.into()),
            common_response_code: response_code_ok(),
            data: None,
            error: Some(TechnicalVehicleLogOffResponseError { code: code.into() }),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.common_response_code == RESPONSE_CODE_OK && self.error.is_none()
    }

    pub fn rejection_code(&self) -> Option<&str> {
        if let Some(error) = &self.error {
            return Some(error.code.as_str());
        }
        (self.common_response_code != RESPONSE_CODE_OK)
            .then_some(self.common_response_code.as_str())
    }
}

/// Answer of the remote side to a payload it could not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidMessageResponse {
    #[serde(rename = "@version", default = "wire_version")]
    pub version: String,
    #[serde(rename = "Timestamp", default = "crate::clock::iso_now")]
    pub timestamp: String,
    #[serde(rename = "MessageId", default = "new_message_id")]
    pub message_id: String,
    #[serde(
        rename = "MessageIdRef",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id_ref: Option<String>,
    #[serde(rename = "CommonResponseCode", default = "response_code_ok")]
    pub common_response_code: String,
}

impl InvalidMessageResponse {
    pub fn new(code: impl Into<String>) -> Self {
        InvalidMessageResponse {
            version: wire_version(),
            timestamp: clock::iso_now(),
            message_id: new_message_id(),
            message_id_ref: None,
            common_response_code: code.into(),
        }
    }
}

/// WGS84 coordinates with optional quality channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wgs84PhysicalPosition {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "@srsName", default, skip_serializing_if = "Option::is_none")]
    pub srs_name: Option<String>,
    #[serde(
        rename = "Latitude",
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub latitude: Option<f64>,
    #[serde(
        rename = "Longitude",
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub longitude: Option<f64>,
    #[serde(
        rename = "Altitude",
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub altitude: Option<f64>,
    #[serde(
        rename = "Precision",
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub precision: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnssPhysicalPosition {
    #[serde(rename = "WGS84PhysicalPosition")]
    pub wgs84_physical_position: Wgs84PhysicalPosition,
    #[serde(
        rename = "NumberOfVisibleSatellites",
        default,
        deserialize_with = "lenient::opt_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub number_of_visible_satellites: Option<u32>,
    #[serde(
        rename = "CompassBearing",
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub compass_bearing: Option<f64>,
    #[serde(
        rename = "Velocity",
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub velocity: Option<f64>,
}

/// Retained position publication for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnssPhysicalPositionData {
    #[serde(rename = "@version", default = "wire_version")]
    pub version: String,
    #[serde(rename = "Timestamp", default = "crate::clock::iso_now")]
    pub timestamp: String,
    #[serde(rename = "TimestampOfMeasurement", default = "crate::clock::iso_now")]
    pub timestamp_of_measurement: String,
    #[serde(rename = "PublisherId")]
    pub publisher_id: String,
    #[serde(rename = "GnssPhysicalPosition")]
    pub gnss_physical_position: GnssPhysicalPosition,
}

impl GnssPhysicalPositionData {
    /// Maps a domain position onto the wire shape. The measurement
    /// timestamp comes from the fix; the publication timestamp is now.
    pub fn from_position(publisher_id: impl Into<String>, position: &VehiclePosition) -> Self {
        GnssPhysicalPositionData {
            version: wire_version(),
            timestamp: clock::iso_now(),
            timestamp_of_measurement: clock::unix_to_iso(position.timestamp),
            publisher_id: publisher_id.into(),
            gnss_physical_position: GnssPhysicalPosition {
                wgs84_physical_position: Wgs84PhysicalPosition {
                    id: None,
                    srs_name: None,
                    latitude: Some(position.latitude),
                    longitude: Some(position.longitude),
                    altitude: position.altitude,
                    precision: position.precision,
                },
                number_of_visible_satellites: position.satellites,
                compass_bearing: position.bearing,
                velocity: position.velocity,
            },
        }
    }
}

mod lenient {
    //! Numeric fields arrive as plain numbers from the JSON syntax and as
    //! strings from the XML syntax; both forms deserialize.

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    pub(super) fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(value)) => Ok(Some(value)),
            Some(Raw::Text(text)) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid decimal number `{text}`"))),
        }
    }

    pub(super) fn opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(value)) => {
                if value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
                    Ok(Some(value as u32))
                } else {
                    Err(D::Error::custom(format!("invalid count `{value}`")))
                }
            }
            Some(Raw::Text(text)) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid count `{text}`"))),
        }
    }
}
