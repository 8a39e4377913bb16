//! Static registration table and the encode/decode entry points.
//!
//! Each entry pairs a wire type name with the decoder that rebuilds the
//! typed message from the unwrapped field map. The table is the closed,
//! compile-time enumeration of everything this crate will put on or accept
//! from the exchange topics; an inbound type name without an entry is a
//! decode failure, never a panic.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::messages::{
    GnssPhysicalPositionData, InvalidMessageResponse, IomMessage, TechnicalVehicleLogOffRequest,
    TechnicalVehicleLogOffResponse, TechnicalVehicleLogOnRequest, TechnicalVehicleLogOnResponse,
};
use super::{xml, WireError};

/// The two interchangeable wire syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Xml,
}

const LOG_ON_REQUEST: &str = "TechnicalVehicleLogOnRequestStructure";
const LOG_ON_RESPONSE: &str = "TechnicalVehicleLogOnResponseStructure";
const LOG_OFF_REQUEST: &str = "TechnicalVehicleLogOffRequestStructure";
const LOG_OFF_RESPONSE: &str = "TechnicalVehicleLogOffResponseStructure";
const GNSS_POSITION_DATA: &str = "GnssPhysicalPositionDataStructure";
const INVALID_MESSAGE_RESPONSE: &str = "InvalidMessageResponseStructure";

struct Registration {
    wire_name: &'static str,
    decode: fn(Value) -> Result<IomMessage, WireError>,
}

static REGISTRY: &[Registration] = &[
    Registration {
        wire_name: LOG_ON_REQUEST,
        decode: decode_log_on_request,
    },
    Registration {
        wire_name: LOG_ON_RESPONSE,
        decode: decode_log_on_response,
    },
    Registration {
        wire_name: LOG_OFF_REQUEST,
        decode: decode_log_off_request,
    },
    Registration {
        wire_name: LOG_OFF_RESPONSE,
        decode: decode_log_off_response,
    },
    Registration {
        wire_name: GNSS_POSITION_DATA,
        decode: decode_gnss_position_data,
    },
    Registration {
        wire_name: INVALID_MESSAGE_RESPONSE,
        decode: decode_invalid_message_response,
    },
];

impl IomMessage {
    /// Type name identifying this message on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            IomMessage::TechnicalVehicleLogOnRequest(_) => LOG_ON_REQUEST,
            IomMessage::TechnicalVehicleLogOnResponse(_) => LOG_ON_RESPONSE,
            IomMessage::TechnicalVehicleLogOffRequest(_) => LOG_OFF_REQUEST,
            IomMessage::TechnicalVehicleLogOffResponse(_) => LOG_OFF_RESPONSE,
            IomMessage::GnssPhysicalPositionData(_) => GNSS_POSITION_DATA,
            IomMessage::InvalidMessageResponse(_) => INVALID_MESSAGE_RESPONSE,
        }
    }
}

/// Wire type names in registration order, for table-driven tests and
/// diagnostics.
pub fn registered_wire_names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|registration| registration.wire_name)
}

/// Renders `message` in the requested syntax, wrapped under its type name.
pub fn encode(message: &IomMessage, format: WireFormat) -> Result<String, WireError> {
    let wire_name = message.wire_name();
    let body = body_value(message)?;
    match format {
        WireFormat::Json => {
            let mut envelope = Map::new();
            envelope.insert(wire_name.to_string(), body);
            serde_json::to_string_pretty(&Value::Object(envelope)).map_err(|err| {
                WireError::Fields {
                    wire_name,
                    detail: err.to_string(),
                }
            })
        }
        WireFormat::Xml => xml::value_to_document(wire_name, &body),
    }
}

/// Parses a payload in either syntax back into a typed message.
///
/// JSON parse is attempted first; anything that is not valid JSON is
/// treated as XML, matching the remote side's detection order.
pub fn decode(raw: &str) -> Result<IomMessage, WireError> {
    let document = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(_) => xml::document_to_value(raw).map_err(|err| match err {
            WireError::Xml(detail) => WireError::Syntax(detail),
            other => other,
        })?,
    };

    let Value::Object(envelope) = document else {
        return Err(WireError::Envelope);
    };
    if envelope.len() != 1 {
        return Err(WireError::Envelope);
    }
    let (wire_name, body) = envelope.into_iter().next().ok_or(WireError::Envelope)?;

    let registration = REGISTRY
        .iter()
        .find(|registration| registration.wire_name == wire_name)
        .ok_or(WireError::UnknownType(wire_name))?;
    (registration.decode)(body)
}

fn body_value(message: &IomMessage) -> Result<Value, WireError> {
    let serialized = match message {
        IomMessage::TechnicalVehicleLogOnRequest(inner) => serde_json::to_value(inner),
        IomMessage::TechnicalVehicleLogOnResponse(inner) => serde_json::to_value(inner),
        IomMessage::TechnicalVehicleLogOffRequest(inner) => serde_json::to_value(inner),
        IomMessage::TechnicalVehicleLogOffResponse(inner) => serde_json::to_value(inner),
        IomMessage::GnssPhysicalPositionData(inner) => serde_json::to_value(inner),
        IomMessage::InvalidMessageResponse(inner) => serde_json::to_value(inner),
    };
    serialized.map_err(|err| WireError::Fields {
        wire_name: message.wire_name(),
        detail: err.to_string(),
    })
}

fn parse_body<T: DeserializeOwned>(wire_name: &'static str, body: Value) -> Result<T, WireError> {
    serde_json::from_value(body).map_err(|err| WireError::Fields {
        wire_name,
        detail: err.to_string(),
    })
}

fn decode_log_on_request(body: Value) -> Result<IomMessage, WireError> {
    parse_body::<TechnicalVehicleLogOnRequest>(LOG_ON_REQUEST, body)
        .map(IomMessage::TechnicalVehicleLogOnRequest)
}

fn decode_log_on_response(body: Value) -> Result<IomMessage, WireError> {
    parse_body::<TechnicalVehicleLogOnResponse>(LOG_ON_RESPONSE, body)
        .map(IomMessage::TechnicalVehicleLogOnResponse)
}

fn decode_log_off_request(body: Value) -> Result<IomMessage, WireError> {
    parse_body::<TechnicalVehicleLogOffRequest>(LOG_OFF_REQUEST, body)
        .map(IomMessage::TechnicalVehicleLogOffRequest)
}

fn decode_log_off_response(body: Value) -> Result<IomMessage, WireError> {
    parse_body::<TechnicalVehicleLogOffResponse>(LOG_OFF_RESPONSE, body)
        .map(IomMessage::TechnicalVehicleLogOffResponse)
}

fn decode_gnss_position_data(body: Value) -> Result<IomMessage, WireError> {
    parse_body::<GnssPhysicalPositionData>(GNSS_POSITION_DATA, body)
        .map(IomMessage::GnssPhysicalPositionData)
}

fn decode_invalid_message_response(body: Value) -> Result<IomMessage, WireError> {
    parse_body::<InvalidMessageResponse>(INVALID_MESSAGE_RESPONSE, body)
        .map(IomMessage::InvalidMessageResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Vehicle, VehiclePosition};
    use crate::wire::messages::{RESPONSE_CODE_OK, WIRE_VERSION};

    fn sample_messages() -> Vec<IomMessage> {
        let vehicle = Vehicle::new("23", "vehicle-23");
        let mut position = VehiclePosition::new(vehicle, 53.551, 9.994, 1_700_000_000);
        position.altitude = Some(12.0);
        position.satellites = Some(9);
        position.velocity = Some(8.4);

        let mut logon_request = TechnicalVehicleLogOnRequest::new("vehicle-23");
        logon_request.onboard_unit_id = Some("obu-7".to_string());
        logon_request.base_version = Some("2024a".to_string());

        vec![
            IomMessage::TechnicalVehicleLogOnRequest(logon_request),
            IomMessage::TechnicalVehicleLogOnResponse(TechnicalVehicleLogOnResponse::acknowledge(
                "m-1",
            )),
            IomMessage::TechnicalVehicleLogOffRequest(TechnicalVehicleLogOffRequest::new(
                "vehicle-23",
            )),
            IomMessage::TechnicalVehicleLogOffResponse(TechnicalVehicleLogOffResponse::reject(
                "m-2",
                "VehicleNotLoggedOn",
            )),
            IomMessage::GnssPhysicalPositionData(GnssPhysicalPositionData::from_position(
                "org-hvv", &position,
            )),
            IomMessage::InvalidMessageResponse(InvalidMessageResponse::new("undefinedError")),
        ]
    }

    #[test]
    fn every_registered_type_round_trips_in_both_syntaxes() {
        let samples = sample_messages();
        assert_eq!(samples.len(), registered_wire_names().count());

        for message in samples {
            for format in [WireFormat::Json, WireFormat::Xml] {
                let encoded = encode(&message, format).expect("encode should succeed");
                let decoded = decode(&encoded).expect("decode should succeed");
                assert_eq!(decoded, message, "round-trip mismatch via {format:?}");
            }
        }
    }

    #[test]
    fn encoded_document_is_wrapped_under_the_type_name() {
        let message =
            IomMessage::TechnicalVehicleLogOnRequest(TechnicalVehicleLogOnRequest::new("v-1"));

        let json = encode(&message, WireFormat::Json).expect("encode should succeed");
        let parsed: Value = serde_json::from_str(&json).expect("valid json");
        let keys: Vec<&String> = parsed.as_object().expect("object").keys().collect();
        assert_eq!(keys, ["TechnicalVehicleLogOnRequestStructure"]);

        let xml = encode(&message, WireFormat::Xml).expect("encode should succeed");
        assert!(xml.contains("<TechnicalVehicleLogOnRequestStructure"));
        assert!(xml.contains("xmlns:netex=\"http://www.netex.org.uk/netex\""));
    }

    #[test]
    fn unknown_type_name_is_rejected() {
        let err = decode(r#"{ "MysteryStructure": {} }"#).expect_err("must fail");
        assert!(matches!(err, WireError::UnknownType(name) if name == "MysteryStructure"));
    }

    #[test]
    fn envelope_must_have_exactly_one_key() {
        assert!(matches!(
            decode(r#"{ "A": {}, "B": {} }"#),
            Err(WireError::Envelope)
        ));
        assert!(matches!(decode("{}"), Err(WireError::Envelope)));
        assert!(matches!(decode("42"), Err(WireError::Envelope)));
    }

    #[test]
    fn malformed_body_is_a_field_error() {
        let err = decode(r#"{ "TechnicalVehicleLogOnRequestStructure": { "Timestamp": "t" } }"#)
            .expect_err("missing vehicle ref must fail");
        assert!(matches!(
            err,
            WireError::Fields { wire_name, .. } if wire_name == "TechnicalVehicleLogOnRequestStructure"
        ));
    }

    #[test]
    fn gibberish_is_a_syntax_error() {
        assert!(matches!(
            decode("neither json nor xml"),
            Err(WireError::Syntax(_))
        ));
    }

    #[test]
    fn xml_fallback_applies_defaults_and_retypes_numbers() {
        let document = "\
<GnssPhysicalPositionDataStructure>\
<PublisherId>org-hvv</PublisherId>\
<GnssPhysicalPosition>\
<WGS84PhysicalPosition><Latitude>53.551</Latitude><Longitude>9.994</Longitude></WGS84PhysicalPosition>\
<NumberOfVisibleSatellites>9</NumberOfVisibleSatellites>\
</GnssPhysicalPosition>\
</GnssPhysicalPositionDataStructure>";

        let decoded = decode(document).expect("decode should succeed");
        let IomMessage::GnssPhysicalPositionData(data) = decoded else {
            panic!("wrong variant");
        };
        assert_eq!(data.version, WIRE_VERSION);
        assert_eq!(data.publisher_id, "org-hvv");
        assert_eq!(
            data.gnss_physical_position.wgs84_physical_position.latitude,
            Some(53.551)
        );
        assert_eq!(
            data.gnss_physical_position.number_of_visible_satellites,
            Some(9)
        );
    }

    #[test]
    fn xml_logon_response_with_empty_data_element_is_accepted() {
        let document = "\
<TechnicalVehicleLogOnResponseStructure version=\"1.0\">\
<MessageId>m-9</MessageId>\
<CommonResponseCode>ok</CommonResponseCode>\
<TechnicalVehicleLogOnResponseData/>\
</TechnicalVehicleLogOnResponseStructure>";

        let decoded = decode(document).expect("decode should succeed");
        let IomMessage::TechnicalVehicleLogOnResponse(response) = decoded else {
            panic!("wrong variant");
        };
        assert!(response.data.is_some());
        assert!(response.is_accepted());
        assert_eq!(response.common_response_code, RESPONSE_CODE_OK);
    }
}
