//! VDV435 operation surface on top of the generic exchange client.
//!
//! [`IomClient`] wires the concrete topic catalogue and message catalogue
//! into an [`ExchangeClient`] and exposes the three operations the
//! synchronization engine needs. The [`IomGateway`] trait is the seam the
//! engine is tested through.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::model::{Vehicle, VehiclePosition};
use crate::topic::catalogue::{
    self, SEGMENT_CORRELATION_ID, TEMPLATE_GNSS_POSITION, TEMPLATE_REQUEST_INBOX,
    TEMPLATE_RESPONSE_INBOX, VAR_CORRELATION, VAR_VEHICLE,
};
use crate::topic::TopicValues;
use crate::wire::messages::{
    GnssPhysicalPositionData, TechnicalVehicleLogOffRequest, TechnicalVehicleLogOnRequest,
};
use crate::wire::{IomMessage, WireFormat};

use super::client::{ExchangeClient, ExchangeOptions, PublishTemplate, ResponsePattern};
use super::transport::{PubSubTransport, QosLevel};

/// Addressing identity of one feed on the IoM side.
#[derive(Debug, Clone)]
pub struct IomIdentity {
    /// Organisation segment shared by every topic this feed touches.
    pub organisation: String,
    /// ITCS identifier addressed by correlated requests.
    pub itcs: String,
}

/// Session and position operations the synchronization engine drives.
///
/// `Ok` on the session operations means the remote side accepted; a
/// rejection or an unexpected answer surfaces as
/// [`BridgeError::Protocol`], a missing answer as
/// [`BridgeError::RequestTimeout`].
#[async_trait]
pub trait IomGateway: Send + Sync {
    async fn log_on_vehicle(&self, vehicle: &Vehicle) -> Result<(), BridgeError>;

    async fn log_off_vehicle(&self, vehicle: &Vehicle) -> Result<(), BridgeError>;

    /// Publishes the retained per-vehicle position notification.
    async fn publish_gnss_position(&self, position: &VehiclePosition) -> Result<(), BridgeError>;

    /// Disconnects and retires the underlying link.
    async fn terminate(&self) -> Result<(), BridgeError>;
}

/// VDV435 client for one feed: one broker connection, one organisation,
/// one ITCS.
pub struct IomClient {
    exchange: ExchangeClient,
    organisation: String,
    request_timeout: Duration,
}

impl IomClient {
    pub fn new(
        feed: impl Into<String>,
        transport: Arc<dyn PubSubTransport>,
        identity: &IomIdentity,
        request_timeout: Duration,
        wire_format: WireFormat,
    ) -> Result<Self, BridgeError> {
        let publish_templates = vec![
            PublishTemplate {
                name: TEMPLATE_REQUEST_INBOX,
                template: catalogue::request_inbox(&identity.organisation, &identity.itcs)?,
                qos: QosLevel::ExactlyOnce,
                retain: false,
            },
            PublishTemplate {
                name: TEMPLATE_GNSS_POSITION,
                template: catalogue::gnss_position(&identity.organisation)?,
                qos: QosLevel::ExactlyOnce,
                retain: true,
            },
        ];
        let response_patterns = vec![ResponsePattern {
            name: TEMPLATE_RESPONSE_INBOX,
            template: catalogue::response_inbox(&identity.organisation)?,
            qos: QosLevel::ExactlyOnce,
        }];
        let options = ExchangeOptions {
            wire_format,
            correlation_variable: VAR_CORRELATION.to_string(),
            correlation_segment: SEGMENT_CORRELATION_ID.to_string(),
        };

        Ok(IomClient {
            exchange: ExchangeClient::new(
                feed,
                transport,
                options,
                publish_templates,
                response_patterns,
            ),
            organisation: identity.organisation.clone(),
            request_timeout,
        })
    }

    /// Connects the link and subscribes the response inbox.
    pub async fn connect(&self) -> Result<(), BridgeError> {
        self.exchange.connect().await
    }
}

#[async_trait]
impl IomGateway for IomClient {
    async fn log_on_vehicle(&self, vehicle: &Vehicle) -> Result<(), BridgeError> {
        let request = IomMessage::TechnicalVehicleLogOnRequest(TechnicalVehicleLogOnRequest::new(
            &vehicle.vehicle_ref,
        ));
        let response = self
            .exchange
            .request(
                TEMPLATE_REQUEST_INBOX,
                &request,
                &TopicValues::new(),
                self.request_timeout,
            )
            .await?;

        match response {
            IomMessage::TechnicalVehicleLogOnResponse(response) if response.is_accepted() => Ok(()),
            IomMessage::TechnicalVehicleLogOnResponse(response) => Err(BridgeError::Protocol {
                code: response.rejection_code().unwrap_or("rejected").to_string(),
            }),
            other => Err(BridgeError::Protocol {
                code: format!("unexpected `{}`", other.wire_name()),
            }),
        }
    }

    async fn log_off_vehicle(&self, vehicle: &Vehicle) -> Result<(), BridgeError> {
        let request = IomMessage::TechnicalVehicleLogOffRequest(TechnicalVehicleLogOffRequest::new(
            &vehicle.vehicle_ref,
        ));
        let response = self
            .exchange
            .request(
                TEMPLATE_REQUEST_INBOX,
                &request,
                &TopicValues::new(),
                self.request_timeout,
            )
            .await?;

        match response {
            IomMessage::TechnicalVehicleLogOffResponse(response) if response.is_accepted() => {
                Ok(())
            }
            IomMessage::TechnicalVehicleLogOffResponse(response) => Err(BridgeError::Protocol {
                code: response.rejection_code().unwrap_or("rejected").to_string(),
            }),
            other => Err(BridgeError::Protocol {
                code: format!("unexpected `{}`", other.wire_name()),
            }),
        }
    }

    async fn publish_gnss_position(&self, position: &VehiclePosition) -> Result<(), BridgeError> {
        let message = IomMessage::GnssPhysicalPositionData(GnssPhysicalPositionData::from_position(
            &self.organisation,
            position,
        ));
        let values = TopicValues::new().with(VAR_VEHICLE, position.vehicle.vehicle_ref.as_str());
        self.exchange
            .publish(TEMPLATE_GNSS_POSITION, &message, &values)
            .await
    }

    async fn terminate(&self) -> Result<(), BridgeError> {
        self.exchange.terminate().await
    }
}
