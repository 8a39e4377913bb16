//! Generic correlated exchange client over one pub/sub transport.
//!
//! The client publishes through named topic templates and turns the pure
//! pub/sub link into a call surface: [`ExchangeClient::request`] stamps a
//! fresh correlation token into the request topic, installs the single
//! pending slot, publishes, and waits bounded for the response that comes
//! back on a subscribed response pattern carrying the same token. A
//! request gate serializes callers, so at most one request is in flight
//! per client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::observability::{events, fields};
use crate::topic::{extract_segment_value, TemplateError, TopicTemplate, TopicValues};
use crate::wire::{self, IomMessage, WireFormat};

use super::correlation::{CorrelationSlot, Resolution};
use super::transport::{PubSubTransport, QosLevel, TransportError, TransportListener};

const COMPONENT: &str = "exchange_client";
const PAYLOAD_PREVIEW_LIMIT: usize = 96;

/// Behavioral knobs of the exchange client.
#[derive(Debug, Clone)]
pub struct ExchangeOptions {
    /// Syntax in which outbound payloads are rendered. Inbound payloads
    /// are always accepted in either syntax.
    pub wire_format: WireFormat,
    /// Template variable that receives the correlation token on requests.
    pub correlation_variable: String,
    /// Literal topic segment preceding the token in response topics.
    pub correlation_segment: String,
}

/// A named outbound topic with its delivery settings.
pub struct PublishTemplate {
    pub name: &'static str,
    pub template: TopicTemplate,
    pub qos: QosLevel,
    pub retain: bool,
}

/// A subscription whose traffic is screened for correlated responses.
pub struct ResponsePattern {
    pub name: &'static str,
    pub template: TopicTemplate,
    pub qos: QosLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal. A terminated client never reconnects; the owner builds a
    /// fresh client instead.
    Terminated,
}

/// State shared between the client surface and the inbound dispatcher.
struct Shared {
    name: String,
    state: Mutex<LinkState>,
    slot: CorrelationSlot,
    response_patterns: Vec<ResponsePattern>,
    correlation_segment: String,
}

impl Shared {
    fn state(&self) -> LinkState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: LinkState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != LinkState::Terminated {
            *state = next;
        }
    }
}

/// Correlated request/response and fire-and-forget publishing on one
/// broker connection.
pub struct ExchangeClient {
    shared: Arc<Shared>,
    transport: Arc<dyn PubSubTransport>,
    wire_format: WireFormat,
    correlation_variable: String,
    publish_templates: Vec<PublishTemplate>,
    request_gate: tokio::sync::Mutex<()>,
    next_token: AtomicU64,
}

impl ExchangeClient {
    pub fn new(
        name: impl Into<String>,
        transport: Arc<dyn PubSubTransport>,
        options: ExchangeOptions,
        publish_templates: Vec<PublishTemplate>,
        response_patterns: Vec<ResponsePattern>,
    ) -> Self {
        ExchangeClient {
            shared: Arc::new(Shared {
                name: name.into(),
                state: Mutex::new(LinkState::Disconnected),
                slot: CorrelationSlot::new(),
                response_patterns,
                correlation_segment: options.correlation_segment,
            }),
            transport,
            wire_format: options.wire_format,
            correlation_variable: options.correlation_variable,
            publish_templates,
            request_gate: tokio::sync::Mutex::new(()),
            next_token: AtomicU64::new(0),
        }
    }

    /// Connects the transport and subscribes every response pattern.
    /// Idempotent while connected; an error on a terminated client.
    pub async fn connect(&self) -> Result<(), BridgeError> {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match *state {
                LinkState::Terminated => return Err(TransportError::Terminated.into()),
                LinkState::Connecting | LinkState::Connected => return Ok(()),
                LinkState::Disconnected => *state = LinkState::Connecting,
            }
        }

        info!(
            event = events::LINK_CONNECT_START,
            component = COMPONENT,
            feed = self.shared.name.as_str(),
            "connecting exchange link"
        );

        let dispatcher: Arc<dyn TransportListener> = Arc::new(InboundDispatcher {
            shared: self.shared.clone(),
        });
        if let Err(err) = self.transport.connect(dispatcher).await {
            self.shared.set_state(LinkState::Disconnected);
            warn!(
                event = events::LINK_CONNECT_FAILED,
                component = COMPONENT,
                feed = self.shared.name.as_str(),
                err = %err,
                "exchange link connect failed"
            );
            return Err(err.into());
        }
        self.shared.set_state(LinkState::Connected);

        for pattern in &self.shared.response_patterns {
            let filter = pattern.template.subscription_filter()?;
            if let Err(err) = self.transport.subscribe(&filter, pattern.qos).await {
                warn!(
                    event = events::LINK_SUBSCRIBE_FAILED,
                    component = COMPONENT,
                    feed = self.shared.name.as_str(),
                    template = pattern.name,
                    topic = filter.as_str(),
                    err = %err,
                    "response subscription failed"
                );
                return Err(err.into());
            }
            debug!(
                event = events::LINK_SUBSCRIBE_OK,
                component = COMPONENT,
                feed = self.shared.name.as_str(),
                template = pattern.name,
                topic = filter.as_str(),
                "response pattern subscribed"
            );
        }

        info!(
            event = events::LINK_CONNECT_OK,
            component = COMPONENT,
            feed = self.shared.name.as_str(),
            "exchange link established"
        );
        Ok(())
    }

    /// Publishes `message` through the named template without expecting an
    /// answer. `values` supplies the call-scoped template variables.
    pub async fn publish(
        &self,
        template_name: &str,
        message: &IomMessage,
        values: &TopicValues,
    ) -> Result<(), BridgeError> {
        self.ensure_connected()?;
        let template = self.publish_template(template_name)?;
        let topic = template.template.resolve(values)?;
        let payload = wire::encode(message, self.wire_format)?;

        match self
            .transport
            .publish(&topic, payload.as_bytes(), template.qos, template.retain)
            .await
        {
            Ok(()) => {
                debug!(
                    event = events::NOTIFY_PUBLISH_OK,
                    component = COMPONENT,
                    feed = self.shared.name.as_str(),
                    template = template.name,
                    topic = topic.as_str(),
                    message_type = message.wire_name(),
                    "notification published"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    event = events::NOTIFY_PUBLISH_FAILED,
                    component = COMPONENT,
                    feed = self.shared.name.as_str(),
                    template = template.name,
                    topic = topic.as_str(),
                    message_type = message.wire_name(),
                    err = %err,
                    "notification publish failed"
                );
                Err(err.into())
            }
        }
    }

    /// Publishes `message` as a correlated request and waits up to
    /// `timeout` for the matching response.
    ///
    /// The fresh token is bound to the template variable named in the
    /// options, so the request topic itself carries the correlation. The
    /// pending slot is installed before the publish goes out; a response
    /// therefore cannot race past its waiter. On timeout the slot is
    /// cleared and the token is burned, so a late straggler resolves
    /// nothing.
    pub async fn request(
        &self,
        template_name: &str,
        message: &IomMessage,
        values: &TopicValues,
        timeout: Duration,
    ) -> Result<IomMessage, BridgeError> {
        let _turn = self.request_gate.lock().await;
        self.ensure_connected()?;

        let template = self.publish_template(template_name)?;
        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        let call_values = values
            .clone()
            .with(self.correlation_variable.as_str(), token.to_string());
        let topic = template.template.resolve(&call_values)?;
        let payload = wire::encode(message, self.wire_format)?;

        let receiver = self.shared.slot.install(token);
        debug!(
            event = events::REQUEST_PUBLISH,
            component = COMPONENT,
            feed = self.shared.name.as_str(),
            template = template.name,
            topic = topic.as_str(),
            token,
            message_type = message.wire_name(),
            "publishing correlated request"
        );

        if let Err(err) = self
            .transport
            .publish(&topic, payload.as_bytes(), template.qos, template.retain)
            .await
        {
            self.shared.slot.clear(token);
            warn!(
                event = events::REQUEST_PUBLISH_FAILED,
                component = COMPONENT,
                feed = self.shared.name.as_str(),
                template = template.name,
                topic = topic.as_str(),
                token,
                err = %err,
                "request publish failed"
            );
            return Err(err.into());
        }

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => {
                debug!(
                    event = events::REQUEST_RESOLVED,
                    component = COMPONENT,
                    feed = self.shared.name.as_str(),
                    token,
                    message_type = response.wire_name(),
                    "request resolved"
                );
                Ok(response)
            }
            Ok(Err(_)) | Err(_) => {
                self.shared.slot.clear(token);
                warn!(
                    event = events::REQUEST_TIMEOUT,
                    component = COMPONENT,
                    feed = self.shared.name.as_str(),
                    token,
                    timeout_ms = timeout.as_millis() as u64,
                    "request expired without a matching response"
                );
                Err(BridgeError::RequestTimeout { timeout })
            }
        }
    }

    /// Disconnects and retires this client permanently.
    pub async fn terminate(&self) -> Result<(), BridgeError> {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *state == LinkState::Terminated {
                return Ok(());
            }
            *state = LinkState::Terminated;
        }

        let disconnected = self.transport.disconnect().await;
        info!(
            event = events::LINK_TERMINATED,
            component = COMPONENT,
            feed = self.shared.name.as_str(),
            "exchange link terminated"
        );
        disconnected.map_err(BridgeError::from)
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        match self.shared.state() {
            LinkState::Connected => Ok(()),
            LinkState::Terminated => Err(TransportError::Terminated),
            LinkState::Disconnected | LinkState::Connecting => Err(TransportError::NotConnected),
        }
    }

    fn publish_template(&self, name: &str) -> Result<&PublishTemplate, TemplateError> {
        self.publish_templates
            .iter()
            .find(|template| template.name == name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
    }
}

/// Transport listener that screens inbound traffic and feeds the
/// correlation slot.
struct InboundDispatcher {
    shared: Arc<Shared>,
}

#[async_trait]
impl TransportListener for InboundDispatcher {
    async fn on_connected(&self) {
        self.shared.set_state(LinkState::Connected);
    }

    async fn on_message(&self, topic: &str, payload: &[u8]) {
        let Some(pattern) = self
            .shared
            .response_patterns
            .iter()
            .find(|pattern| pattern.template.matches(topic))
        else {
            debug!(
                event = events::INBOUND_UNMATCHED,
                component = COMPONENT,
                feed = self.shared.name.as_str(),
                topic,
                "inbound topic matches no response pattern"
            );
            return;
        };

        let token = extract_segment_value(topic, &self.shared.correlation_segment)
            .ok()
            .and_then(|value| value.parse::<u64>().ok());
        let Some(token) = token else {
            debug!(
                event = events::INBOUND_UNMATCHED,
                component = COMPONENT,
                feed = self.shared.name.as_str(),
                template = pattern.name,
                topic,
                reason = "no_correlation_token",
                "response topic carries no usable correlation token"
            );
            return;
        };

        // Decode before touching the slot: a malformed payload is dropped
        // here and the pending request keeps waiting for a valid one.
        let message = match std::str::from_utf8(payload)
            .map_err(|err| wire::WireError::Syntax(err.to_string()))
            .and_then(wire::decode)
        {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    event = events::INBOUND_DECODE_FAILED,
                    component = COMPONENT,
                    feed = self.shared.name.as_str(),
                    topic,
                    token,
                    err = %err,
                    payload = fields::payload_preview(payload, PAYLOAD_PREVIEW_LIMIT).as_str(),
                    "inbound response payload failed to decode"
                );
                return;
            }
        };

        match self.shared.slot.resolve(token, message) {
            Resolution::Delivered => {}
            Resolution::TokenMismatch { outstanding } => {
                warn!(
                    event = events::RESPONSE_TOKEN_MISMATCH,
                    component = COMPONENT,
                    feed = self.shared.name.as_str(),
                    topic,
                    token,
                    outstanding,
                    "response token does not match the outstanding request"
                );
            }
            Resolution::NoOutstanding => {
                debug!(
                    event = events::RESPONSE_WITHOUT_PENDING,
                    component = COMPONENT,
                    feed = self.shared.name.as_str(),
                    topic,
                    token,
                    "response arrived with no outstanding request"
                );
            }
        }
    }

    async fn on_disconnected(&self, reason: &str) {
        if self.shared.state() == LinkState::Terminated {
            return;
        }
        self.shared.set_state(LinkState::Disconnected);
        warn!(
            event = events::LINK_DISCONNECTED,
            component = COMPONENT,
            feed = self.shared.name.as_str(),
            reason,
            "exchange link lost"
        );
    }
}
