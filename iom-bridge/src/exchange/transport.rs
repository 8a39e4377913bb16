//! Transport boundary of the exchange layer.
//!
//! The exchange client consumes any broker through these two traits; the
//! concrete MQTT binding lives in its own crate. Implementations deliver
//! inbound traffic through the listener on their own task, so listener
//! methods must tolerate concurrent invocation with the publishing side.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Delivery guarantee requested for a publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Failure on the pub/sub link.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Operation requires an established connection.
    #[error("not connected to the broker")]
    NotConnected,

    /// The link was terminated; the client instance is spent.
    #[error("link terminated")]
    Terminated,

    /// Connecting to the broker failed or the connection collapsed.
    #[error("connection failure: {0}")]
    Connection(String),

    #[error("publish to `{topic}` failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("subscribe to `{filter}` failed: {reason}")]
    Subscribe { filter: String, reason: String },
}

/// One broker connection.
///
/// `connect` establishes the link and installs the listener; there is no
/// auto-reconnect anywhere in this boundary. After a failure the owner
/// decides whether to build a fresh connection.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    async fn connect(&self, listener: Arc<dyn TransportListener>) -> Result<(), TransportError>;

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
        retain: bool,
    ) -> Result<(), TransportError>;

    async fn subscribe(&self, filter: &str, qos: QosLevel) -> Result<(), TransportError>;

    async fn unsubscribe(&self, filter: &str) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Callbacks a transport drives on link events and inbound messages.
#[async_trait]
pub trait TransportListener: Send + Sync {
    async fn on_connected(&self);

    async fn on_message(&self, topic: &str, payload: &[u8]);

    async fn on_disconnected(&self, reason: &str);
}
