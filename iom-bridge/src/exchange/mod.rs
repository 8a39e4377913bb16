//! Exchange layer.
//!
//! Synchronous-looking request/response calls on top of a pure pub/sub
//! link. The transport publishes and delivers messages; correlation tokens
//! embedded in the request topic, a single pending slot and a bounded wait
//! turn that into a call surface the synchronization engine can drive one
//! vehicle at a time. [`IomClient`] puts the concrete VDV435 operations on
//! top of the generic [`ExchangeClient`].

mod client;
mod correlation;
mod iom;
pub mod transport;

pub use client::{ExchangeClient, ExchangeOptions, PublishTemplate, ResponsePattern};
pub use iom::{IomClient, IomGateway, IomIdentity};
pub use transport::{PubSubTransport, QosLevel, TransportError, TransportListener};
