//! Wire-format layer.
//!
//! The partner protocol speaks one message shape in two interchangeable
//! syntaxes, XML and JSON. Every payload is a document whose single
//! top-level key names the message type; the body underneath is the field
//! map. [`encode`] renders a typed message in either syntax, [`decode`]
//! detects the syntax, resolves the type name against the static
//! registration table and rebuilds the typed message.
//!
//! ```
//! use iom_bridge::wire::{self, IomMessage, WireFormat};
//! use iom_bridge::wire::messages::TechnicalVehicleLogOnRequest;
//!
//! let request = IomMessage::TechnicalVehicleLogOnRequest(
//!     TechnicalVehicleLogOnRequest::new("vehicle-23"),
//! );
//! let json = wire::encode(&request, WireFormat::Json).unwrap();
//! let xml = wire::encode(&request, WireFormat::Xml).unwrap();
//! assert_eq!(wire::decode(&json).unwrap(), request);
//! assert_eq!(wire::decode(&xml).unwrap(), request);
//! ```

use thiserror::Error;

pub mod messages;
mod registry;
mod xml;

pub use messages::IomMessage;
pub use registry::{decode, encode, registered_wire_names, WireFormat};

/// Failure in the wire-format layer. Decode failures drop the offending
/// payload; they never tear down the link or touch correlation state.
#[derive(Debug, Error)]
pub enum WireError {
    /// The payload parsed as neither JSON nor XML.
    #[error("payload is neither valid JSON nor valid XML: {0}")]
    Syntax(String),

    /// The document is not an object with exactly one top-level key.
    #[error("expected a single top-level message-type key")]
    Envelope,

    /// The top-level key names no registered message type.
    #[error("no message type registered for `{0}`")]
    UnknownType(String),

    /// The body under a known type key does not satisfy the message shape.
    #[error("malformed `{wire_name}` body: {detail}")]
    Fields {
        wire_name: &'static str,
        detail: String,
    },

    /// XML rendering or parsing failed structurally.
    #[error("xml conversion failed: {0}")]
    Xml(String),
}
