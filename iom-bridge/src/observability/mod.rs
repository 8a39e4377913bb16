//! Observability layer.
//!
//! Canonical event names and structured field keys used by every `tracing`
//! record the crate emits. Log consumers key dashboards and alerts off the
//! `event` field, so the constants here are the stable contract; free-form
//! message text is not.

pub mod events;
pub mod fields;
