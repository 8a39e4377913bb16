//! Topic layer.
//!
//! Hierarchical topic templates with two flavors: publish templates, which
//! must resolve every variable to a concrete segment before send, and
//! subscribe templates, which keep their wildcards and double as matchers
//! for inbound topics. The [`catalogue`] module pins down the concrete
//! topic shapes of the IoM exchange.

pub mod catalogue;
mod template;

pub use template::{extract_segment_value, TemplateError, TopicTemplate, TopicValues};
