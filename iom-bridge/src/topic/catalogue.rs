//! Concrete topic shapes of the IoM exchange.
//!
//! Three topics per feed: the request inbox the client publishes
//! correlated requests into, the response inbox it subscribes for answers,
//! and the per-vehicle retained position topic. `organisation` and `itcs`
//! are instance-scoped and bound here; `correlation` and `vehicle` stay
//! open for the per-call binding.

use super::template::{TemplateError, TopicTemplate, TopicValues};

pub const REQUEST_INBOX_PATTERN: &str =
    "IoM/1.0/Organisation/{organisation}/ItcsId/{itcs}/CorrelationId/{correlation}/RequestData";
pub const RESPONSE_INBOX_PATTERN: &str =
    "IoM/1.0/Organisation/{organisation}/+/VehicleId/+/CorrelationId/+/ResponseData";
pub const GNSS_POSITION_PATTERN: &str =
    "IoM/1.0/Organisation/{organisation}/Vehicle/{vehicle}/PhysicalPosition/GnssPhysicalPositionData";

// Template names under which the exchange client registers the topics.
pub const TEMPLATE_REQUEST_INBOX: &str = "request_inbox";
pub const TEMPLATE_RESPONSE_INBOX: &str = "response_inbox";
pub const TEMPLATE_GNSS_POSITION: &str = "gnss_position";

pub const VAR_ORGANISATION: &str = "organisation";
pub const VAR_ITCS: &str = "itcs";
pub const VAR_CORRELATION: &str = "correlation";
pub const VAR_VEHICLE: &str = "vehicle";

/// Literal segment preceding the correlation token in response topics.
pub const SEGMENT_CORRELATION_ID: &str = "CorrelationId";

/// Request inbox with the instance variables bound; `{correlation}` stays
/// open for the per-request token.
pub fn request_inbox(organisation: &str, itcs: &str) -> Result<TopicTemplate, TemplateError> {
    let values = TopicValues::new()
        .with(VAR_ORGANISATION, organisation)
        .with(VAR_ITCS, itcs);
    Ok(TopicTemplate::parse(REQUEST_INBOX_PATTERN)?.bind(&values))
}

/// Response inbox subscribe template for one organisation.
pub fn response_inbox(organisation: &str) -> Result<TopicTemplate, TemplateError> {
    let values = TopicValues::new().with(VAR_ORGANISATION, organisation);
    Ok(TopicTemplate::parse(RESPONSE_INBOX_PATTERN)?.bind(&values))
}

/// Retained position topic; `{vehicle}` stays open for the per-call
/// vehicle reference.
pub fn gnss_position(organisation: &str) -> Result<TopicTemplate, TemplateError> {
    let values = TopicValues::new().with(VAR_ORGANISATION, organisation);
    Ok(TopicTemplate::parse(GNSS_POSITION_PATTERN)?.bind(&values))
}
