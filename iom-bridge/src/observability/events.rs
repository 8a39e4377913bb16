//! Canonical structured event names used across `iom-bridge`.

// Exchange link lifecycle events.
pub const LINK_CONNECT_START: &str = "link_connect_start";
pub const LINK_CONNECT_OK: &str = "link_connect_ok";
pub const LINK_CONNECT_FAILED: &str = "link_connect_failed";
pub const LINK_SUBSCRIBE_OK: &str = "link_subscribe_ok";
pub const LINK_SUBSCRIBE_FAILED: &str = "link_subscribe_failed";
pub const LINK_DISCONNECTED: &str = "link_disconnected";
pub const LINK_TERMINATED: &str = "link_terminated";

// Correlated request/response events.
pub const REQUEST_PUBLISH: &str = "request_publish";
pub const REQUEST_PUBLISH_FAILED: &str = "request_publish_failed";
pub const REQUEST_RESOLVED: &str = "request_resolved";
pub const REQUEST_TIMEOUT: &str = "request_timeout";
pub const RESPONSE_TOKEN_MISMATCH: &str = "response_token_mismatch";
pub const RESPONSE_WITHOUT_PENDING: &str = "response_without_pending";
pub const INBOUND_DECODE_FAILED: &str = "inbound_decode_failed";
pub const INBOUND_UNMATCHED: &str = "inbound_unmatched";
pub const NOTIFY_PUBLISH_OK: &str = "notify_publish_ok";
pub const NOTIFY_PUBLISH_FAILED: &str = "notify_publish_failed";

// Synchronization engine events.
pub const SYNC_PASS_FAILED: &str = "sync_pass_failed";
pub const VEHICLE_DISCOVERED: &str = "vehicle_discovered";
pub const VEHICLE_LOGON_OK: &str = "vehicle_logon_ok";
pub const VEHICLE_LOGON_FAILED: &str = "vehicle_logon_failed";
pub const VEHICLE_DISAPPEARED: &str = "vehicle_disappeared";
pub const VEHICLE_LOGOFF_OK: &str = "vehicle_logoff_ok";
pub const VEHICLE_LOGOFF_FAILED: &str = "vehicle_logoff_failed";
pub const POSITION_PUBLISHED: &str = "position_published";
pub const POSITION_PUBLISH_FAILED: &str = "position_publish_failed";
pub const POSITION_SUPPRESSED: &str = "position_suppressed";
pub const SYNC_SHUTDOWN_START: &str = "sync_shutdown_start";
pub const SYNC_SHUTDOWN_COMPLETE: &str = "sync_shutdown_complete";
