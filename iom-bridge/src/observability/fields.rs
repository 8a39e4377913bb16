/********************************************************************************
 * Copyright (c) 2025 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Canonical structured field keys and value-format helpers.

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const FEED: &str = "feed";

pub const VEHICLE: &str = "vehicle";
pub const VEHICLE_REF: &str = "vehicle_ref";

pub const TOPIC: &str = "topic";
pub const TEMPLATE: &str = "template";
pub const TOKEN: &str = "token";
pub const MESSAGE_TYPE: &str = "message_type";
pub const CODE: &str = "code";

pub const REASON: &str = "reason";
pub const ERR: &str = "err";

// Values for the `reason` field on suppressed positions.
pub const REASON_BLACKLISTED: &str = "blacklisted";
pub const REASON_UNTRACKED: &str = "untracked";
pub const REASON_STALE: &str = "stale";
pub const REASON_UNCHANGED: &str = "unchanged";

/// Abbreviates a payload for log records: full text up to `limit` bytes,
/// otherwise the leading chunk on a char boundary plus an ellipsis marker.
pub fn payload_preview(payload: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(payload);
    if text.len() <= limit {
        return text.into_owned();
    }
    let mut cut = limit;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}
