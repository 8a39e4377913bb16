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

//! Wall-clock helpers.
//!
//! Wire timestamps are RFC 3339 with second precision and an explicit UTC
//! offset; internal freshness arithmetic runs on Unix seconds.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current moment as an RFC 3339 string, e.g. `2026-08-23T09:15:02+00:00`.
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Current moment as Unix seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Converts Unix seconds to the wire timestamp form.
pub fn unix_to_iso(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parses an RFC 3339 timestamp into Unix seconds.
pub fn iso_to_unix(timestamp: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|parsed| parsed.timestamp())
}
