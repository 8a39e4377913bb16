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

//! Vendor-neutral upstream record shapes.
//!
//! Unknown fields are tolerated, upstream APIs grow fields without
//! notice. Timestamps arrive as Unix seconds from some systems and as
//! RFC 3339 strings from others; both forms parse.

use serde::Deserialize;

use iom_bridge::clock;
use iom_bridge::{AdapterError, Vehicle, VehiclePosition};

/// One roster entry as delivered upstream.
#[derive(Deserialize, Debug)]
pub(crate) struct VehicleRecord {
    id: String,
    /// Reference used towards the ITCS; falls back to the id.
    #[serde(default, alias = "ref")]
    vehicle_ref: Option<String>,
}

impl VehicleRecord {
    pub(crate) fn into_vehicle(self) -> Vehicle {
        let reference = self.vehicle_ref.unwrap_or_else(|| self.id.clone());
        Vehicle::new(self.id, reference)
    }
}

/// One GNSS fix as delivered upstream.
#[derive(Deserialize, Debug)]
pub(crate) struct PositionRecord {
    vehicle: VehicleRecord,
    latitude: f64,
    longitude: f64,
    timestamp: Timestamp,
    #[serde(default)]
    altitude: Option<f64>,
    #[serde(default)]
    precision: Option<f64>,
    #[serde(default)]
    satellites: Option<u32>,
    #[serde(default)]
    bearing: Option<f64>,
    #[serde(default)]
    velocity: Option<f64>,
}

impl PositionRecord {
    pub(crate) fn into_position(self) -> Result<VehiclePosition, AdapterError> {
        let timestamp = self.timestamp.to_unix()?;
        let mut position = VehiclePosition::new(
            self.vehicle.into_vehicle(),
            self.latitude,
            self.longitude,
            timestamp,
        );
        position.altitude = self.altitude;
        position.precision = self.precision;
        position.satellites = self.satellites;
        position.bearing = self.bearing;
        position.velocity = self.velocity;
        Ok(position)
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Timestamp {
    Unix(i64),
    Iso(String),
}

impl Timestamp {
    fn to_unix(&self) -> Result<i64, AdapterError> {
        match self {
            Timestamp::Unix(seconds) => Ok(*seconds),
            Timestamp::Iso(text) => clock::iso_to_unix(text).ok_or_else(|| {
                AdapterError::Malformed(format!("unparseable timestamp `{text}`"))
            }),
        }
    }
}

/// Fixture document replayed by the static-file adapter.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct FeedDocument {
    #[serde(default)]
    pub(crate) vehicles: Vec<VehicleRecord>,
    #[serde(default)]
    pub(crate) positions: Vec<PositionRecord>,
}
