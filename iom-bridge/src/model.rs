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

//! Domain model shared by adapters, the exchange client and the
//! synchronization engine.

use std::hash::{Hash, Hasher};

/// A vehicle known to the upstream AVL system.
///
/// Identity is the feed-scoped `id` alone; `vehicle_ref` is the reference the
/// remote ITCS addresses the vehicle by and `is_logged_on` is local session
/// state. Two sightings of the same `id` are the same vehicle even when the
/// other fields differ, which is what lets roster reconciliation work on
/// plain set operations.
#[derive(Debug, Clone)]
pub struct Vehicle {
    /// Stable identifier within the owning feed.
    pub id: String,
    /// Reference used on the wire when talking to the remote side.
    pub vehicle_ref: String,
    /// Whether a technical logon for this vehicle currently stands.
    pub is_logged_on: bool,
}

impl Vehicle {
    /// A freshly sighted vehicle, not yet logged on.
    pub fn new(id: impl Into<String>, vehicle_ref: impl Into<String>) -> Self {
        Vehicle {
            id: id.into(),
            vehicle_ref: vehicle_ref.into(),
            is_logged_on: false,
        }
    }
}

impl PartialEq for Vehicle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Vehicle {}

impl Hash for Vehicle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A single GNSS fix for a vehicle.
///
/// Equality is `(vehicle id, timestamp)`: the engine treats a re-delivered
/// fix as the same observation regardless of jitter in the optional fields.
#[derive(Debug, Clone)]
pub struct VehiclePosition {
    pub vehicle: Vehicle,
    /// WGS84 latitude in decimal degrees.
    pub latitude: f64,
    /// WGS84 longitude in decimal degrees.
    pub longitude: f64,
    /// Unix timestamp (seconds) of the measurement.
    pub timestamp: i64,
    /// Altitude above the WGS84 ellipsoid, metres.
    pub altitude: Option<f64>,
    /// Estimated horizontal precision, metres.
    pub precision: Option<f64>,
    pub satellites: Option<u32>,
    /// Compass bearing in degrees, 0 = north.
    pub bearing: Option<f64>,
    /// Speed over ground, metres per second.
    pub velocity: Option<f64>,
}

impl VehiclePosition {
    /// A fix carrying only the mandatory coordinates.
    pub fn new(vehicle: Vehicle, latitude: f64, longitude: f64, timestamp: i64) -> Self {
        VehiclePosition {
            vehicle,
            latitude,
            longitude,
            timestamp,
            altitude: None,
            precision: None,
            satellites: None,
            bearing: None,
            velocity: None,
        }
    }

    /// Whether `other` reports the same coordinates as this fix.
    ///
    /// Used for duplicate suppression; compares latitude and longitude
    /// exactly, never the optional channels.
    pub fn same_coordinates(&self, other: &VehiclePosition) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

impl PartialEq for VehiclePosition {
    fn eq(&self, other: &Self) -> bool {
        self.vehicle == other.vehicle && self.timestamp == other.timestamp
    }
}

impl Eq for VehiclePosition {}
