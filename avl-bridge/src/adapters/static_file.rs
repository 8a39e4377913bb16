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

//! File-backed adapter for local runs.
//!
//! Serves roster and positions from one JSON fixture document. The file is
//! re-read on every pull, so editing it between passes drives the engine
//! through discovery, movement and disappearance without any upstream
//! system.

use async_trait::async_trait;

use iom_bridge::{AdapterError, AvlAdapter, Vehicle, VehiclePosition};

use crate::adapters::record::{FeedDocument, PositionRecord, VehicleRecord};

pub struct StaticFileAdapter {
    path: String,
}

impl StaticFileAdapter {
    pub fn new(path: impl Into<String>) -> Self {
        StaticFileAdapter { path: path.into() }
    }

    fn read_document(&self) -> Result<FeedDocument, AdapterError> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|err| AdapterError::Upstream(format!("cannot read `{}`: {err}", self.path)))?;
        serde_json::from_str(&contents)
            .map_err(|err| AdapterError::Malformed(format!("fixture `{}`: {err}", self.path)))
    }
}

#[async_trait]
impl AvlAdapter for StaticFileAdapter {
    async fn vehicles(&self) -> Result<Vec<Vehicle>, AdapterError> {
        Ok(self
            .read_document()?
            .vehicles
            .into_iter()
            .map(VehicleRecord::into_vehicle)
            .collect())
    }

    async fn vehicle_positions(&self) -> Result<Vec<VehiclePosition>, AdapterError> {
        self.read_document()?
            .positions
            .into_iter()
            .map(PositionRecord::into_position)
            .collect()
    }
}
