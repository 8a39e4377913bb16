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

//! HTTP polling adapter.
//!
//! Pulls `GET {endpoint}/vehicles` and `GET {endpoint}/positions` as JSON,
//! with optional basic auth. One failed pull fails the current
//! reconciliation pass only; the engine retries on the next one.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use iom_bridge::{AdapterError, AvlAdapter, BridgeError, Vehicle, VehiclePosition};

use crate::adapters::record::{PositionRecord, VehicleRecord};
use crate::config::AdapterConfig;

// Bounds one roster or position pull; reqwest has no timeout otherwise.
const PULL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpAvlAdapter {
    endpoint: String,
    client: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
}

impl HttpAvlAdapter {
    pub fn new(config: &AdapterConfig) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(PULL_TIMEOUT)
            .build()
            .map_err(|err| {
                BridgeError::Configuration(format!("cannot build HTTP client: {err}"))
            })?;

        Ok(HttpAvlAdapter {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    async fn pull<T: DeserializeOwned>(&self, path: &str) -> Result<T, AdapterError> {
        let url = self.url(path);
        let mut request = self.client.get(&url);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|err| AdapterError::Upstream(format!("GET {url}: {err}")))?
            .error_for_status()
            .map_err(|err| AdapterError::Upstream(format!("GET {url}: {err}")))?;

        response
            .json()
            .await
            .map_err(|err| AdapterError::Malformed(format!("GET {url}: {err}")))
    }
}

#[async_trait]
impl AvlAdapter for HttpAvlAdapter {
    async fn vehicles(&self) -> Result<Vec<Vehicle>, AdapterError> {
        let records: Vec<VehicleRecord> = self.pull("vehicles").await?;
        Ok(records
            .into_iter()
            .map(VehicleRecord::into_vehicle)
            .collect())
    }

    async fn vehicle_positions(&self) -> Result<Vec<VehiclePosition>, AdapterError> {
        let records: Vec<PositionRecord> = self.pull("positions").await?;
        records
            .into_iter()
            .map(PositionRecord::into_position)
            .collect()
    }
}
