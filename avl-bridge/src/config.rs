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

//! Feed configuration.
//!
//! One json5 document declares all feeds. Every feed names its AVL data
//! source, the broker carrying the IoM data space and the VDV435 identity
//! it represents. Validation runs once at startup and is fatal; no loop
//! starts on an invalid file.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use iom_bridge::BridgeError;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub feeds: Vec<FeedConfig>,
}

/// One AVL feed bridged into one IoM data space.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    /// Unique name of the feed, used as logging scope and default client id.
    pub id: String,
    pub adapter: AdapterConfig,
    pub broker: BrokerConfig,
    pub vdv435: Vdv435Config,
}

/// Where and how often to pull roster and positions.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AdapterConfig {
    #[serde(rename = "type")]
    pub kind: AdapterKind,
    /// Base URL for `http`, fixture file path for `static_file`.
    pub endpoint: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Seconds between reconciliation passes.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Seconds after which a position no longer proves vehicle activity.
    #[serde(default = "default_autologoff")]
    pub autologoff: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Http,
    StaticFile,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Broker client id; derived from the feed id when absent.
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Identity of this participant inside the IoM data space.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Vdv435Config {
    pub organisation: String,
    pub itcs: String,
    /// Wire syntax for published payloads; inbound payloads decode either
    /// way regardless.
    #[serde(default)]
    pub format: WireSyntax,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WireSyntax {
    #[default]
    Json,
    Xml,
}

fn default_interval() -> u64 {
    10
}

fn default_autologoff() -> u64 {
    1800
}

fn default_port() -> u16 {
    1883
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: &str) -> Result<Self, BridgeError> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            BridgeError::Configuration(format!("cannot read config file `{path}`: {err}"))
        })?;
        Self::parse(&contents)
    }

    /// Parses and validates a json5 configuration document.
    pub fn parse(contents: &str) -> Result<Self, BridgeError> {
        let config: Config = json5::from_str(contents)
            .map_err(|err| BridgeError::Configuration(format!("invalid config file: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        if self.feeds.is_empty() {
            return Err(BridgeError::Configuration(
                "no feeds configured".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if feed.id.is_empty() {
                return Err(BridgeError::Configuration(
                    "feed with an empty id".to_string(),
                ));
            }
            if !seen.insert(feed.id.as_str()) {
                return Err(BridgeError::Configuration(format!(
                    "duplicate feed id `{}`",
                    feed.id
                )));
            }
            feed.validate()?;
        }
        Ok(())
    }
}

impl FeedConfig {
    fn validate(&self) -> Result<(), BridgeError> {
        if self.adapter.endpoint.is_empty() {
            return Err(self.invalid("adapter.endpoint must not be empty"));
        }
        if self.adapter.interval == 0 {
            return Err(self.invalid("adapter.interval must be at least one second"));
        }
        if self.broker.host.is_empty() {
            return Err(self.invalid("broker.host must not be empty"));
        }
        if self.vdv435.organisation.is_empty() || self.vdv435.itcs.is_empty() {
            return Err(self.invalid("vdv435.organisation and vdv435.itcs must not be empty"));
        }
        Ok(())
    }

    fn invalid(&self, message: &str) -> BridgeError {
        BridgeError::Configuration(format!("feed `{}`: {message}", self.id))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.adapter.interval)
    }

    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.adapter.autologoff)
    }

    /// Broker client id, unique per feed unless configured explicitly.
    pub fn broker_client_id(&self) -> String {
        self.broker
            .client_id
            .clone()
            .unwrap_or_else(|| format!("avl-bridge-{}", self.id))
    }
}
