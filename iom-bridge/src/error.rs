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

//! Crate-wide error taxonomy.
//!
//! Component-local failures (`WireError`, `TemplateError`, `TransportError`,
//! `AdapterError`) are defined next to their owners and converge here so the
//! synchronization engine and binaries handle one error surface.

use std::time::Duration;

use thiserror::Error;

use crate::adapter::AdapterError;
use crate::exchange::transport::TransportError;
use crate::topic::TemplateError;
use crate::wire::WireError;

/// Unified failure type of the bridging library.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Connect/publish/subscribe failure on the pub/sub link. Fatal to the
    /// current operation; the next reconciliation pass retries naturally.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// No matching response arrived within the bounded wait.
    #[error("no matching response within {timeout:?}")]
    RequestTimeout { timeout: Duration },

    /// A response arrived but carries an application-level error code.
    #[error("remote reported error code `{code}`")]
    Protocol { code: String },

    /// Malformed or unregistered wire payload.
    #[error("wire format failure: {0}")]
    Decode(#[from] WireError),

    /// Topic template could not be resolved or matched.
    #[error("topic template failure: {0}")]
    Template(#[from] TemplateError),

    /// The upstream AVL data source failed to deliver roster or positions.
    #[error("adapter failure: {0}")]
    Adapter(#[from] AdapterError),

    /// Invalid feed definition, raised before any loop begins.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}
