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

//! AVL adapter implementations available to the supervisor.
//!
//! Both adapters speak the same vendor-neutral record shapes defined in
//! [`record`]; they differ only in where the records come from. The HTTP
//! adapter polls a remote endpoint, the static-file adapter replays a
//! local fixture for development runs without an upstream system.

mod http;
mod record;
mod static_file;

pub use http::HttpAvlAdapter;
pub use static_file::StaticFileAdapter;

use std::sync::Arc;

use iom_bridge::{AvlAdapter, BridgeError};

use crate::config::{AdapterConfig, AdapterKind};

/// Builds the adapter a feed's configuration names.
pub fn build(config: &AdapterConfig) -> Result<Arc<dyn AvlAdapter>, BridgeError> {
    match config.kind {
        AdapterKind::Http => Ok(Arc::new(HttpAvlAdapter::new(config)?)),
        AdapterKind::StaticFile => Ok(Arc::new(StaticFileAdapter::new(config.endpoint.clone()))),
    }
}
