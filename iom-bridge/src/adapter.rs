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

//! Upstream data-source abstraction.
//!
//! An [`AvlAdapter`] hides one vendor's AVL interface behind two pull
//! operations. The synchronization engine only ever sees rosters and
//! position batches; everything vendor-specific (pagination, auth, field
//! mapping) stays inside the adapter implementation.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Vehicle, VehiclePosition};

/// Failure raised by an AVL adapter. Adapter errors abort the current
/// reconciliation pass and are retried on the next one.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The upstream endpoint could not be reached or answered abnormally.
    #[error("upstream unreachable: {0}")]
    Upstream(String),

    /// The upstream answered, but the payload does not fit the expected
    /// shape.
    #[error("malformed upstream payload: {0}")]
    Malformed(String),
}

/// Pull-based view onto one vendor's automatic vehicle location system.
#[async_trait]
pub trait AvlAdapter: Send + Sync {
    /// Current roster of active vehicles, one entry per vehicle id.
    async fn vehicles(&self) -> Result<Vec<Vehicle>, AdapterError>;

    /// Latest known position per vehicle. Entries for vehicles missing from
    /// the roster are allowed; the engine filters them.
    async fn vehicle_positions(&self) -> Result<Vec<VehiclePosition>, AdapterError>;
}
