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

//! # iom-bridge
//!
//! `iom-bridge` connects AVL vehicle-tracking sources to an IoM/VDV435
//! interoperability network running over a publish/subscribe broker.
//!
//! Typical usage is API-first and centered on [`IomClient`] and
//! [`SyncEngine`]: one client and one engine per configured feed. The
//! client turns the one-way broker into a correlated request/response
//! surface for vehicle logon and logoff and publishes retained position
//! notifications; the engine reconciles the adapter-reported roster
//! against the remote session state on a fixed interval.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use iom_bridge::exchange::{IomClient, IomGateway, IomIdentity, PubSubTransport};
//! use iom_bridge::wire::WireFormat;
//!
//! # pub mod mock_transport {
//! #     use std::sync::Arc;
//! #     use async_trait::async_trait;
//! #     use iom_bridge::exchange::{
//! #         PubSubTransport, QosLevel, TransportError, TransportListener,
//! #     };
//! #
//! #     pub struct MockTransport;
//! #
//! #     #[async_trait]
//! #     impl PubSubTransport for MockTransport {
//! #         async fn connect(
//! #             &self,
//! #             listener: Arc<dyn TransportListener>,
//! #         ) -> Result<(), TransportError> {
//! #             listener.on_connected().await;
//! #             Ok(())
//! #         }
//! #         async fn publish(
//! #             &self,
//! #             _topic: &str,
//! #             _payload: &[u8],
//! #             _qos: QosLevel,
//! #             _retain: bool,
//! #         ) -> Result<(), TransportError> {
//! #             Ok(())
//! #         }
//! #         async fn subscribe(&self, _filter: &str, _qos: QosLevel) -> Result<(), TransportError> {
//! #             Ok(())
//! #         }
//! #         async fn unsubscribe(&self, _filter: &str) -> Result<(), TransportError> {
//! #             Ok(())
//! #         }
//! #         async fn disconnect(&self) -> Result<(), TransportError> {
//! #             Ok(())
//! #         }
//! #     }
//! # }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let transport: Arc<dyn PubSubTransport> = Arc::new(mock_transport::MockTransport);
//! let identity = IomIdentity {
//!     organisation: "org-hvv".to_string(),
//!     itcs: "itcs-1".to_string(),
//! };
//!
//! let client = IomClient::new(
//!     "quick-start",
//!     transport,
//!     &identity,
//!     Duration::from_secs(10),
//!     WireFormat::Json,
//! )
//! .unwrap();
//! client.connect().await.unwrap();
//! client.terminate().await.unwrap();
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - Wire layer: VDV435 message catalogue, registry-driven JSON/XML codec
//! - Topic layer: hierarchical topic templates, wildcard matching, the
//!   concrete exchange topic catalogue
//! - Exchange layer: transport boundary, correlated exchange client, the
//!   VDV435 operation surface
//! - Sync layer: per-feed roster reconciliation, blacklist and position
//!   deduplication
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events. Library code emits
//! events and does not initialize a global subscriber; binaries own the
//! one-time `tracing_subscriber` setup at process boundaries.

pub mod adapter;
pub use adapter::{AdapterError, AvlAdapter};

pub mod clock;

mod error;
pub use error::BridgeError;

pub mod exchange;
pub use exchange::{IomClient, IomGateway, IomIdentity};

pub mod model;
pub use model::{Vehicle, VehiclePosition};

#[doc(hidden)]
pub mod observability;

pub mod sync;
pub use sync::{SyncEngine, SyncSettings};

pub mod topic;
pub mod wire;
