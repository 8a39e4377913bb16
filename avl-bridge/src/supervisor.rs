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

//! Feed supervision.
//!
//! One task per feed, each owning its broker connection, exchange client
//! and synchronization engine. Feeds share nothing. Shutdown is
//! cooperative: cancelling the root token lets every engine finish its
//! pass, log off its residual vehicles and terminate its link before the
//! supervisor joins the tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use iom_bridge::exchange::PubSubTransport;
use iom_bridge::wire::WireFormat;
use iom_bridge::{BridgeError, IomClient, IomGateway, IomIdentity, SyncEngine, SyncSettings};
use iom_transport_mqtt::{MqttTransport, MqttTransportConfig};

use crate::adapters;
use crate::config::{Config, FeedConfig, WireSyntax};

const COMPONENT: &str = "supervisor";

// Bounded wait for one correlated VDV435 response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Supervisor {
    cancel: CancellationToken,
    feeds: Vec<FeedHandle>,
}

struct FeedHandle {
    id: String,
    task: JoinHandle<()>,
}

impl Supervisor {
    /// Starts one bridging task per configured feed.
    ///
    /// Startup is all-or-nothing: if any feed fails to come up, the feeds
    /// already running are cancelled and joined before the error returns.
    pub async fn start(config: Config) -> Result<Self, BridgeError> {
        let cancel = CancellationToken::new();
        let mut feeds: Vec<FeedHandle> = Vec::with_capacity(config.feeds.len());

        for feed in config.feeds {
            match start_feed(&feed, cancel.child_token()).await {
                Ok(task) => feeds.push(FeedHandle { id: feed.id, task }),
                Err(err) => {
                    error!(
                        component = COMPONENT,
                        feed = feed.id.as_str(),
                        err = %err,
                        "feed failed to start; aborting startup"
                    );
                    cancel.cancel();
                    for started in feeds {
                        let _ = started.task.await;
                    }
                    return Err(err);
                }
            }
        }

        Ok(Supervisor { cancel, feeds })
    }

    /// Runs until `shutdown` resolves, then cancels and joins all feeds.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        shutdown.await;

        info!(component = COMPONENT, "shutdown requested; stopping all feeds");
        self.cancel.cancel();

        for feed in self.feeds {
            if let Err(err) = feed.task.await {
                warn!(
                    component = COMPONENT,
                    feed = feed.id.as_str(),
                    err = %err,
                    "feed task ended abnormally"
                );
            }
        }
        info!(component = COMPONENT, "all feeds stopped");
    }
}

async fn start_feed(
    feed: &FeedConfig,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, BridgeError> {
    info!(
        component = COMPONENT,
        feed = feed.id.as_str(),
        broker = feed.broker.host.as_str(),
        "starting feed"
    );

    let adapter = adapters::build(&feed.adapter)?;

    let transport: Arc<dyn PubSubTransport> = Arc::new(MqttTransport::new(MqttTransportConfig {
        host: feed.broker.host.clone(),
        port: feed.broker.port,
        client_id: feed.broker_client_id(),
        username: feed.broker.username.clone(),
        password: feed.broker.password.clone(),
        ..MqttTransportConfig::default()
    }));

    let identity = IomIdentity {
        organisation: feed.vdv435.organisation.clone(),
        itcs: feed.vdv435.itcs.clone(),
    };
    let wire_format = match feed.vdv435.format {
        WireSyntax::Json => WireFormat::Json,
        WireSyntax::Xml => WireFormat::Xml,
    };

    let client = IomClient::new(&feed.id, transport, &identity, REQUEST_TIMEOUT, wire_format)?;
    client.connect().await?;

    let gateway: Arc<dyn IomGateway> = Arc::new(client);
    let engine = SyncEngine::new(
        &feed.id,
        adapter,
        gateway,
        SyncSettings {
            poll_interval: feed.poll_interval(),
            staleness_window: feed.staleness_window(),
        },
    );

    Ok(tokio::spawn(engine.run(cancel)))
}
