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

mod adapters;
mod config;
mod supervisor;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use iom_bridge::BridgeError;

use crate::config::Config;
use crate::supervisor::Supervisor;

#[derive(Parser)]
#[command(about = "Bridges AVL vehicle feeds into an IoM/VDV435 data space")]
struct BridgeArgs {
    /// Path to the json5 configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = BridgeArgs::parse();
    let config = Config::load(&args.config)?;
    info!(feeds = config.feeds.len(), "starting avl-bridge");

    let supervisor = Supervisor::start(config).await?;
    supervisor.run(shutdown_signal()).await;

    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
