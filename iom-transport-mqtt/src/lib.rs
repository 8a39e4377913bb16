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

//! # iom-transport-mqtt
//!
//! MQTT 3.1.1 binding of the `iom-bridge` transport boundary, built on
//! `rumqttc`.
//!
//! [`MqttTransport`] owns one broker connection and its event-loop task.
//! `connect` resolves once the broker acknowledges the session; from then
//! on inbound publishes and link loss are delivered through the installed
//! `TransportListener`. The binding never reconnects on its own: after a
//! connection collapse or a failed connect, the instance is spent and the
//! owner decides whether to build a fresh one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use iom_bridge::exchange::{PubSubTransport, QosLevel, TransportError, TransportListener};

const COMPONENT: &str = "mqtt_transport";

// Capacity of the request channel between the client handle and the
// event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Connection settings for one broker session.
#[derive(Debug, Clone)]
pub struct MqttTransportConfig {
    pub host: String,
    pub port: u16,
    /// Broker-unique client identifier; one per feed.
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    /// Upper bound on the wait for the broker's session acknowledgement.
    pub connect_timeout: Duration,
}

impl Default for MqttTransportConfig {
    fn default() -> Self {
        MqttTransportConfig {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "iom-bridge".to_string(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// One MQTT broker connection implementing [`PubSubTransport`].
pub struct MqttTransport {
    config: MqttTransportConfig,
    client: Mutex<Option<AsyncClient>>,
    stopped: Arc<AtomicBool>,
}

impl MqttTransport {
    pub fn new(config: MqttTransportConfig) -> Self {
        MqttTransport {
            config,
            client: Mutex::new(None),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    fn client_handle(&self) -> Result<AsyncClient, TransportError> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::NotConnected)
    }

    fn drop_client_handle(&self) -> Option<AsyncClient> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn broker_options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = &self.config.username {
            options.set_credentials(username, self.config.password.clone().unwrap_or_default());
        }
        options
    }
}

#[async_trait]
impl PubSubTransport for MqttTransport {
    async fn connect(&self, listener: Arc<dyn TransportListener>) -> Result<(), TransportError> {
        let (client, event_loop) =
            AsyncClient::new(self.broker_options(), REQUEST_CHANNEL_CAPACITY);
        {
            let mut slot = self.client.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(TransportError::Connection(
                    "transport already started".to_string(),
                ));
            }
            *slot = Some(client);
        }

        debug!(
            component = COMPONENT,
            client_id = self.config.client_id.as_str(),
            host = self.config.host.as_str(),
            port = self.config.port,
            "opening broker connection"
        );

        let (ready_sender, ready_receiver) = oneshot::channel();
        tokio::spawn(run_event_loop(
            event_loop,
            listener,
            self.stopped.clone(),
            ready_sender,
        ));

        match tokio::time::timeout(self.config.connect_timeout, ready_receiver).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => {
                self.drop_client_handle();
                Err(TransportError::Connection(reason))
            }
            Ok(Err(_)) => {
                self.drop_client_handle();
                Err(TransportError::Connection(
                    "connection task ended before the broker acknowledged".to_string(),
                ))
            }
            Err(_) => {
                self.stopped.store(true, Ordering::Relaxed);
                if let Some(client) = self.drop_client_handle() {
                    let _ = client.disconnect().await;
                }
                Err(TransportError::Connection(format!(
                    "no broker acknowledgement within {:?}",
                    self.config.connect_timeout
                )))
            }
        }
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
        retain: bool,
    ) -> Result<(), TransportError> {
        let client = self.client_handle()?;
        client
            .publish(topic, map_qos(qos), retain, payload.to_vec())
            .await
            .map_err(|err| TransportError::Publish {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }

    async fn subscribe(&self, filter: &str, qos: QosLevel) -> Result<(), TransportError> {
        let client = self.client_handle()?;
        client
            .subscribe(filter, map_qos(qos))
            .await
            .map_err(|err| TransportError::Subscribe {
                filter: filter.to_string(),
                reason: err.to_string(),
            })
    }

    async fn unsubscribe(&self, filter: &str) -> Result<(), TransportError> {
        let client = self.client_handle()?;
        client
            .unsubscribe(filter)
            .await
            .map_err(|err| TransportError::Subscribe {
                filter: filter.to_string(),
                reason: err.to_string(),
            })
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.stopped.store(true, Ordering::Relaxed);
        let Some(client) = self.drop_client_handle() else {
            return Ok(());
        };
        client
            .disconnect()
            .await
            .map_err(|err| TransportError::Connection(err.to_string()))
    }
}

/// Drives the rumqttc event loop until the link ends.
///
/// The first session acknowledgement resolves `ready`; a refused session
/// or a poll failure before that resolves it with the reason instead, so
/// `connect` fails fast rather than waiting out its timeout.
async fn run_event_loop(
    mut event_loop: EventLoop,
    listener: Arc<dyn TransportListener>,
    stopped: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let mut ready = Some(ready);
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    debug!(component = COMPONENT, "broker acknowledged the session");
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Ok(()));
                    }
                    listener.on_connected().await;
                } else {
                    let reason = format!("broker refused the session: {:?}", ack.code);
                    warn!(component = COMPONENT, reason = reason.as_str(), "connect refused");
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Err(reason.clone()));
                    }
                    listener.on_disconnected(&reason).await;
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                listener.on_message(&publish.topic, &publish.payload).await;
            }
            Ok(_) => {}
            Err(_) if stopped.load(Ordering::Relaxed) => {
                debug!(component = COMPONENT, "event loop closed after disconnect");
                break;
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(
                    component = COMPONENT,
                    reason = reason.as_str(),
                    "broker connection lost"
                );
                if let Some(ready) = ready.take() {
                    let _ = ready.send(Err(reason.clone()));
                }
                listener.on_disconnected(&reason).await;
                break;
            }
        }
    }
}

fn map_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}
