// Every scenario binary compiles its own copy of this module; no single
// scenario uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use iom_bridge::clock;
use iom_bridge::exchange::{PubSubTransport, QosLevel, TransportError, TransportListener};
use iom_bridge::wire::messages::{TechnicalVehicleLogOffResponse, TechnicalVehicleLogOnResponse};
use iom_bridge::wire::{self, IomMessage, WireFormat};
use iom_bridge::{
    AdapterError, AvlAdapter, IomClient, IomGateway, IomIdentity, SyncEngine, SyncSettings,
    Vehicle, VehiclePosition,
};

pub(crate) const ORGANISATION: &str = "org-hvv";
pub(crate) const ITCS: &str = "itcs-1";

// Short enough that the unanswered-request scenarios stay fast.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_millis(200);
const DEFAULT_STALENESS: Duration = Duration::from_secs(1800);

/// How the scripted broker rules on one vehicle's session requests.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Ruling {
    Accept,
    Reject(&'static str),
    /// Never answer; drives the requester into its timeout.
    Silent,
}

#[derive(Debug, Clone)]
pub(crate) struct PublishedRecord {
    pub(crate) topic: String,
    pub(crate) payload: String,
    pub(crate) retain: bool,
}

/// In-process broker answering correlated VDV435 requests by script.
///
/// Requests arrive on the feed's request inbox; answers go out on the
/// response topic carrying the same correlation token, which is how the
/// real data space behaves. Per-vehicle rulings default to [`Ruling::Accept`].
pub(crate) struct ScriptedBroker {
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
    rulings: Mutex<HashMap<String, Ruling>>,
    published: Mutex<Vec<PublishedRecord>>,
    subscriptions: Mutex<Vec<String>>,
    disconnected: AtomicBool,
}

impl ScriptedBroker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(ScriptedBroker {
            listener: Mutex::new(None),
            rulings: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
        })
    }

    pub(crate) fn rule(&self, vehicle_ref: &str, ruling: Ruling) {
        self.rulings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(vehicle_ref.to_string(), ruling);
    }

    pub(crate) fn published(&self) -> Vec<PublishedRecord> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Published records whose topic contains `fragment`.
    pub(crate) fn published_to(&self, fragment: &str) -> Vec<PublishedRecord> {
        self.published()
            .into_iter()
            .filter(|record| record.topic.contains(fragment))
            .collect()
    }

    /// Decoded request messages seen on the request inbox, oldest first.
    pub(crate) fn requests(&self) -> Vec<IomMessage> {
        self.published()
            .iter()
            .filter(|record| record.topic.ends_with("/RequestData"))
            .filter_map(|record| wire::decode(&record.payload).ok())
            .collect()
    }

    pub(crate) fn logon_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|message| match message {
                IomMessage::TechnicalVehicleLogOnRequest(request) => {
                    Some(request.vehicle_ref.value)
                }
                _ => None,
            })
            .collect()
    }

    pub(crate) fn logoff_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|message| match message {
                IomMessage::TechnicalVehicleLogOffRequest(request) => {
                    Some(request.vehicle_ref.value)
                }
                _ => None,
            })
            .collect()
    }

    pub(crate) fn subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }

    fn ruling_for(&self, vehicle_ref: &str) -> Ruling {
        self.rulings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(vehicle_ref)
            .copied()
            .unwrap_or(Ruling::Accept)
    }

    async fn answer(&self, topic: &str, payload: &[u8]) {
        let segments: Vec<&str> = topic.split('/').collect();
        if segments.last() != Some(&"RequestData") {
            return;
        }
        let Some(token) = segments
            .iter()
            .position(|segment| *segment == "CorrelationId")
            .and_then(|index| segments.get(index + 1))
        else {
            return;
        };
        let Ok(text) = std::str::from_utf8(payload) else {
            return;
        };
        let Ok(message) = wire::decode(text) else {
            return;
        };

        let reply = match message {
            IomMessage::TechnicalVehicleLogOnRequest(request) => {
                let vehicle_ref = request.vehicle_ref.value;
                match self.ruling_for(&vehicle_ref) {
                    Ruling::Accept => Some((
                        vehicle_ref,
                        IomMessage::TechnicalVehicleLogOnResponse(
                            TechnicalVehicleLogOnResponse::acknowledge(&request.message_id),
                        ),
                    )),
                    Ruling::Reject(code) => Some((
                        vehicle_ref,
                        IomMessage::TechnicalVehicleLogOnResponse(
                            TechnicalVehicleLogOnResponse::reject(&request.message_id, code),
                        ),
                    )),
                    Ruling::Silent => None,
                }
            }
            IomMessage::TechnicalVehicleLogOffRequest(request) => {
                let vehicle_ref = request.vehicle_ref.value;
                match self.ruling_for(&vehicle_ref) {
                    Ruling::Accept | Ruling::Reject(_) => Some((
                        vehicle_ref,
                        IomMessage::TechnicalVehicleLogOffResponse(
                            TechnicalVehicleLogOffResponse::acknowledge(&request.message_id),
                        ),
                    )),
                    Ruling::Silent => None,
                }
            }
            _ => None,
        };

        let Some((vehicle_ref, response)) = reply else {
            return;
        };
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            let response_topic = format!(
                "IoM/1.0/Organisation/{ORGANISATION}/{ITCS}/VehicleId/{vehicle_ref}/CorrelationId/{token}/ResponseData"
            );
            let payload =
                wire::encode(&response, WireFormat::Json).expect("scripted responses must encode");
            listener.on_message(&response_topic, payload.as_bytes()).await;
        }
    }
}

#[async_trait]
impl PubSubTransport for ScriptedBroker {
    async fn connect(&self, listener: Arc<dyn TransportListener>) -> Result<(), TransportError> {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener.clone());
        listener.on_connected().await;
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        _qos: QosLevel,
        retain: bool,
    ) -> Result<(), TransportError> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedRecord {
                topic: topic.to_string(),
                payload: String::from_utf8_lossy(payload).into_owned(),
                retain,
            });
        self.answer(topic, payload).await;
        Ok(())
    }

    async fn subscribe(&self, filter: &str, _qos: QosLevel) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(filter.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, _filter: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnected.store(true, Ordering::Relaxed);
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Mutable in-memory AVL feed the tests script between passes.
pub(crate) struct FeedScript {
    vehicles: Mutex<Vec<Vehicle>>,
    positions: Mutex<Vec<VehiclePosition>>,
}

impl FeedScript {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(FeedScript {
            vehicles: Mutex::new(Vec::new()),
            positions: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set_vehicles(&self, vehicles: Vec<Vehicle>) {
        *self
            .vehicles
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = vehicles;
    }

    pub(crate) fn set_positions(&self, positions: Vec<VehiclePosition>) {
        *self
            .positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = positions;
    }
}

#[async_trait]
impl AvlAdapter for FeedScript {
    async fn vehicles(&self) -> Result<Vec<Vehicle>, AdapterError> {
        Ok(self
            .vehicles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn vehicle_positions(&self) -> Result<Vec<VehiclePosition>, AdapterError> {
        Ok(self
            .positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// One feed wired end to end: scripted AVL upstream, real exchange client,
/// real synchronization engine, scripted broker downstream.
pub(crate) struct Bridge {
    pub(crate) broker: Arc<ScriptedBroker>,
    pub(crate) feed: Arc<FeedScript>,
    pub(crate) engine: SyncEngine,
}

pub(crate) async fn bridge() -> Bridge {
    bridge_with_staleness(DEFAULT_STALENESS).await
}

pub(crate) async fn bridge_with_staleness(staleness_window: Duration) -> Bridge {
    let broker = ScriptedBroker::new();
    let feed = FeedScript::new();

    let transport: Arc<dyn PubSubTransport> = broker.clone();
    let identity = IomIdentity {
        organisation: ORGANISATION.to_string(),
        itcs: ITCS.to_string(),
    };
    let client = IomClient::new(
        "it-feed",
        transport,
        &identity,
        REQUEST_TIMEOUT,
        WireFormat::Json,
    )
    .expect("client must build");
    client.connect().await.expect("connect must succeed");

    let gateway: Arc<dyn IomGateway> = Arc::new(client);
    let adapter: Arc<dyn AvlAdapter> = feed.clone();
    let engine = SyncEngine::new(
        "it-feed",
        adapter,
        gateway,
        SyncSettings {
            poll_interval: Duration::from_millis(10),
            staleness_window,
        },
    );

    Bridge {
        broker,
        feed,
        engine,
    }
}

pub(crate) fn vehicle(id: &str) -> Vehicle {
    Vehicle::new(id, format!("bus-{id}"))
}

pub(crate) fn fresh_position(id: &str, latitude: f64, longitude: f64) -> VehiclePosition {
    VehiclePosition::new(vehicle(id), latitude, longitude, clock::unix_now())
}

pub(crate) fn aged_position(
    id: &str,
    latitude: f64,
    longitude: f64,
    age: Duration,
) -> VehiclePosition {
    VehiclePosition::new(
        vehicle(id),
        latitude,
        longitude,
        clock::unix_now() - age.as_secs() as i64,
    )
}
