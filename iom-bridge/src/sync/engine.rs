//! Per-feed reconciliation engine.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::AvlAdapter;
use crate::clock;
use crate::error::BridgeError;
use crate::exchange::IomGateway;
use crate::model::{Vehicle, VehiclePosition};
use crate::observability::{events, fields};

const COMPONENT: &str = "sync_engine";

/// Feed-scoped timing knobs of the reconciliation loop.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Pause between reconciliation passes.
    pub poll_interval: Duration,
    /// Maximum age of a position fix before it is suppressed as stale.
    pub staleness_window: Duration,
}

/// Reconciles one feed's roster and positions against the remote session
/// protocol.
///
/// The engine is the sole owner of its tracked set, blacklist and
/// last-position cache; inbound broker traffic never touches this state,
/// so no locking is needed here. Tracked vehicles are always logged on;
/// blacklisted vehicles are known but unregistered, and the two sets stay
/// disjoint.
pub struct SyncEngine {
    feed: String,
    adapter: Arc<dyn AvlAdapter>,
    gateway: Arc<dyn IomGateway>,
    settings: SyncSettings,
    tracked: HashMap<String, Vehicle>,
    blacklist: HashMap<String, Vehicle>,
    last_positions: HashMap<String, VehiclePosition>,
}

impl SyncEngine {
    pub fn new(
        feed: impl Into<String>,
        adapter: Arc<dyn AvlAdapter>,
        gateway: Arc<dyn IomGateway>,
        settings: SyncSettings,
    ) -> Self {
        SyncEngine {
            feed: feed.into(),
            adapter,
            gateway,
            settings,
            tracked: HashMap::new(),
            blacklist: HashMap::new(),
            last_positions: HashMap::new(),
        }
    }

    pub fn is_tracked(&self, vehicle_id: &str) -> bool {
        self.tracked.contains_key(vehicle_id)
    }

    pub fn is_blacklisted(&self, vehicle_id: &str) -> bool {
        self.blacklist.contains_key(vehicle_id)
    }

    /// Runs reconciliation passes until `cancel` fires, then logs off the
    /// residual vehicles and terminates the gateway.
    ///
    /// Cancellation is honored at pass boundaries: a pass in progress
    /// finishes first, bounded by the gateway's request timeout per
    /// vehicle.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(err) = self.reconcile().await {
                warn!(
                    event = events::SYNC_PASS_FAILED,
                    component = COMPONENT,
                    feed = self.feed.as_str(),
                    err = %err,
                    "reconciliation pass failed"
                );
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
        self.shutdown().await;
    }

    /// One reconciliation pass: roster sync, then position filtering.
    ///
    /// Per-vehicle failures are absorbed inside the pass; only adapter
    /// failures surface, and they leave the session state untouched.
    pub async fn reconcile(&mut self) -> Result<(), BridgeError> {
        let roster = self.adapter.vehicles().await?;
        self.sync_roster(roster).await;

        let positions = self.adapter.vehicle_positions().await?;
        self.process_positions(positions).await;
        Ok(())
    }

    async fn sync_roster(&mut self, roster: Vec<Vehicle>) {
        for vehicle in &roster {
            let tracked = self.tracked.contains_key(&vehicle.id);
            let blacklisted = self.blacklist.contains_key(&vehicle.id);
            if tracked && !blacklisted {
                continue;
            }
            if !tracked && !blacklisted {
                info!(
                    event = events::VEHICLE_DISCOVERED,
                    component = COMPONENT,
                    feed = self.feed.as_str(),
                    vehicle = vehicle.id.as_str(),
                    vehicle_ref = vehicle.vehicle_ref.as_str(),
                    "new vehicle in roster"
                );
            }
            self.attempt_log_on(vehicle.clone()).await;
        }

        let present: HashSet<&str> = roster.iter().map(|vehicle| vehicle.id.as_str()).collect();
        let absent: BTreeSet<String> = self
            .tracked
            .keys()
            .chain(self.blacklist.keys())
            .filter(|id| !present.contains(id.as_str()))
            .cloned()
            .collect();

        for id in absent {
            self.last_positions.remove(&id);
            let tracked = self.tracked.remove(&id);
            let blacklisted = self.blacklist.remove(&id);
            let Some(vehicle) = tracked.or(blacklisted) else {
                continue;
            };

            info!(
                event = events::VEHICLE_DISAPPEARED,
                component = COMPONENT,
                feed = self.feed.as_str(),
                vehicle = vehicle.id.as_str(),
                vehicle_ref = vehicle.vehicle_ref.as_str(),
                "vehicle left the roster"
            );
            if vehicle.is_logged_on {
                self.attempt_log_off(&vehicle).await;
            }
        }
    }

    async fn attempt_log_on(&mut self, mut vehicle: Vehicle) {
        match self.gateway.log_on_vehicle(&vehicle).await {
            Ok(()) => {
                info!(
                    event = events::VEHICLE_LOGON_OK,
                    component = COMPONENT,
                    feed = self.feed.as_str(),
                    vehicle = vehicle.id.as_str(),
                    vehicle_ref = vehicle.vehicle_ref.as_str(),
                    "vehicle logged on"
                );
                self.blacklist.remove(&vehicle.id);
                vehicle.is_logged_on = true;
                self.tracked.insert(vehicle.id.clone(), vehicle);
            }
            Err(err) => {
                warn!(
                    event = events::VEHICLE_LOGON_FAILED,
                    component = COMPONENT,
                    feed = self.feed.as_str(),
                    vehicle = vehicle.id.as_str(),
                    vehicle_ref = vehicle.vehicle_ref.as_str(),
                    err = %err,
                    "vehicle logon failed; suppressing its positions"
                );
                self.tracked.remove(&vehicle.id);
                vehicle.is_logged_on = false;
                self.blacklist.insert(vehicle.id.clone(), vehicle);
            }
        }
    }

    async fn attempt_log_off(&self, vehicle: &Vehicle) {
        match self.gateway.log_off_vehicle(vehicle).await {
            Ok(()) => {
                info!(
                    event = events::VEHICLE_LOGOFF_OK,
                    component = COMPONENT,
                    feed = self.feed.as_str(),
                    vehicle = vehicle.id.as_str(),
                    vehicle_ref = vehicle.vehicle_ref.as_str(),
                    "vehicle logged off"
                );
            }
            Err(err) => {
                warn!(
                    event = events::VEHICLE_LOGOFF_FAILED,
                    component = COMPONENT,
                    feed = self.feed.as_str(),
                    vehicle = vehicle.id.as_str(),
                    vehicle_ref = vehicle.vehicle_ref.as_str(),
                    err = %err,
                    "vehicle logoff failed"
                );
            }
        }
    }

    async fn process_positions(&mut self, positions: Vec<VehiclePosition>) {
        let now = clock::unix_now();
        let staleness = self.settings.staleness_window.as_secs() as i64;

        for position in positions {
            let suppressed_reason = if self.blacklist.contains_key(&position.vehicle.id) {
                Some(fields::REASON_BLACKLISTED)
            } else if !self.tracked.contains_key(&position.vehicle.id) {
                Some(fields::REASON_UNTRACKED)
            } else if now - position.timestamp > staleness {
                Some(fields::REASON_STALE)
            } else if self
                .last_positions
                .get(&position.vehicle.id)
                .is_some_and(|last| *last == position || last.same_coordinates(&position))
            {
                Some(fields::REASON_UNCHANGED)
            } else {
                None
            };

            if let Some(reason) = suppressed_reason {
                debug!(
                    event = events::POSITION_SUPPRESSED,
                    component = COMPONENT,
                    feed = self.feed.as_str(),
                    vehicle = position.vehicle.id.as_str(),
                    vehicle_ref = position.vehicle.vehicle_ref.as_str(),
                    reason,
                    "position suppressed"
                );
                continue;
            }

            match self.gateway.publish_gnss_position(&position).await {
                Ok(()) => {
                    debug!(
                        event = events::POSITION_PUBLISHED,
                        component = COMPONENT,
                        feed = self.feed.as_str(),
                        vehicle = position.vehicle.id.as_str(),
                        vehicle_ref = position.vehicle.vehicle_ref.as_str(),
                        "position published"
                    );
                    self.last_positions
                        .insert(position.vehicle.id.clone(), position);
                }
                Err(err) => {
                    warn!(
                        event = events::POSITION_PUBLISH_FAILED,
                        component = COMPONENT,
                        feed = self.feed.as_str(),
                        vehicle = position.vehicle.id.as_str(),
                        vehicle_ref = position.vehicle.vehicle_ref.as_str(),
                        err = %err,
                        "position publish failed"
                    );
                }
            }
        }
    }

    /// Best-effort logoff for every vehicle still known, tracked or
    /// blacklisted, then gateway termination.
    async fn shutdown(&mut self) {
        info!(
            event = events::SYNC_SHUTDOWN_START,
            component = COMPONENT,
            feed = self.feed.as_str(),
            tracked = self.tracked.len(),
            blacklisted = self.blacklist.len(),
            "stopping synchronization"
        );

        let mut residual: Vec<Vehicle> = self
            .tracked
            .drain()
            .chain(self.blacklist.drain())
            .map(|(_, vehicle)| vehicle)
            .collect();
        residual.sort_by(|a, b| a.id.cmp(&b.id));
        for vehicle in &residual {
            self.attempt_log_off(vehicle).await;
        }
        self.last_positions.clear();

        match self.gateway.terminate().await {
            Ok(()) => {
                info!(
                    event = events::SYNC_SHUTDOWN_COMPLETE,
                    component = COMPONENT,
                    feed = self.feed.as_str(),
                    "synchronization stopped"
                );
            }
            Err(err) => {
                warn!(
                    event = events::SYNC_SHUTDOWN_COMPLETE,
                    component = COMPONENT,
                    feed = self.feed.as_str(),
                    err = %err,
                    "synchronization stopped; gateway termination failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubAdapter {
        vehicles: Mutex<Vec<Vehicle>>,
        positions: Mutex<Vec<VehiclePosition>>,
        roster_error: Mutex<Option<AdapterError>>,
    }

    impl StubAdapter {
        fn set_vehicles(&self, vehicles: Vec<Vehicle>) {
            *self.vehicles.lock().unwrap() = vehicles;
        }

        fn set_positions(&self, positions: Vec<VehiclePosition>) {
            *self.positions.lock().unwrap() = positions;
        }

        fn fail_next_roster(&self, error: AdapterError) {
            *self.roster_error.lock().unwrap() = Some(error);
        }
    }

    #[async_trait::async_trait]
    impl AvlAdapter for StubAdapter {
        async fn vehicles(&self) -> Result<Vec<Vehicle>, AdapterError> {
            if let Some(err) = self.roster_error.lock().unwrap().take() {
                return Err(err);
            }
            Ok(self.vehicles.lock().unwrap().clone())
        }

        async fn vehicle_positions(&self) -> Result<Vec<VehiclePosition>, AdapterError> {
            Ok(self.positions.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct RecordingGateway {
        log_ons: Mutex<Vec<String>>,
        log_offs: Mutex<Vec<String>>,
        published: Mutex<Vec<VehiclePosition>>,
        rejected: Mutex<HashSet<String>>,
        terminated: AtomicBool,
    }

    impl RecordingGateway {
        fn reject_log_on(&self, vehicle_id: &str) {
            self.rejected.lock().unwrap().insert(vehicle_id.to_string());
        }

        fn accept_log_on(&self, vehicle_id: &str) {
            self.rejected.lock().unwrap().remove(vehicle_id);
        }

        fn log_ons(&self) -> Vec<String> {
            self.log_ons.lock().unwrap().clone()
        }

        fn log_offs(&self) -> Vec<String> {
            self.log_offs.lock().unwrap().clone()
        }

        fn published(&self) -> Vec<VehiclePosition> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl IomGateway for RecordingGateway {
        async fn log_on_vehicle(&self, vehicle: &Vehicle) -> Result<(), BridgeError> {
            self.log_ons.lock().unwrap().push(vehicle.id.clone());
            if self.rejected.lock().unwrap().contains(&vehicle.id) {
                return Err(BridgeError::Protocol {
                    code: "temporarilyNotAvailable".to_string(),
                });
            }
            Ok(())
        }

        async fn log_off_vehicle(&self, vehicle: &Vehicle) -> Result<(), BridgeError> {
            self.log_offs.lock().unwrap().push(vehicle.id.clone());
            Ok(())
        }

        async fn publish_gnss_position(
            &self,
            position: &VehiclePosition,
        ) -> Result<(), BridgeError> {
            self.published.lock().unwrap().push(position.clone());
            Ok(())
        }

        async fn terminate(&self) -> Result<(), BridgeError> {
            self.terminated.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn vehicle(id: &str) -> Vehicle {
        Vehicle::new(id, format!("ref-{id}"))
    }

    fn fresh_position(id: &str, latitude: f64, longitude: f64) -> VehiclePosition {
        VehiclePosition::new(vehicle(id), latitude, longitude, clock::unix_now())
    }

    fn engine(
        adapter: &Arc<StubAdapter>,
        gateway: &Arc<RecordingGateway>,
        staleness: Duration,
    ) -> SyncEngine {
        let adapter: Arc<dyn AvlAdapter> = adapter.clone();
        let gateway: Arc<dyn IomGateway> = gateway.clone();
        SyncEngine::new(
            "feed-a",
            adapter,
            gateway,
            SyncSettings {
                poll_interval: Duration::from_millis(10),
                staleness_window: staleness,
            },
        )
    }

    const STALENESS: Duration = Duration::from_secs(1800);

    #[tokio::test]
    async fn new_roster_vehicles_are_logged_on_and_tracked() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        adapter.set_vehicles(vec![vehicle("v1")]);
        engine.reconcile().await.expect("pass should succeed");

        assert_eq!(gateway.log_ons(), vec!["v1"]);
        assert!(engine.is_tracked("v1"));
        assert!(!engine.is_blacklisted("v1"));
    }

    #[tokio::test]
    async fn failed_logon_blacklists_and_suppresses_positions() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        gateway.reject_log_on("v1");
        adapter.set_vehicles(vec![vehicle("v1")]);
        adapter.set_positions(vec![fresh_position("v1", 53.55, 9.99)]);
        engine.reconcile().await.expect("pass should succeed");

        assert!(!engine.is_tracked("v1"));
        assert!(engine.is_blacklisted("v1"));
        assert!(gateway.published().is_empty());
    }

    #[tokio::test]
    async fn blacklisted_vehicles_are_retried_until_logon_succeeds() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        gateway.reject_log_on("v1");
        adapter.set_vehicles(vec![vehicle("v1")]);
        adapter.set_positions(vec![fresh_position("v1", 53.55, 9.99)]);
        engine.reconcile().await.expect("pass should succeed");
        assert!(engine.is_blacklisted("v1"));

        gateway.accept_log_on("v1");
        engine.reconcile().await.expect("pass should succeed");

        assert_eq!(gateway.log_ons(), vec!["v1", "v1"]);
        assert!(engine.is_tracked("v1"));
        assert!(!engine.is_blacklisted("v1"));
        assert_eq!(gateway.published().len(), 1);
    }

    #[tokio::test]
    async fn reconciliation_is_idempotent_for_an_unchanged_feed() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        adapter.set_vehicles(vec![vehicle("v1")]);
        adapter.set_positions(vec![fresh_position("v1", 53.55, 9.99)]);
        engine.reconcile().await.expect("pass should succeed");
        engine.reconcile().await.expect("pass should succeed");

        assert_eq!(gateway.log_ons(), vec!["v1"]);
        assert_eq!(gateway.published().len(), 1);
        assert!(gateway.log_offs().is_empty());
    }

    #[tokio::test]
    async fn repeated_coordinates_are_published_once() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        adapter.set_vehicles(vec![vehicle("v1")]);
        adapter.set_positions(vec![fresh_position("v1", 53.55, 9.99)]);
        engine.reconcile().await.expect("pass should succeed");

        // Later fix, same place.
        adapter.set_positions(vec![fresh_position("v1", 53.55, 9.99)]);
        engine.reconcile().await.expect("pass should succeed");
        assert_eq!(gateway.published().len(), 1);

        // The vehicle moved; the new fix goes out.
        adapter.set_positions(vec![fresh_position("v1", 53.56, 9.99)]);
        engine.reconcile().await.expect("pass should succeed");
        assert_eq!(gateway.published().len(), 2);
    }

    #[tokio::test]
    async fn stale_positions_are_suppressed() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        let mut position = fresh_position("v1", 53.55, 9.99);
        position.timestamp = clock::unix_now() - STALENESS.as_secs() as i64 - 60;
        adapter.set_vehicles(vec![vehicle("v1")]);
        adapter.set_positions(vec![position]);
        engine.reconcile().await.expect("pass should succeed");

        assert!(engine.is_tracked("v1"));
        assert!(gateway.published().is_empty());
    }

    #[tokio::test]
    async fn positions_without_a_session_are_suppressed() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        adapter.set_positions(vec![fresh_position("v9", 53.55, 9.99)]);
        engine.reconcile().await.expect("pass should succeed");

        assert!(gateway.published().is_empty());
    }

    #[tokio::test]
    async fn disappearance_logs_off_once_and_drops_the_position_cache() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        adapter.set_vehicles(vec![vehicle("v1")]);
        adapter.set_positions(vec![fresh_position("v1", 53.55, 9.99)]);
        engine.reconcile().await.expect("pass should succeed");

        adapter.set_vehicles(vec![]);
        adapter.set_positions(vec![]);
        engine.reconcile().await.expect("pass should succeed");
        assert_eq!(gateway.log_offs(), vec!["v1"]);
        assert!(!engine.is_tracked("v1"));

        // The cache went with it: the same coordinates publish again after
        // the vehicle returns.
        adapter.set_vehicles(vec![vehicle("v1")]);
        adapter.set_positions(vec![fresh_position("v1", 53.55, 9.99)]);
        engine.reconcile().await.expect("pass should succeed");
        assert_eq!(gateway.published().len(), 2);
    }

    #[tokio::test]
    async fn a_disappearing_blacklisted_vehicle_is_forgotten_without_logoff() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        gateway.reject_log_on("v1");
        adapter.set_vehicles(vec![vehicle("v1")]);
        engine.reconcile().await.expect("pass should succeed");
        assert!(engine.is_blacklisted("v1"));

        adapter.set_vehicles(vec![]);
        engine.reconcile().await.expect("pass should succeed");

        assert!(!engine.is_blacklisted("v1"));
        assert!(gateway.log_offs().is_empty());
    }

    #[tokio::test]
    async fn one_failing_vehicle_does_not_abort_the_pass() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        gateway.reject_log_on("v1");
        adapter.set_vehicles(vec![vehicle("v1"), vehicle("v2")]);
        engine.reconcile().await.expect("pass should succeed");

        assert!(engine.is_blacklisted("v1"));
        assert!(engine.is_tracked("v2"));
    }

    #[tokio::test]
    async fn adapter_failure_aborts_the_pass_and_keeps_state() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        adapter.set_vehicles(vec![vehicle("v1")]);
        engine.reconcile().await.expect("pass should succeed");

        adapter.fail_next_roster(AdapterError::Upstream("connection refused".to_string()));
        let err = engine.reconcile().await.expect_err("pass must fail");
        assert!(matches!(err, BridgeError::Adapter(_)));
        assert!(engine.is_tracked("v1"));
        assert!(gateway.log_offs().is_empty());

        engine.reconcile().await.expect("next pass should succeed");
    }

    #[tokio::test]
    async fn shutdown_logs_off_residual_vehicles_and_terminates() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let mut engine = engine(&adapter, &gateway, STALENESS);

        gateway.reject_log_on("v2");
        adapter.set_vehicles(vec![vehicle("v1"), vehicle("v2")]);
        engine.reconcile().await.expect("pass should succeed");
        assert!(engine.is_tracked("v1"));
        assert!(engine.is_blacklisted("v2"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        engine.run(cancel).await;

        assert_eq!(gateway.log_offs(), vec!["v1", "v2"]);
        assert!(gateway.terminated.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn run_stops_after_cancellation_mid_sleep() {
        let adapter = Arc::new(StubAdapter::default());
        let gateway = Arc::new(RecordingGateway::default());
        let engine = engine(&adapter, &gateway, STALENESS);

        adapter.set_vehicles(vec![vehicle("v1")]);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(engine.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();
        handle.await.expect("run should finish");

        assert_eq!(gateway.log_ons(), vec!["v1"]);
        assert_eq!(gateway.log_offs(), vec!["v1"]);
        assert!(gateway.terminated.load(Ordering::Relaxed));
    }
}
