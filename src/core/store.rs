// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! History store - the single source of truth for live and recent readings
//!
//! Exactly one producer feeds the store at a time: the simulator or the live
//! transport. Every switch bumps a generation counter under the same lock
//! that appends samples, so a retired producer can never append after the
//! switching call returns.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::event_bus::{EventBus, StoreEvent};
use super::history::{HistoryBuffer, DEFAULT_CAPACITY};
use super::ConnectionState;
use crate::analysis::{HistoryStats, TimeRange};
use crate::config::Config;
use crate::detection::ThresholdConfig;
use crate::error::ConnectionError;
use crate::sensors::{RawSample, Sample, Simulator, SimulatorHandle, Transport, TransportEvent, MIN_PERIOD};

/// Store tuning
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub capacity: usize,
    pub sample_interval: Duration,
    pub connect_timeout: Duration,
    pub thresholds: ThresholdConfig,
    /// Fixed seed for the simulator's random walk
    pub seed: Option<u64>,
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            sample_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            thresholds: ThresholdConfig::default(),
            seed: None,
            event_capacity: 256,
        }
    }
}

impl From<&Config> for StoreConfig {
    fn from(config: &Config) -> Self {
        Self {
            capacity: config.history.capacity,
            sample_interval: Duration::from_millis(config.simulator.interval_ms),
            connect_timeout: Duration::from_millis(config.transport.connect_timeout_ms),
            thresholds: config.thresholds,
            seed: config.simulator.seed,
            event_capacity: config.history.event_capacity,
        }
    }
}

/// Consistent copy of the store, taken under one lock
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub current: Option<Sample>,
    pub history: Vec<Sample>,
    pub connection: ConnectionState,
    pub thresholds: ThresholdConfig,
}

impl StoreSnapshot {
    fn of(state: &StoreState) -> Self {
        Self {
            current: state.current,
            history: state.history.to_vec(),
            connection: state.connection,
            thresholds: state.thresholds,
        }
    }
}

struct StoreState {
    current: Option<Sample>,
    history: HistoryBuffer,
    thresholds: ThresholdConfig,
    connection: ConnectionState,
    generation: u64,
    shut_down: bool,
}

enum Producer {
    Idle,
    Simulator(SimulatorHandle),
    Transport(JoinHandle<()>),
}

struct Control {
    transport: Box<dyn Transport>,
    producer: Producer,
}

struct Inner {
    config: StoreConfig,
    state: RwLock<StoreState>,
    bus: EventBus,
    // Producer switches serialize here, in call order
    control: tokio::sync::Mutex<Control>,
    pending_connect: Mutex<Option<oneshot::Sender<()>>>,
}

impl Inner {
    fn ingest_from(&self, generation: u64, raw: RawSample) -> bool {
        let mut state = self.state.write();
        if state.shut_down || state.generation != generation {
            return false;
        }
        self.apply(&mut state, raw);
        true
    }

    /// Classify, append, trim and publish as one step under the write lock.
    fn apply(&self, state: &mut StoreState, raw: RawSample) -> Option<Sample> {
        if !raw.is_valid() {
            debug!("Dropping invalid sample: {:?}", raw);
            return None;
        }

        let now = Utc::now();
        let timestamp = match state.current {
            Some(prev) if prev.timestamp() > now => prev.timestamp(),
            _ => now,
        };

        let sample = Sample::classify(raw, timestamp, &state.thresholds);
        state.history.push(sample);
        state.current = Some(sample);
        self.bus.publish_sample(sample);

        Some(sample)
    }

    /// Retire whichever producer is active and record the new connection.
    fn switch_producer(&self, connection: ConnectionState) -> u64 {
        let mut state = self.state.write();
        state.generation += 1;
        if state.connection != connection {
            state.connection = connection;
            self.bus.publish_connection(connection);
        }
        state.generation
    }

    fn start_simulator(self: &Arc<Self>, generation: u64) -> SimulatorHandle {
        let previous = self.state.read().current.map(|s| s.as_raw());

        let simulator = match self.config.seed {
            Some(seed) => Simulator::with_seed(seed.wrapping_add(generation)),
            None => Simulator::new(),
        };
        let simulator = match previous {
            Some(last) => simulator.starting_from(last),
            None => simulator,
        };

        let weak = Arc::downgrade(self);
        simulator.spawn(self.config.sample_interval, move |raw| {
            weak.upgrade()
                .map(|inner| inner.ingest_from(generation, raw))
                .unwrap_or(false)
        })
    }

    fn cancel_pending_connect(&self) {
        if let Some(cancel) = self.pending_connect.lock().take() {
            debug!("Cancelling in-flight connect");
            let _ = cancel.send(());
        }
    }

    /// Fallback after the transport closed on its own.
    async fn recover(self: &Arc<Self>, generation: u64) {
        let mut control = self.control.lock().await;
        {
            let state = self.state.read();
            if state.shut_down || state.generation != generation {
                debug!("Ignoring close from retired transport (generation {})", generation);
                return;
            }
        }

        warn!("Transport {} closed unexpectedly, falling back to simulator", control.transport.endpoint());

        let next = self.switch_producer(ConnectionState::Simulated);
        // The caller is the pump itself, so its handle is detached rather than aborted
        control.producer = Producer::Simulator(self.start_simulator(next));
        control.transport.disconnect().await;
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::of(&self.state.read())
    }

    /// Every event is published under the write lock, so holding the read
    /// lock here leaves no gap or overlap between the two.
    fn subscribe_with_snapshot(&self) -> (StoreSnapshot, broadcast::Receiver<StoreEvent>) {
        let state = self.state.read();
        let events = self.bus.subscribe();
        (StoreSnapshot::of(&state), events)
    }
}

fn spawn_pump(
    store: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = events.recv().await;
            let Some(inner) = store.upgrade() else { break };

            match event {
                Some(TransportEvent::Sample(raw)) => {
                    if !inner.ingest_from(generation, raw) {
                        break;
                    }
                }
                Some(TransportEvent::Error(message)) => {
                    warn!("Transport error: {}", message);
                }
                // A dropped sender is a loss of the transport too
                Some(TransportEvent::Closed) | None => {
                    inner.recover(generation).await;
                    break;
                }
            }
        }
    })
}

/// Read-only view handed to presentation consumers
#[derive(Clone)]
pub struct StoreReader {
    inner: Arc<Inner>,
}

impl StoreReader {
    pub fn current(&self) -> Option<Sample> {
        self.inner.state.read().current
    }

    /// Ordered copy of the retention window, oldest first
    pub fn history(&self) -> Vec<Sample> {
        self.inner.state.read().history.to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.inner.state.read().history.len()
    }

    pub fn connection(&self) -> ConnectionState {
        self.inner.state.read().connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_connected()
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.inner.state.read().thresholds
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot()
    }

    pub fn stats(&self, range: Option<TimeRange>) -> HistoryStats {
        let history = self.history();
        HistoryStats::compute(&history, range)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.bus.subscribe()
    }

    /// Snapshot plus a subscription that starts exactly after it: every
    /// change is either in the snapshot or delivered as an event, never both.
    pub fn subscribe_with_snapshot(&self) -> (StoreSnapshot, broadcast::Receiver<StoreEvent>) {
        self.inner.subscribe_with_snapshot()
    }
}

/// Owner of the store. Created once at process start and shut down at exit.
#[derive(Clone)]
pub struct HistoryStore {
    inner: Arc<Inner>,
}

impl HistoryStore {
    pub fn new(mut config: StoreConfig, transport: Box<dyn Transport>) -> Self {
        if config.sample_interval < MIN_PERIOD {
            warn!(
                "Sample interval {:?} is too short, using {:?}",
                config.sample_interval, MIN_PERIOD
            );
            config.sample_interval = MIN_PERIOD;
        }

        let state = StoreState {
            current: None,
            history: HistoryBuffer::new(config.capacity),
            thresholds: config.thresholds,
            connection: ConnectionState::Simulated,
            generation: 0,
            shut_down: false,
        };

        let bus = EventBus::new(config.event_capacity);

        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(state),
                bus,
                control: tokio::sync::Mutex::new(Control {
                    transport,
                    producer: Producer::Idle,
                }),
                pending_connect: Mutex::new(None),
            }),
        }
    }

    /// Start the simulator. No-op if a producer is already running.
    pub async fn start(&self) {
        let mut control = self.inner.control.lock().await;
        if self.inner.state.read().shut_down {
            return;
        }
        if matches!(control.producer, Producer::Idle) {
            let generation = self.inner.switch_producer(ConnectionState::Simulated);
            control.producer = Producer::Simulator(self.inner.start_simulator(generation));
            info!(
                "History store started in simulated mode ({:?} interval)",
                self.inner.config.sample_interval
            );
        }
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader {
            inner: self.inner.clone(),
        }
    }

    /// Ingest one reading regardless of which producer is active.
    ///
    /// Returns the stored sample, or `None` if the reading was not finite
    /// or the store is shut down.
    pub fn ingest(&self, raw: RawSample) -> Option<Sample> {
        let mut state = self.inner.state.write();
        if state.shut_down {
            return None;
        }
        self.inner.apply(&mut state, raw)
    }

    /// Replace the thresholds. Only samples ingested afterwards see them.
    pub fn set_thresholds(&self, thresholds: ThresholdConfig) {
        if thresholds.heart_rate.is_inverted() || thresholds.temperature.is_inverted() {
            warn!("Applying inverted threshold range as given: {:?}", thresholds);
        }

        let mut state = self.inner.state.write();
        state.thresholds = thresholds;
        self.inner.bus.publish_thresholds(thresholds);
        debug!("Thresholds updated: {:?}", thresholds);
    }

    /// Switch ingestion to the live transport.
    ///
    /// The simulator keeps running while the attempt is in flight and is
    /// retired only once the transport is open. On any failure the store
    /// stays simulated.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let mut control = self.inner.control.lock().await;
        if self.inner.state.read().shut_down {
            return Err(ConnectionError::Closed);
        }
        if matches!(control.producer, Producer::Transport(_)) {
            debug!("connect: already connected");
            return Ok(());
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        *self.inner.pending_connect.lock() = Some(cancel_tx);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let endpoint = control.transport.endpoint().to_string();
        let timeout = self.inner.config.connect_timeout;
        info!("Connecting to {}...", endpoint);

        let outcome = tokio::select! {
            result = tokio::time::timeout(timeout, control.transport.connect(events_tx)) => {
                result.unwrap_or(Err(ConnectionError::Timeout))
            }
            _ = cancel_rx => Err(ConnectionError::Cancelled),
        };
        self.inner.pending_connect.lock().take();

        match outcome {
            Ok(()) => {
                let generation = self.inner.switch_producer(ConnectionState::Connected);
                if let Producer::Simulator(mut simulator) =
                    std::mem::replace(&mut control.producer, Producer::Idle)
                {
                    simulator.stop();
                }
                control.producer = Producer::Transport(spawn_pump(
                    Arc::downgrade(&self.inner),
                    generation,
                    events_rx,
                ));
                info!("Connected to {}, live samples active", endpoint);
                Ok(())
            }
            Err(e) => {
                control.transport.disconnect().await;
                warn!("Failed to connect to {}: {}", endpoint, e);

                if matches!(control.producer, Producer::Idle) {
                    let generation = self.inner.switch_producer(ConnectionState::Simulated);
                    control.producer = Producer::Simulator(self.inner.start_simulator(generation));
                }
                Err(e)
            }
        }
    }

    /// Tear down the live transport and resume the simulator. Idempotent.
    pub async fn disconnect(&self) {
        self.inner.cancel_pending_connect();

        let mut control = self.inner.control.lock().await;
        match std::mem::replace(&mut control.producer, Producer::Idle) {
            Producer::Transport(pump) => {
                let generation = self.inner.switch_producer(ConnectionState::Simulated);
                pump.abort();
                control.producer = Producer::Simulator(self.inner.start_simulator(generation));
                control.transport.disconnect().await;
                info!("Disconnected from {}, simulator resumed", control.transport.endpoint());
            }
            other => {
                control.producer = other;
                debug!("disconnect: not connected");
            }
        }
    }

    /// Stop every producer and close any open transport.
    pub async fn shutdown(&self) {
        self.inner.cancel_pending_connect();

        let mut control = self.inner.control.lock().await;
        {
            let mut state = self.inner.state.write();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            state.generation += 1;
            if state.connection != ConnectionState::Simulated {
                state.connection = ConnectionState::Simulated;
                self.inner.bus.publish_connection(ConnectionState::Simulated);
            }
        }

        match std::mem::replace(&mut control.producer, Producer::Idle) {
            Producer::Simulator(mut simulator) => simulator.stop(),
            Producer::Transport(pump) => pump.abort(),
            Producer::Idle => {}
        }
        control.transport.disconnect().await;

        info!("History store shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.state.read().shut_down
    }

    pub fn current(&self) -> Option<Sample> {
        self.inner.state.read().current
    }

    pub fn history(&self) -> Vec<Sample> {
        self.inner.state.read().history.to_vec()
    }

    pub fn connection(&self) -> ConnectionState {
        self.inner.state.read().connection
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.inner.state.read().thresholds
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Range, Status};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy, PartialEq)]
    enum Behavior {
        Open,
        Fail,
        Hang,
    }

    /// Test side of the mock transport
    #[derive(Clone, Default)]
    struct Remote {
        sender: Arc<Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>>,
        disconnects: Arc<AtomicUsize>,
    }

    impl Remote {
        fn send(&self, heart_rate: f64, temperature: f64) {
            if let Some(tx) = self.sender.lock().as_ref() {
                let _ = tx.send(TransportEvent::Sample(RawSample::new(heart_rate, temperature)));
            }
        }

        fn close(&self) {
            if let Some(tx) = self.sender.lock().take() {
                let _ = tx.send(TransportEvent::Closed);
            }
        }

        fn sender(&self) -> Option<mpsc::UnboundedSender<TransportEvent>> {
            self.sender.lock().clone()
        }
    }

    struct MockTransport {
        behavior: Behavior,
        remote: Remote,
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn endpoint(&self) -> &str {
            "mock://device"
        }

        fn is_open(&self) -> bool {
            self.remote.sender.lock().is_some()
        }

        async fn connect(&mut self, events: mpsc::UnboundedSender<TransportEvent>) -> Result<(), ConnectionError> {
            match self.behavior {
                Behavior::Open => {
                    *self.remote.sender.lock() = Some(events);
                    Ok(())
                }
                Behavior::Fail => Err(ConnectionError::Transport("refused".to_string())),
                Behavior::Hang => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        }

        async fn disconnect(&mut self) {
            self.remote.disconnects.fetch_add(1, Ordering::SeqCst);
            self.remote.sender.lock().take();
        }
    }

    fn config() -> StoreConfig {
        StoreConfig {
            sample_interval: Duration::from_millis(10),
            connect_timeout: Duration::from_millis(200),
            seed: Some(11),
            ..StoreConfig::default()
        }
    }

    fn store_with(behavior: Behavior, config: StoreConfig) -> (HistoryStore, Remote) {
        let remote = Remote::default();
        let transport = MockTransport {
            behavior,
            remote: remote.clone(),
        };
        (HistoryStore::new(config, Box::new(transport)), remote)
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        for _ in 0..100 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    #[test]
    fn test_ingest_round_trip_scenario() {
        let (store, _) = store_with(Behavior::Open, config());

        let sample = store.ingest(RawSample::new(130.6, 38.27)).unwrap();

        assert_eq!(sample.heart_rate(), 131);
        assert_eq!(sample.temperature(), 38.3);
        assert_eq!(sample.status().heart_rate, Status::High);
        assert_eq!(sample.status().temperature, Status::High);
        assert_eq!(store.current(), Some(sample));
        assert_eq!(store.history().last(), Some(&sample));
    }

    #[test]
    fn test_malformed_sample_does_not_touch_state() {
        let (store, _) = store_with(Behavior::Open, config());
        let good = store.ingest(RawSample::new(72.0, 26.5)).unwrap();

        assert!(store.ingest(RawSample::new(f64::NAN, 26.5)).is_none());
        assert!(store.ingest(RawSample::new(72.0, f64::INFINITY)).is_none());
        assert!(store.ingest(RawSample::new(1e12, 26.0)).is_none());

        assert_eq!(store.current(), Some(good));
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_history_bounded_and_consistent() {
        let (store, _) = store_with(Behavior::Open, config());

        for i in 0..250 {
            store.ingest(RawSample::new(50.0 + (i % 70) as f64, 25.0));
            let snapshot = store.snapshot();
            assert!(snapshot.history.len() <= 100);
            assert_eq!(snapshot.current.as_ref(), snapshot.history.last());
        }
        assert_eq!(store.history().len(), 100);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let (store, _) = store_with(Behavior::Open, config());
        for _ in 0..50 {
            store.ingest(RawSample::new(72.0, 26.5));
        }

        let history = store.history();
        assert!(history.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
    }

    #[test]
    fn test_thresholds_are_not_retroactive() {
        let (store, _) = store_with(Behavior::Open, config());

        store.ingest(RawSample::new(95.0, 26.0));
        store.ingest(RawSample::new(105.0, 26.0));
        let before: Vec<_> = store.history().iter().map(|s| s.status()).collect();

        store.set_thresholds(ThresholdConfig {
            heart_rate: Range::new(100.0, 110.0),
            temperature: Range::new(21.0, 29.0),
        });

        let after: Vec<_> = store.history().iter().map(|s| s.status()).collect();
        assert_eq!(before, after);
        assert_eq!(after[0].heart_rate, Status::Normal);
        assert_eq!(after[1].heart_rate, Status::High);

        let next = store.ingest(RawSample::new(95.0, 26.0)).unwrap();
        assert_eq!(next.status().heart_rate, Status::Low);
    }

    #[test]
    fn test_inverted_thresholds_applied_literally() {
        let (store, _) = store_with(Behavior::Open, config());
        let inverted = ThresholdConfig {
            heart_rate: Range::new(100.0, 60.0),
            temperature: Range::new(21.0, 29.0),
        };

        store.set_thresholds(inverted);
        assert_eq!(store.thresholds(), inverted);

        let sample = store.ingest(RawSample::new(80.0, 25.0)).unwrap();
        assert_eq!(sample.status().heart_rate, Status::Low);
    }

    #[tokio::test]
    async fn test_simulator_feeds_store_after_start() {
        let (store, _) = store_with(Behavior::Open, config());
        assert!(store.current().is_none());

        store.start().await;

        assert!(wait_for(|| store.history().len() >= 3).await);
        assert_eq!(store.connection(), ConnectionState::Simulated);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_retires_simulator() {
        let (store, remote) = store_with(Behavior::Open, config());
        store.start().await;
        assert!(wait_for(|| store.history().len() >= 2).await);

        store.connect().await.unwrap();
        assert_eq!(store.connection(), ConnectionState::Connected);

        let len = store.history().len();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.history().len(), len);

        remote.send(130.6, 38.27);
        assert!(wait_for(|| store.history().len() == len + 1).await);
        let current = store.current().unwrap();
        assert_eq!(current.heart_rate(), 131);
        assert_eq!(current.temperature(), 38.3);

        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_failure_stays_simulated() {
        let (store, _) = store_with(Behavior::Fail, config());
        store.start().await;

        let err = store.connect().await.unwrap_err();
        assert_eq!(err, ConnectionError::Transport("refused".to_string()));
        assert_eq!(store.connection(), ConnectionState::Simulated);

        let len = store.history().len();
        assert!(wait_for(|| store.history().len() > len).await);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_failure_starts_idle_simulator() {
        let (store, _) = store_with(Behavior::Fail, config());

        assert!(store.connect().await.is_err());
        assert!(wait_for(|| !store.history().is_empty()).await);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_times_out() {
        let (store, remote) = store_with(Behavior::Hang, config());
        store.start().await;

        let err = store.connect().await.unwrap_err();
        assert_eq!(err, ConnectionError::Timeout);
        assert_eq!(store.connection(), ConnectionState::Simulated);
        assert_eq!(remote.disconnects.load(Ordering::SeqCst), 1);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_cancels_inflight_connect() {
        let (store, _) = store_with(
            Behavior::Hang,
            StoreConfig {
                connect_timeout: Duration::from_secs(30),
                ..config()
            },
        );
        store.start().await;

        let connecting = {
            let store = store.clone();
            tokio::spawn(async move { store.connect().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        store.disconnect().await;

        let result = connecting.await.unwrap();
        assert_eq!(result, Err(ConnectionError::Cancelled));
        assert_eq!(store.connection(), ConnectionState::Simulated);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (store, remote) = store_with(Behavior::Open, config());
        store.start().await;
        store.connect().await.unwrap();

        store.disconnect().await;
        assert_eq!(store.connection(), ConnectionState::Simulated);
        store.disconnect().await;
        assert_eq!(store.connection(), ConnectionState::Simulated);

        assert_eq!(remote.disconnects.load(Ordering::SeqCst), 1);
        let len = store.history().len();
        assert!(wait_for(|| store.history().len() > len).await);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_retired_transport_cannot_append() {
        let (store, remote) = store_with(Behavior::Open, config());
        store.connect().await.unwrap();
        let stale = remote.sender().unwrap();

        store.disconnect().await;
        let _ = stale.send(TransportEvent::Sample(RawSample::new(200.0, 39.0)));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.history().iter().all(|s| s.heart_rate() != 200));
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_unexpected_close_falls_back() {
        let (store, remote) = store_with(Behavior::Open, config());
        let mut events = store.subscribe();
        store.start().await;
        store.connect().await.unwrap();

        remote.send(80.0, 26.0);
        assert!(wait_for(|| store.current().map(|s| s.heart_rate()) == Some(80)).await);

        remote.close();
        assert!(wait_for(|| store.connection() == ConnectionState::Simulated).await);

        let len = store.history().len();
        assert!(wait_for(|| store.history().len() > len).await);

        let mut transitions = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let StoreEvent::Connection(state) = event {
                transitions.push(state);
            }
        }
        assert_eq!(transitions, vec![ConnectionState::Connected, ConnectionState::Simulated]);

        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconnect_after_fallback() {
        let (store, remote) = store_with(Behavior::Open, config());
        store.start().await;

        store.connect().await.unwrap();
        remote.close();
        assert!(wait_for(|| store.connection() == ConnectionState::Simulated).await);

        store.connect().await.unwrap();
        assert_eq!(store.connection(), ConnectionState::Connected);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let (store, remote) = store_with(Behavior::Open, config());
        store.start().await;
        store.connect().await.unwrap();

        store.shutdown().await;
        assert!(store.is_shut_down());
        assert_eq!(store.connection(), ConnectionState::Simulated);
        assert_eq!(store.connect().await, Err(ConnectionError::Closed));

        let len = store.history().len();
        remote.send(90.0, 26.0);
        assert!(store.ingest(RawSample::new(90.0, 26.0)).is_none());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.history().len(), len);
    }

    #[tokio::test]
    async fn test_zero_interval_still_simulates() {
        let (store, _) = store_with(
            Behavior::Open,
            StoreConfig {
                sample_interval: Duration::ZERO,
                ..config()
            },
        );
        store.start().await;

        assert!(wait_for(|| store.history().len() >= 3).await);
        store.shutdown().await;
    }

    #[test]
    fn test_snapshot_and_subscription_do_not_overlap() {
        let (store, _) = store_with(
            Behavior::Open,
            StoreConfig {
                capacity: 1_000,
                event_capacity: 1_024,
                ..config()
            },
        );
        let reader = store.reader();

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    store.ingest(RawSample::new(60.0 + (i % 40) as f64, 25.0));
                }
            })
        };

        let mut views = Vec::new();
        for _ in 0..50 {
            views.push(reader.subscribe_with_snapshot());
        }
        writer.join().unwrap();

        for (snapshot, mut events) in views {
            let mut delivered = 0;
            while let Ok(event) = events.try_recv() {
                if matches!(event, StoreEvent::Sample(_)) {
                    delivered += 1;
                }
            }
            assert_eq!(snapshot.history.len() + delivered, 500);
        }
    }

    #[tokio::test]
    async fn test_reader_sees_published_samples() {
        let (store, _) = store_with(Behavior::Open, config());
        let reader = store.reader();
        let mut events = reader.subscribe();

        let sample = store.ingest(RawSample::new(72.0, 26.5)).unwrap();

        assert_eq!(events.recv().await.unwrap(), StoreEvent::Sample(sample));
        assert_eq!(reader.current(), Some(sample));
        assert_eq!(reader.history_len(), 1);
        assert!(!reader.is_connected());
        assert_eq!(reader.stats(None).count, 1);
    }
}
