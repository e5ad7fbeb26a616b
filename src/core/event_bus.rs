// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! Event bus for publishing store changes to consumers

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use super::ConnectionState;
use crate::detection::ThresholdConfig;
use crate::sensors::Sample;

/// Change notifications emitted by the history store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StoreEvent {
    Sample(Sample),
    Connection(ConnectionState),
    Thresholds(ThresholdConfig),
}

/// In-process pub/sub. Publishing never blocks; slow subscribers lag.
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
    published: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));

        Self {
            tx,
            published: AtomicU64::new(0),
        }
    }

    pub fn publish_sample(&self, sample: Sample) {
        self.publish(StoreEvent::Sample(sample));
    }

    pub fn publish_connection(&self, state: ConnectionState) {
        self.publish(StoreEvent::Connection(state));
    }

    pub fn publish_thresholds(&self, thresholds: ThresholdConfig) {
        self.publish(StoreEvent::Thresholds(thresholds));
    }

    fn publish(&self, event: StoreEvent) {
        self.published.fetch_add(1, Ordering::Relaxed);
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
