// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! Sample types and the live transport trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::detection::{SampleStatus, ThresholdConfig};
use crate::error::ConnectionError;

/// Inbound reading before classification: `{"heartRate": n, "temperature": n}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSample {
    pub heart_rate: f64,
    pub temperature: f64,
}

impl RawSample {
    pub fn new(heart_rate: f64, temperature: f64) -> Self {
        Self { heart_rate, temperature }
    }

    /// Decode one wire message. Extra fields are ignored, missing or
    /// non-numeric fields are an error.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn is_finite(&self) -> bool {
        self.heart_rate.is_finite() && self.temperature.is_finite()
    }

    /// Finite, with a heart rate that still fits an integer once rounded.
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && (i32::MIN as f64..=i32::MAX as f64).contains(&self.heart_rate.round())
    }

    /// Heart rate to the nearest integer, temperature to one decimal.
    pub fn normalized(&self) -> Self {
        Self {
            heart_rate: self.heart_rate.round(),
            temperature: round_tenth(self.temperature),
        }
    }
}

/// Round to one decimal place.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// One classified reading. Only the history store creates these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    heart_rate: i32,
    temperature: f64,
    timestamp: DateTime<Utc>,
    status: SampleStatus,
}

impl Sample {
    /// Build a sample from an already validated raw reading. The status is
    /// frozen against `thresholds` and never re-evaluated.
    pub(crate) fn classify(raw: RawSample, timestamp: DateTime<Utc>, thresholds: &ThresholdConfig) -> Self {
        let raw = raw.normalized();
        Self {
            heart_rate: raw.heart_rate as i32,
            temperature: raw.temperature,
            timestamp,
            status: SampleStatus::evaluate(raw.heart_rate, raw.temperature, thresholds),
        }
    }

    pub fn heart_rate(&self) -> i32 {
        self.heart_rate
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn status(&self) -> SampleStatus {
        self.status
    }

    pub fn is_alert(&self) -> bool {
        self.status.is_alert()
    }

    pub fn as_raw(&self) -> RawSample {
        RawSample::new(self.heart_rate as f64, self.temperature)
    }
}

/// Events a live transport reports once it is open
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A decoded, normalized reading
    Sample(RawSample),
    /// A non-fatal error on an open connection
    Error(String),
    /// The remote side or the network closed the connection.
    /// Sent at most once per session, never after `disconnect()`.
    Closed,
}

/// A single external, receive-only telemetry connection.
///
/// Implementations are plain I/O: they decode messages and report events.
/// Deciding what happens on close (fallback to the simulator) belongs to
/// the history store.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human readable endpoint, for logging
    fn endpoint(&self) -> &str;

    /// Whether a session is currently open
    fn is_open(&self) -> bool;

    /// Open the connection. Resolves once the transport reports open;
    /// events are delivered on `events` from then on.
    async fn connect(&mut self, events: mpsc::UnboundedSender<TransportEvent>) -> Result<(), ConnectionError>;

    /// Close the connection if open. Idempotent. No event is delivered
    /// after this returns.
    async fn disconnect(&mut self);
}
