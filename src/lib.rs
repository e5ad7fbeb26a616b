// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! VitalWatch - real-time heart-rate and temperature telemetry engine
//!
//! Ingests `(heart rate, temperature)` readings from a live WebSocket device
//! or, when none is connected, from a bounded random-walk simulator. Every
//! reading is classified against configurable thresholds and kept in a
//! bounded, time-ordered history that dashboards read from.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────────────────────┐
//! │ WebSocketTransport   │──┐  │          History Store           │
//! │ (live device)        │  │  │  classify → append → trim →      │
//! └──────────────────────┘  ├─→│  publish      (one producer)     │
//! ┌──────────────────────┐  │  └───────────────┬──────────────────┘
//! │ Simulator            │──┘                  │ StoreReader / events
//! │ (fallback)           │         ┌───────────┼────────────┐
//! └──────────────────────┘         ↓           ↓            ↓
//!                             FeedServer   HistoryStats   Exporter
//! ```

pub mod analysis;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod sensors;
pub mod streaming;

// Re-exports for convenience
pub use analysis::{HistoryStats, TimeRange};
pub use config::Config;
pub use core::{ConnectionState, HistoryStore, StoreConfig, StoreEvent, StoreReader};
pub use detection::{classify, Range, SampleStatus, Status, ThresholdConfig};
pub use error::ConnectionError;
pub use sensors::{RawSample, Sample, Simulator, Transport, TransportEvent};
pub use streaming::{ExportFormat, FeedServer, HistoryExporter, WebSocketTransport};

/// VitalWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VitalWatch name
pub const NAME: &str = "VitalWatch";
