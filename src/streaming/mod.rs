//! Streaming module - live device transport, dashboard feed and export

mod transport;
mod websocket;
mod export;

pub use transport::WebSocketTransport;
pub use websocket::FeedServer;
pub use export::{write_samples, HistoryExporter};

use serde::{Deserialize, Serialize};

/// Export format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "jsonl",
        }
    }
}
