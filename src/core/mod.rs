//! Core module - the history store that owns all live state

mod store;
mod history;
mod event_bus;

pub use store::{HistoryStore, StoreConfig, StoreReader, StoreSnapshot};
pub use history::{HistoryBuffer, DEFAULT_CAPACITY};
pub use event_bus::{EventBus, StoreEvent};

use serde::{Deserialize, Serialize};

/// Which producer currently drives ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Simulated,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Simulated
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Simulated => f.write_str("simulated"),
            ConnectionState::Connected => f.write_str("connected"),
        }
    }
}
