// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! Error types for the live transport

use thiserror::Error;

/// Errors surfaced to the caller of `connect()`.
///
/// None of these are fatal: the store stays on (or returns to) the
/// simulator whenever one is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The configured endpoint is not a usable WebSocket URL.
    #[error("invalid transport url: {0}")]
    InvalidUrl(String),

    /// The transport did not open within the configured bound.
    #[error("connection attempt timed out")]
    Timeout,

    /// The transport errored before it opened.
    #[error("transport error: {0}")]
    Transport(String),

    /// A `disconnect()` arrived while the attempt was in flight.
    #[error("connection attempt cancelled")]
    Cancelled,

    /// The store has been shut down.
    #[error("store is shut down")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for ConnectionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::Url(e) => ConnectionError::InvalidUrl(e.to_string()),
            other => ConnectionError::Transport(other.to_string()),
        }
    }
}
