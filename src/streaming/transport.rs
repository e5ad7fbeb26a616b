// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! WebSocket client for the live device feed

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::ConnectionError;
use crate::sensors::{RawSample, Transport, TransportEvent};

type DeviceStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `disconnect()` waits for the close handshake before aborting
const CLOSE_GRACE: Duration = Duration::from_millis(500);

struct Session {
    shutdown: Option<oneshot::Sender<()>>,
    reader: JoinHandle<()>,
}

/// Receive-only WebSocket connection to the device.
///
/// Each inbound text or binary message is decoded as
/// `{"heartRate": n, "temperature": n}`, normalized and forwarded.
/// Malformed messages are logged and dropped without ending the session.
pub struct WebSocketTransport {
    url: String,
    session: Option<Session>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session: None,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn is_open(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| !s.reader.is_finished())
            .unwrap_or(false)
    }

    async fn connect(&mut self, events: mpsc::UnboundedSender<TransportEvent>) -> Result<(), ConnectionError> {
        // One connection at a time
        self.disconnect().await;

        let (stream, _response) = connect_async(self.url.as_str()).await?;
        info!("WebSocket connected to {}", self.url);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader = tokio::spawn(read_loop(stream, self.url.clone(), events, shutdown_rx));

        self.session = Some(Session {
            shutdown: Some(shutdown_tx),
            reader,
        });
        Ok(())
    }

    async fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        if let Some(shutdown) = session.shutdown.take() {
            let _ = shutdown.send(());
        }

        if tokio::time::timeout(CLOSE_GRACE, &mut session.reader).await.is_err() {
            warn!("Close handshake with {} timed out, aborting", self.url);
            session.reader.abort();
            let _ = (&mut session.reader).await;
        }

        info!("WebSocket disconnected from {}", self.url);
    }
}

async fn read_loop(
    mut stream: DeviceStream,
    url: String,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = stream.close(None).await {
                    debug!("Close to {} failed: {}", url, e);
                }
                // Explicit disconnect: no Closed event
                return;
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !forward(text.as_bytes(), &events) {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        if !forward(&bytes, &events) {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Device at {} closed the connection: {:?}", url, frame);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", url, e);
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = events.send(TransportEvent::Closed);
}

/// Decode one message and pass it on. Returns false once nobody listens.
fn forward(bytes: &[u8], events: &mpsc::UnboundedSender<TransportEvent>) -> bool {
    match RawSample::from_json(bytes) {
        Ok(raw) if raw.is_valid() => events.send(TransportEvent::Sample(raw.normalized())).is_ok(),
        Ok(raw) => {
            warn!("Discarding out-of-range reading: {:?}", raw);
            true
        }
        Err(e) => {
            warn!("Discarding malformed message: {}", e);
            true
        }
    }
}
