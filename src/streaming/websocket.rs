// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! WebSocket server pushing live store changes to dashboards

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::config::FeedConfig;
use crate::core::StoreReader;

/// Read-only live feed.
///
/// A new client first gets a `welcome` message carrying the full snapshot,
/// then every later store event as `{"type": ..., "data": ...}`. No change
/// shows up in both. Anything a client sends apart from `ping` is ignored.
pub struct FeedServer {
    bind: String,
    port: u16,
    max_clients: usize,
    reader: StoreReader,
    clients: Arc<RwLock<HashMap<String, SocketAddr>>>,
}

impl FeedServer {
    pub fn new(config: &FeedConfig, reader: StoreReader) -> Self {
        Self {
            bind: config.bind.clone(),
            port: config.port,
            max_clients: config.max_clients,
            reader,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bind and serve in the background until `shutdown` fires.
    /// Returns the bound address.
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.bind, self.port);
        let listener = TcpListener::bind(&addr).await?;
        let local = listener.local_addr()?;

        info!("Live feed listening on ws://{}", local);

        let clients = self.clients.clone();
        let max_clients = self.max_clients;
        let reader = self.reader.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                // Reserve the slot before the handshake starts
                                let client_id = {
                                    let mut clients = clients.write().await;
                                    if clients.len() >= max_clients {
                                        warn!("Max clients reached, rejecting connection from {}", addr);
                                        continue;
                                    }
                                    let client_id = uuid::Uuid::new_v4().to_string();
                                    clients.insert(client_id.clone(), addr);
                                    client_id
                                };

                                tokio::spawn(handle_connection(
                                    stream,
                                    addr,
                                    client_id,
                                    clients.clone(),
                                    reader.clone(),
                                    shutdown.resubscribe(),
                                ));
                            }
                            Err(e) => {
                                error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("Live feed shutting down");
                        break;
                    }
                }
            }
        });

        Ok(local)
    }

    /// Clients connected or mid-handshake
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    client_id: String,
    clients: Arc<RwLock<HashMap<String, SocketAddr>>>,
    reader: StoreReader,
    mut shutdown: broadcast::Receiver<()>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            clients.write().await.remove(&client_id);
            return;
        }
    };

    info!("Feed client connected from {} (id: {})", addr, client_id);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (snapshot, mut events) = reader.subscribe_with_snapshot();

    let welcome = serde_json::json!({
        "type": "welcome",
        "clientId": client_id,
        "server": crate::NAME,
        "version": crate::VERSION,
        "snapshot": snapshot,
    });

    if let Err(e) = ws_sender.send(Message::Text(welcome.to_string())).await {
        warn!("Failed to send welcome to {}: {}", addr, e);
    }

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received from {}: {}", addr, text);

                        let is_ping = serde_json::from_str::<serde_json::Value>(&text)
                            .ok()
                            .and_then(|cmd| cmd.get("type").and_then(|v| v.as_str()).map(|t| t == "ping"))
                            .unwrap_or(false);
                        if is_ping {
                            let pong = serde_json::json!({"type": "pong"});
                            let _ = ws_sender.send(Message::Text(pong.to_string())).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Feed closed by client {}", addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Failed to encode store event: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sender.send(Message::Text(json)).await {
                            warn!("Failed to send to {}: {}", addr, e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Feed client {} lagged, skipped {} events", addr, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            _ = shutdown.recv() => {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    clients.write().await.remove(&client_id);
    info!("Feed client {} disconnected", addr);
}
