//! WebSocket Score Relay
//!
//! Hosts one shared scores collection and exposes it to many clients:
//! appends are acknowledged with the assigned id, and every subscriber gets a
//! fresh snapshot of its window whenever anyone changes the collection.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};
use uuid::Uuid;

use crate::leaderboard::entry::normalize_name;
use crate::leaderboard::memory::MemoryScoreStore;
use crate::leaderboard::source::{RealtimeSource, ScoreQuery, SourceError};
use crate::network::protocol::{ClientMessage, ServerMessage, SnapshotRecord};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest `limit_to_last` a subscriber may ask for.
    pub max_window: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1000,
            max_window: 100,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Score server errors.
#[derive(Debug, thiserror::Error)]
pub enum ScoreServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// Connected client state.
struct ConnectedClient {
    connection_id: Uuid,
    connected_at: Instant,
}

/// Per-connection subscription forwarders, keyed by client subscription id.
type Forwarders = BTreeMap<u64, JoinHandle<()>>;

/// The score relay server.
pub struct ScoreServer {
    config: ServerConfig,
    store: MemoryScoreStore,
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ScoreServer {
    /// Create a server over an empty collection.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, MemoryScoreStore::new())
    }

    /// Create a server over an existing collection.
    pub fn with_store(config: ServerConfig, store: MemoryScoreStore) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            store,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// The hosted collection.
    pub fn store(&self) -> &MemoryScoreStore {
        &self.store
    }

    /// Bind and run until shutdown.
    pub async fn run(&self) -> Result<(), ScoreServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run on an already-bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ScoreServerError> {
        info!("Score relay listening on {}", listener.local_addr()?);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let store = self.store.clone();
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);
            let connection_id = Uuid::new_v4();

            clients.write().await.insert(addr, ConnectedClient {
                connection_id,
                connected_at: Instant::now(),
            });

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let _ = msg_tx.send(ServerMessage::Hello {
                connection_id: connection_id.to_string(),
                server_version: config.version.clone(),
            }).await;

            let mut forwarders = Forwarders::new();

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        Self::handle_client_message(
                                            client_msg,
                                            &store,
                                            &config,
                                            &msg_tx,
                                            &mut forwarders,
                                        ).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error {
                                            request_id: None,
                                            subscription_id: None,
                                            error: SourceError::PermissionDenied(
                                                "invalid message format".to_string(),
                                            ),
                                        }).await;
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        // Let the sender flush the shutdown notice.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        break;
                    }
                }
            }

            // Cleanup
            for (_, forwarder) in forwarders {
                forwarder.abort();
            }
            sender_task.abort();

            if let Some(client) = clients.write().await.remove(&addr) {
                info!(
                    connection_id = %client.connection_id,
                    "Client {} left after {:?}", addr, client.connected_at.elapsed()
                );
            }
        });
    }

    /// Handle a parsed client message.
    async fn handle_client_message(
        msg: ClientMessage,
        store: &MemoryScoreStore,
        config: &ServerConfig,
        msg_tx: &mpsc::Sender<ServerMessage>,
        forwarders: &mut Forwarders,
    ) {
        match msg {
            ClientMessage::Append { request_id, mut record } => {
                // Clients are untrusted; apply the same name rules again.
                let reply = match normalize_name(&record.name) {
                    Ok(name) => {
                        record.name = name;
                        match store.append(record).await {
                            Ok(id) => ServerMessage::Appended { request_id, id },
                            Err(error) => ServerMessage::Error {
                                request_id: Some(request_id),
                                subscription_id: None,
                                error,
                            },
                        }
                    }
                    Err(e) => ServerMessage::Error {
                        request_id: Some(request_id),
                        subscription_id: None,
                        error: SourceError::PermissionDenied(e.to_string()),
                    },
                };
                let _ = msg_tx.send(reply).await;
            }

            ClientMessage::Subscribe { subscription_id, limit_to_last } => {
                if limit_to_last > config.max_window {
                    let _ = msg_tx.send(ServerMessage::Error {
                        request_id: None,
                        subscription_id: Some(subscription_id),
                        error: SourceError::PermissionDenied(format!(
                            "window of {} exceeds limit {}", limit_to_last, config.max_window
                        )),
                    }).await;
                    return;
                }

                let mut stream = store.subscribe(ScoreQuery::top_by_score(limit_to_last));
                let tx = msg_tx.clone();
                let forwarder = tokio::spawn(async move {
                    while let Some(event) = stream.recv().await {
                        let msg = match event {
                            Ok(snapshot) => ServerMessage::Snapshot {
                                subscription_id,
                                records: SnapshotRecord::encode(snapshot),
                            },
                            Err(error) => ServerMessage::Error {
                                request_id: None,
                                subscription_id: Some(subscription_id),
                                error,
                            },
                        };
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                });

                if let Some(previous) = forwarders.insert(subscription_id, forwarder) {
                    previous.abort();
                }
                debug!(subscription_id, limit_to_last, "Subscription started");
            }

            ClientMessage::Unsubscribe { subscription_id } => {
                if let Some(forwarder) = forwarders.remove(&subscription_id) {
                    forwarder.abort();
                    debug!(subscription_id, "Subscription stopped");
                }
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}
