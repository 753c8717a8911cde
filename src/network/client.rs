//! WebSocket client for a score relay.
//!
//! [`RemoteScoreStore`] implements [`RealtimeSource`] over one WebSocket
//! connection. Appends are matched to acknowledgements by request id and
//! snapshots are routed to local subscription channels by subscription id.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::leaderboard::entry::{EntryId, StoredRecord};
use crate::leaderboard::source::{
    RealtimeSource, ScoreQuery, SnapshotEvent, SnapshotStream, SourceError,
    SNAPSHOT_CHANNEL_CAPACITY,
};
use crate::network::protocol::{ClientMessage, ServerMessage, SnapshotRecord};

/// How long an append waits for its acknowledgement.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type PendingAppends = BTreeMap<u64, oneshot::Sender<Result<EntryId, SourceError>>>;
type Subscriptions = BTreeMap<u64, mpsc::Sender<SnapshotEvent>>;

struct ClientInner {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    pending: Mutex<PendingAppends>,
    subscriptions: Mutex<Subscriptions>,
    next_id: AtomicU64,
    closed: AtomicBool,
    request_timeout: Duration,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ClientInner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Fail everything outstanding once the connection is gone.
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);

        for (_, waiter) in std::mem::take(&mut *locked(&self.pending)) {
            let _ = waiter.send(Err(SourceError::Closed));
        }
        for (_, subscriber) in std::mem::take(&mut *locked(&self.subscriptions)) {
            let _ = subscriber.try_send(Err(SourceError::Closed));
        }
    }

    async fn dispatch(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Hello { connection_id, server_version } => {
                info!(%connection_id, %server_version, "Connected to score relay");
            }
            ServerMessage::Appended { request_id, id } => {
                let waiter = locked(&self.pending).remove(&request_id);
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Ok(id));
                }
            }
            ServerMessage::Snapshot { subscription_id, records } => {
                let subscriber = locked(&self.subscriptions).get(&subscription_id).cloned();
                if let Some(subscriber) = subscriber {
                    let _ = subscriber.send(Ok(SnapshotRecord::decode(records))).await;
                }
            }
            ServerMessage::Error { request_id, subscription_id, error } => {
                warn!(?request_id, ?subscription_id, "Score relay error: {}", error);
                if let Some(request_id) = request_id {
                    let waiter = locked(&self.pending).remove(&request_id);
                    if let Some(waiter) = waiter {
                        let _ = waiter.send(Err(error.clone()));
                    }
                }
                if let Some(subscription_id) = subscription_id {
                    let subscriber = locked(&self.subscriptions).get(&subscription_id).cloned();
                    if let Some(subscriber) = subscriber {
                        let _ = subscriber.send(Err(error)).await;
                    }
                }
            }
            ServerMessage::Shutdown { reason } => {
                warn!("Score relay shutting down: {}", reason);
            }
        }
    }
}

/// Realtime score collection hosted by a remote relay. Cheap to clone.
#[derive(Clone)]
pub struct RemoteScoreStore {
    inner: Arc<ClientInner>,
}

impl RemoteScoreStore {
    /// Connect to a relay at `url` (e.g. `ws://127.0.0.1:8080`).
    pub async fn connect(url: &str) -> Result<Self, SourceError> {
        Self::connect_with_timeout(url, DEFAULT_REQUEST_TIMEOUT).await
    }

    /// Connect with a custom append acknowledgement timeout.
    pub async fn connect_with_timeout(url: &str, request_timeout: Duration) -> Result<Self, SourceError> {
        info!("Connecting to {}...", url);
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<ClientMessage>();

        let inner = Arc::new(ClientInner {
            outgoing,
            pending: Mutex::new(BTreeMap::new()),
            subscriptions: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            request_timeout,
        });

        // Writer task
        tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                let text = match msg.to_json() {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };
                if write.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Reader task
        let reader_inner = inner.clone();
        tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match ServerMessage::from_json(&text) {
                        Ok(server_msg) => reader_inner.dispatch(server_msg).await,
                        Err(e) => warn!("Failed to parse server message: {} - {}", e, text),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Server closed connection");
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            reader_inner.close();
        });

        Ok(Self { inner })
    }

    /// Whether the connection has dropped.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl RealtimeSource for RemoteScoreStore {
    async fn append(&self, record: StoredRecord) -> Result<EntryId, SourceError> {
        if self.inner.is_closed() {
            return Err(SourceError::Closed);
        }

        let request_id = self.inner.next_id();
        let (tx, rx) = oneshot::channel();
        locked(&self.inner.pending).insert(request_id, tx);

        if self.inner.outgoing.send(ClientMessage::Append { request_id, record }).is_err() {
            locked(&self.inner.pending).remove(&request_id);
            return Err(SourceError::Closed);
        }

        match tokio::time::timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SourceError::Closed),
            Err(_) => {
                locked(&self.inner.pending).remove(&request_id);
                Err(SourceError::Unavailable("append timed out".to_string()))
            }
        }
    }

    fn subscribe(&self, query: ScoreQuery) -> SnapshotStream {
        let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);

        if self.inner.is_closed() {
            let _ = tx.try_send(Err(SourceError::Closed));
            return rx;
        }

        let subscription_id = self.inner.next_id();
        locked(&self.inner.subscriptions).insert(subscription_id, tx.clone());
        let _ = self.inner.outgoing.send(ClientMessage::Subscribe {
            subscription_id,
            limit_to_last: query.limit_to_last,
        });

        // Unsubscribe once the local receiver goes away.
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tx.closed().await;
            if locked(&inner.subscriptions).remove(&subscription_id).is_some() {
                let _ = inner.outgoing.send(ClientMessage::Unsubscribe { subscription_id });
                debug!(subscription_id, "Unsubscribed");
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_to_nothing_is_unavailable() {
        let result = RemoteScoreStore::connect("ws://127.0.0.1:1").await;
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }
}
