//! In-process realtime score collection.
//!
//! Holds records in a `BTreeMap` keyed by sequential ids and fans a change
//! signal out to subscriber tasks, each of which re-reads its window and
//! pushes a full snapshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::leaderboard::entry::{EntryId, StoredRecord};
use crate::leaderboard::source::{
    RealtimeSource, ScoreQuery, Snapshot, SnapshotStream, SourceError,
    SNAPSHOT_CHANNEL_CAPACITY,
};

struct Inner {
    records: RwLock<BTreeMap<EntryId, StoredRecord>>,
    next_seq: AtomicU64,
    changes: broadcast::Sender<()>,
}

/// Shared in-memory score collection. Cheap to clone.
#[derive(Clone)]
pub struct MemoryScoreStore {
    inner: Arc<Inner>,
}

impl Default for MemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScoreStore {
    /// Create an empty collection.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                records: RwLock::new(BTreeMap::new()),
                next_seq: AtomicU64::new(1),
                changes,
            }),
        }
    }

    /// Remove a record. Returns whether it existed.
    pub async fn remove(&self, id: &EntryId) -> bool {
        let removed = self.inner.records.write().await.remove(id).is_some();
        if removed {
            debug!(%id, "Removed score record");
            let _ = self.inner.changes.send(());
        }
        removed
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.records.read().await.len()
    }

    /// Whether the collection is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current window for `query`.
    pub async fn snapshot(&self, query: &ScoreQuery) -> Snapshot {
        let records = self.inner.records.read().await;
        query.window(records.iter())
    }

    /// Number of live subscriber tasks.
    pub fn subscriber_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }
}

impl RealtimeSource for MemoryScoreStore {
    async fn append(&self, record: StoredRecord) -> Result<EntryId, SourceError> {
        let id = EntryId::from_sequence(self.inner.next_seq.fetch_add(1, Ordering::SeqCst));
        self.inner.records.write().await.insert(id.clone(), record);
        debug!(%id, "Appended score record");
        let _ = self.inner.changes.send(());
        Ok(id)
    }

    fn subscribe(&self, query: ScoreQuery) -> SnapshotStream {
        let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);
        // Subscribe before the first read so no change slips between them.
        let mut changes = self.inner.changes.subscribe();
        let store = self.clone();

        tokio::spawn(async move {
            loop {
                let snapshot = store.snapshot(&query).await;
                if tx.send(Ok(snapshot)).await.is_err() {
                    break;
                }

                tokio::select! {
                    change = changes.recv() => match change {
                        Ok(()) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Subscriber lagged, sending latest snapshot");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = tx.closed() => break,
                }
            }
            debug!("Score subscription ended");
        });

        rx
    }
}
