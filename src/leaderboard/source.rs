//! Realtime ordered data source.
//!
//! The leaderboard treats its backing store as a passive collection that can
//! append a record and push full snapshots of an ordered window to every
//! subscriber whenever anything changes.

use std::future::Future;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::leaderboard::entry::{EntryId, StoredRecord};

/// Capacity of each subscriber's snapshot channel.
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// Transport or permission failure reported by a source.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SourceError {
    /// Store unreachable.
    #[error("score store unavailable: {0}")]
    Unavailable(String),

    /// Store refused the read or write.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Connection to the store has closed.
    #[error("score store connection closed")]
    Closed,
}

/// Ordered window over the collection: the last `limit` records by ascending score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreQuery {
    /// Maximum records per snapshot.
    pub limit_to_last: usize,
}

impl ScoreQuery {
    /// Highest `limit` scores.
    pub const fn top_by_score(limit: usize) -> Self {
        Self { limit_to_last: limit }
    }

    /// Apply the window to a set of records.
    ///
    /// Records order by `(score, id)` ascending and the tail of length
    /// `limit_to_last` is returned, still ascending.
    pub fn window<'a, I>(&self, records: I) -> Snapshot
    where
        I: IntoIterator<Item = (&'a EntryId, &'a StoredRecord)>,
    {
        let mut all: Vec<(EntryId, StoredRecord)> = records
            .into_iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect();
        all.sort_by(|(a_id, a), (b_id, b)| a.score.cmp(&b.score).then_with(|| a_id.cmp(b_id)));

        let skip = all.len().saturating_sub(self.limit_to_last);
        all.split_off(skip)
    }
}

/// Full replacement set of records for one query.
pub type Snapshot = Vec<(EntryId, StoredRecord)>;

/// One push from the source.
pub type SnapshotEvent = Result<Snapshot, SourceError>;

/// Receiving end of a subscription. Dropping it ends the subscription.
pub type SnapshotStream = mpsc::Receiver<SnapshotEvent>;

/// A realtime ordered collection of leaderboard records.
pub trait RealtimeSource: Send + Sync + 'static {
    /// Append a record. The store assigns and returns a fresh id; existing
    /// records are never touched.
    fn append(&self, record: StoredRecord) -> impl Future<Output = Result<EntryId, SourceError>> + Send;

    /// Start receiving snapshots for `query`.
    ///
    /// The first snapshot arrives as soon as the store can serve it, then one
    /// per change. Must be called from within a tokio runtime.
    fn subscribe(&self, query: ScoreQuery) -> SnapshotStream;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record(name: &str, score: u32) -> StoredRecord {
        StoredRecord::new(name, score, 1, Utc::now()).unwrap()
    }

    #[test]
    fn test_window_keeps_highest_ascending() {
        let mut records = BTreeMap::new();
        for (seq, score) in [50u32, 10, 90, 30, 70].iter().enumerate() {
            records.insert(EntryId::from_sequence(seq as u64), record("p", *score));
        }

        let snapshot = ScoreQuery::top_by_score(3).window(&records);
        let scores: Vec<u32> = snapshot.iter().map(|(_, r)| r.score).collect();
        assert_eq!(scores, vec![50, 70, 90]);
    }

    #[test]
    fn test_window_ties_order_by_id() {
        let mut records = BTreeMap::new();
        records.insert(EntryId::from_sequence(2), record("late", 40));
        records.insert(EntryId::from_sequence(1), record("early", 40));

        let snapshot = ScoreQuery::top_by_score(20).window(&records);
        let names: Vec<&str> = snapshot.iter().map(|(_, r)| r.name.as_str()).collect();
        assert_eq!(names, vec!["EARLY", "LATE"]);
    }

    #[test]
    fn test_window_of_empty_collection() {
        let records: BTreeMap<EntryId, StoredRecord> = BTreeMap::new();
        assert!(ScoreQuery::top_by_score(20).window(&records).is_empty());
    }

    #[test]
    fn test_source_error_wire_shape() {
        let json = serde_json::to_string(&SourceError::PermissionDenied("scores".into())).unwrap();
        assert!(json.contains("permission_denied"));
        let back: SourceError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SourceError::PermissionDenied("scores".into()));

        let closed = serde_json::to_string(&SourceError::Closed).unwrap();
        assert_eq!(serde_json::from_str::<SourceError>(&closed).unwrap(), SourceError::Closed);
    }
}
