//! Protocol Messages
//!
//! Wire format between score relay clients and the relay server.
//! All messages are JSON text frames.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::leaderboard::entry::{EntryId, StoredRecord};
use crate::leaderboard::source::{Snapshot, SourceError};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Append a record to the scores collection.
    Append {
        request_id: u64,
        record: StoredRecord,
    },

    /// Start receiving snapshots of the top `limit_to_last` scores.
    Subscribe {
        subscription_id: u64,
        limit_to_last: usize,
    },

    /// Stop a subscription.
    Unsubscribe {
        subscription_id: u64,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after the handshake.
    Hello {
        connection_id: String,
        server_version: String,
    },

    /// Append acknowledged.
    Appended {
        request_id: u64,
        id: EntryId,
    },

    /// Full replacement window for a subscription, ascending by score.
    Snapshot {
        subscription_id: u64,
        records: Vec<SnapshotRecord>,
    },

    /// A request or subscription failed.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subscription_id: Option<u64>,
        error: SourceError,
    },

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// One record inside a snapshot frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Store-assigned id.
    pub id: EntryId,
    /// Player name.
    pub name: String,
    /// Score.
    pub score: u32,
    /// Streak.
    pub streak: u32,
    /// Submission time.
    pub date: DateTime<Utc>,
}

impl SnapshotRecord {
    /// Encode a snapshot for the wire.
    pub fn encode(snapshot: Snapshot) -> Vec<SnapshotRecord> {
        snapshot
            .into_iter()
            .map(|(id, record)| SnapshotRecord {
                id,
                name: record.name,
                score: record.score,
                streak: record.streak,
                date: record.date,
            })
            .collect()
    }

    /// Decode a snapshot from the wire.
    pub fn decode(records: Vec<SnapshotRecord>) -> Snapshot {
        records
            .into_iter()
            .map(|r| {
                (
                    r.id,
                    StoredRecord {
                        name: r.name,
                        score: r.score,
                        streak: r.streak,
                        date: r.date,
                    },
                )
            })
            .collect()
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
