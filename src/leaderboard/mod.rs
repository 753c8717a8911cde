//! Shared leaderboard.
//!
//! ## Module Structure
//!
//! - `entry`: stored records, ranked entries, name rules
//! - `source`: the realtime ordered data source seam
//! - `memory`: in-process source
//! - `view`: ranking and display rows
//! - `sync`: the synchronizer tying a source to a cached view

pub mod entry;
pub mod source;
pub mod memory;
pub mod view;
pub mod sync;

pub use entry::{EntryId, LeaderboardEntry, StoredRecord, NAME_MAX_CHARS};
pub use source::{RealtimeSource, ScoreQuery, Snapshot, SnapshotEvent, SnapshotStream, SourceError};
pub use memory::MemoryScoreStore;
pub use view::{LeaderboardView, LeaderboardRow, Badge, rank_snapshot};
pub use sync::{LeaderboardSync, Subscription, SubmitError, FETCH_LIMIT, DISPLAY_LIMIT};
