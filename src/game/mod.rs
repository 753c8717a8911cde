//! Game Logic Module
//!
//! ## Module Structure
//!
//! - `state`: session state and lifetime records
//! - `round`: the round engine (prediction, flip, resolve)
//! - `events`: table events and their banner text
//! - `table`: async orchestration with the animation window and submission

pub mod state;
pub mod round;
pub mod events;
pub mod table;

// Re-export key types
pub use state::{SessionState, SessionRecords};
pub use round::{RoundEngine, RoundError, FlipResult, POINTS_PER_STREAK};
pub use events::{RoundEvent, RejectReason};
pub use table::{CoinTable, TableError, SubmittedScore, DEFAULT_FLIP_DELAY};
