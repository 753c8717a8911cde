//! # Coin Flip Casino
//!
//! Heads-or-tails game engine with a shared, realtime leaderboard.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    COIN FLIP CASINO                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Coin faces and randomness                 │
//! │  ├── coin.rs     - CoinFace, CoinSource seam                 │
//! │  └── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │                                                              │
//! │  game/           - Round engine                              │
//! │  ├── state.rs    - Session state and lifetime records        │
//! │  ├── round.rs    - Prediction, flip and scoring rules        │
//! │  ├── events.rs   - Table events and banners                  │
//! │  └── table.rs    - Animation window, submit-then-reset       │
//! │                                                              │
//! │  storage/        - Durable high score / record streak        │
//! │                                                              │
//! │  leaderboard/    - Leaderboard synchronizer                  │
//! │  ├── source.rs   - Realtime ordered data source seam         │
//! │  ├── memory.rs   - In-process source                         │
//! │  ├── view.rs     - Ranking (top 10 of last 20)               │
//! │  └── sync.rs     - Push-driven cached view, submission       │
//! │                                                              │
//! │  network/        - Shared leaderboard over WebSocket         │
//! │  ├── server.rs   - Score relay                               │
//! │  ├── client.rs   - RealtimeSource backed by a relay          │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The round engine and the leaderboard share no state. They meet only when
//! a run is submitted: the table reads score and streak, hands them to the
//! synchronizer, and clears the run once the store acknowledges.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod leaderboard;
pub mod network;
pub mod storage;

// Re-export commonly used types
pub use crate::core::coin::{CoinFace, CoinSource, ScriptedCoin};
pub use crate::core::rng::DeterministicRng;
pub use game::round::{RoundEngine, RoundError, FlipResult};
pub use game::state::{SessionState, SessionRecords};
pub use game::table::{CoinTable, TableError};
pub use leaderboard::sync::{LeaderboardSync, SubmitError};
pub use leaderboard::view::LeaderboardView;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
