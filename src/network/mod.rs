//! Network Layer
//!
//! WebSocket relay that lets many players share one realtime leaderboard.

pub mod protocol;
pub mod server;
pub mod client;

pub use protocol::{ClientMessage, ServerMessage, SnapshotRecord};
pub use server::{ScoreServer, ServerConfig, ScoreServerError};
pub use client::RemoteScoreStore;
