//! Core primitives.
//!
//! Coin faces, the randomness seam, and the seeded generator that feeds it.

pub mod coin;
pub mod rng;

// Re-export core types
pub use coin::{CoinFace, CoinSource, ScriptedCoin};
pub use rng::DeterministicRng;
