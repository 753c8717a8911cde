//! Coin faces and the randomness seam.
//!
//! The round engine never draws its own outcomes. Callers hand it a
//! [`CoinFace`] drawn from any [`CoinSource`], which keeps resolution
//! deterministic under test.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One side of the coin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinFace {
    /// Heads.
    Heads,
    /// Tails.
    Tails,
}

impl CoinFace {
    /// The opposite face.
    #[inline]
    pub fn opposite(self) -> CoinFace {
        match self {
            CoinFace::Heads => CoinFace::Tails,
            CoinFace::Tails => CoinFace::Heads,
        }
    }

    /// Upper-case label used in banners.
    pub fn label(self) -> &'static str {
        match self {
            CoinFace::Heads => "HEADS",
            CoinFace::Tails => "TAILS",
        }
    }
}

impl fmt::Display for CoinFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Anything that can produce a fair coin flip.
pub trait CoinSource {
    /// Draw the next outcome with 50/50 probability.
    fn flip(&mut self) -> CoinFace;
}

/// Replays a fixed list of outcomes, then repeats the last one.
///
/// Used by tests and replays where the outcome sequence is known up front.
#[derive(Clone, Debug)]
pub struct ScriptedCoin {
    outcomes: VecDeque<CoinFace>,
    last: CoinFace,
}

impl ScriptedCoin {
    /// Create from an outcome sequence. An empty script always lands heads.
    pub fn new(outcomes: impl IntoIterator<Item = CoinFace>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            last: CoinFace::Heads,
        }
    }

    /// Outcomes not yet drawn.
    pub fn remaining(&self) -> usize {
        self.outcomes.len()
    }
}

impl CoinSource for ScriptedCoin {
    fn flip(&mut self) -> CoinFace {
        if let Some(face) = self.outcomes.pop_front() {
            self.last = face;
        }
        self.last
    }
}
