//! Session State Definitions
//!
//! The score, streak and pending prediction of the current run, plus the
//! lifetime records that outlive it.

use serde::{Serialize, Deserialize};

use crate::core::coin::CoinFace;

// =============================================================================
// LIFETIME RECORDS
// =============================================================================

/// Lifetime bests. Never decrease during a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecords {
    /// Best score ever reached.
    pub high_score: u32,
    /// Longest streak ever reached.
    pub record_streak: u32,
}

impl SessionRecords {
    /// Raise the records to cover `score` and `streak`.
    ///
    /// Returns `(new_high_score, new_record_streak)`.
    pub fn absorb(&mut self, score: u32, streak: u32) -> (bool, bool) {
        let new_high = score > self.high_score;
        let new_streak = streak > self.record_streak;
        self.high_score = self.high_score.max(score);
        self.record_streak = self.record_streak.max(streak);
        (new_high, new_streak)
    }
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// State of the current run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Points accumulated since the last miss or submission.
    pub current_score: u32,

    /// Consecutive correct predictions since the last miss.
    pub current_streak: u32,

    /// Face the player is betting on, if any.
    pub prediction: Option<CoinFace>,

    /// Lifetime bests.
    pub records: SessionRecords,
}

impl SessionState {
    /// Fresh run on top of previously persisted records.
    pub fn with_records(records: SessionRecords) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Lifetime high score.
    #[inline]
    pub fn high_score(&self) -> u32 {
        self.records.high_score
    }

    /// Lifetime record streak.
    #[inline]
    pub fn record_streak(&self) -> u32 {
        self.records.record_streak
    }

    /// Clear the run, keeping records.
    pub fn clear_run(&mut self) {
        self.current_score = 0;
        self.current_streak = 0;
        self.prediction = None;
    }
}
