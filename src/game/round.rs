//! Round Engine
//!
//! Owns the player's [`SessionState`] and the flip/resolve transition.
//!
//! ## Scoring
//!
//! A correct call extends the streak and pays `10 * streak` points, so k
//! consecutive hits total `10 * k * (k + 1) / 2`. A single miss wipes both the
//! streak and the whole score.
//!
//! ## Flip lifecycle
//!
//! ```text
//! select_prediction ──► begin_flip ──(animation window)──► resolve_flip
//!        ▲                  │ in-flight: selection and new flips rejected
//!        └──────────────────┘
//! ```
//!
//! A submission is gated the same way: between `begin_submission` and
//! `finish_submission` the run is frozen, so the reset after an
//! acknowledgement clears exactly the run that was sent.
//!
//! Records are written to the [`RecordStore`] after every resolution, even
//! when they did not change.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::coin::CoinFace;
use crate::game::state::SessionState;
use crate::storage::records::RecordStore;

/// Points paid per streak level on a correct call.
pub const POINTS_PER_STREAK: u32 = 10;

/// Precondition failures. None of these are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoundError {
    /// Flip requested without a prediction.
    #[error("select heads or tails first")]
    NoPrediction,

    /// Another flip is still resolving.
    #[error("a flip is already in progress")]
    FlipInProgress,

    /// Submission requested with a zero score.
    #[error("score some points first")]
    NothingToSubmit,

    /// A submission is waiting for the leaderboard to acknowledge it.
    #[error("a score submission is in progress")]
    SubmitInProgress,
}

/// Outcome of one resolved flip, computed from the post-update state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipResult {
    /// Face the coin landed on.
    pub outcome: CoinFace,
    /// Face the player called.
    pub prediction: CoinFace,
    /// Whether the call was right.
    pub correct: bool,
    /// Points paid for this flip (0 on a miss).
    pub points_earned: u32,
    /// Score after the flip.
    pub new_score: u32,
    /// Streak after the flip.
    pub new_streak: u32,
    /// Streak before the flip; what a miss just ended.
    pub previous_streak: u32,
    /// The flip raised the lifetime high score.
    pub is_new_high_score: bool,
    /// The flip raised the lifetime record streak.
    pub is_new_record_streak: bool,
}

/// Single-player round engine.
pub struct RoundEngine<S: RecordStore> {
    state: SessionState,
    store: S,
    flip_in_flight: bool,
    submit_in_flight: bool,
}

impl<S: RecordStore> RoundEngine<S> {
    /// Start a session from the records held by `store`.
    pub fn new(store: S) -> Self {
        let records = store.load();
        debug!(?records, "Starting session");
        Self {
            state: SessionState::with_records(records),
            store,
            flip_in_flight: false,
            submit_in_flight: false,
        }
    }

    /// Current session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The durable store backing the records.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether a flip is waiting to resolve.
    #[inline]
    pub fn is_flipping(&self) -> bool {
        self.flip_in_flight
    }

    /// Whether a submission is waiting for acknowledgement.
    #[inline]
    pub fn is_submitting(&self) -> bool {
        self.submit_in_flight
    }

    fn ensure_idle(&self) -> Result<(), RoundError> {
        if self.flip_in_flight {
            return Err(RoundError::FlipInProgress);
        }
        if self.submit_in_flight {
            return Err(RoundError::SubmitInProgress);
        }
        Ok(())
    }

    /// Set the prediction, overwriting any previous one.
    pub fn select_prediction(&mut self, choice: CoinFace) -> Result<(), RoundError> {
        self.ensure_idle()?;
        self.state.prediction = Some(choice);
        Ok(())
    }

    /// Mark a flip as in flight. Returns the prediction being played.
    pub fn begin_flip(&mut self) -> Result<CoinFace, RoundError> {
        self.ensure_idle()?;
        let prediction = self.state.prediction.ok_or(RoundError::NoPrediction)?;
        self.flip_in_flight = true;
        Ok(prediction)
    }

    /// Drop an in-flight flip without resolving it.
    pub fn abort_flip(&mut self) {
        self.flip_in_flight = false;
    }

    /// Settle the current prediction against `outcome`.
    pub fn resolve_flip(&mut self, outcome: CoinFace) -> Result<FlipResult, RoundError> {
        self.flip_in_flight = false;
        let prediction = self.state.prediction.ok_or(RoundError::NoPrediction)?;

        let correct = outcome == prediction;
        let previous_streak = self.state.current_streak;
        let mut points_earned = 0;

        if correct {
            self.state.current_streak = self.state.current_streak.saturating_add(1);
            points_earned = POINTS_PER_STREAK.saturating_mul(self.state.current_streak);
            self.state.current_score = self.state.current_score.saturating_add(points_earned);
        } else {
            self.state.current_streak = 0;
            self.state.current_score = 0;
        }

        let (is_new_high_score, is_new_record_streak) = self
            .state
            .records
            .absorb(self.state.current_score, self.state.current_streak);

        // A hit keeps the call armed; a miss makes the player choose again.
        if !correct {
            self.state.prediction = None;
        }

        if let Err(e) = self.store.save(&self.state.records) {
            warn!("Failed to persist records: {}", e);
        }

        let result = FlipResult {
            outcome,
            prediction,
            correct,
            points_earned,
            new_score: self.state.current_score,
            new_streak: self.state.current_streak,
            previous_streak,
            is_new_high_score,
            is_new_record_streak,
        };
        debug!(?result, "Flip resolved");
        Ok(result)
    }

    /// Score and streak to submit, if submission is allowed right now.
    pub fn submission(&self) -> Result<(u32, u32), RoundError> {
        self.ensure_idle()?;
        if self.state.current_score == 0 {
            return Err(RoundError::NothingToSubmit);
        }
        Ok((self.state.current_score, self.state.current_streak))
    }

    /// Freeze the run for submission. Returns the score and streak to send.
    pub fn begin_submission(&mut self) -> Result<(u32, u32), RoundError> {
        let run = self.submission()?;
        self.submit_in_flight = true;
        Ok(run)
    }

    /// Release the submission gate, clearing the run if the store accepted it.
    pub fn finish_submission(&mut self, accepted: bool) {
        self.submit_in_flight = false;
        if accepted {
            self.reset_for_submission();
        }
    }

    /// Clear the run after a successful leaderboard submission.
    pub fn reset_for_submission(&mut self) {
        self.state.clear_run();
    }
}
