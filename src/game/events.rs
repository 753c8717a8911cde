//! Round Events
//!
//! Everything the table reports back to a front end, each with the banner
//! line shown to the player.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::coin::CoinFace;
use crate::game::round::{FlipResult, RoundError};

/// Something that happened at the table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoundEvent {
    /// Session loaded, nothing played yet.
    Ready,

    /// Player picked a face.
    PredictionSelected {
        choice: CoinFace,
    },

    /// Coin is in the air.
    FlipStarted {
        prediction: CoinFace,
    },

    /// Coin landed.
    FlipResolved(FlipResult),

    /// Score went to the leaderboard and the run was cleared.
    ScoreSubmitted {
        name: String,
        score: u32,
        streak: u32,
    },

    /// An action was refused.
    Rejected {
        reason: RejectReason,
    },
}

/// Why an action was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No face picked yet.
    NoPrediction,
    /// A flip is already resolving.
    FlipInProgress,
    /// Nothing to submit.
    NothingToSubmit,
    /// A submission is still waiting for the leaderboard.
    SubmitInProgress,
}

impl From<RoundError> for RejectReason {
    fn from(err: RoundError) -> Self {
        match err {
            RoundError::NoPrediction => RejectReason::NoPrediction,
            RoundError::FlipInProgress => RejectReason::FlipInProgress,
            RoundError::NothingToSubmit => RejectReason::NothingToSubmit,
            RoundError::SubmitInProgress => RejectReason::SubmitInProgress,
        }
    }
}

impl RoundEvent {
    /// Player-facing banner text.
    pub fn banner(&self) -> String {
        match self {
            RoundEvent::Ready => "READY TO PLAY!".to_string(),
            RoundEvent::PredictionSelected { choice } => {
                format!("{} SELECTED! READY TO FLIP!", choice.label())
            }
            RoundEvent::FlipStarted { prediction } => {
                format!("FLIPPING... YOU CALLED {}", prediction.label())
            }
            RoundEvent::FlipResolved(result) => flip_banner(result),
            RoundEvent::ScoreSubmitted { name, score, .. } => {
                format!("{} ENTERS THE LEADERBOARD WITH {}!", name, score)
            }
            RoundEvent::Rejected { reason: RejectReason::NoPrediction } => {
                "SELECT HEADS OR TAILS FIRST!".to_string()
            }
            RoundEvent::Rejected { reason: RejectReason::FlipInProgress } => {
                "COIN IS STILL IN THE AIR!".to_string()
            }
            RoundEvent::Rejected { reason: RejectReason::NothingToSubmit } => {
                "SCORE SOME POINTS FIRST!".to_string()
            }
            RoundEvent::Rejected { reason: RejectReason::SubmitInProgress } => {
                "SUBMITTING SCORE... HOLD ON!".to_string()
            }
        }
    }
}

fn flip_banner(result: &FlipResult) -> String {
    let mut text = if result.correct {
        if result.new_streak > 1 {
            format!("WINNER! STREAK {} → +{} POINTS!", result.new_streak, result.points_earned)
        } else {
            format!("WINNER! +{} POINTS!", result.points_earned)
        }
    } else if result.previous_streak > 0 {
        format!("STREAK ENDED AT {}!", result.previous_streak)
    } else {
        "BETTER LUCK NEXT TIME!".to_string()
    };

    if result.correct && result.is_new_high_score {
        text.push_str(" NEW HIGH SCORE!");
    }
    text
}

impl fmt::Display for RoundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.banner())
    }
}
