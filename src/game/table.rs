//! Coin Table
//!
//! Ties one player's [`RoundEngine`] to the shared [`LeaderboardSync`] and
//! runs the flip animation window.
//!
//! The outcome is drawn when the flip starts and applied once the window
//! elapses. While a flip is in the air, selecting, flipping and submitting are
//! rejected. Dropping a flip future mid-air releases the gate without scoring.
//!
//! A submission holds the same kind of gate until the store answers, so no
//! flip can add points that the following reset would discard.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::core::coin::{CoinFace, CoinSource};
use crate::game::round::{FlipResult, RoundEngine, RoundError};
use crate::game::state::SessionState;
use crate::leaderboard::entry::EntryId;
use crate::leaderboard::source::RealtimeSource;
use crate::leaderboard::sync::{LeaderboardSync, SubmitError};
use crate::storage::records::RecordStore;

/// Default animation window between flip and result.
pub const DEFAULT_FLIP_DELAY: Duration = Duration::from_millis(1000);

/// Table-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// Round precondition failed.
    #[error(transparent)]
    Round(#[from] RoundError),

    /// Leaderboard submission failed.
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Accepted leaderboard submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedScore {
    /// Id assigned by the store.
    pub id: EntryId,
    /// Score that was submitted.
    pub score: u32,
    /// Streak that was submitted.
    pub streak: u32,
}

/// A single player's seat at the coin table.
pub struct CoinTable<R: RecordStore, S: RealtimeSource> {
    engine: Mutex<RoundEngine<R>>,
    leaderboard: LeaderboardSync<S>,
    flip_delay: Duration,
}

/// Clears the in-flight flag if the flip future is dropped before resolving.
struct FlipGuard<'a, R: RecordStore> {
    engine: &'a Mutex<RoundEngine<R>>,
    armed: bool,
}

impl<R: RecordStore> Drop for FlipGuard<'_, R> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Flip dropped mid-air");
            lock(self.engine).abort_flip();
        }
    }
}

/// Releases the submission gate, keeping the run, if the submit future is dropped.
struct SubmitGuard<'a, R: RecordStore> {
    engine: &'a Mutex<RoundEngine<R>>,
    armed: bool,
}

impl<R: RecordStore> Drop for SubmitGuard<'_, R> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Submission dropped before acknowledgement");
            lock(self.engine).finish_submission(false);
        }
    }
}

fn lock<R: RecordStore>(engine: &Mutex<RoundEngine<R>>) -> MutexGuard<'_, RoundEngine<R>> {
    match engine.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<R: RecordStore, S: RealtimeSource> CoinTable<R, S> {
    /// Seat a player with the default animation window.
    pub fn new(engine: RoundEngine<R>, leaderboard: LeaderboardSync<S>) -> Self {
        Self::with_flip_delay(engine, leaderboard, DEFAULT_FLIP_DELAY)
    }

    /// Seat a player with a custom animation window.
    pub fn with_flip_delay(engine: RoundEngine<R>, leaderboard: LeaderboardSync<S>, flip_delay: Duration) -> Self {
        Self {
            engine: Mutex::new(engine),
            leaderboard,
            flip_delay,
        }
    }

    /// Copy of the current session state.
    pub fn session(&self) -> SessionState {
        lock(&self.engine).state().clone()
    }

    /// Whether a flip is in the air.
    pub fn is_flipping(&self) -> bool {
        lock(&self.engine).is_flipping()
    }

    /// Whether a submission is waiting for the store.
    pub fn is_submitting(&self) -> bool {
        lock(&self.engine).is_submitting()
    }

    /// The shared leaderboard.
    pub fn leaderboard(&self) -> &LeaderboardSync<S> {
        &self.leaderboard
    }

    /// Animation window length.
    pub fn flip_delay(&self) -> Duration {
        self.flip_delay
    }

    /// Pick heads or tails.
    pub fn select_prediction(&self, choice: CoinFace) -> Result<(), TableError> {
        lock(&self.engine).select_prediction(choice)?;
        Ok(())
    }

    /// Flip the coin and wait out the animation window.
    pub async fn flip<C: CoinSource + ?Sized>(&self, coin: &mut C) -> Result<FlipResult, TableError> {
        let prediction = lock(&self.engine).begin_flip()?;
        let mut guard = FlipGuard { engine: &self.engine, armed: true };

        let outcome = coin.flip();
        debug!(%prediction, %outcome, "Coin in the air");
        tokio::time::sleep(self.flip_delay).await;

        let result = lock(&self.engine).resolve_flip(outcome);
        guard.armed = false;
        Ok(result?)
    }

    /// Send the current run to the leaderboard, then clear it.
    ///
    /// A failed submission leaves the run untouched.
    pub async fn submit_score(&self, name: &str) -> Result<SubmittedScore, TableError> {
        let (score, streak) = lock(&self.engine).begin_submission()?;
        let mut guard = SubmitGuard { engine: &self.engine, armed: true };

        let outcome = self.leaderboard.submit(name, score, streak).await;
        guard.armed = false;
        lock(&self.engine).finish_submission(outcome.is_ok());

        let id = outcome?;
        info!(%id, score, streak, "Run submitted and cleared");
        Ok(SubmittedScore { id, score, streak })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coin::ScriptedCoin;
    use crate::leaderboard::entry::StoredRecord;
    use crate::leaderboard::memory::MemoryScoreStore;
    use crate::leaderboard::source::{ScoreQuery, SnapshotStream, SourceError};
    use crate::storage::records::MemoryRecordStore;
    use tokio::time::Instant;

    fn table() -> CoinTable<MemoryRecordStore, MemoryScoreStore> {
        CoinTable::new(
            RoundEngine::new(MemoryRecordStore::default()),
            LeaderboardSync::new(MemoryScoreStore::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_flip_waits_for_animation_window() {
        let table = table();
        let mut coin = ScriptedCoin::new([CoinFace::Heads]);
        table.select_prediction(CoinFace::Heads).unwrap();

        let start = Instant::now();
        let result = table.flip(&mut coin).await.unwrap();

        assert!(start.elapsed() >= DEFAULT_FLIP_DELAY);
        assert!(result.correct);
        assert_eq!(table.session().current_score, 10);
        assert!(!table.is_flipping());
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_rejected_while_flipping() {
        let table = table();
        let mut coin = ScriptedCoin::new([CoinFace::Tails]);
        table.select_prediction(CoinFace::Tails).unwrap();

        let meanwhile = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let reselect = table.select_prediction(CoinFace::Heads);
            let reflip = table.flip(&mut ScriptedCoin::new([CoinFace::Heads])).await;
            let submit = table.submit_score("ace").await;
            (reselect, reflip, submit)
        };

        let (result, (reselect, reflip, submit)) = tokio::join!(table.flip(&mut coin), meanwhile);

        assert_eq!(reselect, Err(TableError::Round(RoundError::FlipInProgress)));
        assert_eq!(reflip, Err(TableError::Round(RoundError::FlipInProgress)));
        assert_eq!(submit, Err(TableError::Round(RoundError::FlipInProgress)));
        assert!(result.unwrap().correct);
        assert_eq!(table.session().prediction, Some(CoinFace::Tails));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_flip_releases_gate() {
        let table = table();
        let mut coin = ScriptedCoin::new([CoinFace::Heads]);
        table.select_prediction(CoinFace::Heads).unwrap();

        let cut_short = tokio::time::timeout(Duration::from_millis(100), table.flip(&mut coin)).await;
        assert!(cut_short.is_err());
        assert!(!table.is_flipping());
        assert_eq!(table.session().current_score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flip_without_prediction() {
        let table = table();
        let mut coin = ScriptedCoin::new([CoinFace::Heads]);
        assert_eq!(
            table.flip(&mut coin).await,
            Err(TableError::Round(RoundError::NoPrediction))
        );
        assert_eq!(coin.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_three_hits_then_miss() {
        let table = table();
        let mut coin = ScriptedCoin::new([CoinFace::Heads, CoinFace::Heads, CoinFace::Heads, CoinFace::Tails]);
        table.select_prediction(CoinFace::Heads).unwrap();

        let mut scores = Vec::new();
        for _ in 0..4 {
            scores.push(table.flip(&mut coin).await.unwrap().new_score);
        }

        assert_eq!(scores, vec![10, 30, 60, 0]);
        let session = table.session();
        assert_eq!(session.current_streak, 0);
        assert_eq!(session.high_score(), 60);
        assert_eq!(session.record_streak(), 3);
        assert_eq!(session.prediction, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_resets_run_after_success() {
        let table = table();
        let mut coin = ScriptedCoin::new([CoinFace::Heads, CoinFace::Heads]);
        table.select_prediction(CoinFace::Heads).unwrap();
        table.flip(&mut coin).await.unwrap();
        table.flip(&mut coin).await.unwrap();

        let submitted = table.submit_score("  ace ").await.unwrap();
        assert_eq!((submitted.score, submitted.streak), (30, 2));

        let session = table.session();
        assert_eq!(session.current_score, 0);
        assert_eq!(session.current_streak, 0);
        assert_eq!(session.prediction, None);
        assert_eq!(session.high_score(), 30);

        let snapshot = table.leaderboard().source().snapshot(&ScoreQuery::top_by_score(20)).await;
        assert_eq!(snapshot[0].1.name, "ACE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_name_keeps_run() {
        let table = table();
        let mut coin = ScriptedCoin::new([CoinFace::Heads]);
        table.select_prediction(CoinFace::Heads).unwrap();
        table.flip(&mut coin).await.unwrap();

        assert_eq!(
            table.submit_score(" ").await,
            Err(TableError::Submit(SubmitError::EmptyName))
        );
        assert_eq!(table.session().current_score, 10);
    }

    #[tokio::test]
    async fn test_submit_with_zero_score_rejected() {
        let table = table();
        assert_eq!(
            table.submit_score("ace").await,
            Err(TableError::Round(RoundError::NothingToSubmit))
        );
    }

    struct RejectingSource;

    impl RealtimeSource for RejectingSource {
        async fn append(&self, _record: StoredRecord) -> Result<EntryId, SourceError> {
            Err(SourceError::Unavailable("network down".into()))
        }

        fn subscribe(&self, _query: ScoreQuery) -> SnapshotStream {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            rx
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_keeps_run() {
        let table = CoinTable::with_flip_delay(
            RoundEngine::new(MemoryRecordStore::default()),
            LeaderboardSync::new(RejectingSource),
            Duration::from_millis(10),
        );
        let mut coin = ScriptedCoin::new([CoinFace::Tails]);
        table.select_prediction(CoinFace::Tails).unwrap();
        table.flip(&mut coin).await.unwrap();

        let err = table.submit_score("ace").await.unwrap_err();
        assert!(matches!(err, TableError::Submit(SubmitError::Transport(_))));

        let session = table.session();
        assert_eq!(session.current_score, 10);
        assert_eq!(session.current_streak, 1);
        assert_eq!(session.prediction, Some(CoinFace::Tails));
        assert!(!table.is_submitting());
        assert!(table.select_prediction(CoinFace::Heads).is_ok());
    }

    /// Source whose appends take a while to be acknowledged.
    struct SlowSource {
        delay: Duration,
    }

    impl RealtimeSource for SlowSource {
        async fn append(&self, _record: StoredRecord) -> Result<EntryId, SourceError> {
            tokio::time::sleep(self.delay).await;
            Ok(EntryId::from_sequence(1))
        }

        fn subscribe(&self, _query: ScoreQuery) -> SnapshotStream {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            rx
        }
    }

    fn slow_table() -> CoinTable<MemoryRecordStore, SlowSource> {
        CoinTable::new(
            RoundEngine::new(MemoryRecordStore::default()),
            LeaderboardSync::new(SlowSource { delay: Duration::from_millis(1500) }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_frozen_while_submit_pending() {
        let table = slow_table();
        let mut coin = ScriptedCoin::new([CoinFace::Heads, CoinFace::Heads]);
        table.select_prediction(CoinFace::Heads).unwrap();
        table.flip(&mut coin).await.unwrap();

        let meanwhile = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let submitting = table.is_submitting();
            let reselect = table.select_prediction(CoinFace::Tails);
            let reflip = table.flip(&mut coin).await;
            let resubmit = table.submit_score("ace").await;
            (submitting, reselect, reflip, resubmit)
        };

        let (submitted, (submitting, reselect, reflip, resubmit)) =
            tokio::join!(table.submit_score("ace"), meanwhile);

        assert!(submitting);
        assert_eq!(reselect, Err(TableError::Round(RoundError::SubmitInProgress)));
        assert_eq!(reflip, Err(TableError::Round(RoundError::SubmitInProgress)));
        assert_eq!(resubmit, Err(TableError::Round(RoundError::SubmitInProgress)));

        let submitted = submitted.unwrap();
        assert_eq!((submitted.score, submitted.streak), (10, 1));
        assert_eq!(coin.remaining(), 1);

        let session = table.session();
        assert_eq!(session.current_score, 0);
        assert_eq!(session.current_streak, 0);
        assert_eq!(session.prediction, None);
        assert!(!table.is_submitting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_submit_releases_gate_and_keeps_run() {
        let table = slow_table();
        let mut coin = ScriptedCoin::new([CoinFace::Tails]);
        table.select_prediction(CoinFace::Tails).unwrap();
        table.flip(&mut coin).await.unwrap();

        let cut_short = tokio::time::timeout(Duration::from_millis(100), table.submit_score("ace")).await;
        assert!(cut_short.is_err());
        assert!(!table.is_submitting());
        assert_eq!(table.session().current_score, 10);
        assert!(table.select_prediction(CoinFace::Heads).is_ok());
    }
}
