//! Leaderboard Synchronizer
//!
//! Keeps a locally cached, ranked view of the shared leaderboard in step with
//! a [`RealtimeSource`], and submits new scores to it.
//!
//! Updates are push-driven: the synchronizer never polls. Every snapshot the
//! source emits (including ones caused by other clients) is re-ranked and
//! handed to the subscriber in emission order, one callback per snapshot.
//!
//! Submitting does not touch the cached view. The new entry shows up once the
//! source's change notification comes back around.

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::leaderboard::entry::{EntryId, StoredRecord};
use crate::leaderboard::source::{RealtimeSource, ScoreQuery, SourceError};
use crate::leaderboard::view::LeaderboardView;

/// Raw records requested per snapshot.
pub const FETCH_LIMIT: usize = 20;

/// Entries kept in the ranked view.
pub const DISPLAY_LIMIT: usize = 10;

/// Submission failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Name is empty after trimming.
    #[error("enter your name")]
    EmptyName,

    /// Name is longer than 20 characters after trimming.
    #[error("name must be 20 characters or fewer")]
    NameTooLong,

    /// The source rejected or failed the write.
    #[error("could not save score: {0}")]
    Transport(#[from] SourceError),
}

impl SubmitError {
    /// Whether this is a local validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, SubmitError::EmptyName | SubmitError::NameTooLong)
    }
}

/// Handle to a running subscription. Dropping it stops delivery.
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering updates.
    pub fn cancel(self) {
        // Drop aborts.
    }

    /// Whether the listener task is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Ranked leaderboard kept in sync with a realtime source.
pub struct LeaderboardSync<S: RealtimeSource> {
    source: S,
    query: ScoreQuery,
    display_limit: usize,
    view_tx: watch::Sender<LeaderboardView>,
}

impl<S: RealtimeSource> LeaderboardSync<S> {
    /// Synchronizer over `source` with the standard 20-fetch / 10-display window.
    pub fn new(source: S) -> Self {
        Self::with_limits(source, FETCH_LIMIT, DISPLAY_LIMIT)
    }

    /// Synchronizer with custom window sizes.
    pub fn with_limits(source: S, fetch_limit: usize, display_limit: usize) -> Self {
        let (view_tx, _) = watch::channel(LeaderboardView::Loading);
        Self {
            source,
            query: ScoreQuery::top_by_score(fetch_limit),
            display_limit,
            view_tx,
        }
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Most recent view.
    pub fn latest(&self) -> LeaderboardView {
        self.view_tx.borrow().clone()
    }

    /// Watch the cached view instead of registering a callback.
    ///
    /// Only holds views once a [`subscribe`](Self::subscribe) is running.
    pub fn watch(&self) -> watch::Receiver<LeaderboardView> {
        self.view_tx.subscribe()
    }

    /// Register for ranked updates.
    ///
    /// `on_update` runs on a background task for every snapshot the source
    /// emits, with [`LeaderboardView::Unavailable`] when the source reports
    /// an error. Must be called from within a tokio runtime.
    pub fn subscribe<F>(&self, mut on_update: F) -> Subscription
    where
        F: FnMut(LeaderboardView) + Send + 'static,
    {
        let mut stream = self.source.subscribe(self.query);
        let view_tx = self.view_tx.clone();
        let display_limit = self.display_limit;

        let task = tokio::spawn(async move {
            while let Some(event) = stream.recv().await {
                let view = match event {
                    Ok(snapshot) => {
                        debug!(records = snapshot.len(), "Leaderboard snapshot");
                        LeaderboardView::from_snapshot(snapshot, display_limit)
                    }
                    Err(e) => {
                        warn!("Leaderboard source error: {}", e);
                        LeaderboardView::Unavailable(e)
                    }
                };
                view_tx.send_replace(view.clone());
                on_update(view);
            }

            debug!("Leaderboard source ended the subscription");
            let view = LeaderboardView::Unavailable(SourceError::Closed);
            view_tx.send_replace(view.clone());
            on_update(view);
        });

        Subscription { task }
    }

    /// Validate and append a score.
    ///
    /// Validation runs before anything is sent. No retry on transport failure.
    pub async fn submit(&self, name: &str, score: u32, streak: u32) -> Result<EntryId, SubmitError> {
        let record = StoredRecord::new(name, score, streak, Utc::now())?;
        let player = record.name.clone();
        let id = self.source.append(record).await?;
        info!(%id, player = %player, score, streak, "Score submitted");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::memory::MemoryScoreStore;
    use crate::leaderboard::source::{SnapshotStream, SNAPSHOT_CHANNEL_CAPACITY};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    async fn next_view(rx: &mut mpsc::UnboundedReceiver<LeaderboardView>) -> LeaderboardView {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("update timed out")
            .expect("update channel closed")
    }

    fn collector() -> (impl FnMut(LeaderboardView) + Send + 'static, mpsc::UnboundedReceiver<LeaderboardView>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (move |view| { let _ = tx.send(view); }, rx)
    }

    #[tokio::test]
    async fn test_submit_validation_happens_before_append() {
        let sync = LeaderboardSync::new(MemoryScoreStore::new());

        assert_eq!(sync.submit("", 100, 3).await, Err(SubmitError::EmptyName));
        assert_eq!(sync.submit("   ", 100, 3).await, Err(SubmitError::EmptyName));
        assert_eq!(sync.submit(&"a".repeat(21), 100, 3).await, Err(SubmitError::NameTooLong));
        assert!(sync.source().is_empty().await);
    }

    #[tokio::test]
    async fn test_submit_stores_uppercased_name() {
        let sync = LeaderboardSync::new(MemoryScoreStore::new());
        sync.submit("ace", 150, 4).await.unwrap();

        let snapshot = sync.source().snapshot(&ScoreQuery::top_by_score(20)).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].1.name, "ACE");
        assert_eq!(snapshot[0].1.score, 150);
        assert_eq!(snapshot[0].1.streak, 4);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_ranked_top_ten() {
        let store = MemoryScoreStore::new();
        let sync = LeaderboardSync::new(store.clone());
        let (on_update, mut rx) = collector();
        let _subscription = sync.subscribe(on_update);

        assert_eq!(next_view(&mut rx).await, LeaderboardView::Ranked(Vec::new()));

        for i in 1..=25u32 {
            sync.submit(&format!("p{}", i), i * 10, 1).await.unwrap();
        }

        // Bursts are not coalesced; drain until the final state shows up.
        let mut view = next_view(&mut rx).await;
        while view.entries().first().map(|e| e.score) != Some(250) {
            view = next_view(&mut rx).await;
        }

        let entries = view.entries();
        assert_eq!(entries.len(), 10);
        assert!(entries.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert_eq!(entries[9].score, 160);
        assert_eq!(sync.latest(), view);
    }

    #[tokio::test]
    async fn test_submit_does_not_patch_cached_view() {
        let sync = LeaderboardSync::new(MemoryScoreStore::new());
        sync.submit("ace", 150, 4).await.unwrap();
        assert_eq!(sync.latest(), LeaderboardView::Loading);
    }

    #[tokio::test]
    async fn test_watch_follows_subscription() {
        let sync = LeaderboardSync::new(MemoryScoreStore::new());
        let mut view_rx = sync.watch();
        assert_eq!(*view_rx.borrow(), LeaderboardView::Loading);

        let _subscription = sync.subscribe(|_| {});
        sync.submit("ace", 150, 4).await.unwrap();

        let view = timeout(Duration::from_secs(1), async {
            loop {
                view_rx.changed().await.expect("sync dropped");
                let view = view_rx.borrow_and_update().clone();
                if !view.entries().is_empty() {
                    return view;
                }
            }
        })
        .await
        .expect("view never updated");

        assert_eq!(view.entries()[0].name, "ACE");
        assert_eq!(sync.latest(), view);
    }

    #[tokio::test]
    async fn test_cancelled_subscription_stops_updates() {
        let store = MemoryScoreStore::new();
        let sync = LeaderboardSync::new(store.clone());
        let (on_update, mut rx) = collector();
        let subscription = sync.subscribe(on_update);
        next_view(&mut rx).await;
        assert!(subscription.is_active());

        subscription.cancel();
        sync.submit("late", 10, 1).await.unwrap();

        let pending = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(!matches!(pending, Ok(Some(_))));
    }

    /// Source that fails every operation.
    struct DownSource {
        appends: AtomicUsize,
    }

    impl RealtimeSource for DownSource {
        async fn append(&self, _record: StoredRecord) -> Result<EntryId, SourceError> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::PermissionDenied("scores".into()))
        }

        fn subscribe(&self, _query: ScoreQuery) -> SnapshotStream {
            let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);
            tokio::spawn(async move {
                let _ = tx.send(Err(SourceError::Unavailable("offline".into()))).await;
                tx.closed().await;
            });
            rx
        }
    }

    #[tokio::test]
    async fn test_source_error_surfaces_as_unavailable() {
        let sync = LeaderboardSync::new(DownSource { appends: AtomicUsize::new(0) });
        let (on_update, mut rx) = collector();
        let _subscription = sync.subscribe(on_update);

        let view = next_view(&mut rx).await;
        assert_eq!(view, LeaderboardView::Unavailable(SourceError::Unavailable("offline".into())));
        assert!(sync.latest().is_unavailable());
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported_without_retry() {
        let sync = LeaderboardSync::new(DownSource { appends: AtomicUsize::new(0) });
        let err = sync.submit("ace", 150, 4).await.unwrap_err();

        assert!(matches!(err, SubmitError::Transport(SourceError::PermissionDenied(_))));
        assert!(!err.is_validation());
        assert_eq!(sync.source().appends.load(Ordering::SeqCst), 1);
    }
}
