//! Ranked leaderboard view.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::leaderboard::entry::LeaderboardEntry;
use crate::leaderboard::source::{Snapshot, SourceError};

/// What the leaderboard currently shows. Replaced wholesale on every snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum LeaderboardView {
    /// No snapshot has arrived yet.
    #[default]
    Loading,

    /// Entries ranked by descending score. Empty means no scores yet.
    Ranked(Vec<LeaderboardEntry>),

    /// The source reported an error.
    Unavailable(SourceError),
}

impl LeaderboardView {
    /// Rank a snapshot and keep the first `limit` entries.
    pub fn from_snapshot(snapshot: Snapshot, limit: usize) -> Self {
        LeaderboardView::Ranked(rank_snapshot(snapshot, limit))
    }

    /// Ranked entries, empty unless the view is [`LeaderboardView::Ranked`].
    pub fn entries(&self) -> &[LeaderboardEntry] {
        match self {
            LeaderboardView::Ranked(entries) => entries,
            _ => &[],
        }
    }

    /// Whether the source is reporting an error.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LeaderboardView::Unavailable(_))
    }

    /// Display rows with 1-based ranks.
    pub fn rows(&self) -> Vec<LeaderboardRow> {
        self.entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| LeaderboardRow {
                rank: index + 1,
                badge: Badge::for_rank(index + 1),
                name: entry.name.clone(),
                score: entry.score,
                streak: entry.streak,
                date: entry.display_date(),
            })
            .collect()
    }
}

/// Flatten, stable-sort by descending score, and truncate.
///
/// Equal scores keep their snapshot order.
pub fn rank_snapshot(snapshot: Snapshot, limit: usize) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = snapshot
        .into_iter()
        .map(|(id, record)| LeaderboardEntry::from_record(id, record))
        .collect();
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries.truncate(limit);
    entries
}

/// Podium marker for the top three.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    /// First place.
    Gold,
    /// Second place.
    Silver,
    /// Third place.
    Bronze,
}

impl Badge {
    /// Badge for a 1-based rank.
    pub fn for_rank(rank: usize) -> Option<Badge> {
        match rank {
            1 => Some(Badge::Gold),
            2 => Some(Badge::Silver),
            3 => Some(Badge::Bronze),
            _ => None,
        }
    }

    /// Medal glyph.
    pub fn medal(self) -> &'static str {
        match self {
            Badge::Gold => "🥇",
            Badge::Silver => "🥈",
            Badge::Bronze => "🥉",
        }
    }
}

/// One rendered table row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    /// 1-based position.
    pub rank: usize,
    /// Podium badge, top three only.
    pub badge: Option<Badge>,
    /// Player name.
    pub name: String,
    /// Score.
    pub score: u32,
    /// Streak.
    pub streak: u32,
    /// Formatted submission date.
    pub date: String,
}

impl fmt::Display for LeaderboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaderboardView::Loading => writeln!(f, "LOADING CASINO LEADERBOARD..."),
            LeaderboardView::Unavailable(_) => {
                writeln!(f, "CASINO ERROR: CANNOT CONNECT TO SERVER")
            }
            LeaderboardView::Ranked(entries) if entries.is_empty() => {
                writeln!(f, "NO SCORES YET • BE THE FIRST CASINO CHAMPION!")
            }
            LeaderboardView::Ranked(_) => {
                writeln!(f, "{:<6} {:<20} {:>7} {:>7}  {}", "RANK", "PLAYER", "SCORE", "STREAK", "DATE")?;
                for row in self.rows() {
                    let rank = match row.badge {
                        Some(badge) => format!("{} {}", badge.medal(), row.rank),
                        None => row.rank.to_string(),
                    };
                    writeln!(
                        f,
                        "{:<6} {:<20} {:>7} {:>7}  {}",
                        rank, row.name, row.score, row.streak, row.date
                    )?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::entry::{EntryId, StoredRecord};
    use chrono::Utc;

    fn snapshot(scores: &[u32]) -> Snapshot {
        scores
            .iter()
            .enumerate()
            .map(|(seq, score)| {
                (
                    EntryId::from_sequence(seq as u64),
                    StoredRecord::new(&format!("p{}", seq), *score, 1, Utc::now()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_rank_sorts_descending_and_truncates() {
        let scores: Vec<u32> = (1..=20).map(|s| s * 10).collect();
        let ranked = rank_snapshot(snapshot(&scores), 10);

        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].score, 200);
        assert_eq!(ranked[9].score, 110);
        assert!(ranked.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[test]
    fn test_rank_ties_keep_snapshot_order() {
        let ranked = rank_snapshot(snapshot(&[40, 40, 90, 40]), 10);
        let names: Vec<&str> = ranked.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["P2", "P0", "P1", "P3"]);
    }

    #[test]
    fn test_empty_snapshot_is_ranked_empty_not_unavailable() {
        let view = LeaderboardView::from_snapshot(Vec::new(), 10);
        assert_eq!(view, LeaderboardView::Ranked(Vec::new()));
        assert!(!view.is_unavailable());
        assert!(view.to_string().contains("NO SCORES YET"));
    }

    #[test]
    fn test_unavailable_renders_error() {
        let view = LeaderboardView::Unavailable(SourceError::Closed);
        assert!(view.entries().is_empty());
        assert!(view.to_string().contains("CANNOT CONNECT"));
    }

    #[test]
    fn test_rows_carry_podium_badges() {
        let view = LeaderboardView::from_snapshot(snapshot(&[10, 20, 30, 40]), 10);
        let rows = view.rows();
        assert_eq!(rows[0].badge, Some(Badge::Gold));
        assert_eq!(rows[1].badge, Some(Badge::Silver));
        assert_eq!(rows[2].badge, Some(Badge::Bronze));
        assert_eq!(rows[3].badge, None);
        assert_eq!(rows[3].rank, 4);
        assert_eq!(rows[0].score, 40);
    }
}
