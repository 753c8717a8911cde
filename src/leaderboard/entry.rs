//! Leaderboard records.
//!
//! [`StoredRecord`] is the shape kept in the shared collection; a
//! [`LeaderboardEntry`] is that record joined with the id the store assigned.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::leaderboard::sync::SubmitError;

/// Longest accepted player name, counted in characters after trimming.
pub const NAME_MAX_CHARS: usize = 20;

/// Store-assigned record id.
///
/// Ids sort in append order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    /// Id for the `seq`-th append. Zero-padded so string order matches append order.
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("{:016x}", seq))
    }

    /// Raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One submitted score as held by the realtime collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Upper-cased, trimmed player name.
    pub name: String,
    /// Submitted score.
    pub score: u32,
    /// Streak at submission time.
    pub streak: u32,
    /// Submission time (ISO-8601 on the wire).
    pub date: DateTime<Utc>,
}

impl StoredRecord {
    /// Build a record, validating and normalizing `name`.
    pub fn new(name: &str, score: u32, streak: u32, date: DateTime<Utc>) -> Result<Self, SubmitError> {
        Ok(Self {
            name: normalize_name(name)?,
            score,
            streak,
            date,
        })
    }
}

/// A ranked, immutable leaderboard row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Store-assigned id.
    pub id: EntryId,
    /// Player name.
    pub name: String,
    /// Score.
    pub score: u32,
    /// Streak.
    pub streak: u32,
    /// When it was submitted.
    pub submitted_at: DateTime<Utc>,
}

impl LeaderboardEntry {
    /// Join a stored record with its id.
    pub fn from_record(id: EntryId, record: StoredRecord) -> Self {
        Self {
            id,
            name: record.name,
            score: record.score,
            streak: record.streak,
            submitted_at: record.date,
        }
    }

    /// Date in `Mon D, YYYY` form.
    pub fn display_date(&self) -> String {
        self.submitted_at.format("%b %-d, %Y").to_string()
    }
}

/// Trim and upper-case a player name.
///
/// Empty names are checked before long ones.
pub fn normalize_name(raw: &str) -> Result<String, SubmitError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SubmitError::EmptyName);
    }
    if trimmed.chars().count() > NAME_MAX_CHARS {
        return Err(SubmitError::NameTooLong);
    }
    Ok(trimmed.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("ace").unwrap(), "ACE");
        assert_eq!(normalize_name("  lucky Lou ").unwrap(), "LUCKY LOU");
        assert_eq!(normalize_name(&"b".repeat(20)).unwrap(), "B".repeat(20));
    }

    #[test]
    fn test_normalize_name_rejections() {
        assert_eq!(normalize_name(""), Err(SubmitError::EmptyName));
        assert_eq!(normalize_name("   \t"), Err(SubmitError::EmptyName));
        assert_eq!(normalize_name(&"a".repeat(21)), Err(SubmitError::NameTooLong));
        // Padding does not count toward the limit.
        assert!(normalize_name(&format!("  {}  ", "a".repeat(20))).is_ok());
    }

    #[test]
    fn test_entry_ids_sort_in_append_order() {
        let ids: Vec<EntryId> = [9u64, 10, 255, 256].iter().map(|s| EntryId::from_sequence(*s)).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_record_wire_shape() {
        let date = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let record = StoredRecord::new("ace", 150, 4, date).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["name"], "ACE");
        assert_eq!(json["score"], 150);
        assert_eq!(json["streak"], 4);
        assert!(json["date"].as_str().unwrap().starts_with("2026-10-18T12:00:00"));
    }

    #[test]
    fn test_display_date() {
        let date = Utc.with_ymd_and_hms(2026, 3, 5, 8, 30, 0).unwrap();
        let entry = LeaderboardEntry::from_record(
            EntryId::from_sequence(1),
            StoredRecord::new("x", 10, 1, date).unwrap(),
        );
        assert_eq!(entry.display_date(), "Mar 5, 2026");
    }
}
