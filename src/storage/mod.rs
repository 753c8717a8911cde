//! Durable storage for lifetime records.

pub mod records;

pub use records::{
    RecordStore, MemoryRecordStore, JsonFileRecordStore, StorageError,
    HIGH_SCORE_KEY, RECORD_STREAK_KEY,
};
