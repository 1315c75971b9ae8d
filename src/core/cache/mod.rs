//! # Cache Module
//!
//! Persisted snapshots of a target's analyzed photos.
//!
//! ## Lifecycle
//! A snapshot is created empty, filled by one full analysis pass, written
//! once, and never modified afterwards. A refresh builds a brand-new
//! snapshot that atomically replaces the file on disk.
//!
//! ## Storage
//! One gzip-compressed JSON file per target in the injected base
//! directory, named `{target}_cache.json.gz`.

pub mod ignore;
mod store;

pub use ignore::{write_ignore_file, IgnoreSet};
pub use store::{cache_file_name, read_snapshot, write_snapshot, CacheStore};

use crate::core::fingerprint::PhotoEntry;
use chrono::Utc;

/// Age at which a snapshot must be rebuilt, in seconds
pub const FRESHNESS_WINDOW_SECS: i64 = 24 * 60 * 60;

/// One timestamped set of analyzed photos for a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    /// Target this snapshot belongs to; empty for ad-hoc scans
    pub target_name: String,
    /// When the snapshot was created, as unix seconds
    pub built_at: i64,
    /// Analyzed photos in scan completion order
    pub entries: Vec<PhotoEntry>,
}

impl CacheSnapshot {
    /// Create an empty snapshot built at the given time
    pub fn new(target_name: impl Into<String>, built_at: i64) -> Self {
        Self {
            target_name: target_name.into(),
            built_at,
            entries: Vec::new(),
        }
    }

    /// Create an empty snapshot built now
    pub fn created_now(target_name: impl Into<String>) -> Self {
        Self::new(target_name, Utc::now().timestamp())
    }

    /// Seconds elapsed between creation and `now`
    pub fn age_at(&self, now: i64) -> i64 {
        now - self.built_at
    }

    /// Whether the snapshot may still be used at `now`
    pub fn is_fresh_at(&self, now: i64) -> bool {
        self.age_at(now) < FRESHNESS_WINDOW_SECS
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn fresh_just_inside_window() {
        let snapshot = CacheSnapshot::new("nas", NOW - 86_399);
        assert!(snapshot.is_fresh_at(NOW));
    }

    #[test]
    fn stale_at_exactly_one_day() {
        let snapshot = CacheSnapshot::new("nas", NOW - 86_400);
        assert!(!snapshot.is_fresh_at(NOW));
    }

    #[test]
    fn stale_when_older() {
        let snapshot = CacheSnapshot::new("nas", NOW - 10 * 86_400);
        assert!(!snapshot.is_fresh_at(NOW));
    }

    #[test]
    fn created_now_is_fresh_and_empty() {
        let snapshot = CacheSnapshot::created_now("");
        assert!(snapshot.is_fresh_at(Utc::now().timestamp()));
        assert!(snapshot.is_empty());
    }
}
