//! Ignore lists.
//!
//! An ignore file is an ordinary cache file written next to a set of photos
//! that should never be reported again (rejects, screenshots, someone
//! else's camera roll). Targets list such files; every photo whose identity
//! hash appears in one of them is dropped before matching.

use super::{read_snapshot, write_snapshot, CacheSnapshot};
use crate::core::fingerprint::PhotoEntry;
use crate::error::CacheError;
use chrono::{Local, NaiveDateTime};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IGNORE_FILE_PREFIX: &str = "photoignore_";
const IGNORE_FILE_SUFFIX: &str = ".json.gz";

/// Identity hashes collected from ignore files
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    hashes: HashSet<String>,
}

impl IgnoreSet {
    /// Load and merge every listed ignore file
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, CacheError> {
        let mut set = Self::default();
        for path in paths {
            let path = path.as_ref();
            let snapshot = read_snapshot(path)?;
            debug!(path = %path.display(), entries = snapshot.len(), "ignore file loaded");
            set.extend(&snapshot);
        }
        Ok(set)
    }

    /// Add every photo of a snapshot
    pub fn extend(&mut self, snapshot: &CacheSnapshot) {
        self.hashes
            .extend(snapshot.entries.iter().map(|e| e.identity_hash.clone()));
    }

    pub fn contains(&self, identity_hash: &str) -> bool {
        self.hashes.contains(identity_hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Drop ignored photos, returning how many were removed
    pub fn retain_unignored(&self, entries: &mut Vec<PhotoEntry>) -> usize {
        if self.hashes.is_empty() {
            return 0;
        }
        let before = entries.len();
        entries.retain(|e| !self.contains(&e.identity_hash));
        before - entries.len()
    }
}

/// Name of an ignore file created at `at`
pub fn ignore_file_name(at: NaiveDateTime) -> String {
    format!(
        "{}{}{}",
        IGNORE_FILE_PREFIX,
        at.format("%Y-%m-%d_%H-%M-%S"),
        IGNORE_FILE_SUFFIX
    )
}

/// Write `snapshot` as a new ignore file inside `dir`
pub fn write_ignore_file(dir: &Path, snapshot: &CacheSnapshot) -> Result<PathBuf, CacheError> {
    let path = dir.join(ignore_file_name(Local::now().naive_local()));
    write_snapshot(snapshot, &path)?;
    info!(path = %path.display(), entries = snapshot.len(), "ignore file written");
    Ok(path)
}
