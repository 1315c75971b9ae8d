//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the photo cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Directory enumeration events
    Scan(ScanEvent),
    /// Per-photo analysis events
    Analyze(AnalyzeEvent),
    /// Cache freshness and rebuild events
    Refresh(RefreshEvent),
    /// File reorganization events
    Organize(OrganizeEvent),
}

/// Events during directory enumeration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Enumeration of a directory tree has started
    Started { root: PathBuf },
    /// Enumeration finished; all candidates are known
    CandidatesFound { root: PathBuf, total: usize },
    /// Every candidate has been analyzed or has failed
    Completed { analyzed: usize, failed: usize },
}

/// Events while photos are being analyzed by the worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnalyzeEvent {
    /// Progress update after each finished photo
    Progress(AnalyzeProgress),
    /// A photo could not be analyzed and was skipped
    Error { path: PathBuf, message: String },
    /// A photo could not be converted to JPEG and was left as-is
    ConversionFailed { path: PathBuf, message: String },
    /// A photo was converted to JPEG
    Converted { from: PathBuf, to: PathBuf },
}

/// Progress information during analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeProgress {
    /// Number of photos finished so far (successfully or not)
    pub completed: usize,
    /// Total number of candidate photos
    pub total: usize,
    /// Photo that just finished
    pub current_path: PathBuf,
}

/// Events from the refresh orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RefreshEvent {
    /// The cache was loaded and is fresh enough to use
    Fresh { target: String, age_secs: i64 },
    /// The cache must be rebuilt
    Stale { target: String, reason: String },
    /// A rebuild has started
    RebuildStarted { target: String, remote: bool },
    /// A rebuild finished and the new cache was loaded
    RebuildCompleted { target: String, entries: usize },
}

/// Where the organizer put a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    /// Already present in the target
    AlreadyImported,
    /// No usable EXIF identity; needs manual review
    NoExif,
    /// New photo, sorted into a daily folder
    ToBeImported,
    /// Renamed in place
    Renamed,
}

/// Events from the organizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrganizeEvent {
    /// A photo was moved or renamed
    Moved {
        from: PathBuf,
        to: PathBuf,
        bucket: Bucket,
    },
    /// A photo could not be moved and was left in place
    Failed { path: PathBuf, message: String },
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bucket::AlreadyImported => write!(f, "already imported"),
            Bucket::NoExif => write!(f, "no EXIF"),
            Bucket::ToBeImported => write!(f, "to be imported"),
            Bucket::Renamed => write!(f, "renamed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Analyze(AnalyzeEvent::Progress(AnalyzeProgress {
            completed: 10,
            total: 50,
            current_path: PathBuf::from("/photos/a.jpg"),
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Analyze(AnalyzeEvent::Progress(p)) => {
                assert_eq!(p.completed, 10);
                assert_eq!(p.total, 50);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn bucket_display_is_human_readable() {
        assert_eq!(Bucket::AlreadyImported.to_string(), "already imported");
        assert_eq!(Bucket::NoExif.to_string(), "no EXIF");
    }
}
