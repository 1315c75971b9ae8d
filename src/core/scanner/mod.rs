//! # Scanner Module
//!
//! Walks directory trees and analyzes every photo found with a bounded pool
//! of workers, producing a [`CacheSnapshot`](crate::core::cache::CacheSnapshot).
//!
//! ## Supported Formats
//! - JPEG (.jpg, .jpeg)
//! - HEIC (.heic, .heif) - converted to JPEG when the fingerprinter converts
//!
//! ## Error policy
//! A photo that cannot be analyzed is logged and skipped. A directory that
//! cannot be enumerated aborts the whole scan.
//!
//! ## Example
//! ```rust,ignore
//! let fingerprinter = Fingerprinter::new(Arc::new(ExifReader::new()));
//! let pool = WorkerPool::new(8, fingerprinter)?;
//! let outcome = pool.scan(Path::new("/photos"), "", &null_sender())?;
//! ```

mod filter;
mod pool;
mod walker;

pub use filter::{CandidateFilter, DEFAULT_EXTENSIONS};
pub use pool::WorkerPool;
pub use walker::{enumerate, Candidate};

use crate::core::cache::CacheSnapshot;
use std::path::PathBuf;

/// Configuration for the directory scanner
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Which files are analyzed
    pub filter: CandidateFilter,
    /// Capacity of the job and result queues (None = 4 per worker)
    pub queue_capacity: Option<usize>,
}

/// A photo that was skipped or left unconverted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub message: String,
}

/// Result of a scan operation
#[derive(Debug)]
pub struct ScanOutcome {
    /// Every photo that was analyzed successfully
    pub snapshot: CacheSnapshot,
    /// Photos that could not be analyzed (non-fatal)
    pub failures: Vec<FailedFile>,
    /// Photos left in their original format because conversion failed
    pub conversion_failures: Vec<FailedFile>,
}
