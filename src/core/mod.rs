//! # Core Module
//!
//! The photo cache engine, independent of any front end.
//!
//! ## Modules
//! - `metadata` - Reads capture time and camera model from EXIF
//! - `fingerprint` - Derives the identity of a photo, converts HEIC to JPEG
//! - `scanner` - Analyzes directory trees with a bounded worker pool
//! - `cache` - Persists snapshots of analyzed photos, ignore lists
//! - `matcher` - Classifies local photos against a target snapshot
//! - `refresh` - Keeps target caches fresh, locally or over SSH
//! - `organize` - Sorts and renames photos in a working directory
//! - `stats` - Summaries of a target snapshot

pub mod cache;
pub mod fingerprint;
pub mod matcher;
pub mod metadata;
pub mod organize;
pub mod refresh;
pub mod scanner;
pub mod stats;

// Re-export commonly used types
pub use cache::{CacheSnapshot, CacheStore};
pub use fingerprint::{Fingerprinter, PhotoEntry};
pub use matcher::{classify, Classification, TieBreak};
pub use metadata::{ExifFields, ExifReader, MetadataReader};
pub use refresh::RefreshOrchestrator;
pub use scanner::WorkerPool;
