//! # Error Module
//!
//! Error types for the photo cache.
//!
//! ## Propagation
//! - Per-file problems (`AnalysisError`, `ConversionError`) are absorbed by the
//!   scanner and the organizer: the file is skipped or left as-is.
//! - Cache load problems (`CacheError::NotFound`, `CacheError::Corrupted`) are
//!   absorbed by the refresh orchestrator and trigger a rebuild.
//! - Directory enumeration (`ScanError`) and remote transport (`RemoteError`)
//!   failures are fatal to the enclosing operation.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum PhotoCacheError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that abort a directory scan
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Invalid worker count: {value} (must be at least 1)")]
    InvalidConcurrency { value: usize },

    #[error("Failed to start analysis worker: {source}")]
    SpawnWorker {
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while analyzing a single photo
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Cannot open {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read metadata from {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },
}

impl AnalysisError {
    /// Whether the file must be skipped rather than analyzed without EXIF
    pub fn is_fatal(&self) -> bool {
        matches!(self, AnalysisError::Unreadable { .. })
    }
}

/// Errors that occur while converting a photo to JPEG
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converting {path} failed: {reason}")]
    ToolFailed { path: PathBuf, reason: String },

    #[error("Converted file {path} is unusable: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur with cache files
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Cache file {path} is corrupted ({reason}). It will be rebuilt on the next update.")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Cache file I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache for {path}: {reason}")]
    SerializationFailed { path: PathBuf, reason: String },
}

/// Errors from the remote peer or the transport used to reach it
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote command on {target} failed ({status}): {command}\n{stderr}")]
    CommandFailed {
        target: String,
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Copying {local} to {target}:{remote} failed: {reason}")]
    CopyFailed {
        target: String,
        local: PathBuf,
        remote: String,
        reason: String,
    },

    #[error("Cannot locate {what} to install on {target}: {reason}")]
    MissingLocalFile {
        target: String,
        what: &'static str,
        reason: String,
    },
}

/// Errors in the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Target not found: {name}")]
    UnknownTarget { name: String },

    #[error("Target {name:?} is invalid: {reason}")]
    InvalidTarget { name: String, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, PhotoCacheError>;
