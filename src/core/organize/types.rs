//! Types for the organize module.

use crate::core::scanner::FailedFile;
use crate::events::Bucket;
use std::path::PathBuf;

/// A photo that was moved or renamed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedFile {
    pub from: PathBuf,
    pub to: PathBuf,
    pub bucket: Bucket,
}

/// Result of organizing a directory
#[derive(Debug, Default)]
pub struct OrganizeReport {
    /// Photos that were moved or renamed
    pub moved: Vec<MovedFile>,
    /// Photos that could not be moved and were left in place
    pub failures: Vec<FailedFile>,
    /// Photos left alone on purpose (no capture time, already named)
    pub unchanged: usize,
    /// Photos dropped because an ignore list names them
    pub ignored: usize,
    /// Photos that could not be analyzed
    pub scan_failures: Vec<FailedFile>,
    /// Photos left in their original format
    pub conversion_failures: Vec<FailedFile>,
}

impl OrganizeReport {
    /// How many photos went to `bucket`
    pub fn count(&self, bucket: Bucket) -> usize {
        self.moved.iter().filter(|m| m.bucket == bucket).count()
    }
}
