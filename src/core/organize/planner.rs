//! Destination names derived from capture time.
//!
//! Capture timestamps hold the camera's wall-clock time encoded as UTC, so
//! formatting them in UTC reproduces the time shown on the camera.

use chrono::{DateTime, Utc};
use std::path::Path;

/// Bucket for photos already in the target
pub const ALREADY_IMPORTED_DIR: &str = "AlreadyImported";
/// Bucket for photos without a usable EXIF identity
pub const NO_EXIF_DIR: &str = "NoExif";
/// Bucket for new photos, split into daily folders
pub const TO_BE_IMPORTED_DIR: &str = "ToBeImported";

/// Every bucket directory created inside a filtered directory
pub const BUCKET_DIRS: &[&str] = &[ALREADY_IMPORTED_DIR, NO_EXIF_DIR, TO_BE_IMPORTED_DIR];

fn capture_time(timestamp: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
}

/// `YYYY-MM-DD` folder for a capture time
pub fn daily_dir_name(timestamp: i64) -> Option<String> {
    capture_time(timestamp).map(|t| t.format("%Y-%m-%d").to_string())
}

/// `YYYY-MM-DD_HH-MM-SS.<ext>` name for a photo captured at `timestamp`
///
/// JPEGs always get `.jpg`; other formats keep their lowercased extension.
pub fn capture_file_name(timestamp: i64, current: &Path) -> Option<String> {
    let stamp = capture_time(timestamp)?.format("%Y-%m-%d_%H-%M-%S");
    let extension = current
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| e != "jpeg" && !e.is_empty())
        .unwrap_or_else(|| "jpg".to_string());
    Some(format!("{}.{}", stamp, extension))
}

/// Whether `path` lies inside one of the bucket directories of `root`
pub fn is_in_bucket(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .ok()
        .and_then(|relative| relative.components().next())
        .map(|first| {
            let first = first.as_os_str();
            BUCKET_DIRS.iter().any(|bucket| first == *bucket)
        })
        .unwrap_or(false)
}
