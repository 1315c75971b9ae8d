//! # Metadata Module
//!
//! Reads the two EXIF fields a photo's identity is built from.
//!
//! ## Extracted Fields
//! - Capture time (DateTimeOriginal, falling back to DateTime)
//! - Camera model
//!
//! Capture times carry no zone information in EXIF. They are interpreted as
//! UTC so that formatting the timestamp back in UTC reproduces the camera's
//! wall clock, which is what file names and daily folders are built from.

use crate::error::AnalysisError;
use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// The EXIF fields used for photo identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifFields {
    /// Capture time as unix seconds
    pub capture_timestamp: Option<i64>,
    /// Camera model (e.g., "iPhone 15 Pro")
    pub camera_model: Option<String>,
}

impl ExifFields {
    /// Build fields, treating a zero timestamp or a blank model as unknown
    pub fn new(capture_timestamp: Option<i64>, camera_model: Option<String>) -> Self {
        Self {
            capture_timestamp: capture_timestamp.filter(|t| *t != 0),
            camera_model: camera_model
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
        }
    }

    /// Both fields are present
    pub fn is_complete(&self) -> bool {
        self.capture_timestamp.is_some() && self.camera_model.is_some()
    }
}

/// Source of capture metadata for a photo
///
/// Implementations must return `AnalysisError::Unreadable` when the file itself
/// cannot be opened; any other error is treated as "no EXIF".
pub trait MetadataReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<ExifFields, AnalysisError>;
}

/// Metadata reader backed by kamadak-exif
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifReader;

impl ExifReader {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataReader for ExifReader {
    fn read(&self, path: &Path) -> Result<ExifFields, AnalysisError> {
        let exif = read_exif(path)?;

        let capture_timestamp = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))
            .and_then(|field| get_string_value(&field.value))
            .and_then(|s| parse_exif_datetime(&s));

        let camera_model = exif
            .get_field(Tag::Model, In::PRIMARY)
            .and_then(|field| get_string_value(&field.value));

        Ok(ExifFields::new(capture_timestamp, camera_model))
    }
}

/// One EXIF field, formatted for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedField {
    pub tag: String,
    pub ifd: String,
    pub value: String,
}

/// List every EXIF field of a photo, for diagnostics
pub fn dump_fields(path: &Path) -> Result<Vec<DumpedField>, AnalysisError> {
    let exif = read_exif(path)?;
    Ok(exif
        .fields()
        .map(|field| DumpedField {
            tag: field.tag.to_string(),
            ifd: field.ifd_num.to_string(),
            value: field.display_value().with_unit(&exif).to_string(),
        })
        .collect())
}

fn read_exif(path: &Path) -> Result<Exif, AnalysisError> {
    let file = File::open(path).map_err(|source| AnalysisError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut bufreader = BufReader::new(&file);
    Reader::new()
        .read_from_container(&mut bufreader)
        .map_err(|e| AnalysisError::Metadata {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Parse an EXIF "YYYY:MM:DD HH:MM:SS" string into unix seconds
pub fn parse_exif_datetime(s: &str) -> Option<i64> {
    let s = s.trim_end_matches('\0').trim();
    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

/// Helper to extract string from EXIF ASCII value
fn get_string_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}
