//! # Fingerprint Module
//!
//! Turns a photo file into a [`PhotoEntry`]: capture time, camera model and
//! the identity hash used for deduplication.
//!
//! ## Identity
//! Two files shot by the same camera in the same second are the same photo,
//! even when their bytes differ (re-exports, edited copies). Photos without
//! complete EXIF fall back to a content hash, then to the file name.
//!
//! ## Conversion
//! With a converter attached, camera-native files (HEIC/HEIF) without a JPEG
//! sibling are converted, the original is deleted and the JPEG re-analyzed.

pub mod convert;
pub mod identity;

pub use convert::{ImageConverter, MagickConverter};

use crate::core::metadata::{ExifFields, MetadataReader};
use crate::error::{AnalysisError, ConversionError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One analyzed photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoEntry {
    /// Location of the file at analysis time
    pub path: PathBuf,
    /// File size in bytes at analysis time
    pub size_bytes: u64,
    /// Capture time as unix seconds
    pub capture_timestamp: Option<i64>,
    /// Camera model
    pub camera_model: Option<String>,
    /// Deduplication key; never empty
    pub identity_hash: String,
}

impl PhotoEntry {
    pub fn new(
        path: impl Into<PathBuf>,
        size_bytes: u64,
        fields: ExifFields,
        identity_hash: impl Into<String>,
    ) -> Self {
        let fields = ExifFields::new(fields.capture_timestamp, fields.camera_model);
        Self {
            path: path.into(),
            size_bytes,
            capture_timestamp: fields.capture_timestamp,
            camera_model: fields.camera_model,
            identity_hash: identity_hash.into(),
        }
    }

    /// Both capture time and camera model are known
    pub fn has_exif(&self) -> bool {
        self.capture_timestamp.is_some() && self.camera_model.is_some()
    }

    /// The same photo at a new location
    pub fn relocated(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }
}

/// What happened when a photo was considered for JPEG conversion
#[derive(Debug)]
pub enum ConversionOutcome {
    /// Not a convertible format, or no converter attached
    NotNeeded,
    /// A JPEG with the same base name already exists; nothing was done
    SiblingExists { jpeg: PathBuf },
    /// Converted; the original was removed
    Converted { from: PathBuf },
    /// Conversion failed; the entry still points at the original file
    Failed(ConversionError),
}

/// Produces [`PhotoEntry`] values from files
#[derive(Clone)]
pub struct Fingerprinter {
    reader: Arc<dyn MetadataReader>,
    converter: Option<Arc<dyn ImageConverter>>,
}

impl Fingerprinter {
    pub fn new(reader: Arc<dyn MetadataReader>) -> Self {
        Self {
            reader,
            converter: None,
        }
    }

    /// Convert camera-native formats to JPEG while analyzing
    pub fn with_converter(mut self, converter: Arc<dyn ImageConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn converts(&self) -> bool {
        self.converter.is_some()
    }

    /// Analyze a photo without touching the filesystem
    pub fn analyze(&self, path: &Path, known_size: u64) -> Result<PhotoEntry, AnalysisError> {
        let fields = match self.reader.read(path) {
            Ok(fields) => fields,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no usable EXIF");
                ExifFields::default()
            }
        };

        let identity_hash = identity::derive(path, &fields);
        Ok(PhotoEntry::new(path, known_size, fields, identity_hash))
    }

    /// Analyze a photo, converting it to JPEG first when needed
    pub fn analyze_converting(
        &self,
        path: &Path,
        known_size: u64,
    ) -> Result<(PhotoEntry, ConversionOutcome), AnalysisError> {
        let entry = self.analyze(path, known_size)?;
        Ok(self.convert_entry(entry))
    }

    /// Convert an analyzed photo to JPEG, replacing the entry wholesale
    pub fn convert_entry(&self, entry: PhotoEntry) -> (PhotoEntry, ConversionOutcome) {
        let converter = match &self.converter {
            Some(converter) if convert::is_convertible(&entry.path) => converter,
            _ => return (entry, ConversionOutcome::NotNeeded),
        };

        if let Some(jpeg) = convert::existing_jpeg_sibling(&entry.path) {
            debug!(path = %entry.path.display(), jpeg = %jpeg.display(), "JPEG sibling exists, not converting");
            return (entry, ConversionOutcome::SiblingExists { jpeg });
        }

        let jpeg = convert::jpeg_destination(&entry.path);
        if let Err(e) = converter.convert(&entry.path, &jpeg) {
            warn!(path = %entry.path.display(), error = %e, "conversion to JPEG failed");
            return (entry, ConversionOutcome::Failed(e));
        }

        let jpeg_size = match fs::metadata(&jpeg) {
            Ok(metadata) => metadata.len(),
            Err(source) => {
                let error = ConversionError::Output {
                    path: jpeg.clone(),
                    source,
                };
                warn!(path = %entry.path.display(), error = %error, "converted JPEG is missing");
                return (entry, ConversionOutcome::Failed(error));
            }
        };

        if let Err(e) = fs::remove_file(&entry.path) {
            warn!(path = %entry.path.display(), error = %e, "could not remove original after conversion");
        }

        let converted = match self.analyze(&jpeg, jpeg_size) {
            Ok(converted) => converted,
            Err(e) => {
                warn!(path = %jpeg.display(), error = %e, "unable to analyze converted JPEG");
                entry.relocated(&jpeg)
            }
        };

        (converted, ConversionOutcome::Converted { from: entry.path })
    }
}
