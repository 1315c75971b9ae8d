//! HEIC/HEIF to JPEG conversion.

use crate::error::ConversionError;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Extensions of camera-native formats that are converted to JPEG
pub const CONVERTIBLE_EXTENSIONS: &[&str] = &["heic", "heif"];

/// External image conversion capability
pub trait ImageConverter: Send + Sync {
    /// Write a JPEG rendition of `source` to `dest`
    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConversionError>;
}

/// Converter that shells out to ImageMagick
#[derive(Debug, Clone)]
pub struct MagickConverter {
    program: String,
    leading_args: Vec<String>,
}

impl MagickConverter {
    /// `magick convert` on Windows, `convert` elsewhere
    pub fn new() -> Self {
        if cfg!(windows) {
            Self::with_program("magick", vec!["convert".to_string()])
        } else {
            Self::with_program("convert", Vec::new())
        }
    }

    pub fn with_program(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }
}

impl Default for MagickConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageConverter for MagickConverter {
    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConversionError> {
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(source)
            .arg(dest)
            .output()
            .map_err(|source| ConversionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            // Don't leave a half-written JPEG behind
            let _ = std::fs::remove_file(dest);
            return Err(ConversionError::ToolFailed {
                path: source.to_path_buf(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(())
    }
}

/// Whether a path has a convertible (non-JPEG, camera-native) extension
pub fn is_convertible(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CONVERTIBLE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Where the JPEG rendition of a photo goes
pub fn jpeg_destination(path: &Path) -> PathBuf {
    path.with_extension("jpg")
}

/// An existing JPEG next to `path` with the same base name, if any
pub fn existing_jpeg_sibling(path: &Path) -> Option<PathBuf> {
    ["jpg", "jpeg", "JPG", "JPEG"]
        .iter()
        .map(|ext| path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}
