//! Identity hash derivation.
//!
//! Priority order, first success wins:
//! 1. `"{timestamp}|{camera model}"` when both EXIF fields are present
//! 2. 128-bit XXH3 digest of the whole file
//! 3. the file's base name
//!
//! The third step is a weak fallback: two different photos with the same
//! name and no EXIF collapse to one identity if their contents cannot be read.

use crate::core::metadata::ExifFields;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::warn;
use xxhash_rust::xxh3::Xxh3;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Identity derived from EXIF fields alone
pub fn exif_identity(fields: &ExifFields) -> Option<String> {
    match (&fields.capture_timestamp, &fields.camera_model) {
        (Some(timestamp), Some(model)) => Some(format!("{}|{}", timestamp, model)),
        _ => None,
    }
}

/// Derive the identity hash for a photo
pub fn derive(path: &Path, fields: &ExifFields) -> String {
    if let Some(identity) = exif_identity(fields) {
        return identity;
    }

    match content_hash(path) {
        Ok(hash) => hash,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "content hash failed, using file name as identity");
            file_name_identity(path)
        }
    }
}

/// 128-bit XXH3 digest of the file contents as lowercase hex
pub fn content_hash(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:032x}", hasher.digest128()))
}

fn file_name_identity(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn fields(timestamp: Option<i64>, model: Option<&str>) -> ExifFields {
        ExifFields::new(timestamp, model.map(String::from))
    }

    #[test]
    fn exif_identity_combines_timestamp_and_model() {
        let identity = derive(Path::new("/does/not/matter.jpg"), &fields(Some(1000), Some("X")));
        assert_eq!(identity, "1000|X");
    }

    #[test]
    fn same_exif_gives_same_identity_regardless_of_content() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        File::create(&a).unwrap().write_all(b"first bytes").unwrap();
        File::create(&b).unwrap().write_all(b"other bytes").unwrap();

        let exif = fields(Some(1_600_000_000), Some("Pixel 8"));
        assert_eq!(derive(&a, &exif), derive(&b, &exif));
    }

    #[test]
    fn partial_exif_falls_back_to_content_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        File::create(&path).unwrap().write_all(b"content").unwrap();

        let identity = derive(&path, &fields(Some(1000), None));

        assert_eq!(identity.len(), 32);
        assert!(identity.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(identity, content_hash(&path).unwrap());
    }

    #[test]
    fn content_hash_differs_for_different_bytes() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        File::create(&a).unwrap().write_all(b"one").unwrap();
        File::create(&b).unwrap().write_all(b"two").unwrap();

        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn unreadable_file_falls_back_to_name() {
        let identity = derive(Path::new("/nonexistent/IMG_0001.HEIC"), &ExifFields::default());
        assert_eq!(identity, "IMG_0001.HEIC");
    }
}
