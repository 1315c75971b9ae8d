//! Gzip-compressed JSON cache files.
//!
//! Writes go to a temporary file in the destination directory which is then
//! renamed over the destination, so a crash mid-write leaves the previous
//! cache intact.

use super::CacheSnapshot;
use crate::core::fingerprint::PhotoEntry;
use crate::core::metadata::ExifFields;
use crate::error::CacheError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// On-disk layout of a cache file
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    target: String,
    last_update: i64,
    #[serde(default)]
    photos: Option<Vec<PhotoRecord>>,
}

/// On-disk layout of one photo; unknown fields are stored as 0 / ""
#[derive(Debug, Serialize, Deserialize)]
struct PhotoRecord {
    path: String,
    /// Raw OS bytes of the path, only written when `path` is not valid UTF-8
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path_bytes: Option<Vec<u8>>,
    size: u64,
    tstamp: i64,
    camera: String,
    hash: String,
}

impl From<&PhotoEntry> for PhotoRecord {
    fn from(entry: &PhotoEntry) -> Self {
        let (path, path_bytes) = match entry.path.to_str() {
            Some(path) => (path.to_string(), None),
            None => (entry.path.to_string_lossy().into_owned(), raw_path_bytes(&entry.path)),
        };
        Self {
            path,
            path_bytes,
            size: entry.size_bytes,
            tstamp: entry.capture_timestamp.unwrap_or(0),
            camera: entry.camera_model.clone().unwrap_or_default(),
            hash: entry.identity_hash.clone(),
        }
    }
}

impl From<PhotoRecord> for PhotoEntry {
    fn from(record: PhotoRecord) -> Self {
        let path = record
            .path_bytes
            .and_then(path_from_bytes)
            .unwrap_or_else(|| PathBuf::from(record.path));
        PhotoEntry::new(
            path,
            record.size,
            ExifFields::new(Some(record.tstamp), Some(record.camera)),
            record.hash,
        )
    }
}

#[cfg(unix)]
fn raw_path_bytes(path: &Path) -> Option<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    Some(path.as_os_str().as_bytes().to_vec())
}

// Only unix paths can hold arbitrary bytes; elsewhere the lossy form is kept
#[cfg(not(unix))]
fn raw_path_bytes(_path: &Path) -> Option<Vec<u8>> {
    None
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Some(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(_bytes: Vec<u8>) -> Option<PathBuf> {
    None
}

/// Cache files of every target, kept in one base directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    base_dir: PathBuf,
}

impl CacheStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Cache file location for a target
    pub fn path_for(&self, target_name: &str) -> PathBuf {
        self.base_dir.join(cache_file_name(target_name))
    }

    /// Persist a snapshot as its target's cache file
    pub fn save(&self, snapshot: &CacheSnapshot) -> Result<PathBuf, CacheError> {
        let path = self.path_for(&snapshot.target_name);
        write_snapshot(snapshot, &path)?;
        info!(target = %snapshot.target_name, entries = snapshot.len(), path = %path.display(), "cache saved");
        Ok(path)
    }

    /// Load a target's cache file
    pub fn load(&self, target_name: &str) -> Result<CacheSnapshot, CacheError> {
        read_snapshot(&self.path_for(target_name))
    }

    /// Replace a target's cache file with bytes produced elsewhere
    ///
    /// The bytes must decode as a cache file of the same target; otherwise
    /// the existing file is kept and `Corrupted` is returned.
    pub fn store_raw(&self, target_name: &str, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.path_for(target_name);
        let snapshot = decode(&path, bytes)?;
        if snapshot.target_name != target_name {
            return Err(CacheError::Corrupted {
                path,
                reason: format!(
                    "cache belongs to target '{}', expected '{}'",
                    snapshot.target_name, target_name
                ),
            });
        }
        write_atomically(&path, |writer| writer.write_all(bytes))?;
        info!(target = %target_name, bytes = bytes.len(), path = %path.display(), "cache stored");
        Ok(path)
    }
}

/// File name of a target's cache
pub fn cache_file_name(target_name: &str) -> String {
    format!("{}_cache.json.gz", target_name)
}

/// Serialize, compress and atomically write a snapshot to `dest`
pub fn write_snapshot(snapshot: &CacheSnapshot, dest: &Path) -> Result<(), CacheError> {
    let file = CacheFile {
        target: snapshot.target_name.clone(),
        last_update: snapshot.built_at,
        photos: Some(snapshot.entries.iter().map(PhotoRecord::from).collect()),
    };
    let json = serde_json::to_vec(&file).map_err(|e| CacheError::SerializationFailed {
        path: dest.to_path_buf(),
        reason: e.to_string(),
    })?;

    write_atomically(dest, |writer| {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        encoder.write_all(&json)?;
        encoder.finish()?;
        Ok(())
    })?;

    debug!(path = %dest.display(), entries = snapshot.len(), "snapshot written");
    Ok(())
}

/// Read, decompress and deserialize a snapshot from `source`
pub fn read_snapshot(source: &Path) -> Result<CacheSnapshot, CacheError> {
    let mut file = File::open(source).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CacheError::NotFound {
            path: source.to_path_buf(),
        },
        _ => CacheError::Io {
            path: source.to_path_buf(),
            source: e,
        },
    })?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| CacheError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;

    decode(source, &bytes)
}

fn decode(path: &Path, bytes: &[u8]) -> Result<CacheSnapshot, CacheError> {
    let corrupted = |reason: String| CacheError::Corrupted {
        path: path.to_path_buf(),
        reason,
    };

    let mut json = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut json)
        .map_err(|e| corrupted(format!("invalid gzip stream: {}", e)))?;

    let file: CacheFile =
        serde_json::from_slice(&json).map_err(|e| corrupted(format!("invalid JSON: {}", e)))?;

    let records = file.photos.unwrap_or_default();
    if let Some(record) = records.iter().find(|r| r.hash.is_empty()) {
        return Err(corrupted(format!(
            "entry {} has an empty hash",
            record.path
        )));
    }

    Ok(CacheSnapshot {
        target_name: file.target,
        built_at: file.last_update,
        entries: records.into_iter().map(PhotoEntry::from).collect(),
    })
}

fn write_atomically<F>(dest: &Path, write: F) -> Result<(), CacheError>
where
    F: FnOnce(&mut BufWriter<&File>) -> io::Result<()>,
{
    let io_error = |source: io::Error| CacheError::Io {
        path: dest.to_path_buf(),
        source,
    };

    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(io_error)?;

    let temp = NamedTempFile::new_in(&dir).map_err(io_error)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer).map_err(io_error)?;
        writer.flush().map_err(io_error)?;
    }
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(dest).map_err(|e| io_error(e.error))?;
    Ok(())
}
