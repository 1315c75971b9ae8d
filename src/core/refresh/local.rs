//! Rebuilds a target's cache by scanning its collections on this machine.

use super::Rebuild;
use crate::config::Target;
use crate::core::cache::{CacheStore, IgnoreSet};
use crate::core::fingerprint::Fingerprinter;
use crate::core::metadata::MetadataReader;
use crate::core::scanner::{ScanConfig, WorkerPool};
use crate::error::Result;
use crate::events::EventSender;
use std::sync::Arc;
use tracing::{info, warn};

/// Scans every collection of a target into one snapshot and saves it
///
/// Never converts or moves files: the target's archive is read-only here.
pub struct LocalRebuilder {
    reader: Arc<dyn MetadataReader>,
    workers: usize,
    config: ScanConfig,
}

impl LocalRebuilder {
    pub fn new(reader: Arc<dyn MetadataReader>, workers: usize) -> Self {
        Self {
            reader,
            workers,
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }
}

impl Rebuild for LocalRebuilder {
    fn rebuild(&self, target: &Target, store: &CacheStore, events: &EventSender) -> Result<()> {
        if target.collections.is_empty() {
            warn!(target = %target.name, "target has no collections; cache will be empty");
        }

        // Load ignore lists first so a bad path fails before a long scan
        let ignored = IgnoreSet::load(&target.ignore)?;

        let pool = WorkerPool::new(self.workers, Fingerprinter::new(self.reader.clone()))?
            .with_config(self.config.clone());
        let mut outcome = pool.scan_all(&target.collections, &target.name, events)?;

        let dropped = ignored.retain_unignored(&mut outcome.snapshot.entries);
        if dropped > 0 {
            info!(target = %target.name, dropped, "ignored photos removed");
        }

        store.save(&outcome.snapshot)?;
        info!(
            target = %target.name,
            entries = outcome.snapshot.len(),
            skipped = outcome.failures.len(),
            "local rebuild finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::write_ignore_file;
    use crate::core::cache::CacheSnapshot;
    use crate::core::fingerprint::PhotoEntry;
    use crate::core::metadata::ExifFields;
    use crate::error::{AnalysisError, PhotoCacheError, ScanError};
    use crate::events::null_sender;
    use std::path::Path;
    use tempfile::TempDir;

    /// "photoN.jpg" shot at 1000+N by camera X
    struct NameReader;

    impl MetadataReader for NameReader {
        fn read(&self, path: &Path) -> std::result::Result<ExifFields, AnalysisError> {
            let stem = path.file_stem().unwrap().to_string_lossy().to_string();
            let n: i64 = stem.trim_start_matches("photo").parse().unwrap_or(0);
            Ok(ExifFields::new(Some(1_000 + n), Some("X".to_string())))
        }
    }

    fn rebuilder() -> LocalRebuilder {
        LocalRebuilder::new(Arc::new(NameReader), 2)
    }

    #[test]
    fn scans_all_collections_into_one_cache() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        std::fs::write(first.path().join("photo1.jpg"), b"1").unwrap();
        std::fs::create_dir(second.path().join("2020")).unwrap();
        std::fs::write(second.path().join("2020/photo2.jpg"), b"2").unwrap();
        std::fs::write(second.path().join("notes.txt"), b"ignored").unwrap();
        let base = TempDir::new().unwrap();
        let store = CacheStore::new(base.path());

        let target = Target::local(
            "home",
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
        );
        rebuilder().rebuild(&target, &store, &null_sender()).unwrap();

        let snapshot = store.load("home").unwrap();
        assert_eq!(snapshot.target_name, "home");
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn ignored_photos_are_left_out() {
        let photos = TempDir::new().unwrap();
        std::fs::write(photos.path().join("photo1.jpg"), b"1").unwrap();
        std::fs::write(photos.path().join("photo2.jpg"), b"2").unwrap();

        let ignore_dir = TempDir::new().unwrap();
        let mut ignored = CacheSnapshot::new("", 0);
        ignored.entries.push(PhotoEntry::new(
            "/elsewhere/x.jpg",
            1,
            ExifFields::new(Some(1_002), Some("X".to_string())),
            "1002|X",
        ));
        let ignore_file = write_ignore_file(ignore_dir.path(), &ignored).unwrap();

        let base = TempDir::new().unwrap();
        let store = CacheStore::new(base.path());
        let mut target = Target::local("home", vec![photos.path().to_path_buf()]);
        target.ignore = vec![ignore_file];

        rebuilder().rebuild(&target, &store, &null_sender()).unwrap();

        let snapshot = store.load("home").unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entries[0].identity_hash, "1001|X");
    }

    #[test]
    fn missing_collection_fails_without_writing() {
        let base = TempDir::new().unwrap();
        let store = CacheStore::new(base.path());
        let target = Target::local("home", vec!["/nonexistent/collection".into()]);

        let result = rebuilder().rebuild(&target, &store, &null_sender());

        assert!(matches!(
            result,
            Err(PhotoCacheError::Scan(ScanError::DirectoryNotFound { .. }))
        ));
        assert!(!store.path_for("home").exists());
    }

    #[test]
    fn rebuild_does_not_touch_heic_files() {
        let photos = TempDir::new().unwrap();
        let heic = photos.path().join("photo3.heic");
        std::fs::write(&heic, b"heic").unwrap();
        let base = TempDir::new().unwrap();
        let store = CacheStore::new(base.path());

        let target = Target::local("home", vec![photos.path().to_path_buf()]);
        rebuilder().rebuild(&target, &store, &null_sender()).unwrap();

        assert!(heic.exists());
        assert_eq!(store.load("home").unwrap().entries[0].path, heic);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_file_names_do_not_abort_the_rebuild() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let photos = TempDir::new().unwrap();
        std::fs::write(photos.path().join("photo1.jpg"), b"1").unwrap();
        let odd = photos.path().join(OsStr::from_bytes(b"caf\xe9.jpg"));
        std::fs::write(&odd, b"2").unwrap();
        let base = TempDir::new().unwrap();
        let store = CacheStore::new(base.path());

        let target = Target::local("home", vec![photos.path().to_path_buf()]);
        rebuilder().rebuild(&target, &store, &null_sender()).unwrap();

        let snapshot = store.load("home").unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.entries.iter().any(|e| e.path == odd));
    }
}
