//! # Organize Module
//!
//! Reorganizes a working directory of freshly downloaded photos.
//!
//! ## filter
//! Photos are classified against a target snapshot and moved into buckets
//! inside the directory:
//! - `AlreadyImported/` for duplicates
//! - `NoExif/` for photos without a capture time and camera model
//! - `ToBeImported/YYYY-MM-DD/YYYY-MM-DD_HH-MM-SS.jpg` for new photos
//!
//! ## fix
//! Every photo with a capture time is renamed in place to
//! `YYYY-MM-DD_HH-MM-SS.jpg`.
//!
//! Both convert HEIC/HEIF photos to JPEG first when a converter is attached.
//! A photo that cannot be moved is reported and left where it is.

mod executor;
mod planner;
mod types;

pub use executor::{move_file, move_into, unique_destination};
pub use planner::{
    capture_file_name, daily_dir_name, ALREADY_IMPORTED_DIR, BUCKET_DIRS, NO_EXIF_DIR,
    TO_BE_IMPORTED_DIR,
};
pub use types::{MovedFile, OrganizeReport};

use crate::core::cache::{CacheSnapshot, IgnoreSet};
use crate::core::fingerprint::{Fingerprinter, PhotoEntry};
use crate::core::matcher::{classify_with, Classification, TargetIndex, TieBreak};
use crate::core::scanner::{CandidateFilter, FailedFile, ScanOutcome, WorkerPool};
use crate::error::Result;
use crate::events::{Bucket, Event, EventSender, OrganizeEvent};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sorts and renames photos in a working directory
pub struct Organizer {
    fingerprinter: Fingerprinter,
    workers: usize,
    ignored: IgnoreSet,
    tie_break: TieBreak,
}

impl Organizer {
    pub fn new(fingerprinter: Fingerprinter, workers: usize) -> Self {
        Self {
            fingerprinter,
            workers,
            ignored: IgnoreSet::default(),
            tie_break: TieBreak::default(),
        }
    }

    /// Drop photos named by these ignore lists before organizing
    pub fn with_ignored(mut self, ignored: IgnoreSet) -> Self {
        self.ignored = ignored;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Move every photo under `dir` into its bucket
    pub fn filter(
        &self,
        dir: &Path,
        target: &CacheSnapshot,
        events: &EventSender,
    ) -> Result<OrganizeReport> {
        let (local, mut report) = self.scan(dir, events)?;

        let index = TargetIndex::build(target, self.tie_break);
        if index.collisions() > 0 {
            warn!(
                target = %target.target_name,
                collisions = index.collisions(),
                "target photos share an identity; only one of each is matched"
            );
        }

        for classified in classify_with(&local, &index) {
            let entry = classified.entry;
            let (bucket_dir, name, bucket) = match classified.classification {
                Classification::NoIdentity => (
                    dir.join(NO_EXIF_DIR),
                    file_name(&entry.path),
                    Bucket::NoExif,
                ),
                Classification::Duplicate => {
                    if let Some(existing) = classified.existing {
                        info!(
                            path = %entry.path.display(),
                            existing = %existing.path.display(),
                            identity = %entry.identity_hash,
                            "photo already in target"
                        );
                    }
                    (
                        dir.join(ALREADY_IMPORTED_DIR),
                        file_name(&entry.path),
                        Bucket::AlreadyImported,
                    )
                }
                Classification::New => match new_photo_destination(dir, entry) {
                    Some((daily, name)) => (daily, name, Bucket::ToBeImported),
                    None => {
                        fail(&mut report, &entry.path, "capture time out of range".to_string(), events);
                        continue;
                    }
                },
            };

            relocate(&mut report, &entry.path, &bucket_dir, &name, bucket, events);
        }

        info!(
            dir = %dir.display(),
            already_imported = report.count(Bucket::AlreadyImported),
            no_exif = report.count(Bucket::NoExif),
            to_be_imported = report.count(Bucket::ToBeImported),
            failed = report.failures.len(),
            "filter finished"
        );
        Ok(report)
    }

    /// Rename every photo under `dir` after its capture time
    pub fn fix(&self, dir: &Path, events: &EventSender) -> Result<OrganizeReport> {
        let (local, mut report) = self.scan(dir, events)?;

        for entry in &local.entries {
            let Some(timestamp) = entry.capture_timestamp else {
                debug!(path = %entry.path.display(), "no capture time, leaving as is");
                report.unchanged += 1;
                continue;
            };
            let Some(name) = capture_file_name(timestamp, &entry.path) else {
                fail(&mut report, &entry.path, "capture time out of range".to_string(), events);
                continue;
            };
            if entry.path.file_name().is_some_and(|current| current == name.as_str()) {
                report.unchanged += 1;
                continue;
            }

            let parent = entry
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            relocate(&mut report, &entry.path, &parent, &name, Bucket::Renamed, events);
        }

        info!(
            dir = %dir.display(),
            renamed = report.count(Bucket::Renamed),
            unchanged = report.unchanged,
            failed = report.failures.len(),
            "fix finished"
        );
        Ok(report)
    }

    /// Analyze `dir`, skipping bucket folders and ignored photos
    fn scan(&self, dir: &Path, events: &EventSender) -> Result<(CacheSnapshot, OrganizeReport)> {
        let root = dir.to_path_buf();
        let filter =
            CandidateFilter::new().with_predicate(move |path| !planner::is_in_bucket(&root, path));
        let pool = WorkerPool::new(self.workers, self.fingerprinter.clone())?.with_filter(filter);

        let ScanOutcome {
            mut snapshot,
            failures,
            conversion_failures,
        } = pool.scan(dir, "", events)?;

        let ignored = self.ignored.retain_unignored(&mut snapshot.entries);
        let report = OrganizeReport {
            ignored,
            scan_failures: failures,
            conversion_failures,
            ..OrganizeReport::default()
        };
        Ok((snapshot, report))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn new_photo_destination(dir: &Path, entry: &PhotoEntry) -> Option<(PathBuf, String)> {
    let timestamp = entry.capture_timestamp?;
    let daily = dir.join(TO_BE_IMPORTED_DIR).join(daily_dir_name(timestamp)?);
    Some((daily, capture_file_name(timestamp, &entry.path)?))
}

fn relocate(
    report: &mut OrganizeReport,
    from: &Path,
    dir: &Path,
    name: &str,
    bucket: Bucket,
    events: &EventSender,
) {
    match move_into(from, dir, name) {
        Ok(to) => {
            debug!(from = %from.display(), to = %to.display(), bucket = %bucket, "moved");
            events.send(Event::Organize(OrganizeEvent::Moved {
                from: from.to_path_buf(),
                to: to.clone(),
                bucket,
            }));
            report.moved.push(MovedFile {
                from: from.to_path_buf(),
                to,
                bucket,
            });
        }
        Err(e) => fail(
            report,
            from,
            format!("unable to move to {}: {}", dir.join(name).display(), e),
            events,
        ),
    }
}

fn fail(report: &mut OrganizeReport, path: &Path, message: String, events: &EventSender) {
    warn!(path = %path.display(), error = %message, "photo left in place");
    events.send(Event::Organize(OrganizeEvent::Failed {
        path: path.to_path_buf(),
        message: message.clone(),
    }));
    report.failures.push(FailedFile {
        path: path.to_path_buf(),
        message,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{ExifFields, MetadataReader};
    use crate::error::AnalysisError;
    use crate::events::null_sender;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// "tNNN_model.jpg" carries EXIF (NNN, model); "2001-09-09_01-46-40*" was
    /// shot at 1_000_000_000 by X; anything else has none
    struct NameReader;

    impl MetadataReader for NameReader {
        fn read(&self, path: &Path) -> std::result::Result<ExifFields, AnalysisError> {
            let stem = path.file_stem().unwrap().to_string_lossy().to_string();
            if stem.starts_with("2001-09-09_01-46-40") {
                return Ok(ExifFields::new(Some(1_000_000_000), Some("X".to_string())));
            }
            let parsed = stem.strip_prefix('t').and_then(|rest| {
                let (ts, model) = rest.split_once('_')?;
                Some(ExifFields::new(ts.parse().ok(), Some(model.to_string())))
            });
            Ok(parsed.unwrap_or_default())
        }
    }

    fn organizer() -> Organizer {
        Organizer::new(Fingerprinter::new(Arc::new(NameReader)), 2)
    }

    fn target(hashes: &[&str]) -> CacheSnapshot {
        let mut snapshot = CacheSnapshot::new("nas", 0);
        for hash in hashes {
            snapshot.entries.push(PhotoEntry::new(
                format!("/nas/{}.jpg", hash),
                1,
                ExifFields::default(),
                *hash,
            ));
        }
        snapshot
    }

    #[test]
    fn filter_sorts_into_buckets() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t1000_X.jpg"), b"dup").unwrap();
        fs::write(dir.path().join("t1000000000_X.jpg"), b"new").unwrap();
        fs::write(dir.path().join("scan.jpg"), b"noexif").unwrap();

        let report = organizer()
            .filter(dir.path(), &target(&["1000|X"]), &null_sender())
            .unwrap();

        assert_eq!(report.moved.len(), 3);
        assert!(dir.path().join("AlreadyImported/t1000_X.jpg").exists());
        assert!(dir.path().join("NoExif/scan.jpg").exists());
        assert!(dir
            .path()
            .join("ToBeImported/2001-09-09/2001-09-09_01-46-40.jpg")
            .exists());
        assert!(!dir.path().join("t1000_X.jpg").exists());
    }

    #[test]
    fn second_filter_run_ignores_buckets() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("scan.jpg"), b"noexif").unwrap();
        let organizer = organizer();
        organizer
            .filter(dir.path(), &target(&[]), &null_sender())
            .unwrap();

        let report = organizer
            .filter(dir.path(), &target(&[]), &null_sender())
            .unwrap();

        assert!(report.moved.is_empty());
        assert!(dir.path().join("NoExif/scan.jpg").exists());
    }

    #[test]
    fn same_second_shots_do_not_clobber() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/t1000000000_X.jpg"), b"one").unwrap();
        fs::write(dir.path().join("t1000000000_Y.jpg"), b"two").unwrap();

        let report = organizer()
            .filter(dir.path(), &target(&[]), &null_sender())
            .unwrap();

        let daily = dir.path().join("ToBeImported/2001-09-09");
        assert_eq!(report.count(Bucket::ToBeImported), 2);
        assert!(daily.join("2001-09-09_01-46-40.jpg").exists());
        assert!(daily.join("2001-09-09_01-46-40_1.jpg").exists());
    }

    #[test]
    fn ignored_photos_stay_put() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t5_X.jpg"), b"ignored").unwrap();
        let mut ignored = IgnoreSet::default();
        ignored.extend(&target(&["5|X"]));

        let report = organizer()
            .with_ignored(ignored)
            .filter(dir.path(), &target(&[]), &null_sender())
            .unwrap();

        assert_eq!(report.ignored, 1);
        assert!(report.moved.is_empty());
        assert!(dir.path().join("t5_X.jpg").exists());
    }

    #[test]
    fn fix_renames_in_place() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("trip")).unwrap();
        fs::write(dir.path().join("trip/t1000000000_X.jpeg"), b"a").unwrap();
        fs::write(dir.path().join("trip/scan.jpg"), b"b").unwrap();

        let report = organizer().fix(dir.path(), &null_sender()).unwrap();

        assert_eq!(report.count(Bucket::Renamed), 1);
        assert_eq!(report.unchanged, 1);
        assert!(dir.path().join("trip/2001-09-09_01-46-40.jpg").exists());
        assert!(dir.path().join("trip/scan.jpg").exists());
    }

    #[test]
    fn fix_keeps_names_that_already_match() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t1000000000_X.jpg"), b"a").unwrap();
        let organizer = organizer();
        organizer.fix(dir.path(), &null_sender()).unwrap();

        let report = organizer.fix(dir.path(), &null_sender()).unwrap();

        assert!(report.moved.is_empty());
        assert_eq!(report.unchanged, 1);
        assert!(!dir.path().join("2001-09-09_01-46-40_1.jpg").exists());
        assert!(dir.path().join("2001-09-09_01-46-40.jpg").exists());
    }

    #[test]
    fn missing_dir_is_fatal() {
        let result = organizer().fix(Path::new("/nonexistent/inbox"), &null_sender());
        assert!(result.is_err());
    }
}
