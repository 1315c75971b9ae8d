//! Fixed-size worker pool that analyzes scan candidates.
//!
//! A feeder thread pushes jobs into a bounded queue, exactly `concurrency`
//! scoped workers drain it, and the calling thread collects results from a
//! bounded result channel. Both channels are capped, so memory stays flat
//! on very large trees; because the caller drains results while workers run,
//! no send blocks forever. The scope joins every thread before returning.

use super::walker::{self, Candidate};
use super::{CandidateFilter, FailedFile, ScanConfig, ScanOutcome};
use crate::core::cache::CacheSnapshot;
use crate::core::fingerprint::{ConversionOutcome, Fingerprinter, PhotoEntry};
use crate::error::ScanError;
use crate::events::{AnalyzeEvent, AnalyzeProgress, Event, EventSender, ScanEvent};
use crossbeam_channel::bounded;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info, warn};

/// Result of analyzing one candidate
enum JobOutcome {
    Analyzed {
        entry: PhotoEntry,
        conversion: ConversionOutcome,
    },
    Failed {
        path: PathBuf,
        message: String,
    },
}

/// Bounded pool of analysis workers
pub struct WorkerPool {
    concurrency: usize,
    fingerprinter: Fingerprinter,
    config: ScanConfig,
}

impl WorkerPool {
    /// Create a pool with exactly `concurrency` workers
    pub fn new(concurrency: usize, fingerprinter: Fingerprinter) -> Result<Self, ScanError> {
        if concurrency == 0 {
            return Err(ScanError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self {
            concurrency,
            fingerprinter,
            config: ScanConfig::default(),
        })
    }

    /// Set scanner configuration
    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Only analyze files accepted by `filter`
    pub fn with_filter(mut self, filter: CandidateFilter) -> Self {
        self.config.filter = filter;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Scan one directory tree into a new snapshot
    pub fn scan(
        &self,
        root: &Path,
        target_name: &str,
        events: &EventSender,
    ) -> Result<ScanOutcome, ScanError> {
        let mut outcome = ScanOutcome {
            snapshot: CacheSnapshot::created_now(target_name),
            failures: Vec::new(),
            conversion_failures: Vec::new(),
        };
        self.analyze_dir(&mut outcome, root, events)?;
        Ok(outcome)
    }

    /// Scan several directory trees into one new snapshot
    pub fn scan_all(
        &self,
        roots: &[PathBuf],
        target_name: &str,
        events: &EventSender,
    ) -> Result<ScanOutcome, ScanError> {
        let mut outcome = ScanOutcome {
            snapshot: CacheSnapshot::created_now(target_name),
            failures: Vec::new(),
            conversion_failures: Vec::new(),
        };
        for root in roots {
            self.analyze_dir(&mut outcome, root, events)?;
        }
        Ok(outcome)
    }

    /// Analyze every candidate under `root`, appending to `outcome`
    pub fn analyze_dir(
        &self,
        outcome: &mut ScanOutcome,
        root: &Path,
        events: &EventSender,
    ) -> Result<(), ScanError> {
        events.send(Event::Scan(ScanEvent::Started {
            root: root.to_path_buf(),
        }));

        let candidates = walker::enumerate(root, &self.config.filter, self.config.follow_symlinks)?;
        let total = candidates.len();

        info!(root = %root.display(), candidates = total, workers = self.concurrency, "analyzing photos");
        events.send(Event::Scan(ScanEvent::CandidatesFound {
            root: root.to_path_buf(),
            total,
        }));

        let mut analyzed = 0usize;
        let mut failed = 0usize;

        if total > 0 {
            let capacity = self
                .config
                .queue_capacity
                .unwrap_or(self.concurrency * 4)
                .max(1);
            let (job_tx, job_rx) = bounded::<Candidate>(capacity);
            let (result_tx, result_rx) = bounded::<JobOutcome>(capacity);

            thread::scope(|scope| -> Result<(), ScanError> {
                for worker_id in 0..self.concurrency {
                    let jobs = job_rx.clone();
                    let results = result_tx.clone();
                    let fingerprinter = &self.fingerprinter;
                    thread::Builder::new()
                        .name(format!("photo-analyze-{}", worker_id))
                        .spawn_scoped(scope, move || {
                            for job in jobs.iter() {
                                if results.send(run_job(fingerprinter, job)).is_err() {
                                    break;
                                }
                            }
                        })
                        .map_err(|source| ScanError::SpawnWorker { source })?;
                }
                // Workers hold the only remaining handles, so the result
                // channel closes once the last worker finishes.
                drop(job_rx);
                drop(result_tx);

                scope.spawn(move || {
                    for candidate in candidates {
                        if job_tx.send(candidate).is_err() {
                            break;
                        }
                    }
                });

                for job_outcome in result_rx.iter() {
                    let current_path = match job_outcome {
                        JobOutcome::Analyzed { entry, conversion } => {
                            analyzed += 1;
                            let path = entry.path.clone();
                            record_conversion(outcome, &entry, conversion, events);
                            debug!(path = %path.display(), identity = %entry.identity_hash, "analyzed");
                            outcome.snapshot.entries.push(entry);
                            path
                        }
                        JobOutcome::Failed { path, message } => {
                            failed += 1;
                            warn!(path = %path.display(), error = %message, "skipping photo");
                            events.send(Event::Analyze(AnalyzeEvent::Error {
                                path: path.clone(),
                                message: message.clone(),
                            }));
                            outcome.failures.push(FailedFile {
                                path: path.clone(),
                                message,
                            });
                            path
                        }
                    };

                    events.send(Event::Analyze(AnalyzeEvent::Progress(AnalyzeProgress {
                        completed: analyzed + failed,
                        total,
                        current_path,
                    })));
                }

                Ok(())
            })?;

            debug_assert_eq!(analyzed + failed, total);
        }

        events.send(Event::Scan(ScanEvent::Completed { analyzed, failed }));
        info!(root = %root.display(), analyzed, failed, "analysis finished");

        Ok(())
    }
}

fn run_job(fingerprinter: &Fingerprinter, job: Candidate) -> JobOutcome {
    let result = if fingerprinter.converts() {
        fingerprinter.analyze_converting(&job.path, job.size)
    } else {
        fingerprinter
            .analyze(&job.path, job.size)
            .map(|entry| (entry, ConversionOutcome::NotNeeded))
    };

    match result {
        Ok((entry, conversion)) => JobOutcome::Analyzed { entry, conversion },
        Err(e) => JobOutcome::Failed {
            path: job.path,
            message: e.to_string(),
        },
    }
}

fn record_conversion(
    outcome: &mut ScanOutcome,
    entry: &PhotoEntry,
    conversion: ConversionOutcome,
    events: &EventSender,
) {
    match conversion {
        ConversionOutcome::Converted { from } => {
            events.send(Event::Analyze(AnalyzeEvent::Converted {
                from,
                to: entry.path.clone(),
            }));
        }
        ConversionOutcome::Failed(error) => {
            let message = error.to_string();
            events.send(Event::Analyze(AnalyzeEvent::ConversionFailed {
                path: entry.path.clone(),
                message: message.clone(),
            }));
            outcome.conversion_failures.push(FailedFile {
                path: entry.path.clone(),
                message,
            });
        }
        ConversionOutcome::NotNeeded | ConversionOutcome::SiblingExists { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{ExifFields, MetadataReader};
    use crate::error::AnalysisError;
    use crate::events::{null_sender, EventChannel};
    use std::collections::HashSet;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Reader that derives EXIF from the file name and fails on "broken*"
    struct NameReader;

    impl MetadataReader for NameReader {
        fn read(&self, path: &Path) -> Result<ExifFields, AnalysisError> {
            let stem = path.file_stem().unwrap().to_string_lossy().to_string();
            if stem.starts_with("broken") {
                return Err(AnalysisError::Unreadable {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            match stem.strip_prefix("photo") {
                Some(n) => Ok(ExifFields::new(
                    Some(1_000 + n.parse::<i64>().unwrap_or(0)),
                    Some("X".to_string()),
                )),
                None => Ok(ExifFields::default()),
            }
        }
    }

    fn pool(concurrency: usize) -> WorkerPool {
        WorkerPool::new(concurrency, Fingerprinter::new(Arc::new(NameReader))).unwrap()
    }

    fn create_file(dir: &Path, name: &str) {
        File::create(dir.join(name))
            .unwrap()
            .write_all(name.as_bytes())
            .unwrap();
    }

    #[test]
    fn zero_workers_is_rejected() {
        let result = WorkerPool::new(0, Fingerprinter::new(Arc::new(NameReader)));
        assert!(matches!(result, Err(ScanError::InvalidConcurrency { value: 0 })));
    }

    #[test]
    fn failures_are_skipped_not_raised() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..10 {
            create_file(temp_dir.path(), &format!("photo{}.jpg", i));
        }
        create_file(temp_dir.path(), "broken1.jpg");
        create_file(temp_dir.path(), "broken2.jpg");

        let outcome = pool(4).scan(temp_dir.path(), "", &null_sender()).unwrap();

        assert_eq!(outcome.snapshot.entries.len(), 10);
        assert_eq!(outcome.failures.len(), 2);
    }

    #[test]
    fn every_candidate_appears_exactly_once() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..57 {
            create_file(temp_dir.path(), &format!("photo{}.jpg", i));
        }

        // Queue smaller than the job count exercises back-pressure
        let config = ScanConfig {
            queue_capacity: Some(2),
            ..ScanConfig::default()
        };
        let outcome = pool(3)
            .with_config(config)
            .scan(temp_dir.path(), "", &null_sender())
            .unwrap();

        let paths: HashSet<_> = outcome.snapshot.entries.iter().map(|e| e.path.clone()).collect();
        assert_eq!(outcome.snapshot.entries.len(), 57);
        assert_eq!(paths.len(), 57);
    }

    #[test]
    fn single_worker_completes() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..5 {
            create_file(temp_dir.path(), &format!("photo{}.jpg", i));
        }

        let outcome = pool(1).scan(temp_dir.path(), "", &null_sender()).unwrap();

        assert_eq!(outcome.snapshot.entries.len(), 5);
    }

    #[test]
    fn every_identity_hash_is_non_empty() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "photo1.jpg");
        create_file(temp_dir.path(), "plain.jpg");
        create_file(temp_dir.path(), "plain.heic");

        let outcome = pool(2).scan(temp_dir.path(), "", &null_sender()).unwrap();

        assert_eq!(outcome.snapshot.entries.len(), 3);
        assert!(outcome
            .snapshot
            .entries
            .iter()
            .all(|e| !e.identity_hash.is_empty()));
    }

    #[test]
    fn scan_all_merges_collections() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        create_file(first.path(), "photo1.jpg");
        create_file(second.path(), "photo2.jpg");
        create_file(second.path(), "photo3.jpg");

        let roots = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let outcome = pool(2).scan_all(&roots, "nas", &null_sender()).unwrap();

        assert_eq!(outcome.snapshot.target_name, "nas");
        assert_eq!(outcome.snapshot.entries.len(), 3);
    }

    #[test]
    fn missing_collection_aborts_scan() {
        let first = TempDir::new().unwrap();
        let roots = vec![
            first.path().to_path_buf(),
            PathBuf::from("/nonexistent/collection"),
        ];

        let result = pool(2).scan_all(&roots, "nas", &null_sender());

        assert!(matches!(result, Err(ScanError::DirectoryNotFound { .. })));
    }

    #[test]
    fn progress_events_cover_every_job() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..4 {
            create_file(temp_dir.path(), &format!("photo{}.jpg", i));
        }
        create_file(temp_dir.path(), "broken.jpg");

        let (sender, receiver) = EventChannel::new();
        pool(2).scan(temp_dir.path(), "", &sender).unwrap();
        drop(sender);

        let mut progress = 0;
        let mut errors = 0;
        for event in receiver.iter() {
            match event {
                Event::Analyze(AnalyzeEvent::Progress(p)) => {
                    progress += 1;
                    assert_eq!(p.total, 5);
                }
                Event::Analyze(AnalyzeEvent::Error { .. }) => errors += 1,
                _ => {}
            }
        }
        assert_eq!(progress, 5);
        assert_eq!(errors, 1);
    }
}
