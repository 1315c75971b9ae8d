//! Directory enumeration using walkdir.
//!
//! The walk is single-threaded and finishes before any analysis starts, so
//! the number of jobs is known up front. A directory that cannot be read
//! aborts it; a file that vanishes before it can be stat'ed is skipped.

use super::filter::CandidateFilter;
use crate::error::ScanError;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// A file selected for analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
}

/// Collect every candidate file under `root`
pub fn enumerate(
    root: &Path,
    filter: &CandidateFilter,
    follow_symlinks: bool,
) -> Result<Vec<Candidate>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::DirectoryNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut candidates = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .sort_by_file_name();

    for entry_result in walker {
        let entry = entry_result.map_err(|source| ScanError::ReadDirectory {
            path: source
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !filter.should_include(path) {
            continue;
        }

        let metadata = entry.metadata().map_err(io::Error::from);
        candidates.extend(candidate(path, metadata));
    }

    Ok(candidates)
}

fn candidate(path: &Path, metadata: io::Result<Metadata>) -> Option<Candidate> {
    match metadata {
        Ok(metadata) => Some(Candidate {
            path: path.to_path_buf(),
            size: metadata.len(),
        }),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping file that could not be stat'ed");
            None
        }
    }
}
