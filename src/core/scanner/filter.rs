//! Candidate filtering for the scanner.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Still-image and convertible-image extensions recognized by default
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "heic", "heif"];

type IncludePredicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Decides which files are analysis candidates
#[derive(Clone)]
pub struct CandidateFilter {
    /// Lowercase file extensions to include
    extensions: HashSet<String>,
    /// Extra caller-supplied condition
    predicate: Option<IncludePredicate>,
}

impl CandidateFilter {
    /// Create a new filter with the default photo extensions
    pub fn new() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            predicate: None,
        }
    }

    /// Override the list of extensions to accept
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Only include files for which `predicate` returns true
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Check if a file should be analyzed
    pub fn should_include(&self, path: &Path) -> bool {
        let recognized = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false);

        recognized && self.predicate.as_ref().map_or(true, |p| p(path))
    }
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CandidateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateFilter")
            .field("extensions", &self.extensions)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}
