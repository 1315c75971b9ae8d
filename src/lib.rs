//! # Photo Cache
//!
//! Keeps an inventory of every photo in one or more archives (targets) and
//! uses it to sort a folder of new photos: what is already archived, what
//! needs review, and what still has to be imported.
//!
//! ## Architecture
//! - `core` - Scanning, fingerprinting, caching, matching and organizing
//! - `config` - Targets and worker settings from `config.json`
//! - `events` - Progress reporting for front ends
//! - `error` - Error types
//!
//! The binary (`photo`) is a thin command-line layer over `core`.

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{PhotoCacheError, Result};

/// Initialize tracing for the library
///
/// `RUST_LOG` takes precedence; otherwise `info`, or `debug` when verbose.
/// This should be called once by the application entry point.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    // A subscriber installed earlier (tests, embedding apps) stays in place
    let _ = tracing::subscriber::set_global_default(subscriber);
}
