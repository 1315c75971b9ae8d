//! # photo CLI
//!
//! Command-line interface for the photo cache.
//!
//! ## Usage
//! ```bash
//! photo update nas
//! photo filter nas ~/Downloads/phone
//! photo stats nas --all
//! ```

mod cli;

use photo_cache::Result;

fn main() -> Result<()> {
    cli::run()
}
