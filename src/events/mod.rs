//! # Events Module
//!
//! Progress reporting through channels, so the CLI (or any other front end)
//! can show what the scanner, the refresh orchestrator and the organizer are
//! doing without the library knowing about terminals.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Analyze(AnalyzeEvent::Progress(p)) = event {
//!             println!("Analyzed {}/{}", p.completed, p.total);
//!         }
//!     }
//! });
//!
//! pool.scan(&root, "", &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
