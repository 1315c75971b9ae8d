//! # Refresh Module
//!
//! Decides whether a target's cache can be used as-is or must be rebuilt.
//!
//! ## States
//! ```text
//! NeedLoad ─┬─> Fresh ───────────────────────> (use snapshot)
//!           └─> Stale ─> Rebuilding ─> Done ─> (use snapshot)
//! ```
//! A missing, corrupted or unreadable cache counts as stale. A cache that
//! cannot be loaded right after a successful rebuild is fatal.
//!
//! Local targets are rebuilt by scanning their collections; SSH targets by
//! running `localupdate` on the peer and fetching the resulting cache.

mod local;
pub mod remote;

pub use local::LocalRebuilder;
pub use remote::{RemoteRebuilder, RemoteTransport, SshTransport};

use crate::config::{Target, TargetKind};
use crate::core::cache::{CacheSnapshot, CacheStore};
use crate::error::{CacheError, Result};
use crate::events::{Event, EventSender, RefreshEvent};
use chrono::Utc;
use tracing::{info, warn};

/// Produces a new cache file for a target
pub trait Rebuild {
    fn rebuild(&self, target: &Target, store: &CacheStore, events: &EventSender) -> Result<()>;
}

/// Why a cache has to be rebuilt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    Missing,
    Expired { age_secs: i64 },
    Corrupted { reason: String },
    Unreadable { reason: String },
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::Missing => write!(f, "no cache yet"),
            StaleReason::Expired { age_secs } => {
                write!(f, "cache is {:.1} hours old", *age_secs as f64 / 3600.0)
            }
            StaleReason::Corrupted { reason } => write!(f, "cache is corrupted ({})", reason),
            StaleReason::Unreadable { reason } => write!(f, "cache is unreadable ({})", reason),
        }
    }
}

/// Refresh progress for one target
#[derive(Debug)]
pub enum RefreshState {
    NeedLoad,
    Fresh(CacheSnapshot),
    Stale(StaleReason),
    Rebuilding,
    Done(CacheSnapshot),
}

/// Keeps target caches fresh
pub struct RefreshOrchestrator {
    store: CacheStore,
    local: Box<dyn Rebuild>,
    remote: Box<dyn Rebuild>,
}

impl RefreshOrchestrator {
    pub fn new(store: CacheStore, local: Box<dyn Rebuild>, remote: Box<dyn Rebuild>) -> Self {
        Self {
            store,
            local,
            remote,
        }
    }

    pub fn with_local(mut self, local: Box<dyn Rebuild>) -> Self {
        self.local = local;
        self
    }

    pub fn with_remote(mut self, remote: Box<dyn Rebuild>) -> Self {
        self.remote = remote;
        self
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Return a snapshot of `target` no older than a day
    pub fn ensure_fresh(&self, target: &Target, events: &EventSender) -> Result<CacheSnapshot> {
        self.ensure_fresh_at(target, Utc::now().timestamp(), events)
    }

    /// Return a snapshot of `target` that is fresh at `now`
    pub fn ensure_fresh_at(
        &self,
        target: &Target,
        now: i64,
        events: &EventSender,
    ) -> Result<CacheSnapshot> {
        let mut state = RefreshState::NeedLoad;
        loop {
            state = match state {
                RefreshState::NeedLoad => self.load_state(target, now),
                RefreshState::Fresh(snapshot) => {
                    let age_secs = snapshot.age_at(now);
                    info!(target = %target.name, age_secs, entries = snapshot.len(), "using cached snapshot");
                    events.send(Event::Refresh(RefreshEvent::Fresh {
                        target: target.name.clone(),
                        age_secs,
                    }));
                    return Ok(snapshot);
                }
                RefreshState::Stale(reason) => {
                    warn!(target = %target.name, reason = %reason, "cache must be rebuilt");
                    events.send(Event::Refresh(RefreshEvent::Stale {
                        target: target.name.clone(),
                        reason: reason.to_string(),
                    }));
                    RefreshState::Rebuilding
                }
                RefreshState::Rebuilding => RefreshState::Done(self.rebuild(target, events)?),
                RefreshState::Done(snapshot) => return Ok(snapshot),
            };
        }
    }

    /// Rebuild the target's cache unconditionally and load the result
    pub fn rebuild(&self, target: &Target, events: &EventSender) -> Result<CacheSnapshot> {
        let remote = target.kind == TargetKind::Ssh;
        events.send(Event::Refresh(RefreshEvent::RebuildStarted {
            target: target.name.clone(),
            remote,
        }));
        info!(target = %target.name, remote, "rebuilding cache");

        let rebuilder = if remote { &self.remote } else { &self.local };
        rebuilder.rebuild(target, &self.store, events)?;

        let snapshot = self.store.load(&target.name)?;
        events.send(Event::Refresh(RefreshEvent::RebuildCompleted {
            target: target.name.clone(),
            entries: snapshot.len(),
        }));
        Ok(snapshot)
    }

    fn load_state(&self, target: &Target, now: i64) -> RefreshState {
        match self.store.load(&target.name) {
            Ok(snapshot) if snapshot.is_fresh_at(now) => RefreshState::Fresh(snapshot),
            Ok(snapshot) => RefreshState::Stale(StaleReason::Expired {
                age_secs: snapshot.age_at(now),
            }),
            Err(CacheError::NotFound { .. }) => RefreshState::Stale(StaleReason::Missing),
            Err(CacheError::Corrupted { reason, .. }) => {
                RefreshState::Stale(StaleReason::Corrupted { reason })
            }
            Err(e) => RefreshState::Stale(StaleReason::Unreadable {
                reason: e.to_string(),
            }),
        }
    }
}
