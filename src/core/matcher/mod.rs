//! # Matcher Module
//!
//! Classifies the photos of one snapshot against another.
//!
//! ## Classifications
//! | Local entry                          | Classification |
//! |--------------------------------------|----------------|
//! | capture time or camera model missing | `NoIdentity`   |
//! | identity hash present in target      | `Duplicate`    |
//! | anything else                        | `New`          |
//!
//! ## Hash collisions
//! Distinct target photos can share an identity (two bodies of the same
//! model firing in the same second). They collapse to one index slot; which
//! one survives is chosen by [`TieBreak`] and counted by
//! [`TargetIndex::collisions`].
//!
//! Matching is pure: no I/O, no mutation of either snapshot.

use crate::core::cache::CacheSnapshot;
use crate::core::fingerprint::PhotoEntry;
use std::collections::HashMap;

/// Which target entry keeps an identity hash shared by several entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The entry seen last overwrites earlier ones
    #[default]
    LastWins,
    /// The entry seen first is kept
    FirstWins,
}

/// How a local photo relates to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Not present in the target
    New,
    /// Already present in the target
    Duplicate,
    /// No EXIF identity; needs manual review
    NoIdentity,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::New => write!(f, "new"),
            Classification::Duplicate => write!(f, "duplicate"),
            Classification::NoIdentity => write!(f, "no identity"),
        }
    }
}

/// A local photo with its classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified<'a> {
    pub entry: &'a PhotoEntry,
    pub classification: Classification,
    /// Matching target photo, for duplicates
    pub existing: Option<&'a PhotoEntry>,
}

/// Lookup from identity hash to target photo
#[derive(Debug)]
pub struct TargetIndex<'a> {
    by_hash: HashMap<&'a str, &'a PhotoEntry>,
    collisions: usize,
}

impl<'a> TargetIndex<'a> {
    pub fn build(target: &'a CacheSnapshot, tie_break: TieBreak) -> Self {
        let mut by_hash: HashMap<&'a str, &'a PhotoEntry> =
            HashMap::with_capacity(target.entries.len());
        let mut collisions = 0;

        for entry in &target.entries {
            let key = entry.identity_hash.as_str();
            if by_hash.contains_key(key) {
                collisions += 1;
                if tie_break == TieBreak::FirstWins {
                    continue;
                }
            }
            by_hash.insert(key, entry);
        }

        Self {
            by_hash,
            collisions,
        }
    }

    pub fn get(&self, identity_hash: &str) -> Option<&'a PhotoEntry> {
        self.by_hash.get(identity_hash).copied()
    }

    /// Distinct identities in the index
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Target entries that shared an identity with an earlier one
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

/// Classify every local photo against the target, last entry winning ties
pub fn classify<'a>(local: &'a CacheSnapshot, target: &'a CacheSnapshot) -> Vec<Classified<'a>> {
    let index = TargetIndex::build(target, TieBreak::default());
    classify_with(local, &index)
}

/// Classify every local photo against a prebuilt index
pub fn classify_with<'a>(local: &'a CacheSnapshot, index: &TargetIndex<'a>) -> Vec<Classified<'a>> {
    local
        .entries
        .iter()
        .map(|entry| {
            if !entry.has_exif() {
                return Classified {
                    entry,
                    classification: Classification::NoIdentity,
                    existing: None,
                };
            }
            match index.get(&entry.identity_hash) {
                Some(existing) => Classified {
                    entry,
                    classification: Classification::Duplicate,
                    existing: Some(existing),
                },
                None => Classified {
                    entry,
                    classification: Classification::New,
                    existing: None,
                },
            }
        })
        .collect()
}
