//! # Stats Module
//!
//! Summaries computed from a target snapshot.

use crate::core::cache::CacheSnapshot;
use crate::core::fingerprint::PhotoEntry;
use std::collections::BTreeMap;

/// Newest photo of one camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraLatest<'a> {
    pub camera: String,
    /// None when the target holds no photo from this camera
    pub latest: Option<&'a PhotoEntry>,
}

/// Newest photo per camera model, keyed by model
///
/// Photos without a camera model are not counted.
pub fn latest_per_camera(snapshot: &CacheSnapshot) -> BTreeMap<&str, &PhotoEntry> {
    let mut latest: BTreeMap<&str, &PhotoEntry> = BTreeMap::new();
    for entry in &snapshot.entries {
        let Some(camera) = entry.camera_model.as_deref() else {
            continue;
        };
        latest
            .entry(camera)
            .and_modify(|current| {
                if current.capture_timestamp < entry.capture_timestamp {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }
    latest
}

/// Rows for the listed cameras, or for every camera seen when `cameras` is
/// None, sorted by camera name
pub fn camera_report<'a>(
    snapshot: &'a CacheSnapshot,
    cameras: Option<&[String]>,
) -> Vec<CameraLatest<'a>> {
    let latest = latest_per_camera(snapshot);
    let mut names: Vec<String> = match cameras {
        Some(cameras) => cameras.to_vec(),
        None => latest.keys().map(|c| c.to_string()).collect(),
    };
    names.sort();
    names.dedup();

    names
        .into_iter()
        .map(|camera| CameraLatest {
            latest: latest.get(camera.as_str()).copied(),
            camera,
        })
        .collect()
}
