use crate::tracked_object::{TrackId, TrackedObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The per-frame output of the tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub timestamp_ms: u64,
    pub num_active_objects: usize,
    pub counts_by_class: BTreeMap<String, usize>,
    pub active_objects: Vec<ActiveObject>,
}

/// A snapshot of one active track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveObject {
    pub id: String,
    pub class_label: String,
    pub mean_confidence: f64,
    pub last_position: [f64; 2],
    pub consecutive_matches: u32,
    pub consecutive_misses: u32,
}

impl ActiveObject {
    pub fn from_track(id: &TrackId, track: &TrackedObject) -> Self {
        Self {
            id: id.to_string(),
            class_label: track.class_label.clone(),
            mean_confidence: track.mean_confidence,
            last_position: [track.last_position.x, track.last_position.y],
            consecutive_matches: track.consecutive_matches,
            consecutive_misses: track.consecutive_misses,
        }
    }
}

impl FrameSummary {
    /// Whether two summaries report the same counts. Timestamps and the
    /// per-object details are ignored.
    pub fn same_counts(&self, other: &FrameSummary) -> bool {
        self.num_active_objects == other.num_active_objects
            && self.counts_by_class == other.counts_by_class
    }
}
