use crate::{
    config::Config,
    tracked_object::{TrackId, TrackMap, TrackedObject},
};
use itertools::Itertools;
use std::collections::BTreeMap;
use tracing::debug;

/// Number of active tracks, in total and per class label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActiveCounts {
    pub total: usize,
    pub by_class: BTreeMap<String, usize>,
}

/// Drives the Tentative -> Active -> Evicted transitions of the tracks in
/// one registry.
pub struct LifecycleManager {
    config: Config,
}

impl LifecycleManager {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Whether a track should be dropped before association. A track unseen
    /// for longer than `max_deactivation_time_ms` is gone regardless of its
    /// state; a tentative track older than `max_tentative_time_ms` is dropped
    /// even while it keeps matching.
    pub fn is_stale(&self, track: &TrackedObject, now_ms: u64) -> bool {
        if track.elapsed_since_seen_ms(now_ms) > self.config.max_deactivation_time_ms {
            return true;
        }
        match self.config.max_tentative_time_ms {
            Some(max_age) if !track.is_active => {
                now_ms.saturating_sub(track.first_seen_ms) > max_age
            }
            _ => false,
        }
    }

    /// Remove stale tracks and return their ids. Running it twice with the
    /// same timestamp removes nothing the second time.
    pub fn prune_stale(&self, tracks: &mut TrackMap, now_ms: u64) -> Vec<TrackId> {
        let keys: Vec<TrackId> = tracks
            .iter()
            .filter(|(_, track)| self.is_stale(track, now_ms))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            let track = tracks.remove(key);
            debug!(
                "pruned stale track {} (active: {})",
                key,
                track.map_or(false, |t| t.is_active)
            );
        }
        keys
    }

    /// Promote a tentative track whose activation metric reached the
    /// threshold. Returns true when the track became active.
    pub fn try_activate(&self, key: &TrackId, track: &mut TrackedObject) -> bool {
        if track.is_active {
            return false;
        }
        let metric = track.activation_metric(&self.config);
        if metric < self.config.activation_threshold {
            return false;
        }
        track.is_active = true;
        debug!("activated track {} (metric {:.2})", key, metric);
        true
    }

    /// Evict every active track whose deactivation metric fell below the
    /// threshold. Deactivated tracks are removed, not kept for reactivation.
    pub fn evict_deactivated(&self, tracks: &mut TrackMap, now_ms: u64) -> Vec<TrackId> {
        let keys: Vec<TrackId> = tracks
            .iter()
            .filter(|(_, track)| track.is_active)
            .filter(|(_, track)| {
                track.deactivation_metric(now_ms, &self.config) < self.config.deactivation_threshold
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            if let Some(track) = tracks.remove(key) {
                debug!(
                    "evicted track {} after {} ms unseen",
                    key,
                    track.elapsed_since_seen_ms(now_ms)
                );
            }
        }
        keys
    }

    pub fn count_active(tracks: &TrackMap) -> ActiveCounts {
        let by_class: BTreeMap<String, usize> = tracks
            .values()
            .filter(|track| track.is_active)
            .map(|track| track.class_label.as_str())
            .sorted()
            .dedup_with_count()
            .map(|(count, label)| (label.to_string(), count))
            .collect();
        let total = by_class.values().sum();

        ActiveCounts { total, by_class }
    }
}
