use crate::{
    config::Config,
    distance_matrix::DistanceMatrixBuilder,
    error::{Error, Result},
    lifecycle::{ActiveCounts, LifecycleManager},
    object::Detection,
    summary::{ActiveObject, FrameSummary},
    tracked_object::{TrackId, TrackMap, TrackedObject},
};
use std::{
    ops::RangeFrom,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, trace, warn};

/// This is the main struct to perform object tracking on one detection
/// stream. Independent streams need independent trackers.
pub struct Tracker {
    track_map: TrackMap,
    unique_id_iter: RangeFrom<u64>,
    last_timestamp_ms: Option<u64>,
    lifecycle: LifecycleManager,
    distance_matrix_builder: DistanceMatrixBuilder,
}

impl Tracker {
    /// This is the function to build a Tracker. The config is validated
    /// first.
    ///
    /// Example:
    ///
    /// ```rust
    /// use det_tracking::config::Config;
    /// use det_tracking::Tracker;
    ///
    /// let config = Config {
    ///     max_distance: 80.0,
    ///     ..Config::default()
    /// };
    /// let tracker = Tracker::new(&config).unwrap();
    /// assert!(tracker.is_empty());
    /// ```
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            track_map: TrackMap::new(),
            unique_id_iter: 0..,
            last_timestamp_ms: None,
            lifecycle: LifecycleManager::new(config),
            distance_matrix_builder: DistanceMatrixBuilder::new(config),
        })
    }

    /// This is the function to track objects in one frame.
    ///
    /// The whole batch is validated before the tracker state is touched; a
    /// rejected frame leaves the tracker as it was. An empty batch is a
    /// valid frame that only ages the existing tracks.
    ///
    /// Example:
    ///
    /// ```rust
    /// # use det_tracking::config::Config;
    /// # use det_tracking::Tracker;
    /// use det_tracking::object::{BBox, Detection};
    ///
    /// let mut tracker = Tracker::new(&Config::default()).unwrap();
    /// for frame in 0..5 {
    ///     let detections = vec![Detection::new("person", BBox::new(100., 100., 40., 80.), 80.)];
    ///     let summary = tracker.process_frame(&detections, frame * 100).unwrap();
    ///     assert_eq!(summary.num_active_objects, if frame == 4 { 1 } else { 0 });
    /// }
    /// ```
    pub fn process_frame(
        &mut self,
        detections: &[Detection],
        timestamp_ms: u64,
    ) -> Result<FrameSummary> {
        if let Err(err) = self.validate_frame(detections, timestamp_ms) {
            warn!("rejected frame at {} ms: {}", timestamp_ms, err);
            return Err(err);
        }
        self.last_timestamp_ms = Some(timestamp_ms);

        trace!(
            "frame at {} ms: {} detections, {} tracks",
            timestamp_ms,
            detections.len(),
            self.track_map.len()
        );

        // Remove tracks that are gone before they can be matched
        self.lifecycle.prune_stale(&mut self.track_map, timestamp_ms);

        self.associate(detections, timestamp_ms);

        self.lifecycle
            .evict_deactivated(&mut self.track_map, timestamp_ms);

        Ok(self.build_summary(timestamp_ms))
    }

    /// Same as [Tracker::process_frame], stamped with the system clock in
    /// milliseconds since the Unix epoch.
    pub fn process_frame_now(&mut self, detections: &[Detection]) -> Result<FrameSummary> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        // Keep the clock monotonic from the tracker's point of view.
        let now_ms = now_ms.max(self.last_timestamp_ms.unwrap_or(0));
        self.process_frame(detections, now_ms)
    }

    fn validate_frame(&self, detections: &[Detection], timestamp_ms: u64) -> Result<()> {
        if let Some(previous) = self.last_timestamp_ms {
            if timestamp_ms < previous {
                return Err(Error::NonMonotonicTimestamp {
                    previous,
                    current: timestamp_ms,
                });
            }
        }
        detections
            .iter()
            .enumerate()
            .try_for_each(|(index, det)| det.validate(index))
    }

    /// Match the batch against the tracks alive at the start of the frame,
    /// start new tracks for the leftovers and age the unmatched tracks.
    fn associate(&mut self, detections: &[Detection], timestamp_ms: u64) {
        let assignments = self
            .distance_matrix_builder
            .build_with_track_map(detections, &self.track_map)
            .assign();

        let mut unmatched: Vec<TrackId> = self.track_map.keys().cloned().collect();
        unmatched.retain(|key| !assignments.iter().flatten().any(|matched| matched == key));

        let mut spawned = vec![];
        for (index, (det, assignment)) in detections.iter().zip(assignments).enumerate() {
            let Some(track_id) = assignment else {
                spawned.push(index);
                continue;
            };
            if let Some(track) = self.track_map.get_mut(&track_id) {
                track.update(det.confidence, det.center(), timestamp_ms);
                self.lifecycle.try_activate(&track_id, track);
            }
        }

        for (index, seq) in spawned.into_iter().zip(&mut self.unique_id_iter) {
            let det = &detections[index];
            let track_id = TrackId {
                seq,
                class_label: det.class_label.clone(),
                created_at_ms: timestamp_ms,
                detection_index: index,
            };
            debug!("new track {}", track_id);
            self.track_map.insert(
                track_id,
                TrackedObject::new(
                    det.class_label.clone(),
                    det.confidence,
                    det.center(),
                    timestamp_ms,
                ),
            );
        }

        for key in &unmatched {
            if let Some(track) = self.track_map.get_mut(key) {
                track.missed_detection(timestamp_ms);
            }
        }
    }

    fn build_summary(&self, timestamp_ms: u64) -> FrameSummary {
        let ActiveCounts { total, by_class } = LifecycleManager::count_active(&self.track_map);
        let active_objects = self
            .track_map
            .iter()
            .filter(|(_, track)| track.is_active)
            .map(|(id, track)| ActiveObject::from_track(id, track))
            .collect();

        FrameSummary {
            timestamp_ms,
            num_active_objects: total,
            counts_by_class: by_class,
            active_objects,
        }
    }

    /// Tracks in creation order.
    pub fn tracked_objects(&self) -> impl Iterator<Item = (&TrackId, &TrackedObject)> {
        self.track_map.iter()
    }

    pub fn len(&self) -> usize {
        self.track_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track_map.is_empty()
    }

    pub fn last_timestamp_ms(&self) -> Option<u64> {
        self.last_timestamp_ms
    }
}
