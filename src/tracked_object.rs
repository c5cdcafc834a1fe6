use crate::config::Config;
use nalgebra::Point2;
use std::{collections::BTreeMap, fmt};

pub type TrackMap = BTreeMap<TrackId, TrackedObject>;

/// The registry key of a tracked object.
///
/// Keys order by `seq`, the creation sequence number, so iterating a
/// [TrackMap] visits tracks in the order they were created.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId {
    pub seq: u64,
    pub class_label: String,
    pub created_at_ms: u64,
    pub detection_index: usize,
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.class_label, self.created_at_ms, self.detection_index
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackState {
    /// Followed but not yet counted.
    Tentative,
    /// Counted in the frame summary.
    Active,
}

/// One physical object followed across frames.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedObject {
    pub class_label: String,
    /// Last matched center. Kept unchanged while the object is missing.
    pub last_position: Point2<f64>,
    /// Timestamp of the last successful match.
    pub last_seen_ms: u64,
    pub first_seen_ms: u64,
    /// Exponentially smoothed confidence, `(7 * mean + sample) / 8`.
    pub mean_confidence: f64,
    pub consecutive_matches: u32,
    pub consecutive_misses: u32,
    pub is_active: bool,
}

impl TrackedObject {
    /// Start a track from its first detection. The creating detection counts
    /// as the first match.
    pub fn new(
        class_label: impl Into<String>,
        confidence: f64,
        position: Point2<f64>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            class_label: class_label.into(),
            last_position: position,
            last_seen_ms: timestamp_ms,
            first_seen_ms: timestamp_ms,
            mean_confidence: confidence,
            consecutive_matches: 1,
            consecutive_misses: 0,
            is_active: false,
        }
    }

    pub fn state(&self) -> TrackState {
        if self.is_active {
            TrackState::Active
        } else {
            TrackState::Tentative
        }
    }

    pub fn update(&mut self, confidence: f64, position: Point2<f64>, timestamp_ms: u64) {
        self.smooth_confidence(confidence);
        self.last_position = position;
        self.last_seen_ms = timestamp_ms;
        self.consecutive_misses = 0;
        self.consecutive_matches += 1;
    }

    /// Record a frame without a match. `last_seen_ms` and `last_position`
    /// keep their values from the last real match.
    pub fn missed_detection(&mut self, _timestamp_ms: u64) {
        self.smooth_confidence(0.0);
        self.consecutive_misses += 1;
        self.consecutive_matches = 0;
    }

    fn smooth_confidence(&mut self, sample: f64) {
        self.mean_confidence = (7.0 * self.mean_confidence + sample) / 8.0;
    }

    fn consecutive_matches_factor(&self) -> f64 {
        1.0 + 0.1 * self.consecutive_matches as f64
    }

    fn missed_penalty(&self) -> f64 {
        (1.0 - 0.1 * self.consecutive_misses as f64).max(0.0)
    }

    pub fn elapsed_since_seen_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_seen_ms)
    }

    /// Score used to promote a tentative track. Zero until the track has
    /// `min_consecutive_matches` matches in a row.
    pub fn activation_metric(&self, config: &Config) -> f64 {
        if self.consecutive_matches < config.min_consecutive_matches {
            return 0.0;
        }
        self.mean_confidence * self.consecutive_matches_factor() * self.missed_penalty()
    }

    /// Score used to evict an active track. Constant 100 during the grace
    /// period, then decays linearly to zero at `max_deactivation_time_ms`.
    pub fn deactivation_metric(&self, now_ms: u64, config: &Config) -> f64 {
        let elapsed = self.elapsed_since_seen_ms(now_ms);
        if elapsed < config.min_deactivation_time_ms {
            return 100.0;
        }

        let time_ratio = ((elapsed - config.min_deactivation_time_ms) as f64
            / config.deactivation_window_ms())
        .clamp(0.0, 1.0);

        self.mean_confidence
            * (1.0 - time_ratio)
            * self.consecutive_matches_factor()
            * self.missed_penalty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn person_at(x: f64, y: f64, confidence: f64) -> TrackedObject {
        TrackedObject::new("person", confidence, Point2::new(x, y), 0)
    }

    #[test]
    fn miss_decays_confidence_by_seven_eighths() {
        let mut obj = person_at(0.0, 0.0, 64.0);
        obj.missed_detection(100);
        assert_relative_eq!(obj.mean_confidence, 56.0);
        assert_eq!(obj.consecutive_matches, 0);
        assert_eq!(obj.consecutive_misses, 1);
        assert_eq!(obj.last_seen_ms, 0);
    }

    #[test]
    fn match_blends_confidence() {
        let mut obj = person_at(0.0, 0.0, 40.0);
        obj.missed_detection(100);
        obj.update(80.0, Point2::new(5.0, 5.0), 200);
        assert_relative_eq!(obj.mean_confidence, (7.0 * 35.0 + 80.0) / 8.0);
        assert_eq!(obj.consecutive_matches, 1);
        assert_eq!(obj.consecutive_misses, 0);
        assert_eq!(obj.last_seen_ms, 200);
        assert_eq!(obj.last_position, Point2::new(5.0, 5.0));
    }

    #[test]
    fn counters_are_never_both_nonzero() {
        let mut obj = person_at(0.0, 0.0, 50.0);
        for step in 0..20u64 {
            if step % 3 == 0 {
                obj.missed_detection(step * 100);
            } else {
                obj.update(50.0, Point2::new(0.0, 0.0), step * 100);
            }
            assert!(obj.consecutive_matches == 0 || obj.consecutive_misses == 0);
        }
    }

    #[test]
    fn activation_is_gated_by_match_streak() {
        let config = Config::default();
        let mut obj = person_at(0.0, 0.0, 100.0);
        for t in 1..4 {
            obj.update(100.0, Point2::new(0.0, 0.0), t * 100);
        }
        assert_eq!(obj.consecutive_matches, 4);
        assert_eq!(obj.activation_metric(&config), 0.0);

        obj.update(100.0, Point2::new(0.0, 0.0), 400);
        assert_relative_eq!(obj.activation_metric(&config), 150.0);
    }

    #[test]
    fn deactivation_metric_has_grace_period() {
        let config = Config::default();
        let obj = person_at(0.0, 0.0, 10.0);
        assert_eq!(obj.deactivation_metric(999, &config), 100.0);
        assert!(obj.deactivation_metric(1000, &config) < 100.0);
    }

    #[test]
    fn deactivation_metric_decays_linearly() {
        let config = Config::default();
        let obj = TrackedObject {
            mean_confidence: 70.0,
            consecutive_matches: 3,
            ..person_at(0.0, 0.0, 70.0)
        };

        assert_relative_eq!(
            obj.deactivation_metric(3000, &config),
            70.0 * 0.5 * 1.3,
            epsilon = 1e-9
        );
        assert_relative_eq!(obj.deactivation_metric(1000, &config), 70.0 * 1.3, epsilon = 1e-9);
        assert_eq!(obj.deactivation_metric(5000, &config), 0.0);
        assert_eq!(obj.deactivation_metric(9000, &config), 0.0);
    }

    #[test]
    fn missed_penalty_floors_at_zero() {
        let config = Config::default();
        let obj = TrackedObject {
            consecutive_matches: 0,
            consecutive_misses: 15,
            ..person_at(0.0, 0.0, 90.0)
        };
        assert_eq!(obj.deactivation_metric(2000, &config), 0.0);
    }

    #[test]
    fn track_id_display() {
        let id = TrackId {
            seq: 7,
            class_label: "dog".into(),
            created_at_ms: 1200,
            detection_index: 2,
        };
        assert_eq!(id.to_string(), "dog-1200-2");
    }
}
