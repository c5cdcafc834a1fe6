use crate::{
    config::Config,
    object::Detection,
    tracked_object::{TrackId, TrackMap},
};
use itertools::Itertools;
use noisy_float::types::{r64, R64};
use priority_matrix::PriorityMatrix;
use std::cmp::Reverse;
use tracing::trace;

/// Candidate pairs of (detection, track) that are allowed to match,
/// weighted so that the closest track of each detection row is on top.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    matrix: PriorityMatrix<Index, TrackId, Closeness>,
    num_detections: usize,
}

impl DistanceMatrix {
    pub fn remove_row_and_column(&mut self, pivot_row: &Index, pivot_col: &TrackId) {
        self.matrix.remove_row_and_column(pivot_row, pivot_col)
    }

    pub fn max_from_row(&self, row: &Index) -> Option<Element> {
        let entry = self.matrix.peek_from_row(row)?;
        Some(Element {
            det_idx: *entry.row,
            track_id: entry.column.clone(),
            distance: entry.weight.distance(),
        })
    }

    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pair detections with tracks in batch order. Each detection takes
    /// the nearest track not claimed by an earlier detection, so an earlier
    /// detection keeps a track even when a later one is closer to it.
    ///
    /// Equal distances go to the older track. The result has one slot per
    /// detection; `None` means the detection starts a new track.
    pub fn assign(mut self) -> Vec<Option<TrackId>> {
        (0..self.num_detections)
            .map(Index)
            .map(|det_idx| {
                let Element { track_id, .. } = self.max_from_row(&det_idx)?;
                self.remove_row_and_column(&det_idx, &track_id);
                Some(track_id)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Index(pub usize);

/// Matrix weight. Larger is better: smaller distance first, then lower
/// track sequence number.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Closeness {
    distance: Reverse<R64>,
    track_seq: Reverse<u64>,
}

impl Closeness {
    fn new(distance: f64, track_seq: u64) -> Self {
        Self {
            distance: Reverse(r64(distance)),
            track_seq: Reverse(track_seq),
        }
    }

    pub fn distance(&self) -> f64 {
        self.distance.0.raw()
    }
}

pub struct DistanceMatrixBuilder {
    max_distance: f64,
}

impl DistanceMatrixBuilder {
    pub fn new(config: &Config) -> Self {
        let Config { max_distance, .. } = *config;
        Self { max_distance }
    }

    /// Build the candidate matrix between a batch of detections and the
    /// tracks that existed before the batch. A pair is a candidate when the
    /// class labels agree and the centers are closer than `max_distance`.
    pub fn build_with_track_map(
        &self,
        detections: &[Detection],
        tracks: &TrackMap,
    ) -> DistanceMatrix {
        let matrix: PriorityMatrix<Index, TrackId, Closeness> = detections
            .iter()
            .enumerate()
            .cartesian_product(tracks.iter())
            .filter(|((_, det), (_, track))| det.class_label == track.class_label)
            .filter_map(|((det_idx, det), (track_id, track))| {
                let distance = nalgebra::distance(&det.center(), &track.last_position);
                (distance < self.max_distance).then(|| {
                    (
                        Index(det_idx),
                        track_id.clone(),
                        Closeness::new(distance, track_id.seq),
                    )
                })
            })
            .collect();

        trace!(
            "{} candidate pairs between {} detections and {} tracks",
            matrix.len(),
            detections.len(),
            tracks.len()
        );

        DistanceMatrix {
            matrix,
            num_detections: detections.len(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Element {
    pub det_idx: Index,
    pub track_id: TrackId,
    pub distance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{object::BBox, tracked_object::TrackedObject};
    use nalgebra::Point2;

    fn insert_track(tracks: &mut TrackMap, seq: u64, label: &str, x: f64, y: f64) -> TrackId {
        let id = TrackId {
            seq,
            class_label: label.into(),
            created_at_ms: 0,
            detection_index: seq as usize,
        };
        tracks.insert(
            id.clone(),
            TrackedObject::new(label, 80.0, Point2::new(x, y), 0),
        );
        id
    }

    /// A 20x20 detection centered on (cx, cy).
    fn det(label: &str, cx: f64, cy: f64) -> Detection {
        Detection::new(label, BBox::new(cx - 10.0, cy - 10.0, 20.0, 20.0), 80.0)
    }

    fn builder() -> DistanceMatrixBuilder {
        DistanceMatrixBuilder::new(&Config::default())
    }

    #[test]
    fn closer_detection_first_keeps_the_track() {
        let mut tracks = TrackMap::new();
        let id = insert_track(&mut tracks, 0, "person", 100.0, 100.0);

        let detections = vec![det("person", 110.0, 100.0), det("person", 130.0, 100.0)];
        let assignments = builder()
            .build_with_track_map(&detections, &tracks)
            .assign();
        assert_eq!(assignments, vec![Some(id), None]);
    }

    #[test]
    fn earlier_detection_claims_its_nearest_track() {
        let mut tracks = TrackMap::new();
        let left = insert_track(&mut tracks, 0, "person", 0.0, 0.0);
        insert_track(&mut tracks, 1, "person", 150.0, 0.0);

        // 70 from left, 80 from right; the later detection at 10 is closer
        // to left but finds it taken, and right is out of range.
        let detections = vec![det("person", 70.0, 0.0), det("person", 10.0, 0.0)];
        let assignments = builder()
            .build_with_track_map(&detections, &tracks)
            .assign();
        assert_eq!(assignments, vec![Some(left), None]);
    }

    #[test]
    fn labels_must_agree() {
        let mut tracks = TrackMap::new();
        insert_track(&mut tracks, 0, "cat", 0.0, 0.0);

        let detections = vec![det("dog", 0.0, 0.0)];
        let matrix = builder().build_with_track_map(&detections, &tracks);
        assert!(matrix.is_empty());
        assert_eq!(matrix.assign(), vec![None]);
    }

    #[test]
    fn distance_bound_is_exclusive() {
        let mut tracks = TrackMap::new();
        insert_track(&mut tracks, 0, "person", 0.0, 0.0);

        let detections = vec![det("person", 100.0, 0.0), det("person", 0.0, 99.5)];
        let matrix = builder().build_with_track_map(&detections, &tracks);
        assert_eq!(matrix.len(), 1);
        assert!(matrix.max_from_row(&Index(0)).is_none());
        let best = matrix.max_from_row(&Index(1)).unwrap();
        assert_eq!(best.det_idx, Index(1));
        assert!((best.distance - 99.5).abs() < 1e-9);
    }

    #[test]
    fn equal_distances_go_to_the_older_track() {
        let mut tracks = TrackMap::new();
        let older = insert_track(&mut tracks, 3, "person", 40.0, 0.0);
        let newer = insert_track(&mut tracks, 9, "person", -40.0, 0.0);

        let detections = vec![det("person", 0.0, 0.0), det("person", 0.0, 0.0)];
        let assignments = builder()
            .build_with_track_map(&detections, &tracks)
            .assign();
        assert_eq!(assignments, vec![Some(older), Some(newer)]);
    }

    #[test]
    fn each_track_is_used_once() {
        let mut tracks = TrackMap::new();
        let a = insert_track(&mut tracks, 0, "person", 0.0, 0.0);
        let b = insert_track(&mut tracks, 1, "person", 200.0, 0.0);

        let detections = vec![
            det("person", 5.0, 0.0),
            det("person", 195.0, 0.0),
            det("person", 10.0, 0.0),
        ];
        let assignments = builder()
            .build_with_track_map(&detections, &tracks)
            .assign();
        assert_eq!(assignments, vec![Some(a), Some(b), None]);
    }
}
