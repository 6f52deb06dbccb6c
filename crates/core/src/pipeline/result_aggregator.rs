use crate::tracking::domain::lifecycle::TrackLifecycleManager;
use crate::tracking::domain::track::Track;

use super::frame_result::FrameResult;

/// Packages the reportable tracks of one frame into a [`FrameResult`].
///
/// Pure: reads track state, never mutates it. Tentative tracks and lost
/// tracks past their grace window are left out.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn aggregate(
        &self,
        sequence_number: u64,
        timestamp: f64,
        tracks: &[Track],
        lifecycle: &TrackLifecycleManager,
    ) -> FrameResult {
        let mut snapshots: Vec<_> = tracks
            .iter()
            .filter(|t| lifecycle.is_reportable(t))
            .map(Track::snapshot)
            .collect();
        snapshots.sort_by_key(|s| s.track_id);

        FrameResult {
            sequence_number,
            timestamp,
            tracks: snapshots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::Detection;
    use crate::shared::bbox::BoundingBox;
    use crate::tracking::domain::track::TrackState;
    use crate::tracking::domain::tracker::{Tracker, TrackerConfig};

    fn det(x: f64) -> Detection {
        Detection::new(BoundingBox::new(x, 0.0, 50.0, 50.0), 0.9)
    }

    #[test]
    fn test_tentative_tracks_are_not_reported() {
        let mut tracker = Tracker::default();
        tracker.update(&[det(0.0)]).unwrap();

        let result = ResultAggregator.aggregate(0, 0.0, tracker.tracks(), tracker.lifecycle());
        assert!(result.is_empty());
        assert_eq!(tracker.tracks().len(), 1);
    }

    #[test]
    fn test_confirmed_and_lost_are_reported_in_id_order() {
        let mut tracker = Tracker::new(TrackerConfig {
            lifecycle: TrackLifecycleManager::new(1, 0, 5),
            ..TrackerConfig::default()
        });
        tracker.update(&[det(0.0), det(200.0), det(400.0)]).unwrap();
        tracker.update(&[det(400.0), det(0.0)]).unwrap();

        let result = ResultAggregator.aggregate(1, 0.04, tracker.tracks(), tracker.lifecycle());
        assert_eq!(result.sequence_number, 1);
        assert_eq!(result.timestamp, 0.04);
        assert_eq!(result.track_ids(), vec![1, 2, 3]);
        assert_eq!(result.tracks[1].state, TrackState::Lost);
    }

    #[test]
    fn test_aggregate_does_not_mutate() {
        let mut tracker = Tracker::default();
        for _ in 0..3 {
            tracker.update(&[det(0.0)]).unwrap();
        }
        let before = tracker.snapshots();
        let a = ResultAggregator.aggregate(2, 0.0, tracker.tracks(), tracker.lifecycle());
        let b = ResultAggregator.aggregate(2, 0.0, tracker.tracks(), tracker.lifecycle());
        assert_eq!(a, b);
        assert_eq!(tracker.snapshots(), before);
    }
}
