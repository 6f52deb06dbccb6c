use crate::detection::domain::detection::Detection;
use crate::shared::constants::{DEFAULT_MATCH_DISTANCE_CUTOFF, DEFAULT_SMOOTHING_FACTOR};
use crate::shared::settings::{AssociationStrategy, PipelineSettings};

use super::assignment::{self, AssignmentInfeasible, CostMatrix};
use super::lifecycle::{LifecycleEvent, TrackLifecycleManager, Verdict};
use super::track::{Track, TrackSnapshot};

#[derive(Clone, Debug, PartialEq)]
pub struct TrackerConfig {
    /// Pairs with `1 - IoU` above this are never matched.
    pub match_distance_cutoff: f64,
    /// Weight of the new observation in box and confidence smoothing.
    pub smoothing_factor: f64,
    pub association: AssociationStrategy,
    pub lifecycle: TrackLifecycleManager,
}

impl TrackerConfig {
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            match_distance_cutoff: settings.match_distance_cutoff,
            smoothing_factor: settings.smoothing_factor,
            association: settings.association,
            lifecycle: TrackLifecycleManager::from_settings(settings),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_distance_cutoff: DEFAULT_MATCH_DISTANCE_CUTOFF,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            association: AssociationStrategy::Optimal,
            lifecycle: TrackLifecycleManager::default(),
        }
    }
}

/// Associates per-frame detections into persistent tracks.
///
/// Owns the live track set and the id counter; both are per-instance so
/// independent pipelines never share identities. Tracks are kept in
/// ascending id order, which is also the tie-break order for matching.
pub struct Tracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u32,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Advances every track by one frame.
    ///
    /// `detections` should already be filtered; an empty slice is a frame in
    /// which nothing was seen. On error the track set is left untouched.
    pub fn update(
        &mut self,
        detections: &[Detection],
    ) -> Result<Vec<LifecycleEvent>, AssignmentInfeasible> {
        let costs = self.cost_matrix(detections);
        let assignment = assignment::solve(&costs, self.config.association);
        assignment::verify(&costs, &assignment)?;

        let alpha = self.config.smoothing_factor;
        let lifecycle = &self.config.lifecycle;
        let mut events = Vec::new();
        let mut claimed = vec![false; detections.len()];
        let mut verdicts = Vec::with_capacity(self.tracks.len());

        for (track, matched) in self.tracks.iter_mut().zip(&assignment) {
            let verdict = match *matched {
                Some(d) => {
                    claimed[d] = true;
                    track.apply_match(&detections[d], alpha);
                    events.extend(lifecycle.on_hit(track));
                    Verdict::Keep
                }
                None => {
                    track.apply_miss();
                    let (verdict, event) = lifecycle.on_miss(track);
                    events.extend(event);
                    verdict
                }
            };
            verdicts.push(verdict);
        }
        let mut verdicts = verdicts.into_iter();
        self.tracks
            .retain(|_| verdicts.next() == Some(Verdict::Keep));

        for (d, detection) in detections.iter().enumerate() {
            if claimed[d] {
                continue;
            }
            let mut track = Track::new(self.next_id, detection);
            self.next_id += 1;
            events.push(LifecycleEvent::Created(track.id()));
            events.extend(lifecycle.on_hit(&mut track));
            self.tracks.push(track);
        }

        Ok(events)
    }

    /// Every live track, in ascending id order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn lifecycle(&self) -> &TrackLifecycleManager {
        &self.config.lifecycle
    }

    pub fn snapshots(&self) -> Vec<TrackSnapshot> {
        self.tracks.iter().map(Track::snapshot).collect()
    }

    /// Drops all tracks and restarts id allocation at 1.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }

    fn cost_matrix(&self, detections: &[Detection]) -> CostMatrix {
        let mut costs = CostMatrix::forbidden(self.tracks.len(), detections.len());
        for (r, track) in self.tracks.iter().enumerate() {
            let predicted = track.predicted_box();
            for (c, detection) in detections.iter().enumerate() {
                let cost = 1.0 - predicted.iou(&detection.bbox);
                if cost <= self.config.match_distance_cutoff {
                    costs.set(r, c, cost);
                }
            }
        }
        costs
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
