use serde::{Deserialize, Serialize};

use crate::detection::domain::detection::Detection;
use crate::shared::bbox::BoundingBox;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Newly created, not yet trusted. Never reported.
    Tentative,
    Confirmed,
    /// Confirmed but currently unmatched; kept for a short grace window.
    Lost,
}

/// A persistent face identity across frames.
///
/// Only the tracker and lifecycle manager mutate a track; everything outside
/// `tracking::domain` sees it through accessors or a [`TrackSnapshot`].
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub(super) id: u32,
    pub(super) current_box: BoundingBox,
    pub(super) velocity: (f64, f64),
    pub(super) confidence: f64,
    pub(super) age: usize,
    pub(super) misses: usize,
    pub(super) state: TrackState,
    /// Bit `i` set when the track matched `i` frames ago (bit 0 = latest).
    pub(super) hit_history: u64,
    pub(super) hits: usize,
    pub(super) lost_frames: usize,
}

impl Track {
    /// A fresh tentative track seeded from an unmatched detection.
    /// The creating detection counts as the first hit.
    pub(super) fn new(id: u32, detection: &Detection) -> Self {
        Self {
            id,
            current_box: detection.bbox,
            velocity: (0.0, 0.0),
            confidence: detection.confidence,
            age: 1,
            misses: 0,
            state: TrackState::Tentative,
            hit_history: 1,
            hits: 1,
            lost_frames: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn current_box(&self) -> BoundingBox {
        self.current_box
    }

    pub fn velocity(&self) -> (f64, f64) {
        self.velocity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn age(&self) -> usize {
        self.age
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn lost_frames(&self) -> usize {
        self.lost_frames
    }

    /// Number of matches among the last `window` frames (capped at 64).
    pub fn recent_hits(&self, window: usize) -> usize {
        let mask = if window >= 64 {
            u64::MAX
        } else {
            (1u64 << window) - 1
        };
        (self.hit_history & mask).count_ones() as usize
    }

    /// Expected box for the coming frame: linear extrapolation over every
    /// frame since the last match.
    pub fn predicted_box(&self) -> BoundingBox {
        let steps = (self.misses + 1) as f64;
        self.current_box
            .translate(self.velocity.0 * steps, self.velocity.1 * steps)
    }

    /// Folds a matched detection into the track state.
    ///
    /// The new box is `alpha * detection + (1 - alpha) * predicted`. Velocity
    /// is the per-frame center displacement since the last match.
    pub(super) fn apply_match(&mut self, detection: &Detection, alpha: f64) {
        let steps = (self.misses + 1) as f64;
        let (old_cx, old_cy) = self.current_box.center();
        let smoothed = self.predicted_box().blend(&detection.bbox, alpha);
        let (new_cx, new_cy) = smoothed.center();

        self.velocity = ((new_cx - old_cx) / steps, (new_cy - old_cy) / steps);
        self.current_box = smoothed;
        self.confidence = alpha * detection.confidence + (1.0 - alpha) * self.confidence;
        self.misses = 0;
        self.age += 1;
        self.hits += 1;
        self.hit_history = (self.hit_history << 1) | 1;
    }

    pub(super) fn apply_miss(&mut self) {
        self.misses += 1;
        self.age += 1;
        self.hit_history <<= 1;
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            track_id: self.id,
            bbox: self.current_box,
            velocity: self.velocity,
            confidence: self.confidence,
            state: self.state,
            age: self.age,
            misses: self.misses,
        }
    }
}

/// Public, serializable view of a track at one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub track_id: u32,
    pub bbox: BoundingBox,
    pub velocity: (f64, f64),
    pub confidence: f64,
    pub state: TrackState,
    pub age: usize,
    pub misses: usize,
}
