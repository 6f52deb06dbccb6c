use serde::{Deserialize, Serialize};

use crate::tracking::domain::track::TrackSnapshot;

/// Everything the serving layer learns about one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub sequence_number: u64,
    /// Seconds since the start of the source.
    pub timestamp: f64,
    /// Reportable tracks, ascending by `track_id`.
    pub tracks: Vec<TrackSnapshot>,
}

impl FrameResult {
    pub fn track_ids(&self) -> Vec<u32> {
        self.tracks.iter().map(|t| t.track_id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
