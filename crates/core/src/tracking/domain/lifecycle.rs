use crate::shared::constants::{
    DEFAULT_CONFIRM_MATCH_COUNT, DEFAULT_LOST_TRACK_TTL, DEFAULT_MISS_GRACE_LIMIT,
    DEFAULT_TENTATIVE_MISS_LIMIT,
};
use crate::shared::settings::PipelineSettings;

use super::track::{Track, TrackState};

/// A state change worth telling the outside world about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created(u32),
    Confirmed(u32),
    Lost(u32),
    /// A lost track matched again and keeps its id.
    Resurrected(u32),
    Removed(u32),
}

/// Whether a track survives the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Remove,
}

/// Owns the TENTATIVE → CONFIRMED → LOST → removed rules.
///
/// - Tentative confirms once it matched in every one of its last
///   `confirm_match_count` frames (the creating detection counts).
/// - Tentative is removed once its consecutive misses exceed
///   `tentative_miss_limit`.
/// - Confirmed keeps coasting while `misses <= miss_grace_limit` and goes
///   lost on the next miss.
/// - Lost is removed once it has been lost for more than `lost_track_ttl`
///   frames.
/// - Lost matched again goes straight back to confirmed.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackLifecycleManager {
    pub confirm_match_count: usize,
    pub miss_grace_limit: usize,
    pub lost_track_ttl: usize,
    pub tentative_miss_limit: usize,
}

impl TrackLifecycleManager {
    pub fn new(confirm_match_count: usize, miss_grace_limit: usize, lost_track_ttl: usize) -> Self {
        Self {
            confirm_match_count,
            miss_grace_limit,
            lost_track_ttl,
            tentative_miss_limit: DEFAULT_TENTATIVE_MISS_LIMIT,
        }
    }

    pub fn with_tentative_miss_limit(mut self, limit: usize) -> Self {
        self.tentative_miss_limit = limit;
        self
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(
            settings.confirm_match_count,
            settings.miss_grace_limit,
            settings.lost_track_ttl,
        )
        .with_tentative_miss_limit(settings.tentative_miss_limit)
    }

    /// Called after a track was created or matched this frame.
    pub fn on_hit(&self, track: &mut Track) -> Option<LifecycleEvent> {
        match track.state {
            TrackState::Tentative => {
                let window = self.confirm_match_count.max(1);
                if track.recent_hits(window) >= window {
                    track.state = TrackState::Confirmed;
                    Some(LifecycleEvent::Confirmed(track.id))
                } else {
                    None
                }
            }
            TrackState::Lost => {
                track.state = TrackState::Confirmed;
                track.lost_frames = 0;
                Some(LifecycleEvent::Resurrected(track.id))
            }
            TrackState::Confirmed => None,
        }
    }

    /// Called after a track went unmatched this frame.
    pub fn on_miss(&self, track: &mut Track) -> (Verdict, Option<LifecycleEvent>) {
        match track.state {
            TrackState::Tentative if track.misses > self.tentative_miss_limit => {
                (Verdict::Remove, Some(LifecycleEvent::Removed(track.id)))
            }
            TrackState::Tentative => (Verdict::Keep, None),
            TrackState::Confirmed if track.misses > self.miss_grace_limit => {
                track.state = TrackState::Lost;
                track.lost_frames = 1;
                if self.expired(track) {
                    (Verdict::Remove, Some(LifecycleEvent::Removed(track.id)))
                } else {
                    (Verdict::Keep, Some(LifecycleEvent::Lost(track.id)))
                }
            }
            TrackState::Confirmed => (Verdict::Keep, None),
            TrackState::Lost => {
                track.lost_frames += 1;
                if self.expired(track) {
                    (Verdict::Remove, Some(LifecycleEvent::Removed(track.id)))
                } else {
                    (Verdict::Keep, None)
                }
            }
        }
    }

    /// Confirmed tracks (coasting included) and lost tracks still inside
    /// their retention window.
    pub fn is_reportable(&self, track: &Track) -> bool {
        match track.state {
            TrackState::Confirmed => true,
            TrackState::Lost => !self.expired(track),
            TrackState::Tentative => false,
        }
    }

    fn expired(&self, track: &Track) -> bool {
        track.lost_frames > self.lost_track_ttl
    }
}

impl Default for TrackLifecycleManager {
    fn default() -> Self {
        Self::new(
            DEFAULT_CONFIRM_MATCH_COUNT,
            DEFAULT_MISS_GRACE_LIMIT,
            DEFAULT_LOST_TRACK_TTL,
        )
    }
}
