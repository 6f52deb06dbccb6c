use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_CONFIRM_MATCH_COUNT, DEFAULT_IOU_THRESHOLD,
    DEFAULT_LOST_TRACK_TTL, DEFAULT_MATCH_DISTANCE_CUTOFF, DEFAULT_MISS_GRACE_LIMIT,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SMOOTHING_FACTOR, DEFAULT_TENTATIVE_MISS_LIMIT,
    DEFAULT_WORKER_POOL_SIZE,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// What the reader does when the detector queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameDropPolicy {
    /// Stall the source until a slot frees up.
    #[default]
    Block,
    /// Evict the oldest queued frame to make room.
    DropOldest,
    /// Discard the frame that did not fit.
    DropNewest,
}

impl std::str::FromStr for FrameDropPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(FrameDropPolicy::Block),
            "drop_oldest" => Ok(FrameDropPolicy::DropOldest),
            "drop_newest" => Ok(FrameDropPolicy::DropNewest),
            other => Err(format!(
                "frame drop policy must be one of: block, drop_oldest, drop_newest, got '{other}'"
            )),
        }
    }
}

/// How the tracker pairs detections with tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationStrategy {
    /// Minimum-cost bipartite matching (Jonker–Volgenant).
    #[default]
    Optimal,
    /// Highest-IoU-first greedy pairing. Cheaper, may miss the global optimum.
    Greedy,
}

/// Tunables consumed by the detection/tracking core.
///
/// Missing fields in a settings file fall back to their defaults so that
/// partial files stay valid across versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub confidence_threshold: f64,
    pub iou_threshold: f64,
    pub min_box_size: f64,
    pub match_distance_cutoff: f64,
    pub smoothing_factor: f64,
    pub confirm_match_count: usize,
    pub miss_grace_limit: usize,
    pub lost_track_ttl: usize,
    pub tentative_miss_limit: usize,
    pub queue_capacity: usize,
    pub worker_pool_size: usize,
    pub frame_drop_policy: FrameDropPolicy,
    pub association: AssociationStrategy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            min_box_size: 0.0,
            match_distance_cutoff: DEFAULT_MATCH_DISTANCE_CUTOFF,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            confirm_match_count: DEFAULT_CONFIRM_MATCH_COUNT,
            miss_grace_limit: DEFAULT_MISS_GRACE_LIMIT,
            lost_track_ttl: DEFAULT_LOST_TRACK_TTL,
            tentative_miss_limit: DEFAULT_TENTATIVE_MISS_LIMIT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            frame_drop_policy: FrameDropPolicy::Block,
            association: AssociationStrategy::Optimal,
        }
    }
}

impl PipelineSettings {
    /// Default location: `<config dir>/FaceTrack/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceTrack").join("settings.json"))
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Self = serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads from the default location, falling back to defaults when the
    /// file is absent or unusable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring settings file: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        check_unit("confidence_threshold", self.confidence_threshold)?;
        check_unit("iou_threshold", self.iou_threshold)?;
        check_unit("match_distance_cutoff", self.match_distance_cutoff)?;
        check_unit("smoothing_factor", self.smoothing_factor)?;
        if !(self.min_box_size >= 0.0 && self.min_box_size.is_finite()) {
            return Err(invalid("min_box_size", "must be a non-negative number"));
        }
        if self.confirm_match_count == 0 || self.confirm_match_count > 64 {
            return Err(invalid("confirm_match_count", "must be between 1 and 64"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must be at least 1"));
        }
        if self.worker_pool_size == 0 {
            return Err(invalid("worker_pool_size", "must be at least 1"));
        }
        Ok(())
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), SettingsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(name, &format!("must be between 0.0 and 1.0, got {value}")))
    }
}

fn invalid(name: &'static str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = PipelineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.confirm_match_count, 3);
        assert_eq!(settings.miss_grace_limit, 5);
        assert_eq!(settings.queue_capacity, 4);
        assert_eq!(settings.frame_drop_policy, FrameDropPolicy::Block);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, r#"{"iou_threshold": 0.3, "frame_drop_policy": "drop_oldest"}"#).unwrap();

        let settings = PipelineSettings::load(&path).unwrap();
        assert_eq!(settings.iou_threshold, 0.3);
        assert_eq!(settings.frame_drop_policy, FrameDropPolicy::DropOldest);
        assert_eq!(settings.queue_capacity, 4);
        assert_eq!(settings.tentative_miss_limit, 0);
    }

    #[test]
    fn test_tentative_miss_limit_is_read_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, r#"{"tentative_miss_limit": 2}"#).unwrap();

        let settings = PipelineSettings::load(&path).unwrap();
        assert_eq!(settings.tentative_miss_limit, 2);
        assert_eq!(settings.miss_grace_limit, 5);
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("settings.json");
        let settings = PipelineSettings {
            worker_pool_size: 6,
            association: AssociationStrategy::Greedy,
            ..PipelineSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(PipelineSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let err = PipelineSettings::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let err = PipelineSettings::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, r#"{"queue_capacity": 0}"#).unwrap();
        let err = PipelineSettings::load(&path).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                name: "queue_capacity",
                ..
            }
        ));
    }

    #[rstest]
    #[case::confidence(PipelineSettings { confidence_threshold: 1.5, ..Default::default() })]
    #[case::iou(PipelineSettings { iou_threshold: -0.1, ..Default::default() })]
    #[case::smoothing(PipelineSettings { smoothing_factor: 2.0, ..Default::default() })]
    #[case::confirm(PipelineSettings { confirm_match_count: 0, ..Default::default() })]
    #[case::workers(PipelineSettings { worker_pool_size: 0, ..Default::default() })]
    #[case::min_size(PipelineSettings { min_box_size: f64::NAN, ..Default::default() })]
    fn test_validate_rejects(#[case] settings: PipelineSettings) {
        assert!(settings.validate().is_err());
    }

    #[rstest]
    #[case("block", FrameDropPolicy::Block)]
    #[case("drop_oldest", FrameDropPolicy::DropOldest)]
    #[case("drop_newest", FrameDropPolicy::DropNewest)]
    fn test_drop_policy_from_str(#[case] input: &str, #[case] expected: FrameDropPolicy) {
        assert_eq!(input.parse::<FrameDropPolicy>().unwrap(), expected);
    }

    #[test]
    fn test_drop_policy_from_str_rejects_unknown() {
        assert!("drop_all".parse::<FrameDropPolicy>().is_err());
    }
}
