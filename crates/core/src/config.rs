use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detection::infrastructure::cascade_detector::CascadeParams;
use crate::detection::infrastructure::correlation_tracker::TrackerParams;
use crate::gaze::domain::engagement::EngagementTimings;
use crate::gaze::domain::gaze_classifier::ChannelOrder;
use crate::gaze::domain::prediction::LabelSet;
use crate::gaze::domain::prediction_history::DEFAULT_HISTORY_SIZE;
use crate::gaze::domain::pupil_heuristic::HeuristicParams;
use crate::shared::constants::{
    DEFAULT_DETECTION_INTERVAL, DEFAULT_EYE_CASCADE_PATH, DEFAULT_FACE_CASCADE_PATH,
    DEFAULT_INPUT_SHAPE, DEFAULT_MODEL_PATH,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Every tunable of the detector. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    pub model_path: PathBuf,
    pub face_cascade_path: PathBuf,
    pub eye_cascade_path: PathBuf,
    pub input_shape: (u32, u32),
    pub detection_interval: usize,
    pub history_size: usize,
    pub engagement: EngagementTimings,
    pub face_search: CascadeParams,
    pub eye_search: CascadeParams,
    pub tracker: TrackerParams,
    pub heuristic: HeuristicParams,
    pub labels: LabelSet,
    pub channel_order: ChannelOrder,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            face_cascade_path: PathBuf::from(DEFAULT_FACE_CASCADE_PATH),
            eye_cascade_path: PathBuf::from(DEFAULT_EYE_CASCADE_PATH),
            input_shape: DEFAULT_INPUT_SHAPE,
            detection_interval: DEFAULT_DETECTION_INTERVAL,
            history_size: DEFAULT_HISTORY_SIZE,
            engagement: EngagementTimings::default(),
            face_search: CascadeParams::FACE,
            eye_search: CascadeParams::EYE,
            tracker: TrackerParams::default(),
            heuristic: HeuristicParams::default(),
            labels: LabelSet::default(),
            channel_order: ChannelOrder::default(),
        }
    }
}

impl GazeConfig {
    /// Read a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GazeConfig =
            serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.input_shape.0 == 0 || self.input_shape.1 == 0 {
            return invalid(format!("input_shape must be non-zero, got {:?}", self.input_shape));
        }
        if self.detection_interval == 0 {
            return invalid("detection_interval must be >= 1".into());
        }
        if self.history_size == 0 {
            return invalid("history_size must be >= 1".into());
        }
        for (name, secs, window) in [
            ("threshold_secs", self.engagement.threshold_secs, self.engagement.threshold()),
            (
                "lookaway_grace_secs",
                self.engagement.lookaway_grace_secs,
                self.engagement.lookaway_grace(),
            ),
        ] {
            if window.is_none() {
                return invalid(format!("{name} must be a non-negative duration, got {secs}"));
            }
        }
        for (name, params) in [("face_search", &self.face_search), ("eye_search", &self.eye_search)] {
            if params.scale_factor.is_nan() || params.scale_factor <= 1.0 {
                return invalid(format!(
                    "{name}.scale_factor must be > 1, got {}",
                    params.scale_factor
                ));
            }
        }
        if self.tracker.template_size < 4 {
            return invalid("tracker.template_size must be >= 4".into());
        }
        let (lo, hi) = self.heuristic.forward_band;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return invalid(format!("heuristic.forward_band must satisfy 0 <= lo <= hi <= 1, got ({lo}, {hi})"));
        }
        if self.labels.is_empty() {
            return invalid("labels.classes must not be empty".into());
        }
        let unknown = self.labels.unknown_forward_names();
        if !unknown.is_empty() {
            return invalid(format!("labels.forward names unknown classes: {unknown:?}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(GazeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let c = GazeConfig::default();
        assert_eq!(c.input_shape, (64, 64));
        assert_eq!(c.detection_interval, 10);
        assert_eq!(c.history_size, 5);
        assert_eq!(c.face_search.min_neighbors, 5);
        assert_eq!(c.eye_search.min_neighbors, 3);
        assert_eq!(c.heuristic.pupil_threshold, 45);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let file = write_config(r#"{ "history_size": 7, "engagement": { "threshold_secs": 2.0 } }"#);
        let c = GazeConfig::load(file.path()).unwrap();
        assert_eq!(c.history_size, 7);
        assert_eq!(c.engagement.threshold_secs, 2.0);
        assert_eq!(c.engagement.lookaway_grace_secs, 0.5);
        assert_eq!(c.detection_interval, 10);
    }

    #[test]
    fn test_directional_labels_from_file() {
        let file = write_config(
            r#"{ "labels": { "classes": ["forward_look", "close_look", "left_look", "right_look"],
                             "forward": ["forward_look", "close_look"] },
                 "heuristic": { "policy": "bypass" } }"#,
        );
        let c = GazeConfig::load(file.path()).unwrap();
        assert_eq!(c.labels, LabelSet::directional());
        assert_eq!(c.heuristic.policy, crate::gaze::domain::pupil_heuristic::HeuristicPolicy::Bypass);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = GazeConfig::load(Path::new("/nonexistent/gaze.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let file = write_config("{ not json");
        assert!(matches!(GazeConfig::load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let file = write_config(r#"{ "detection_interval": 0 }"#);
        assert!(matches!(GazeConfig::load(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_out_of_range_timings_rejected() {
        for (threshold_secs, lookaway_grace_secs) in
            [(1e20, 0.5), (1.5, f64::INFINITY), (-0.5, 0.5), (f64::NAN, 0.5)]
        {
            let c = GazeConfig {
                engagement: EngagementTimings {
                    threshold_secs,
                    lookaway_grace_secs,
                },
                ..GazeConfig::default()
            };
            assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_huge_threshold_in_file_rejected() {
        let file = write_config(r#"{ "engagement": { "threshold_secs": 1e20 } }"#);
        assert!(matches!(GazeConfig::load(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_forward_label_rejected() {
        let c = GazeConfig {
            labels: LabelSet::new(vec!["forward", "not_forward"], vec!["ahead"]),
            ..GazeConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_scale_factor_must_exceed_one() {
        let mut c = GazeConfig::default();
        c.eye_search.scale_factor = 1.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_inverted_band_rejected() {
        let mut c = GazeConfig::default();
        c.heuristic.forward_band = (0.7, 0.3);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_round_trips_through_json() {
        let c = GazeConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let back: GazeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
