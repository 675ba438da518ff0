use std::path::PathBuf;

/// Errors surfaced by [`GazeDetector`](crate::pipeline::gaze_detector::GazeDetector).
///
/// Per-frame problems never show up here; they are logged and folded into a
/// NotForward prediction.
#[derive(Debug, thiserror::Error)]
pub enum GazeError {
    #[error("failed to load {kind} from {}: {reason}", path.display())]
    ModelLoad {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("detector has been released")]
    Released,
}

impl GazeError {
    pub(crate) fn model_load(
        kind: &'static str,
        path: impl Into<PathBuf>,
        reason: impl std::fmt::Display,
    ) -> Self {
        GazeError::ModelLoad {
            kind,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
