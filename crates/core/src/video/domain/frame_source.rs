use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::shared::frame::Frame;

/// Properties of an opened frame source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    /// Nominal rate; 0 when unknown.
    pub fps: f64,
    /// 0 when the container does not say.
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}

impl SourceMetadata {
    /// Presentation time of frame `index` at the nominal rate.
    pub fn timestamp_of(&self, index: usize) -> Option<Duration> {
        (self.fps > 0.0 && self.fps.is_finite())
            .then(|| Duration::from_secs_f64(index as f64 / self.fps))
    }
}

/// Supplies sequentially ordered frames to the detector.
///
/// Implementations hide decoding details; frames come out in presentation
/// order with sequential indices starting at 0. Sources that know each
/// frame's presentation time attach it via [`Frame::with_timestamp`].
pub trait FrameSource: Send {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, Box<dyn std::error::Error>>;

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(fps: f64) -> SourceMetadata {
        SourceMetadata {
            width: 640,
            height: 480,
            fps,
            total_frames: 0,
            source_path: None,
        }
    }

    #[test]
    fn test_timestamp_from_fps() {
        assert_eq!(meta(25.0).timestamp_of(50), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_timestamp_unknown_rate() {
        assert_eq!(meta(0.0).timestamp_of(3), None);
        assert_eq!(meta(f64::INFINITY).timestamp_of(3), None);
    }
}
