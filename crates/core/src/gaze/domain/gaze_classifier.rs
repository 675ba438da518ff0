use image::RgbImage;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::eye_regions::EyeRegionPair;
use super::prediction::{LabelSet, PredictionLabel};
use super::pupil_heuristic::{HeuristicParams, HeuristicPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model returned {got} scores, label set has {expected}")]
    ShapeMismatch { expected: usize, got: usize },
}

/// A learned gaze classifier: one NHWC `(1, H, W, 3)` tensor in `[0, 1]`
/// in, one score per class out.
pub trait GazeModel: Send {
    fn scores(&mut self, input: Array4<f32>) -> Result<Vec<f32>, ClassifierError>;
}

/// Channel order the model was trained on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    #[default]
    Bgr,
}

/// Pixels scaled to `[0, 1]` as a `(1, H, W, 3)` tensor.
pub fn to_input_tensor(img: &RgbImage, order: ChannelOrder) -> Array4<f32> {
    let (w, h) = img.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, h as usize, w as usize, 3));
    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b] = px.0;
        let channels = match order {
            ChannelOrder::Rgb => [r, g, b],
            ChannelOrder::Bgr => [b, g, r],
        };
        for (c, v) in channels.into_iter().enumerate() {
            tensor[[0, y as usize, x as usize, c]] = v as f32 / 255.0;
        }
    }
    tensor
}

/// Two-stage gaze decision: the pupil heuristic first, the model only for
/// candidates the heuristic lets through.
pub struct GazeClassifier {
    model: Box<dyn GazeModel>,
    labels: LabelSet,
    heuristic: HeuristicParams,
    channel_order: ChannelOrder,
    model_invocations: u64,
}

impl GazeClassifier {
    pub fn new(
        model: Box<dyn GazeModel>,
        labels: LabelSet,
        heuristic: HeuristicParams,
        channel_order: ChannelOrder,
    ) -> Self {
        Self {
            model,
            labels,
            heuristic,
            channel_order,
            model_invocations: 0,
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn model_invocations(&self) -> u64 {
        self.model_invocations
    }

    pub fn classify(&mut self, eyes: &EyeRegionPair) -> Result<PredictionLabel, ClassifierError> {
        if self.heuristic.policy == HeuristicPolicy::Gate
            && !self.heuristic.evaluate(&eyes.left_gray).is_forward()
        {
            log::trace!("pupil heuristic rejected frame");
            return Ok(PredictionLabel::NotForward);
        }

        let input = to_input_tensor(&eyes.model_input, self.channel_order);
        self.model_invocations += 1;
        let scores = self.model.scores(input)?;
        if scores.len() != self.labels.len() {
            return Err(ClassifierError::ShapeMismatch {
                expected: self.labels.len(),
                got: scores.len(),
            });
        }
        Ok(self.labels.label_for_scores(&scores))
    }
}
