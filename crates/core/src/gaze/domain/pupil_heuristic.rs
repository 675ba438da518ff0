use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::contrast::{equalize_histogram, threshold, ThresholdType};
use imageproc::definitions::Image;
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};

use super::prediction::PredictionLabel;

/// Whether the pupil check may veto the learned classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeuristicPolicy {
    /// Off-centre pupils are NotForward without running the model.
    #[default]
    Gate,
    /// Always run the model.
    Bypass,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicParams {
    pub policy: HeuristicPolicy,
    /// Equalized intensities at or below this are pupil candidates. The
    /// equalized value of a level is its cumulative share scaled to 255.
    pub pupil_threshold: u8,
    /// Inclusive range of centroid-x / eye-width accepted as centred.
    pub forward_band: (f64, f64),
}

impl Default for HeuristicParams {
    fn default() -> Self {
        Self {
            policy: HeuristicPolicy::Gate,
            pupil_threshold: 45,
            forward_band: (0.4, 0.6),
        }
    }
}

impl HeuristicParams {
    /// Heuristic verdict for an unresized grayscale eye crop.
    pub fn evaluate(&self, eye_gray: &GrayImage) -> PredictionLabel {
        let (lo, hi) = self.forward_band;
        match pupil_centroid_ratio(eye_gray, self.pupil_threshold) {
            Some(ratio) if ratio >= lo && ratio <= hi => PredictionLabel::Forward,
            _ => PredictionLabel::NotForward,
        }
    }
}

/// Horizontal position of the pupil as a fraction of eye width.
///
/// Equalizes, keeps pixels `<= pupil_threshold`, takes the largest
/// 8-connected dark region and returns its integer centroid column over the
/// width. `None` for an empty crop or when nothing is dark enough.
pub fn pupil_centroid_ratio(eye_gray: &GrayImage, pupil_threshold: u8) -> Option<f64> {
    let (width, height) = eye_gray.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let dark = threshold(
        &equalize_histogram(eye_gray),
        pupil_threshold,
        ThresholdType::BinaryInverted,
    );
    let labels = connected_components(&dark, Connectivity::Eight, Luma([0u8]));
    let (count, sum_x) = largest_region(&labels)?;

    let cx = (sum_x / count) as f64;
    Some(cx / width as f64)
}

/// `(pixel count, sum of x)` of the largest labelled region.
/// Equal sizes keep the region reached first in raster order.
fn largest_region(labels: &Image<Luma<u32>>) -> Option<(u64, u64)> {
    let mut order = Vec::new();
    let mut regions: HashMap<u32, (u64, u64)> = HashMap::new();
    for (x, _, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let region = regions.entry(label).or_insert_with(|| {
            order.push(label);
            (0, 0)
        });
        region.0 += 1;
        region.1 += x as u64;
    }

    order
        .iter()
        .map(|label| regions[label])
        .fold(None, |best: Option<(u64, u64)>, r| match best {
            Some(b) if b.0 >= r.0 => Some(b),
            _ => Some(r),
        })
}
