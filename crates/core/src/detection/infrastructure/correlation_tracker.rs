use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use serde::{Deserialize, Serialize};

use crate::detection::domain::face_tracker::FaceTracker;
use crate::shared::bounding_box::BoundingBox;

/// Tuning for [`CorrelationTracker`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    /// Side length of the square template the face patch is resampled to.
    pub template_size: u32,
    /// Search margin around the previous box, as a fraction of its size.
    pub search_padding: f64,
    /// Peaks below this normalized correlation count as a lost target.
    pub min_confidence: f64,
    /// Weight of the newest patch when refreshing the template.
    pub learning_rate: f64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            template_size: 32,
            search_padding: 0.5,
            min_confidence: 0.45,
            learning_rate: 0.15,
        }
    }
}

struct Target {
    bbox: BoundingBox,
    /// Face patch resampled to `template_size` square.
    template: GrayImage,
}

/// Single-target template tracker.
///
/// The face patch is resampled to a fixed-size template; each update searches
/// a padded window around the last box at the template's scale, so the box
/// size stays fixed between detections and only its position moves. The
/// best position is the normalized squared-error minimum, and the match is
/// accepted when the patch there correlates with the template.
pub struct CorrelationTracker {
    params: TrackerParams,
    target: Option<Target>,
}

impl CorrelationTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self {
            params,
            target: None,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.target.is_some()
    }

    fn sample_patch(&self, gray: &GrayImage, bbox: &BoundingBox) -> Option<GrayImage> {
        let clipped = bbox.clipped(gray.width(), gray.height())?;
        let size = self.params.template_size.max(1);
        Some(resize_exact(&crop(gray, &clipped), size, size))
    }

    /// Best match of `template` inside `search`, as `(u, v, score)`.
    fn best_match(&self, search: &GrayImage, template: &GrayImage) -> Option<(u32, u32, f64)> {
        let (tw, th) = template.dimensions();
        if search.width() < tw || search.height() < th {
            return None;
        }

        let errors = match_template(
            search,
            template,
            MatchTemplateMethod::SumOfSquaredErrorsNormalized,
        );
        let (u, v) = find_extremes(&errors).min_value_location;
        let patch = imageops::crop_imm(search, u, v, tw, th).to_image();
        let score = correlation(template, &patch)?;
        Some((u, v, score))
    }
}

impl Default for CorrelationTracker {
    fn default() -> Self {
        Self::new(TrackerParams::default())
    }
}

impl FaceTracker for CorrelationTracker {
    fn start(&mut self, gray: &GrayImage, bbox: BoundingBox) {
        self.target = self
            .sample_patch(gray, &bbox)
            .map(|template| Target { bbox, template });
    }

    fn update(&mut self, gray: &GrayImage) -> Option<BoundingBox> {
        let target = self.target.take()?;
        let prev = target.bbox;
        let size = self.params.template_size.max(1) as f64;
        let sx = size / prev.width.max(1) as f64;
        let sy = size / prev.height.max(1) as f64;

        let pad_x = (prev.width as f64 * self.params.search_padding).round() as i32;
        let pad_y = (prev.height as f64 * self.params.search_padding).round() as i32;
        let region = BoundingBox::new(
            prev.x - pad_x,
            prev.y - pad_y,
            prev.width + 2 * pad_x,
            prev.height + 2 * pad_y,
        )
        .clipped(gray.width(), gray.height())?;

        let search_w = (region.width as f64 * sx).round() as u32;
        let search_h = (region.height as f64 * sy).round() as u32;
        let search = resize_exact(&crop(gray, &region), search_w, search_h);

        let (u, v, score) = self.best_match(&search, &target.template)?;
        if score < self.params.min_confidence {
            log::trace!("correlation peak {score:.3} below floor");
            return None;
        }

        let moved = BoundingBox::new(
            region.x + (u as f64 / sx).round() as i32,
            region.y + (v as f64 / sy).round() as i32,
            prev.width,
            prev.height,
        );
        let clipped = moved.clipped(gray.width(), gray.height())?;

        let lr = self.params.learning_rate.clamp(0.0, 1.0);
        let template = match self.sample_patch(gray, &clipped) {
            Some(fresh) => blend(&target.template, &fresh, lr),
            None => target.template,
        };

        self.target = Some(Target {
            bbox: clipped,
            template,
        });
        Some(clipped)
    }

    fn clear(&mut self) {
        self.target = None;
    }
}

/// Pearson correlation of two equally sized images; `None` if either is flat.
fn correlation(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    let n = a.as_raw().len() as f64;
    let mean = |img: &GrayImage| img.as_raw().iter().map(|&v| v as f64).sum::<f64>() / n;
    let (ma, mb) = (mean(a), mean(b));

    let (mut cross, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&pa, &pb) in a.as_raw().iter().zip(b.as_raw()) {
        let (da, db) = (pa as f64 - ma, pb as f64 - mb);
        cross += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return None;
    }
    Some(cross / (var_a * var_b).sqrt())
}

/// Running-average template refresh.
fn blend(old: &GrayImage, fresh: &GrayImage, rate: f64) -> GrayImage {
    let mut out = old.clone();
    for (dst, &new) in out.iter_mut().zip(fresh.as_raw()) {
        let mixed = (1.0 - rate) * *dst as f64 + rate * new as f64;
        *dst = mixed.round().clamp(0.0, 255.0) as u8;
    }
    out
}

fn crop(gray: &GrayImage, bbox: &BoundingBox) -> GrayImage {
    imageops::crop_imm(
        gray,
        bbox.x as u32,
        bbox.y as u32,
        bbox.width as u32,
        bbox.height as u32,
    )
    .to_image()
}

fn resize_exact(img: &GrayImage, width: u32, height: u32) -> GrayImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    imageops::resize(img, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(x: i32, y: i32) -> u8 {
        let h = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663)) as u32;
        (h.wrapping_mul(2_654_435_761) >> 24) as u8
    }

    /// A noise texture translated by `(dx, dy)`.
    fn scene(width: u32, height: u32, dx: i32, dy: i32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            image::Luma([noise(x as i32 - dx, y as i32 - dy)])
        })
    }

    fn unit_scale_params() -> TrackerParams {
        TrackerParams {
            template_size: 40,
            ..TrackerParams::default()
        }
    }

    #[test]
    fn test_update_without_start_returns_none() {
        let mut tracker = CorrelationTracker::default();
        assert!(tracker.update(&scene(64, 64, 0, 0)).is_none());
    }

    #[test]
    fn test_follows_translated_texture() {
        let mut tracker = CorrelationTracker::new(unit_scale_params());
        tracker.start(&scene(160, 120, 0, 0), BoundingBox::new(40, 30, 40, 40));

        let next = tracker.update(&scene(160, 120, 4, 2));
        assert_eq!(next, Some(BoundingBox::new(44, 32, 40, 40)));
    }

    #[test]
    fn test_follows_over_consecutive_frames() {
        let mut tracker = CorrelationTracker::new(unit_scale_params());
        tracker.start(&scene(160, 120, 0, 0), BoundingBox::new(40, 30, 40, 40));

        tracker.update(&scene(160, 120, 3, 0));
        let next = tracker.update(&scene(160, 120, 6, -1));
        assert_eq!(next, Some(BoundingBox::new(46, 29, 40, 40)));
    }

    #[test]
    fn test_flat_frame_loses_target() {
        let mut tracker = CorrelationTracker::new(unit_scale_params());
        tracker.start(&scene(160, 120, 0, 0), BoundingBox::new(40, 30, 40, 40));

        let flat = GrayImage::from_pixel(160, 120, image::Luma([90]));
        assert!(tracker.update(&flat).is_none());
        assert!(!tracker.is_tracking());
        // stays lost until restarted
        assert!(tracker.update(&scene(160, 120, 0, 0)).is_none());
    }

    #[test]
    fn test_clear_drops_target() {
        let mut tracker = CorrelationTracker::new(unit_scale_params());
        tracker.start(&scene(160, 120, 0, 0), BoundingBox::new(40, 30, 40, 40));
        tracker.clear();
        assert!(tracker.update(&scene(160, 120, 0, 0)).is_none());
    }

    #[test]
    fn test_result_stays_inside_frame() {
        let mut tracker = CorrelationTracker::default();
        tracker.start(&scene(100, 80, 0, 0), BoundingBox::new(70, 50, 30, 30));
        if let Some(b) = tracker.update(&scene(100, 80, 0, 0)) {
            assert!(b.x >= 0 && b.y >= 0);
            assert!(b.right() <= 100 && b.bottom() <= 80);
        }
    }

    #[test]
    fn test_correlation_of_inverted_patch_is_negative() {
        let a = scene(8, 8, 0, 0);
        let mut b = a.clone();
        b.iter_mut().for_each(|p| *p = 255 - *p);
        assert!((correlation(&a, &a).unwrap() - 1.0).abs() < 1e-9);
        assert!((correlation(&a, &b).unwrap() + 1.0).abs() < 1e-9);
        assert!(correlation(&a, &GrayImage::from_pixel(8, 8, image::Luma([3]))).is_none());
    }

    #[test]
    fn test_blend_moves_toward_fresh_patch() {
        let old = GrayImage::from_pixel(2, 2, image::Luma([100]));
        let fresh = GrayImage::from_pixel(2, 2, image::Luma([200]));
        assert_eq!(blend(&old, &fresh, 0.15).get_pixel(0, 0)[0], 115);
        assert_eq!(blend(&old, &fresh, 0.0), old);
    }

    #[test]
    fn test_start_outside_frame_is_inactive() {
        let mut tracker = CorrelationTracker::default();
        tracker.start(&scene(50, 50, 0, 0), BoundingBox::new(200, 200, 20, 20));
        assert!(!tracker.is_tracking());
    }
}
