use image::GrayImage;

use crate::shared::bounding_box::BoundingBox;

/// Domain interface for a short-term single-object visual tracker.
///
/// Implementations carry a bounding box frame-to-frame between full
/// detections; `update` returns `None` when the target is lost, after which
/// the tracker stays inactive until the next `start`.
pub trait FaceTracker: Send {
    /// Seed the tracker with a freshly detected box.
    fn start(&mut self, gray: &GrayImage, bbox: BoundingBox);

    /// Advance by one frame.
    fn update(&mut self, gray: &GrayImage) -> Option<BoundingBox>;

    /// Drop any tracking state.
    fn clear(&mut self);
}
