use image::GrayImage;

use crate::shared::bounding_box::BoundingBox;

/// Domain interface for full-frame face search.
///
/// An empty result is a valid outcome meaning "no face"; errors are reserved
/// for genuine failures of the underlying detector.
pub trait FaceLocator: Send {
    fn locate(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>>;
}
