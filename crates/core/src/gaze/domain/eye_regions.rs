use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

use crate::shared::bounding_box::BoundingBox;

/// Domain interface for finding eyes inside a face crop.
///
/// Boxes are relative to `face_gray`.
pub trait EyeLocator: Send {
    fn locate_eyes(
        &mut self,
        face_gray: &GrayImage,
    ) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>>;
}

/// Cropped eye images for one frame, ordered left-to-right in image space.
#[derive(Clone, Debug)]
pub struct EyeRegionPair {
    pub left: RgbImage,
    pub right: RgbImage,
    /// Unresized grayscale crops, used by the pupil heuristic.
    pub left_gray: GrayImage,
    pub right_gray: GrayImage,
    /// Both eyes resized, placed side by side and resampled to the model shape.
    pub model_input: RgbImage,
}

/// Finds two eyes inside a face box and builds the classifier input.
pub struct EyeRegionExtractor {
    locator: Box<dyn EyeLocator>,
    input_width: u32,
    input_height: u32,
}

impl EyeRegionExtractor {
    pub fn new(locator: Box<dyn EyeLocator>, input_shape: (u32, u32)) -> Self {
        Self {
            locator,
            input_width: input_shape.0.max(1),
            input_height: input_shape.1.max(1),
        }
    }

    pub fn input_shape(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    /// `Ok(None)` when fewer than two eyes are found or the face box lies
    /// outside the frame.
    pub fn extract(
        &mut self,
        rgb: &RgbImage,
        gray: &GrayImage,
        face: BoundingBox,
    ) -> Result<Option<EyeRegionPair>, Box<dyn std::error::Error>> {
        let Some(face) = face.clipped(gray.width(), gray.height()) else {
            return Ok(None);
        };
        let face_gray = crop(gray, &face);
        let face_rgb = crop(rgb, &face);

        let candidates = self.locator.locate_eyes(&face_gray)?;
        let Some((first, second)) = pick_eye_pair(&candidates, face.width as u32, face.height as u32)
        else {
            return Ok(None);
        };

        let left = crop(&face_rgb, &first);
        let right = crop(&face_rgb, &second);
        let model_input = self.combine(&left, &right);

        Ok(Some(EyeRegionPair {
            left_gray: crop(&face_gray, &first),
            right_gray: crop(&face_gray, &second),
            left,
            right,
            model_input,
        }))
    }

    fn combine(&self, left: &RgbImage, right: &RgbImage) -> RgbImage {
        let (w, h) = (self.input_width, self.input_height);
        let left = imageops::resize(left, w, h, FilterType::Triangle);
        let right = imageops::resize(right, w, h, FilterType::Triangle);

        let mut pair = RgbImage::new(w * 2, h);
        imageops::replace(&mut pair, &left, 0, 0);
        imageops::replace(&mut pair, &right, w as i64, 0);
        imageops::resize(&pair, w, h, FilterType::Triangle)
    }
}

/// Two largest candidates, then ordered by x. Both sorts are stable, so
/// equal areas keep detection order and equal x keeps area order.
fn pick_eye_pair(
    candidates: &[BoundingBox],
    face_width: u32,
    face_height: u32,
) -> Option<(BoundingBox, BoundingBox)> {
    let mut eyes: Vec<BoundingBox> = candidates
        .iter()
        .filter_map(|b| b.clipped(face_width, face_height))
        .collect();
    if eyes.len() < 2 {
        return None;
    }
    eyes.sort_by_key(|b| std::cmp::Reverse(b.area()));
    eyes.truncate(2);
    eyes.sort_by_key(|b| b.x);
    Some((eyes[0], eyes[1]))
}

type Buffer<P> = image::ImageBuffer<P, Vec<<P as image::Pixel>::Subpixel>>;

fn crop<I>(img: &I, bbox: &BoundingBox) -> Buffer<I::Pixel>
where
    I: image::GenericImageView + 'static,
{
    imageops::crop_imm(
        img,
        bbox.x as u32,
        bbox.y as u32,
        bbox.width as u32,
        bbox.height as u32,
    )
    .to_image()
}
