use std::path::Path;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::detection::domain::face_locator::FaceLocator;
use crate::gaze::domain::eye_regions::EyeLocator;
use crate::shared::bounding_box::BoundingBox;

#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error("cascade file does not exist")]
    NotFound,
    #[error("file holds no usable cascade")]
    Empty,
    #[cfg(feature = "opencv")]
    #[error("OpenCV: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error("OpenCV feature not enabled")]
    Unavailable,
}

/// Multi-scale search parameters, passed through to `detectMultiScale`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeParams {
    /// Pyramid step between consecutive scales; must be > 1.
    pub scale_factor: f64,
    /// Neighbouring hits a candidate needs to be kept.
    pub min_neighbors: usize,
    /// Smallest window side in source pixels; 0 means the cascade's own window.
    pub min_size: u32,
    /// Largest window side in source pixels; 0 means unbounded.
    pub max_size: u32,
}

impl CascadeParams {
    pub const FACE: CascadeParams = CascadeParams {
        scale_factor: 1.1,
        min_neighbors: 5,
        min_size: 0,
        max_size: 0,
    };

    pub const EYE: CascadeParams = CascadeParams {
        scale_factor: 1.1,
        min_neighbors: 3,
        min_size: 0,
        max_size: 0,
    };
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self::FACE
    }
}

/// Haar cascade object detector backed by OpenCV's `CascadeClassifier`.
///
/// Serves as both the full-frame face locator and the per-face eye locator;
/// only the cascade file and the search parameters differ.
pub struct CascadeDetector {
    classifier: backend::Classifier,
    params: CascadeParams,
}

impl CascadeDetector {
    pub fn load(path: &Path, params: CascadeParams) -> Result<Self, CascadeError> {
        if !path.is_file() {
            return Err(CascadeError::NotFound);
        }
        let classifier = backend::Classifier::load(path)?;
        log::debug!("loaded cascade {}", path.display());
        Ok(Self { classifier, params })
    }

    pub fn params(&self) -> CascadeParams {
        self.params
    }

    /// Every object the cascade accepts, in the classifier's own order.
    pub fn detect_multi_scale(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>, CascadeError> {
        if gray.width() == 0 || gray.height() == 0 {
            return Ok(Vec::new());
        }
        self.classifier.detect(gray, &self.params)
    }
}

impl FaceLocator for CascadeDetector {
    fn locate(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        Ok(self.detect_multi_scale(gray)?)
    }
}

impl EyeLocator for CascadeDetector {
    fn locate_eyes(
        &mut self,
        face_gray: &GrayImage,
    ) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        Ok(self.detect_multi_scale(face_gray)?)
    }
}

#[cfg(feature = "opencv")]
mod backend {
    use std::path::Path;

    use image::GrayImage;
    use opencv::core::{Mat, Rect, Scalar, Size, Vector, CV_8UC1};
    use opencv::objdetect::CascadeClassifier;
    use opencv::prelude::*;

    use super::{CascadeError, CascadeParams};
    use crate::shared::bounding_box::BoundingBox;

    pub(super) struct Classifier(CascadeClassifier);

    impl Classifier {
        pub(super) fn load(path: &Path) -> Result<Self, CascadeError> {
            let path = path.to_str().ok_or(CascadeError::NotFound)?;
            let classifier = CascadeClassifier::new(path)?;
            // a file OpenCV cannot parse leaves the classifier empty
            if classifier.empty()? {
                return Err(CascadeError::Empty);
            }
            Ok(Self(classifier))
        }

        pub(super) fn detect(
            &mut self,
            gray: &GrayImage,
            params: &CascadeParams,
        ) -> Result<Vec<BoundingBox>, CascadeError> {
            let mat = to_mat(gray)?;
            let mut found = Vector::<Rect>::new();
            self.0.detect_multi_scale(
                &mat,
                &mut found,
                params.scale_factor,
                params.min_neighbors as i32,
                0,
                Size::new(params.min_size as i32, params.min_size as i32),
                Size::new(params.max_size as i32, params.max_size as i32),
            )?;
            Ok(found
                .iter()
                .map(|r| BoundingBox::new(r.x, r.y, r.width, r.height))
                .collect())
        }
    }

    fn to_mat(gray: &GrayImage) -> opencv::Result<Mat> {
        let mut mat = Mat::new_rows_cols_with_default(
            gray.height() as i32,
            gray.width() as i32,
            CV_8UC1,
            Scalar::all(0.0),
        )?;
        mat.data_bytes_mut()?.copy_from_slice(gray.as_raw());
        Ok(mat)
    }
}

/// Non-opencv stub
#[cfg(not(feature = "opencv"))]
mod backend {
    use std::path::Path;

    use image::GrayImage;

    use super::{CascadeError, CascadeParams};
    use crate::shared::bounding_box::BoundingBox;

    pub(super) struct Classifier;

    impl Classifier {
        pub(super) fn load(_path: &Path) -> Result<Self, CascadeError> {
            Err(CascadeError::Unavailable)
        }

        pub(super) fn detect(
            &mut self,
            _gray: &GrayImage,
            _params: &CascadeParams,
        ) -> Result<Vec<BoundingBox>, CascadeError> {
            Err(CascadeError::Unavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// One-stage 4x4 cascade that fires on a bright-left / dark-right edge.
    const EDGE_CASCADE_XML: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>4</height>
  <width>4</width>
  <stageParams><maxWeakCount>1</maxWeakCount></stageParams>
  <featureParams><maxCatCount>0</maxCatCount></featureParams>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 1.0000000000000000e-01</internalNodes>
          <leafValues>
            -1. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 2 4 1.</_>
        <_>
          2 0 2 4 -1.</_></rects></_></features></cascade>
</opencv_storage>
"#;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = CascadeDetector::load(Path::new("/nonexistent/face.xml"), CascadeParams::FACE)
            .err()
            .unwrap();
        assert!(matches!(err, CascadeError::NotFound));
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let file = write_file("this is not a cascade");
        assert!(CascadeDetector::load(file.path(), CascadeParams::EYE).is_err());
    }

    #[test]
    fn test_default_params_are_face_tuning() {
        assert_eq!(CascadeParams::default(), CascadeParams::FACE);
        assert_eq!(CascadeParams::EYE.min_neighbors, 3);
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_existing_file_without_opencv_is_unavailable() {
        let file = write_file(EDGE_CASCADE_XML);
        let err = CascadeDetector::load(file.path(), CascadeParams::FACE).err().unwrap();
        assert!(matches!(err, CascadeError::Unavailable));
    }

    #[cfg(feature = "opencv")]
    mod with_opencv {
        use super::*;

        fn detector() -> CascadeDetector {
            let file = write_file(EDGE_CASCADE_XML);
            CascadeDetector::load(
                file.path(),
                CascadeParams {
                    min_neighbors: 0,
                    ..CascadeParams::FACE
                },
            )
            .unwrap()
        }

        #[test]
        fn test_loads_cascade_and_keeps_params() {
            assert_eq!(detector().params().min_neighbors, 0);
        }

        #[test]
        fn test_flat_image_has_no_hits() {
            let mut det = detector();
            let flat = GrayImage::from_pixel(32, 32, image::Luma([90]));
            assert!(det.detect_multi_scale(&flat).unwrap().is_empty());
        }

        #[test]
        fn test_empty_image_has_no_hits() {
            let mut det = detector();
            assert!(det.detect_multi_scale(&GrayImage::new(0, 0)).unwrap().is_empty());
        }

        #[test]
        fn test_locator_traits_agree() {
            let mut det = detector();
            let flat = GrayImage::from_pixel(16, 16, image::Luma([200]));
            let faces = FaceLocator::locate(&mut det, &flat).unwrap();
            let eyes = EyeLocator::locate_eyes(&mut det, &flat).unwrap();
            assert_eq!(faces, eyes);
        }
    }
}
