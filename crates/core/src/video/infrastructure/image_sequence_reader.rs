use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::{Frame, PixelFormat};
use crate::video::domain::frame_source::{FrameSource, SourceMetadata};

/// Replays still images as a frame stream.
///
/// Opening a directory yields its image files in file-name order; opening a
/// single image yields one frame. Images are decoded lazily, one per frame.
pub struct ImageSequenceReader {
    fps: f64,
    files: Vec<PathBuf>,
}

impl ImageSequenceReader {
    /// `fps` is the nominal rate reported in the metadata.
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            files: Vec::new(),
        }
    }

    pub fn is_image_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && Self::is_image_file(p))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl Default for ImageSequenceReader {
    fn default() -> Self {
        Self::new(30.0)
    }
}

fn load_frame(path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = image::open(path)
        .map_err(|e| format!("cannot decode {}: {e}", path.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, PixelFormat::Rgb8, index)?)
}

impl FrameSource for ImageSequenceReader {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, Box<dyn std::error::Error>> {
        let files = if path.is_dir() {
            Self::list_images(path)?
        } else if Self::is_image_file(path) {
            vec![path.to_path_buf()]
        } else {
            return Err(format!("not an image or image directory: {}", path.display()).into());
        };

        let first = files
            .first()
            .ok_or_else(|| format!("no images in {}", path.display()))?;
        let (width, height) = image::image_dimensions(first)?;

        let metadata = SourceMetadata {
            width,
            height,
            fps: self.fps,
            total_frames: files.len(),
            source_path: Some(path.to_path_buf()),
        };
        log::debug!("opened {} images from {}", files.len(), path.display());
        self.files = files;
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        if self.files.is_empty() {
            return Box::new(std::iter::once(Err("ImageSequenceReader: not opened".into())));
        }
        Box::new(
            self.files
                .iter()
                .enumerate()
                .map(|(index, path)| load_frame(path, index)),
        )
    }

    fn close(&mut self) {
        self.files.clear();
    }
}
