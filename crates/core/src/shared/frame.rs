use std::time::Duration;

use image::{GrayImage, RgbImage};

/// Channel layout of a [`Frame`]'s pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Bgr8,
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("{width}x{height} {format:?} frame needs {expected} bytes, got {actual}")]
    BufferSize {
        width: u32,
        height: u32,
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
}

/// A single camera frame: contiguous pixel bytes in row-major order.
///
/// Borrowed read-only by the detector for the duration of one call.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    index: usize,
    timestamp: Option<Duration>,
}

impl Frame {
    /// Wraps `data`, which must hold exactly `width * height * channels` bytes.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        index: usize,
    ) -> Result<Self, FrameError> {
        let expected = (width as usize) * (height as usize) * (format.channels() as usize);
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                width,
                height,
                format,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            index,
            timestamp: None,
        })
    }

    /// Attach the presentation time reported by the decoder.
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Presentation time since the start of the stream, when the source knows it.
    pub fn timestamp(&self) -> Option<Duration> {
        self.timestamp
    }

    /// Luma conversion with BT.601 weights, matching common camera pipelines.
    pub fn to_gray(&self) -> GrayImage {
        let mut out = GrayImage::new(self.width, self.height);
        match self.format {
            PixelFormat::Gray8 => out.copy_from_slice(&self.data),
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => {
                let (ri, bi) = self.red_blue_offsets();
                for (dst, px) in out.iter_mut().zip(self.data.chunks_exact(3)) {
                    let luma = 0.299 * px[ri] as f32 + 0.587 * px[1] as f32 + 0.114 * px[bi] as f32;
                    *dst = luma.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
        out
    }

    /// Copy into an RGB image regardless of the source channel order.
    pub fn to_rgb(&self) -> RgbImage {
        let mut out = RgbImage::new(self.width, self.height);
        match self.format {
            PixelFormat::Gray8 => {
                for (dst, &v) in out.pixels_mut().zip(self.data.iter()) {
                    *dst = image::Rgb([v, v, v]);
                }
            }
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => {
                let (ri, bi) = self.red_blue_offsets();
                for (dst, px) in out.pixels_mut().zip(self.data.chunks_exact(3)) {
                    *dst = image::Rgb([px[ri], px[1], px[bi]]);
                }
            }
        }
        out
    }

    fn red_blue_offsets(&self) -> (usize, usize) {
        match self.format {
            PixelFormat::Bgr8 => (2, 0),
            _ => (0, 2),
        }
    }
}
