use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::{decoder, media, Rational};

use crate::shared::frame::{Frame, PixelFormat};
use crate::video::domain::frame_source::{FrameSource, SourceMetadata};

type Decoded = Result<Frame, Box<dyn std::error::Error>>;

/// Video files decoded with ffmpeg-next.
///
/// Frames come out as packed RGB, stamped with their presentation time
/// relative to the first decoded frame, so variable-rate footage replays
/// with its real timing.
pub struct FfmpegReader {
    input: Option<Input>,
    stream_index: usize,
    time_base: Rational,
}

// Safety: the input context is owned and only touched through `&mut self`.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input: None,
            stream_index: 0,
            time_base: Rational(0, 1),
        }
    }

    fn decoding(&mut self) -> Result<Decoding<'_>, Box<dyn std::error::Error>> {
        let input = self.input.as_mut().ok_or("FfmpegReader: not opened")?;
        let stream = input
            .stream(self.stream_index)
            .ok_or("video stream disappeared")?;
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        let scaler = scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            scaling::Flags::BILINEAR,
        )?;

        Ok(Decoding {
            input,
            stream_index: self.stream_index,
            time_base: self.time_base,
            decoder,
            scaler,
            origin: None,
            pending: VecDeque::new(),
            next_index: 0,
            drained: false,
        })
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let input = ffmpeg_next::format::input(path)?;

        let stream = input
            .streams()
            .best(media::Type::Video)
            .ok_or("No video stream found")?;
        let params = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        // average rate first; the nominal rate overstates VFR footage
        let fps = [stream.avg_frame_rate(), stream.rate()]
            .into_iter()
            .find_map(rate_to_fps)
            .unwrap_or(0.0);

        let metadata = SourceMetadata {
            width: params.width(),
            height: params.height(),
            fps,
            total_frames: stream.frames().max(0) as usize,
            source_path: Some(path.to_path_buf()),
        };
        log::debug!(
            "opened {} ({}x{} @ {:.2} fps, time base {})",
            path.display(),
            metadata.width,
            metadata.height,
            fps,
            stream.time_base()
        );

        self.stream_index = stream.index();
        self.time_base = stream.time_base();
        self.input = Some(input);
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Decoded> + '_> {
        match self.decoding() {
            Ok(decoding) => Box::new(decoding),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input = None;
    }
}

fn rate_to_fps(rate: Rational) -> Option<f64> {
    (rate.numerator() > 0 && rate.denominator() > 0)
        .then(|| rate.numerator() as f64 / rate.denominator() as f64)
}

/// Pull-based decode loop: reads packets until the decoder yields frames,
/// queues them, and hands them out one at a time.
struct Decoding<'a> {
    input: &'a mut Input,
    stream_index: usize,
    time_base: Rational,
    decoder: decoder::Video,
    scaler: scaling::Context,
    /// Timestamp of the first frame, in stream ticks.
    origin: Option<i64>,
    pending: VecDeque<Frame>,
    next_index: usize,
    drained: bool,
}

impl Decoding<'_> {
    /// Feed one packet (or end of stream) and queue whatever it produced.
    fn pump(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        match self.input.packets().next() {
            Some((stream, packet)) => {
                if stream.index() != self.stream_index {
                    return Ok(());
                }
                if let Err(e) = self.decoder.send_packet(&packet) {
                    log::debug!("skipping undecodable packet: {e}");
                    return Ok(());
                }
            }
            None => {
                self.decoder.send_eof()?;
                self.drained = true;
            }
        }

        let mut decoded = Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let frame = self.convert(&decoded)?;
            self.pending.push_back(frame);
        }
        Ok(())
    }

    fn convert(&mut self, decoded: &Video) -> Decoded {
        let mut rgb = Video::empty();
        self.scaler.run(decoded, &mut rgb)?;

        let (width, height) = (rgb.width(), rgb.height());
        let row_bytes = width as usize * 3;
        let pixels: Vec<u8> = rgb
            .data(0)
            .chunks(rgb.stride(0))
            .take(height as usize)
            .flat_map(|line| &line[..row_bytes])
            .copied()
            .collect();

        let frame = Frame::new(pixels, width, height, PixelFormat::Rgb8, self.next_index)?;
        self.next_index += 1;
        Ok(match self.presentation_time(decoded.timestamp()) {
            Some(ts) => frame.with_timestamp(ts),
            None => frame,
        })
    }

    fn presentation_time(&mut self, ticks: Option<i64>) -> Option<Duration> {
        let ticks = ticks?;
        let origin = *self.origin.get_or_insert(ticks);
        ticks_to_duration(ticks.saturating_sub(origin), self.time_base)
    }
}

impl Iterator for Decoding<'_> {
    type Item = Decoded;

    fn next(&mut self) -> Option<Decoded> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(Ok(frame));
            }
            if self.drained {
                return None;
            }
            if let Err(e) = self.pump() {
                self.drained = true;
                return Some(Err(e));
            }
        }
    }
}

/// Exact integer conversion; negative or unrepresentable spans give `None`.
fn ticks_to_duration(ticks: i64, time_base: Rational) -> Option<Duration> {
    let (num, den) = (time_base.numerator() as i128, time_base.denominator() as i128);
    if ticks < 0 || num <= 0 || den <= 0 {
        return None;
    }
    let nanos = ticks as i128 * num * 1_000_000_000 / den;
    u64::try_from(nanos).ok().map(Duration::from_nanos)
}
