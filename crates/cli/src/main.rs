mod notifier;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};

use gazewatch_core::config::GazeConfig;
use gazewatch_core::pipeline::gaze_detector::GazeDetector;
use gazewatch_core::shared::clock::ManualClock;
use gazewatch_core::shared::frame::Frame;
use gazewatch_core::video::domain::frame_source::{FrameSource, SourceMetadata};
use gazewatch_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use gazewatch_core::video::infrastructure::image_sequence_reader::ImageSequenceReader;

use notifier::{Hooks, Notification, Notifier};

/// Time source for the engagement timers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ClockMode {
    /// Frame presentation timestamps (replays at the footage's own pace).
    Video,
    /// Wall-clock time while processing.
    Wall,
}

/// Gaze engagement detection over recorded video or image sequences.
#[derive(Parser)]
#[command(name = "gaze-watch")]
struct Cli {
    /// Input video file, image file, or directory of images.
    input: PathBuf,

    /// JSON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// ONNX gaze classifier.
    #[arg(long)]
    model: Option<PathBuf>,

    /// OpenCV Haar cascade XML for faces.
    #[arg(long)]
    face_cascade: Option<PathBuf>,

    /// OpenCV Haar cascade XML for eyes.
    #[arg(long)]
    eye_cascade: Option<PathBuf>,

    /// Run the full face search every Nth frame.
    #[arg(long)]
    detection_interval: Option<usize>,

    /// Majority-vote window in frames.
    #[arg(long)]
    history_size: Option<usize>,

    /// Seconds of sustained forward gaze before engagement starts.
    #[arg(long)]
    threshold: Option<f64>,

    /// Seconds a lookaway is tolerated before engagement ends.
    #[arg(long)]
    grace: Option<f64>,

    /// Nominal frame rate for image sequences.
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Clock driving the engagement timers.
    #[arg(long, value_enum, default_value = "video")]
    clock: ClockMode,

    /// Shell command run on engagement start.
    #[arg(long)]
    on_start: Option<String>,

    /// Shell command run on engagement end.
    #[arg(long)]
    on_end: Option<String>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;
    let mut source = open_source(&cli.input, cli.fps);
    let metadata = source.open(&cli.input)?;
    log::info!(
        "Input {}x{} @ {:.2} fps, {} frames",
        metadata.width,
        metadata.height,
        metadata.fps,
        metadata.total_frames
    );

    let clock_mode = effective_clock(cli.clock, &metadata);
    let replay_clock = ManualClock::new();
    let mut detector = GazeDetector::from_config(&config)?;
    if clock_mode == ClockMode::Video {
        detector = detector.with_clock(replay_clock.clone());
    }

    let notifier = Notifier::spawn(Hooks {
        on_start: cli.on_start.clone(),
        on_end: cli.on_end.clone(),
    });
    let current_frame = Arc::new(AtomicUsize::new(0));
    wire_callbacks(&mut detector, &notifier, &current_frame);

    let total = metadata.total_frames;
    let mut processed = 0usize;
    let mut busy = Duration::ZERO;
    for frame in source.frames() {
        let frame = frame?;
        current_frame.store(frame.index(), Ordering::Relaxed);
        if clock_mode == ClockMode::Video {
            if let Some(ts) = frame_time(&frame, &metadata) {
                replay_clock.set(ts);
            }
        }

        let started = Instant::now();
        detector.process_frame(&frame)?;
        busy += started.elapsed();
        processed += 1;

        if total > 0 {
            eprint!("\rProcessing frame {processed}/{total}");
        } else {
            eprint!("\rProcessing frame {processed}");
        }
    }
    eprintln!();
    source.close();

    let engagements = detector.engagement_count();
    detector.release();
    // callbacks hold notifier senders
    drop(detector);
    let delivered = notifier.shutdown();

    print_summary(processed, busy, engagements, delivered);
    Ok(())
}

fn build_config(cli: &Cli) -> Result<GazeConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => GazeConfig::load(path)?,
        None => GazeConfig::default(),
    };

    if let Some(p) = &cli.model {
        config.model_path = p.clone();
    }
    if let Some(p) = &cli.face_cascade {
        config.face_cascade_path = p.clone();
    }
    if let Some(p) = &cli.eye_cascade {
        config.eye_cascade_path = p.clone();
    }
    if let Some(n) = cli.detection_interval {
        config.detection_interval = n;
    }
    if let Some(n) = cli.history_size {
        config.history_size = n;
    }
    if let Some(secs) = cli.threshold {
        config.engagement.threshold_secs = secs;
    }
    if let Some(secs) = cli.grace {
        config.engagement.lookaway_grace_secs = secs;
    }

    config.validate()?;
    Ok(config)
}

fn wire_callbacks(
    detector: &mut GazeDetector,
    notifier: &Notifier,
    current_frame: &Arc<AtomicUsize>,
) {
    let tx = notifier.sender();
    let frame = Arc::clone(current_frame);
    detector.set_gaze_start_callback(move || {
        let _ = tx.send(Notification::Started {
            frame: frame.load(Ordering::Relaxed),
        });
    });

    let tx = notifier.sender();
    let frame = Arc::clone(current_frame);
    detector.set_gaze_end_callback(move || {
        let _ = tx.send(Notification::Ended {
            frame: frame.load(Ordering::Relaxed),
        });
    });
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if !(cli.fps.is_finite() && cli.fps > 0.0) {
        return Err(format!("Frame rate must be positive, got {}", cli.fps).into());
    }
    Ok(())
}

fn open_source(input: &Path, fps: f64) -> Box<dyn FrameSource> {
    if input.is_dir() || ImageSequenceReader::is_image_file(input) {
        Box::new(ImageSequenceReader::new(fps))
    } else {
        Box::new(FfmpegReader::new())
    }
}

/// Decoder timestamp when the source has one, else the nominal-rate position.
fn frame_time(frame: &Frame, metadata: &SourceMetadata) -> Option<Duration> {
    frame
        .timestamp()
        .or_else(|| metadata.timestamp_of(frame.index()))
}

/// Video timing needs a known frame rate; fall back to the wall clock.
fn effective_clock(requested: ClockMode, metadata: &SourceMetadata) -> ClockMode {
    if requested == ClockMode::Video && metadata.timestamp_of(1).is_none() {
        log::warn!("Unknown frame rate, using wall-clock timing");
        return ClockMode::Wall;
    }
    requested
}

fn print_summary(processed: usize, busy: Duration, engagements: u64, delivered: usize) {
    let avg_ms = if processed > 0 {
        busy.as_secs_f64() * 1000.0 / processed as f64
    } else {
        0.0
    };
    println!("Frames processed: {processed}");
    println!("Average latency:  {avg_ms:.2} ms/frame");
    println!("Engagements:      {engagements}");
    log::debug!("{delivered} notifications delivered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazewatch_core::shared::frame::PixelFormat;

    fn metadata(fps: f64) -> SourceMetadata {
        SourceMetadata {
            width: 1,
            height: 1,
            fps,
            total_frames: 0,
            source_path: None,
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0; 3], 1, 1, PixelFormat::Rgb8, index).unwrap()
    }

    #[test]
    fn test_frame_time_prefers_decoder_timestamp() {
        let stamped = frame(4).with_timestamp(Duration::from_millis(130));
        assert_eq!(
            frame_time(&stamped, &metadata(10.0)),
            Some(Duration::from_millis(130))
        );
    }

    #[test]
    fn test_frame_time_falls_back_to_nominal_rate() {
        assert_eq!(frame_time(&frame(5), &metadata(10.0)), Some(Duration::from_millis(500)));
        assert_eq!(frame_time(&frame(5), &metadata(0.0)), None);
    }

    #[test]
    fn test_unknown_rate_switches_to_wall_clock() {
        assert_eq!(effective_clock(ClockMode::Video, &metadata(0.0)), ClockMode::Wall);
        assert_eq!(effective_clock(ClockMode::Video, &metadata(25.0)), ClockMode::Video);
        assert_eq!(effective_clock(ClockMode::Wall, &metadata(25.0)), ClockMode::Wall);
    }
}
