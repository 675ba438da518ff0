use std::path::Path;
use std::time::Instant;

use image::GrayImage;

use super::track_state::TrackState;
use crate::config::GazeConfig;
use crate::detection::domain::face_locator::FaceLocator;
use crate::detection::domain::face_tracker::FaceTracker;
use crate::detection::infrastructure::cascade_detector::CascadeDetector;
use crate::detection::infrastructure::correlation_tracker::CorrelationTracker;
use crate::error::GazeError;
use crate::gaze::domain::engagement::{EngagementEvent, EngagementState, EngagementStateMachine};
use crate::gaze::domain::eye_regions::{EyeLocator, EyeRegionExtractor};
use crate::gaze::domain::gaze_classifier::{GazeClassifier, GazeModel};
use crate::gaze::domain::prediction::PredictionLabel;
use crate::gaze::domain::prediction_history::PredictionHistory;
use crate::gaze::infrastructure::onnx_gaze_model::OnnxGazeModel;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::frame::Frame;

/// Engagement edge handler. Runs on the caller's thread inside
/// [`GazeDetector::process_frame`], so it should hand work off rather than
/// block.
pub type GazeCallback = Box<dyn FnMut() + Send>;

/// Strategy objects a detector is assembled from.
pub struct DetectorComponents {
    pub face_locator: Box<dyn FaceLocator>,
    pub face_tracker: Box<dyn FaceTracker>,
    pub eye_locator: Box<dyn EyeLocator>,
    pub model: Box<dyn GazeModel>,
}

/// Heavy per-frame machinery, dropped on release.
struct Stages {
    locator: Box<dyn FaceLocator>,
    eyes: EyeRegionExtractor,
    classifier: GazeClassifier,
}

impl Stages {
    /// Raw prediction for one frame; every failure is NotForward.
    fn predict(&mut self, frame: &Frame, gray: &GrayImage, face: BoundingBox) -> PredictionLabel {
        let rgb = frame.to_rgb();
        let eyes = match self.eyes.extract(&rgb, gray, face) {
            Ok(Some(eyes)) => eyes,
            Ok(None) => {
                log::trace!("frame {}: fewer than two eyes", frame.index());
                return PredictionLabel::NotForward;
            }
            Err(e) => {
                log::debug!("frame {}: eye search failed: {e}", frame.index());
                return PredictionLabel::NotForward;
            }
        };

        match self.classifier.classify(&eyes) {
            Ok(label) => label,
            Err(e) => {
                log::warn!("frame {}: gaze classifier failed: {e}", frame.index());
                PredictionLabel::NotForward
            }
        }
    }
}

/// Real-time gaze engagement detector for a single camera stream.
///
/// Call [`process_frame`](Self::process_frame) once per captured frame.
/// Engagement start and end are reported through the registered callbacks,
/// each exactly once per edge.
pub struct GazeDetector {
    stages: Option<Stages>,
    track: TrackState,
    history: PredictionHistory,
    engagement: EngagementStateMachine,
    clock: Box<dyn Clock>,
    last_stable: PredictionLabel,
    engagements: u64,
    on_start: Option<GazeCallback>,
    on_end: Option<GazeCallback>,
}

impl GazeDetector {
    /// Load the gaze model and both cascades with default tuning.
    pub fn new(
        model_path: &Path,
        face_cascade_path: &Path,
        eye_cascade_path: &Path,
        input_shape: (u32, u32),
    ) -> Result<Self, GazeError> {
        Self::from_config(&GazeConfig {
            model_path: model_path.to_path_buf(),
            face_cascade_path: face_cascade_path.to_path_buf(),
            eye_cascade_path: eye_cascade_path.to_path_buf(),
            input_shape,
            ..GazeConfig::default()
        })
    }

    pub fn from_config(config: &GazeConfig) -> Result<Self, GazeError> {
        config.validate()?;

        let face = CascadeDetector::load(&config.face_cascade_path, config.face_search)
            .map_err(|e| GazeError::model_load("face cascade", &config.face_cascade_path, e))?;
        let eyes = CascadeDetector::load(&config.eye_cascade_path, config.eye_search)
            .map_err(|e| GazeError::model_load("eye cascade", &config.eye_cascade_path, e))?;
        let model = OnnxGazeModel::load(&config.model_path)
            .map_err(|e| GazeError::model_load("gaze model", &config.model_path, e))?;

        log::info!(
            "gaze detector ready (model {}, input {}x{})",
            config.model_path.display(),
            config.input_shape.0,
            config.input_shape.1
        );

        Self::with_components(
            config,
            DetectorComponents {
                face_locator: Box::new(face),
                face_tracker: Box::new(CorrelationTracker::new(config.tracker)),
                eye_locator: Box::new(eyes),
                model: Box::new(model),
            },
        )
    }

    /// Assemble a detector from caller-supplied strategies; only the tuning
    /// values of `config` are used, not its paths.
    pub fn with_components(
        config: &GazeConfig,
        components: DetectorComponents,
    ) -> Result<Self, GazeError> {
        config.validate()?;

        let classifier = GazeClassifier::new(
            components.model,
            config.labels.clone(),
            config.heuristic,
            config.channel_order,
        );

        Ok(Self {
            stages: Some(Stages {
                locator: components.face_locator,
                eyes: EyeRegionExtractor::new(components.eye_locator, config.input_shape),
                classifier,
            }),
            track: TrackState::new(components.face_tracker, config.detection_interval),
            history: PredictionHistory::new(config.history_size),
            engagement: EngagementStateMachine::new(config.engagement),
            clock: Box::new(SystemClock),
            last_stable: PredictionLabel::NotForward,
            engagements: 0,
            on_start: None,
            on_end: None,
        })
    }

    /// Replace the time source used by the hysteresis timers.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn set_gaze_start_callback<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_start = Some(Box::new(callback));
    }

    pub fn set_gaze_end_callback<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_end = Some(Box::new(callback));
    }

    /// Run one frame through locate/track, eye extraction, classification,
    /// smoothing and the engagement state machine.
    ///
    /// Per-frame failures are absorbed; the only error is use after
    /// [`release`](Self::release).
    pub fn process_frame(&mut self, frame: &Frame) -> Result<(), GazeError> {
        let Some(stages) = self.stages.as_mut() else {
            return Err(GazeError::Released);
        };
        let started = Instant::now();
        let counter = self.track.advance();
        let now = self.clock.now();
        let gray = frame.to_gray();

        self.track.update_tracker(&gray);

        if self.track.needs_detection() {
            let candidates = match stages.locator.locate(&gray) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("frame {counter}: face search failed: {e}");
                    Vec::new()
                }
            };
            let face = BoundingBox::largest(&candidates)
                .and_then(|b| b.clipped(frame.width(), frame.height()));
            match face {
                Some(face) => {
                    log::debug!("frame {counter}: face at {face:?}");
                    self.track.start(&gray, face);
                }
                None => {
                    self.face_lost(counter);
                    return Ok(());
                }
            }
        }

        let raw = match self.track.bbox() {
            Some(face) => stages.predict(frame, &gray, face),
            None => PredictionLabel::NotForward,
        };

        self.history.push(raw);
        let stable = self.history.stable();
        self.last_stable = stable;
        if let Some(event) = self.engagement.update(stable.is_forward(), now) {
            self.dispatch(event);
        }

        log::trace!(
            "frame {counter}: raw {raw:?}, stable {stable:?}, {:?} in {:?}",
            self.engagement.state(),
            started.elapsed()
        );
        Ok(())
    }

    fn face_lost(&mut self, counter: u64) {
        log::debug!("frame {counter}: no face");
        self.track.clear();
        if let Some(event) = self.engagement.face_lost() {
            self.dispatch(event);
        }
        self.history.clear();
        self.last_stable = PredictionLabel::NotForward;
    }

    fn dispatch(&mut self, event: EngagementEvent) {
        match event {
            EngagementEvent::Started => {
                self.engagements += 1;
                log::info!("engagement started");
                if let Some(cb) = self.on_start.as_mut() {
                    cb();
                }
            }
            EngagementEvent::Ended => {
                log::info!("engagement ended");
                self.history.clear();
                if let Some(cb) = self.on_end.as_mut() {
                    cb();
                }
            }
        }
    }

    /// Drop the tracker, locators and model. Safe to call repeatedly; never
    /// fires callbacks.
    pub fn release(&mut self) {
        if self.stages.take().is_some() {
            self.track.release();
            log::info!("gaze detector released after {} frames", self.track.frame_counter());
        }
    }

    pub fn is_released(&self) -> bool {
        self.stages.is_none()
    }

    pub fn last_stable_prediction(&self) -> PredictionLabel {
        self.last_stable
    }

    /// Box of the tracked face, `None` when no face is tracked.
    pub fn tracking_bounding_box(&self) -> Option<BoundingBox> {
        self.track.bbox()
    }

    pub fn is_engaged(&self) -> bool {
        self.engagement.state().is_engaged()
    }

    pub fn engagement_state(&self) -> EngagementState {
        self.engagement.state()
    }

    pub fn frame_count(&self) -> u64 {
        self.track.frame_counter()
    }

    /// Engagement starts seen so far.
    pub fn engagement_count(&self) -> u64 {
        self.engagements
    }

    /// Times the learned classifier actually ran; 0 after release.
    pub fn model_invocations(&self) -> u64 {
        self.stages
            .as_ref()
            .map_or(0, |s| s.classifier.model_invocations())
    }
}
