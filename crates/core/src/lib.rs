//! Real-time gaze engagement detection.
//!
//! Frames flow through face location and tracking, eye extraction, a
//! two-stage gaze classifier, majority-vote smoothing and an engagement
//! state machine; see [`pipeline::gaze_detector::GazeDetector`].

pub mod config;
pub mod detection;
pub mod error;
pub mod gaze;
pub mod pipeline;
pub mod shared;
pub mod video;
