pub mod cascade_detector;
pub mod correlation_tracker;
