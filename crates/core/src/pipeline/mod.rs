pub mod gaze_detector;
pub mod track_state;
