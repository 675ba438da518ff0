pub mod engagement;
pub mod eye_regions;
pub mod gaze_classifier;
pub mod prediction;
pub mod prediction_history;
pub mod pupil_heuristic;
