pub mod face_locator;
pub mod face_tracker;
