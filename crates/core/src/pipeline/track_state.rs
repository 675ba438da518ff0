use image::GrayImage;

use crate::detection::domain::face_tracker::FaceTracker;
use crate::shared::bounding_box::BoundingBox;

/// Tracker handle, last known face box and the frame counter that drives
/// periodic re-detection.
pub struct TrackState {
    tracker: Option<Box<dyn FaceTracker>>,
    bbox: Option<BoundingBox>,
    frame_counter: u64,
    detection_interval: u64,
}

impl TrackState {
    pub fn new(tracker: Box<dyn FaceTracker>, detection_interval: usize) -> Self {
        Self {
            tracker: Some(tracker),
            bbox: None,
            frame_counter: 0,
            detection_interval: detection_interval.max(1) as u64,
        }
    }

    /// Count a new frame and return its 1-based number.
    pub fn advance(&mut self) -> u64 {
        self.frame_counter += 1;
        self.frame_counter
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        self.bbox
    }

    /// Full-frame search is due when nothing is tracked or on every
    /// `detection_interval`-th frame.
    pub fn needs_detection(&self) -> bool {
        self.bbox.is_none() || self.frame_counter % self.detection_interval == 0
    }

    /// Move the box with the tracker; a failed update clears the track.
    pub fn update_tracker(&mut self, gray: &GrayImage) {
        let Some(prev) = self.bbox else {
            return;
        };
        let Some(tracker) = self.tracker.as_mut() else {
            return;
        };
        match tracker
            .update(gray)
            .and_then(|b| b.clipped(gray.width(), gray.height()))
        {
            Some(b) => self.bbox = Some(b),
            None => {
                log::debug!(
                    "frame {}: tracker lost face at {:?}",
                    self.frame_counter,
                    prev
                );
                self.clear();
            }
        }
    }

    pub fn start(&mut self, gray: &GrayImage, bbox: BoundingBox) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.start(gray, bbox);
        }
        self.bbox = Some(bbox);
    }

    pub fn clear(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.clear();
        }
        self.bbox = None;
    }

    /// Drop the tracker itself; the counter survives for reporting.
    pub fn release(&mut self) {
        self.clear();
        self.tracker = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted tracker results.
    struct ScriptedTracker {
        results: VecDeque<Option<BoundingBox>>,
    }

    impl FaceTracker for ScriptedTracker {
        fn start(&mut self, _gray: &GrayImage, _bbox: BoundingBox) {}

        fn update(&mut self, _gray: &GrayImage) -> Option<BoundingBox> {
            self.results.pop_front().flatten()
        }

        fn clear(&mut self) {}
    }

    fn state(results: Vec<Option<BoundingBox>>, interval: usize) -> TrackState {
        TrackState::new(
            Box::new(ScriptedTracker {
                results: results.into(),
            }),
            interval,
        )
    }

    fn gray() -> GrayImage {
        GrayImage::new(100, 100)
    }

    #[test]
    fn test_detection_needed_without_box() {
        let mut s = state(vec![], 10);
        s.advance();
        assert!(s.needs_detection());
    }

    #[test]
    fn test_detection_on_interval_multiples() {
        let mut s = state(vec![], 3);
        s.start(&gray(), BoundingBox::new(0, 0, 10, 10));
        let due: Vec<bool> = (0..6)
            .map(|_| {
                s.advance();
                s.needs_detection()
            })
            .collect();
        assert_eq!(due, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_tracker_moves_box() {
        let moved = BoundingBox::new(5, 5, 10, 10);
        let mut s = state(vec![Some(moved)], 10);
        s.start(&gray(), BoundingBox::new(0, 0, 10, 10));
        s.update_tracker(&gray());
        assert_eq!(s.bbox(), Some(moved));
    }

    #[test]
    fn test_tracker_failure_clears_box() {
        let mut s = state(vec![None], 10);
        s.start(&gray(), BoundingBox::new(0, 0, 10, 10));
        s.update_tracker(&gray());
        assert_eq!(s.bbox(), None);
        assert!(s.needs_detection());
    }

    #[test]
    fn test_tracker_result_clipped_to_frame() {
        let mut s = state(vec![Some(BoundingBox::new(95, 95, 10, 10))], 10);
        s.start(&gray(), BoundingBox::new(90, 90, 10, 10));
        s.update_tracker(&gray());
        assert_eq!(s.bbox(), Some(BoundingBox::new(95, 95, 5, 5)));
    }

    #[test]
    fn test_release_keeps_counter() {
        let mut s = state(vec![], 10);
        s.advance();
        s.advance();
        s.start(&gray(), BoundingBox::new(0, 0, 10, 10));
        s.release();
        assert_eq!(s.bbox(), None);
        assert_eq!(s.frame_counter(), 2);
    }
}
