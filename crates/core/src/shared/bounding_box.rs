/// Axis-aligned pixel rectangle in frame coordinates.
///
/// Boxes handed out by the detector are always clipped to the frame they
/// were computed from; use [`BoundingBox::clipped`] when producing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Intersect with `[0, frame_width) x [0, frame_height)`.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn clipped(&self, frame_width: u32, frame_height: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(frame_width as i32);
        let y2 = self.bottom().min(frame_height as i32);
        let clipped = BoundingBox::new(x1, y1, x2 - x1, y2 - y1);
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Picks the candidate with the largest area; ties keep the earliest.
    pub fn largest(candidates: &[BoundingBox]) -> Option<BoundingBox> {
        candidates.iter().fold(None, |best: Option<BoundingBox>, c| match best {
            Some(b) if b.area() >= c.area() => Some(b),
            _ => Some(*c),
        })
    }
}
