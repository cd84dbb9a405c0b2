/// Result of running detection on a frame.
///
/// Boxes are in pixel coordinates of the image handed to the detector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    pub boxes: Vec<BoundingBox>,
}

impl DetectionResult {
    pub fn new(boxes: Vec<BoundingBox>) -> Self {
        Self { boxes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of candidates found in the frame.
    pub fn count(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// The box the tracker follows: the largest by area, the first on ties.
    pub fn primary(&self) -> Option<&BoundingBox> {
        let mut best: Option<&BoundingBox> = None;
        for candidate in &self.boxes {
            match best {
                Some(current) if candidate.area() <= current.area() => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub score: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            score: 1.0,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.w as f64 / 2.0,
            self.y as f64 + self.h as f64 / 2.0,
        )
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_is_largest_box() {
        let result = DetectionResult::new(vec![
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            BoundingBox::new(50.0, 50.0, 40.0, 30.0),
            BoundingBox::new(100.0, 0.0, 20.0, 20.0),
        ]);
        assert_eq!(result.count(), 3);
        assert_eq!(result.primary().map(|b| b.center()), Some((70.0, 65.0)));
    }

    #[test]
    fn primary_prefers_first_on_ties() {
        let result = DetectionResult::new(vec![
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            BoundingBox::new(90.0, 90.0, 10.0, 10.0),
        ]);
        assert_eq!(result.primary().map(|b| b.x), Some(0.0));
    }

    #[test]
    fn empty_result_has_no_primary() {
        let result = DetectionResult::empty();
        assert!(result.is_empty());
        assert!(result.primary().is_none());
    }
}
