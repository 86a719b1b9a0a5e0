//! Box geometry and on-screen suppression.
//!
//! Targets are suppressed when an occluder (a screen-class detection) covers
//! more than half of the target's own area. This is intersection over
//! *target* area, not intersection over union: a large screen containing a
//! small target yields 1.0, while a large target brushing a small screen
//! yields a tiny ratio and is not suppressed.

/// Coverage above which a target counts as displayed on a screen.
pub const OCCLUSION_RATIO: f64 = 0.5;

/// Axis-aligned box in frame pixel coordinates. Always `x1 <= x2`, `y1 <= y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Build a box from two corners in any order.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Zero when the corners are inverted.
    pub fn width(&self) -> i64 {
        (i64::from(self.x2) - i64::from(self.x1)).max(0)
    }

    pub fn height(&self) -> i64 {
        (i64::from(self.y2) - i64::from(self.y1)).max(0)
    }

    /// Area in square pixels. Zero for degenerate or inverted boxes.
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Overlapping region, or `None` when it has no positive area.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(BoundingBox { x1, y1, x2, y2 })
    }

    /// Fraction of this box covered by `other`. Zero-area boxes report 0.
    pub fn coverage_by(&self, other: &BoundingBox) -> f64 {
        let area = self.area();
        if area == 0 {
            return 0.0;
        }
        match self.intersection(other) {
            Some(inter) => inter.area() as f64 / area as f64,
            None => 0.0,
        }
    }

    /// Classic intersection over union, used for duplicate suppression.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let Some(inter) = self.intersection(other) else {
            return 0.0;
        };
        let inter_area = inter.area();
        let union = self.area() + other.area() - inter_area;
        if union <= 0 {
            return 0.0;
        }
        inter_area as f64 / union as f64
    }

    /// Clamp the box into a `width` x `height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> BoundingBox {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);
        BoundingBox::new(
            self.x1.clamp(0, max_x),
            self.y1.clamp(0, max_y),
            self.x2.clamp(0, max_x),
            self.y2.clamp(0, max_y),
        )
    }
}

/// Returns true when any occluder covers more than half of `target`.
///
/// Zero-area targets are never suppressed.
pub fn is_occluded(target: &BoundingBox, occluders: &[BoundingBox]) -> bool {
    if target.area() == 0 {
        return false;
    }
    occluders
        .iter()
        .any(|occluder| target.coverage_by(occluder) > OCCLUSION_RATIO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_fully_covering_target_suppresses() {
        let target = BoundingBox::new(100, 100, 200, 200);
        let screen = BoundingBox::new(0, 0, 400, 400);
        assert_eq!(target.area(), 10_000);
        assert_eq!(target.coverage_by(&screen), 1.0);
        assert!(is_occluded(&target, &[screen]));
    }

    #[test]
    fn large_target_touching_small_screen_is_not_suppressed() {
        let target = BoundingBox::new(0, 0, 1000, 1000);
        let screen = BoundingBox::new(0, 0, 10, 10);
        assert!(target.coverage_by(&screen) <= 0.0001);
        assert!(!is_occluded(&target, &[screen]));
    }

    #[test]
    fn exactly_half_covered_is_not_suppressed() {
        let target = BoundingBox::new(0, 0, 100, 100);
        let screen = BoundingBox::new(0, 0, 50, 100);
        assert_eq!(target.coverage_by(&screen), 0.5);
        assert!(!is_occluded(&target, &[screen]));

        let wider = BoundingBox::new(0, 0, 51, 100);
        assert!(is_occluded(&target, &[wider]));
    }

    #[test]
    fn degenerate_target_is_never_suppressed() {
        let line = BoundingBox::new(10, 10, 10, 50);
        let screen = BoundingBox::new(0, 0, 100, 100);
        assert_eq!(line.area(), 0);
        assert!(!is_occluded(&line, &[screen]));
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(10, 0, 20, 10);
        assert!(a.intersection(&b).is_none());
        assert!(!is_occluded(&a, &[b]));
    }

    #[test]
    fn occluder_order_and_duplicates_do_not_matter() {
        let target = BoundingBox::new(100, 100, 200, 200);
        let miss = BoundingBox::new(500, 500, 600, 600);
        let hit = BoundingBox::new(90, 90, 210, 210);
        let forward = is_occluded(&target, &[miss, hit]);
        let reverse = is_occluded(&target, &[hit, miss]);
        let duplicated = is_occluded(&target, &[miss, miss, hit, hit]);
        assert!(forward && reverse && duplicated);
        assert!(!is_occluded(&target, &[miss, miss]));
        assert!(!is_occluded(&target, &[]));
    }

    #[test]
    fn new_orders_corners() {
        let b = BoundingBox::new(20, 30, 10, 5);
        assert_eq!(b, BoundingBox { x1: 10, y1: 5, x2: 20, y2: 30 });
    }

    #[test]
    fn inverted_literal_box_has_no_area() {
        let inverted = BoundingBox { x1: 20, y1: 30, x2: 10, y2: 5 };
        assert_eq!(inverted.area(), 0);
        assert_eq!(inverted.coverage_by(&BoundingBox::new(0, 0, 100, 100)), 0.0);
        assert!(!is_occluded(&inverted, &[BoundingBox::new(0, 0, 100, 100)]));
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, 0, 15, 10);
        assert_eq!(a.iou(&a), 1.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_keeps_box_inside_frame() {
        let b = BoundingBox::new(-5, -5, 700, 500).clamp_to(640, 480);
        assert_eq!(b, BoundingBox::new(0, 0, 640, 480));
    }
}
