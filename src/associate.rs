//! Plate-to-vehicle association by spatial containment.
//!
//! A plate belongs to a vehicle only when its box sits fully inside the
//! vehicle's box — partial overlap is rejected and no IoU scoring is
//! involved. When two vehicle boxes could both contain a plate, whichever
//! vehicle the engine processes first claims it; that ordering dependence
//! is deliberate and kept.

use crate::detector::BBox;

/// Full inclusive containment of `inner` within `outer`.
pub fn contains(outer: BBox, inner: BBox) -> bool {
    inner.0 >= outer.0 && inner.1 >= outer.1 && inner.2 <= outer.2 && inner.3 <= outer.3
}

#[cfg(test)]
mod tests {
    use super::*;

    const VEHICLE: BBox = (0, 0, 100, 100);

    #[test]
    fn fully_inside_is_contained() {
        assert!(contains(VEHICLE, (10, 10, 50, 50)));
    }

    #[test]
    fn partial_overlap_is_rejected() {
        // Exceeds x2.
        assert!(!contains(VEHICLE, (90, 10, 120, 50)));
        // Exceeds y1.
        assert!(!contains(VEHICLE, (10, -5, 50, 50)));
    }

    #[test]
    fn boundaries_are_inclusive() {
        assert!(contains(VEHICLE, (0, 0, 100, 100)));
        assert!(contains(VEHICLE, (0, 50, 100, 100)));
    }

    #[test]
    fn disjoint_boxes_are_rejected() {
        assert!(!contains(VEHICLE, (200, 200, 250, 250)));
    }
}
