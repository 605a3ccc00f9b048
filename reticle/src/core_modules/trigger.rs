// Overlap test for the fire-only loop: fire when the aim point sits inside any
// detected box. Each box is shrunk on every edge by a random margin of up to
// `MAX_MARGIN_FRACTION` of its height, so shots do not land exactly on box edges.

use crate::core_modules::geometry::{BoundingBox, Centroid};
use rand::Rng;

pub const MAX_MARGIN_FRACTION: f64 = 0.1;

/// True if `point` lies inside `bbox` shrunk by `margin` pixels on each edge.
pub fn inside_with_margin(point: Centroid, bbox: &BoundingBox, margin: f64) -> bool {
    let (px, py) = (point.x as f64, point.y as f64);
    let left = bbox.x as f64 + margin;
    let top = bbox.y as f64 + margin;
    let right = (bbox.x + bbox.width) as f64 - margin;
    let bottom = (bbox.y + bbox.height) as f64 - margin;
    px >= left && px <= right && py >= top && py <= bottom
}

/// Decides whether to fire at `aim_point` given this frame's detections.
pub fn should_fire<R: Rng>(aim_point: Centroid, bboxes: &[BoundingBox], rng: &mut R) -> bool {
    bboxes.iter().any(|bbox| {
        let max_margin = bbox.height as f64 * MAX_MARGIN_FRACTION;
        let margin = if max_margin > 0.0 {
            rng.gen_range(0.0..=max_margin)
        } else {
            0.0
        };
        inside_with_margin(aim_point, bbox, margin)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn center_inside_box_fires() {
        let mut rng = StdRng::seed_from_u64(7);
        let boxes = [BoundingBox::new(300, 200, 40, 80)];
        for _ in 0..100 {
            assert!(should_fire(Centroid::new(320, 240), &boxes, &mut rng));
        }
    }

    #[test]
    fn point_outside_every_box_never_fires() {
        let mut rng = StdRng::seed_from_u64(7);
        let boxes = [BoundingBox::new(0, 0, 10, 10), BoundingBox::new(500, 500, 30, 30)];
        for _ in 0..100 {
            assert!(!should_fire(Centroid::new(320, 240), &boxes, &mut rng));
        }
    }

    #[test]
    fn no_boxes_never_fires() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(!should_fire(Centroid::new(1, 1), &[], &mut rng));
    }

    #[test]
    fn margin_shrinks_every_edge() {
        let b = BoundingBox::new(100, 100, 50, 50);
        assert!(inside_with_margin(Centroid::new(100, 100), &b, 0.0));
        assert!(!inside_with_margin(Centroid::new(100, 100), &b, 1.0));
        assert!(!inside_with_margin(Centroid::new(150, 125), &b, 1.0));
        assert!(inside_with_margin(Centroid::new(149, 149), &b, 1.0));
    }
}
