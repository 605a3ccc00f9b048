// THEORY:
// The `geometry` module holds the small, "dumb" data containers that every other
// layer passes around: the axis-aligned `BoundingBox` produced by the blob
// detector, the `Centroid` the tracker remembers between frames, and the two
// rectangular region types used to reject HUD clutter.
//
// Key architectural principles:
// 1.  **Pixel Space Only**: Every coordinate is an integer pixel position in the
//     captured frame. Nothing here is normalized, because the PID gains are tuned
//     directly against pixel offsets.
// 2.  **Stateless Data**: None of these types know anything about time. Persistence
//     across frames is the tracker's job.

use serde::{Deserialize, Serialize};

/// An axis-aligned box around one connected component.
///
/// `width` and `height` are `x_max - x_min` and `y_max - y_min`, so a single
/// isolated pixel yields a zero-sized box. Such boxes are valid; they simply
/// rank last when sorted by area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Center of the box, rounded down.
    pub fn centroid(&self) -> Centroid {
        Centroid {
            x: (self.x + self.width / 2) as i32,
            y: (self.y + self.height / 2) as i32,
        }
    }
}

/// Bounding-box center used as the on-screen position of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Centroid {
    pub x: i32,
    pub y: i32,
}

impl Centroid {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean (L2) distance between two centroids.
    pub fn distance_to(&self, other: &Centroid) -> f64 {
        let dx = (other.x - self.x) as f64;
        let dy = (other.y - self.y) as f64;
        dx.hypot(dy)
    }

    /// Component-wise `self - origin`.
    pub fn offset_from(&self, origin: &Centroid) -> (i32, i32) {
        (self.x - origin.x, self.y - origin.y)
    }
}

/// Rectangle of the mask that survives ROI clearing; everything outside it is
/// zeroed before component labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl MaskRegion {
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x
            && py >= self.y
            && (px - self.x) < self.width
            && (py - self.y) < self.height
    }
}

/// Inclusive bounds a box centroid must fall within for the box to be
/// eligible for acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionBounds {
    pub x_center_min: i32,
    pub x_center_max: i32,
    pub y_center_min: i32,
    pub y_center_max: i32,
}

impl Default for AcquisitionBounds {
    fn default() -> Self {
        Self {
            x_center_min: 0,
            x_center_max: i32::MAX,
            y_center_min: 0,
            y_center_max: i32::MAX,
        }
    }
}

impl AcquisitionBounds {
    pub fn contains(&self, c: &Centroid) -> bool {
        (self.x_center_min..=self.x_center_max).contains(&c.x)
            && (self.y_center_min..=self.y_center_max).contains(&c.y)
    }

    pub fn admits(&self, bbox: &BoundingBox) -> bool {
        self.contains(&bbox.centroid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn centroid_floors_half_extent() {
        let b = BoundingBox::new(10, 20, 5, 3);
        assert_eq!(b.centroid(), Centroid::new(12, 21));
    }

    #[test]
    fn single_pixel_box_has_zero_area() {
        let b = BoundingBox::new(4, 4, 0, 0);
        assert_eq!(b.area(), 0);
        assert_eq!(b.centroid(), Centroid::new(4, 4));
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Centroid::new(0, 0);
        let b = Centroid::new(3, 4);
        assert_relative_eq!(a.distance_to(&b), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn default_bounds_admit_whole_frame() {
        let bounds = AcquisitionBounds::default();
        assert!(bounds.admits(&BoundingBox::new(0, 0, 1, 1)));
        assert!(bounds.admits(&BoundingBox::new(1900, 1000, 20, 20)));
    }

    #[test]
    fn bounds_reject_left_margin() {
        let bounds = AcquisitionBounds {
            x_center_min: 100,
            ..Default::default()
        };
        assert!(!bounds.admits(&BoundingBox::new(0, 0, 50, 50)));
        assert!(bounds.admits(&BoundingBox::new(90, 0, 50, 50)));
    }

    #[test]
    fn mask_region_is_half_open() {
        let r = MaskRegion { x: 2, y: 2, width: 3, height: 3 };
        assert!(r.contains(2, 2));
        assert!(r.contains(4, 4));
        assert!(!r.contains(5, 4));
        assert!(!r.contains(1, 3));
    }
}
