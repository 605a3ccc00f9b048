// THEORY:
// Last stage of the vision pipeline: the cleaned binary mask goes in, and one
// axis-aligned box per connected foreground region comes out. Those boxes are
// everything the tracker ever sees of a frame.
//
// Key architectural principles & algorithm steps:
// 1.  **Labeling**: The mask is scanned row by row. Every foreground pixel that
//     has not been visited yet seeds a new label, and a flood fill claims every
//     pixel reachable from it under the chosen adjacency rule. Label 0 is the
//     background and never produces a box.
// 2.  **Deterministic Ordering**: Labels are handed out in scan order of their
//     seed pixel, so box order is reproducible for a given mask. Callers must not
//     rely on it for anything but reproducibility.
// 3.  **Data Aggregation**: Each label's box spans the extreme coordinates of its
//     pixels. Width and height are `max - min`, so a single isolated pixel yields
//     a zero-sized box; it is kept, not filtered.
// 4.  **Stateless Utility**: Like the rest of the vision layer, this module has no
//     memory of previous frames.

use crate::core_modules::geometry::BoundingBox;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Adjacency rule used when growing a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connectivity {
    /// Horizontal and vertical neighbors only.
    Four,
    /// Diagonal neighbors as well.
    #[default]
    Eight,
}

impl Connectivity {
    fn neighbors(self) -> &'static [(i64, i64)] {
        const FOUR: [(i64, i64); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
        const EIGHT: [(i64, i64); 8] = [
            (0, 1),
            (0, -1),
            (1, 0),
            (-1, 0),
            (1, 1),
            (1, -1),
            (-1, 1),
            (-1, -1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Row-major label image produced by [`label_components`].
#[derive(Debug, Clone)]
pub struct LabelMap {
    pub width: u32,
    pub height: u32,
    /// One label per pixel; 0 is background.
    pub labels: Vec<u32>,
    /// Number of labels including the background.
    pub num_labels: u32,
}

impl LabelMap {
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.labels[(y * self.width + x) as usize]
    }
}

/// Assigns a label to every foreground (non-zero) pixel of `mask`.
pub fn label_components(mask: &GrayImage, connectivity: Connectivity) -> LabelMap {
    let (w, h) = (mask.width() as i64, mask.height() as i64);
    let src = mask.as_raw();
    let mut labels = vec![0u32; src.len()];
    let mut next_label = 1u32;
    let mut stack: Vec<(i64, i64)> = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if src[idx] == 0 || labels[idx] != 0 {
                continue;
            }

            labels[idx] = next_label;
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for (dx, dy) in connectivity.neighbors() {
                    let nx = cx + dx;
                    let ny = cy + dy;
                    if nx < 0 || nx >= w || ny < 0 || ny >= h {
                        continue;
                    }
                    let n_idx = (ny * w + nx) as usize;
                    if src[n_idx] != 0 && labels[n_idx] == 0 {
                        labels[n_idx] = next_label;
                        stack.push((nx, ny));
                    }
                }
            }
            next_label += 1;
        }
    }

    LabelMap {
        width: mask.width(),
        height: mask.height(),
        labels,
        num_labels: next_label,
    }
}

/// One box per non-background label, ordered by ascending label id.
pub fn bounding_boxes(map: &LabelMap) -> Vec<BoundingBox> {
    let n = map.num_labels.saturating_sub(1) as usize;
    let mut extents = vec![(u32::MAX, u32::MAX, 0u32, 0u32); n];

    for (i, &label) in map.labels.iter().enumerate() {
        if label == 0 {
            continue;
        }
        let x = i as u32 % map.width;
        let y = i as u32 / map.width;
        let e = &mut extents[(label - 1) as usize];
        e.0 = e.0.min(x);
        e.1 = e.1.min(y);
        e.2 = e.2.max(x);
        e.3 = e.3.max(y);
    }

    extents
        .into_iter()
        .map(|(min_x, min_y, max_x, max_y)| BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y))
        .collect()
}

/// Labels `mask` and returns the bounding box of every component.
pub fn find_blobs(mask: &GrayImage, connectivity: Connectivity) -> Vec<BoundingBox> {
    bounding_boxes(&label_components(mask, connectivity))
}
