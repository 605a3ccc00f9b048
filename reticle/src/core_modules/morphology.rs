// THEORY:
// Binary morphology is the cleanup stage between thresholding and blob detection.
// A raw color mask of a target is rarely one clean region: thin outlines, shading
// and compression noise split it into fragments and sprinkle isolated pixels
// around it.
//
// The stages, in order:
// 1.  **Open** (erode, then dilate): removes specks smaller than the kernel.
// 2.  **Close** (dilate, then erode): fills pinholes inside surviving regions.
// 3.  **Repeated Dilation**: grows every region so fragments of the same target
//     merge into one blob. More iterations means coarser, but steadier, blobs.
//
// Pixels outside the image never participate: erosion treats them as foreground
// and dilation as background, so borders neither eat nor grow regions.

use crate::core_modules::filter::KernelSize;
use crate::error::{Error, Result};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Shape of the structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KernelShape {
    #[default]
    Rect,
    Ellipse,
    Cross,
}

/// A binary structuring element anchored at its center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    width: u32,
    height: u32,
    /// Offsets `(dx, dy)` relative to the anchor of every active cell.
    offsets: Vec<(i64, i64)>,
}

impl StructuringElement {
    pub fn new(shape: KernelShape, size: KernelSize) -> Result<Self> {
        if size.width == 0 || size.height == 0 {
            return Err(Error::config(format!(
                "morphology kernel must be positive, got {}x{}",
                size.width, size.height
            )));
        }
        let (w, h) = (size.width as i64, size.height as i64);
        let (ax, ay) = (w / 2, h / 2);
        let mut cells = vec![false; (w * h) as usize];

        match shape {
            KernelShape::Rect => cells.iter_mut().for_each(|c| *c = true),
            KernelShape::Cross => {
                for y in 0..h {
                    for x in 0..w {
                        if x == ax || y == ay {
                            cells[(y * w + x) as usize] = true;
                        }
                    }
                }
            }
            KernelShape::Ellipse => {
                let r = ay as f64;
                let c = ax as f64;
                let inv_r2 = if r > 0.0 { 1.0 / (r * r) } else { 0.0 };
                for y in 0..h {
                    let dy = y as f64 - r;
                    if dy.abs() > r {
                        continue;
                    }
                    let dx = (c * ((r * r - dy * dy) * inv_r2).sqrt()).round() as i64;
                    let x0 = (ax - dx).max(0);
                    let x1 = (ax + dx + 1).min(w);
                    for x in x0..x1 {
                        cells[(y * w + x) as usize] = true;
                    }
                }
            }
        }

        let offsets = (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .filter(|&(x, y)| cells[(y * w + x) as usize])
            .map(|(x, y)| (x - ax, y - ay))
            .collect();

        Ok(Self {
            width: size.width,
            height: size.height,
            offsets,
        })
    }

    pub fn size(&self) -> KernelSize {
        KernelSize::new(self.width, self.height)
    }

    pub fn is_active(&self, dx: i64, dy: i64) -> bool {
        self.offsets.contains(&(dx, dy))
    }
}

#[derive(Clone, Copy)]
enum Op {
    Erode,
    Dilate,
}

fn apply(mask: &GrayImage, kernel: &StructuringElement, op: Op) -> GrayImage {
    let (w, h) = (mask.width() as i64, mask.height() as i64);
    let src = mask.as_raw();
    let mut out = GrayImage::new(mask.width(), mask.height());

    for y in 0..h {
        for x in 0..w {
            let mut acc = match op {
                Op::Erode => u8::MAX,
                Op::Dilate => u8::MIN,
            };
            for &(dx, dy) in &kernel.offsets {
                let (sx, sy) = (x + dx, y + dy);
                if sx < 0 || sy < 0 || sx >= w || sy >= h {
                    continue;
                }
                let v = src[(sy * w + sx) as usize];
                acc = match op {
                    Op::Erode => acc.min(v),
                    Op::Dilate => acc.max(v),
                };
            }
            out.put_pixel(x as u32, y as u32, Luma([acc]));
        }
    }
    out
}

pub fn erode(mask: &GrayImage, kernel: &StructuringElement) -> GrayImage {
    apply(mask, kernel, Op::Erode)
}

pub fn dilate(mask: &GrayImage, kernel: &StructuringElement, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = apply(&out, kernel, Op::Dilate);
    }
    out
}

pub fn open(mask: &GrayImage, kernel: &StructuringElement) -> GrayImage {
    dilate(&erode(mask, kernel), kernel, 1)
}

pub fn close(mask: &GrayImage, kernel: &StructuringElement) -> GrayImage {
    erode(&dilate(mask, kernel, 1), kernel)
}

/// Open, close, then dilate `dilate_iterations` times.
pub fn clean_mask(mask: &GrayImage, kernel: &StructuringElement, dilate_iterations: u32) -> GrayImage {
    let opened = open(mask, kernel);
    let closed = close(&opened, kernel);
    dilate(&closed, kernel, dilate_iterations)
}
