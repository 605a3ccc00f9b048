// Separable Gaussian smoothing applied to a frame before thresholding, so that
// single-pixel noise does not survive into the color mask.

use crate::core_modules::color::Frame;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A `width x height` kernel size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSize {
    pub width: u32,
    pub height: u32,
}

impl KernelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn validate_odd(&self, what: &str) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.width % 2 == 0 || self.height % 2 == 0 {
            return Err(Error::config(format!(
                "{what} must be odd and positive, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Sigma derived from the kernel length when none is given.
fn auto_sigma(len: u32) -> f64 {
    0.3 * ((len as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian weights of length `len`.
pub fn gaussian_kernel(len: u32, sigma: f64) -> Vec<f64> {
    let sigma = if sigma > 0.0 { sigma } else { auto_sigma(len) };
    let center = (len as f64 - 1.0) / 2.0;
    let mut weights: Vec<f64> = (0..len)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Mirror an out-of-range index back into `0..n` without repeating the edge.
fn reflect_101(mut i: i64, n: i64) -> usize {
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// Gaussian blur with sigma derived from `size` on each axis.
pub fn gaussian_blur(frame: &Frame, size: KernelSize) -> Result<Frame> {
    size.validate_odd("blur kernel")?;
    let (w, h) = (frame.width() as i64, frame.height() as i64);
    if w == 0 || h == 0 {
        return Ok(frame.clone());
    }

    let kx = gaussian_kernel(size.width, 0.0);
    let ky = gaussian_kernel(size.height, 0.0);
    let rx = (size.width / 2) as i64;
    let ry = (size.height / 2) as i64;
    let src = frame.as_raw();

    // Horizontal pass into a float buffer, vertical pass back to bytes.
    let mut tmp = vec![0.0f64; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f64; 3];
            for (k, weight) in kx.iter().enumerate() {
                let sx = reflect_101(x + k as i64 - rx, w);
                let base = ((y * w) as usize + sx) * 3;
                for c in 0..3 {
                    acc[c] += weight * src[base + c] as f64;
                }
            }
            let base = ((y * w + x) as usize) * 3;
            tmp[base..base + 3].copy_from_slice(&acc);
        }
    }

    let mut out = vec![0u8; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f64; 3];
            for (k, weight) in ky.iter().enumerate() {
                let sy = reflect_101(y + k as i64 - ry, h);
                let base = (sy * w as usize + x as usize) * 3;
                for c in 0..3 {
                    acc[c] += weight * tmp[base + c];
                }
            }
            let base = ((y * w + x) as usize) * 3;
            for c in 0..3 {
                out[base + c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Frame::from_raw(frame.width(), frame.height(), out)
        .ok_or_else(|| Error::config("blur output buffer size mismatch"))
}
