// THEORY:
// The `color` module is the first decision point of the vision layer. It turns a
// captured color frame into a binary mask by asking one question per pixel: does
// its hue/saturation/value fall inside the configured band?
//
// HSV uses the 8-bit convention of common vision toolkits: hue is halved into
// 0..=180 so it fits a byte, saturation and value span 0..=255. Threshold presets
// are written against that scale and must keep working unchanged.

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

/// A captured frame: height x width x 3 channels, 8 bits per channel.
///
/// The storage type is `RgbImage`, but the meaning of the three channels is set
/// by [`ChannelOrder`]; a capture source and the pipeline must agree on it.
pub type Frame = RgbImage;

/// Order of the three channels inside a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelOrder {
    #[default]
    Bgr,
    Rgb,
}

/// A hue/saturation/value sample on the 8-bit scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let (rf, gf, bf) = (r as f64, g as f64, b as f64);
        let max = rf.max(gf).max(bf);
        let min = rf.min(gf).min(bf);
        let diff = max - min;

        let s = if max > 0.0 { 255.0 * diff / max } else { 0.0 };

        let mut h = if diff == 0.0 {
            0.0
        } else if max == rf {
            60.0 * (gf - bf) / diff
        } else if max == gf {
            120.0 + 60.0 * (bf - rf) / diff
        } else {
            240.0 + 60.0 * (rf - gf) / diff
        };
        if h < 0.0 {
            h += 360.0;
        }

        Self {
            h: (h / 2.0).round().min(180.0) as u8,
            s: s.round() as u8,
            v: max as u8,
        }
    }

    /// Component-wise inclusive comparison against a `[min, max]` band.
    pub fn within(&self, min: &Hsv, max: &Hsv) -> bool {
        (min.h..=max.h).contains(&self.h)
            && (min.s..=max.s).contains(&self.s)
            && (min.v..=max.v).contains(&self.v)
    }
}

impl ChannelOrder {
    pub fn to_hsv(self, px: [u8; 3]) -> Hsv {
        match self {
            ChannelOrder::Bgr => Hsv::from_rgb(px[2], px[1], px[0]),
            ChannelOrder::Rgb => Hsv::from_rgb(px[0], px[1], px[2]),
        }
    }

    /// Packs an `(r, g, b)` color into this channel order.
    pub fn pack(self, r: u8, g: u8, b: u8) -> [u8; 3] {
        match self {
            ChannelOrder::Bgr => [b, g, r],
            ChannelOrder::Rgb => [r, g, b],
        }
    }
}

/// Produces a 0/255 mask of every pixel whose HSV value lies in `[min, max]`.
pub fn hsv_threshold(frame: &Frame, order: ChannelOrder, min: &Hsv, max: &Hsv) -> GrayImage {
    let mut mask = GrayImage::new(frame.width(), frame.height());
    for (x, y, px) in frame.enumerate_pixels() {
        if order.to_hsv(px.0).within(min, max) {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}

/// Binarizes a mask: strictly above `level` becomes 255, everything else 0.
pub fn binarize(mask: &mut GrayImage, level: u8) {
    for px in mask.pixels_mut() {
        px.0[0] = if px.0[0] > level { 255 } else { 0 };
    }
}
