// Debug rendering for replays: each iteration's frame is written to disk with the
// detected boxes outlined in green, their centroids marked in red, the tracked
// target marked in yellow, and the cleaned mask beside it.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use reticle::control_loop::{Telemetry, TelemetrySink};
use reticle::{BoundingBox, Centroid, ChannelOrder, Result};
use std::path::PathBuf;
use tracing::debug;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CENTROID_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TARGET_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const CENTROID_RADIUS: i32 = 3;

pub struct OverlaySink {
    dir: PathBuf,
    order: ChannelOrder,
}

impl OverlaySink {
    pub fn new(dir: PathBuf, order: ChannelOrder) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, order })
    }
}

impl TelemetrySink for OverlaySink {
    fn emit(&mut self, t: &Telemetry<'_>) -> Result<()> {
        let mut canvas = RgbImage::new(t.frame.width() * 2, t.frame.height());

        for (x, y, px) in t.frame.enumerate_pixels() {
            let [a, b, c] = px.0;
            let rgb = match self.order {
                ChannelOrder::Bgr => [c, b, a],
                ChannelOrder::Rgb => [a, b, c],
            };
            canvas.put_pixel(x, y, Rgb(rgb));
        }
        let mask = t.analysis.mask_rgb();
        for (x, y, px) in mask.enumerate_pixels() {
            canvas.put_pixel(x + t.frame.width(), y, *px);
        }

        for bbox in &t.analysis.bboxes {
            draw_box(&mut canvas, bbox);
            draw_dot(&mut canvas, bbox.centroid(), CENTROID_RADIUS, CENTROID_COLOR);
        }
        if let Some(target) = t.target {
            draw_dot(&mut canvas, target, CENTROID_RADIUS + 2, TARGET_COLOR);
        }

        let path = self.dir.join(format!("frame_{:05}.png", t.iteration));
        canvas.save(&path)?;
        debug!(path = %path.display(), fps = t.fps.round(), "overlay written");
        Ok(())
    }
}

fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox) {
    // Box extents are inclusive pixel coordinates, so the outline is one wider
    // than the stored width.
    let rect = Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width + 1, bbox.height + 1);
    draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
}

fn draw_dot(canvas: &mut RgbImage, c: Centroid, radius: i32, color: Rgb<u8>) {
    draw_filled_circle_mut(canvas, (c.x, c.y), radius, color);
}
