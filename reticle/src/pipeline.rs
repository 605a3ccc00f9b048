// THEORY:
// The `pipeline` module is the top-level API of the vision layer. It chains the
// stateless stages into a single call that turns a captured frame into a cleaned
// mask plus a list of candidate target boxes.
//
// Two variants share the same stages:
// - **Full** (continuous aiming): blur, HSV threshold, open/close/dilate, optional
//   mask-region clearing, binarize, label, box. Precise enough to center on.
// - **Fast** (fire-only): skips the blur and the region clearing and dilates less.
//   Coarser boxes, lower latency; good enough for an overlap test.

use crate::core_modules::blob_detector::{self, Connectivity};
use crate::core_modules::color::{self, ChannelOrder, Frame, Hsv};
use crate::core_modules::filter::{self, KernelSize};
use crate::core_modules::geometry::{BoundingBox, Centroid, MaskRegion};
use crate::core_modules::morphology::{self, KernelShape, StructuringElement};
use crate::error::{Error, Result};
use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Threshold applied after morphology; the mask is already 0/255 at that point.
const BINARIZE_LEVEL: u8 = 127;

/// Configuration for the VisionPipeline. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingParams {
    pub hsv_min: Hsv,
    pub hsv_max: Hsv,
    pub channel_order: ChannelOrder,
    /// Odd width/height of the Gaussian blur kernel; sigma is derived from it.
    pub blur_kernel: KernelSize,
    pub morph_kernel: KernelSize,
    pub morph_shape: KernelShape,
    /// Dilation passes after open/close in the full pipeline.
    pub dilate_iterations: u32,
    /// Dilation passes in the fast pipeline.
    pub fast_dilate_iterations: u32,
    /// When set, mask pixels outside this region are cleared before labeling.
    pub mask_region: Option<MaskRegion>,
    pub connectivity: Connectivity,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            hsv_min: Hsv::new(50, 210, 70),
            hsv_max: Hsv::new(70, 255, 255),
            channel_order: ChannelOrder::Bgr,
            blur_kernel: KernelSize::new(21, 21),
            morph_kernel: KernelSize::new(3, 3),
            morph_shape: KernelShape::Rect,
            dilate_iterations: 9,
            fast_dilate_iterations: 5,
            mask_region: None,
            connectivity: Connectivity::Eight,
        }
    }
}

impl ProcessingParams {
    pub fn validate(&self) -> Result<()> {
        self.blur_kernel.validate_odd("blur kernel")?;
        let (lo, hi) = (&self.hsv_min, &self.hsv_max);
        if lo.h > hi.h || lo.s > hi.s || lo.v > hi.v {
            return Err(Error::config(format!("hsv_min {lo:?} exceeds hsv_max {hi:?}")));
        }
        if lo.h > 180 || hi.h > 180 {
            return Err(Error::config("hue bounds must lie in 0..=180"));
        }
        Ok(())
    }
}

/// Which set of stages a pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    Full,
    Fast,
}

/// Output of one frame: the cleaned mask and the detected boxes.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub mask: GrayImage,
    /// Ordered by ascending component label.
    pub bboxes: Vec<BoundingBox>,
}

impl FrameAnalysis {
    pub fn centroids(&self) -> Vec<Centroid> {
        self.bboxes.iter().map(BoundingBox::centroid).collect()
    }

    /// The mask expanded to three channels for display.
    pub fn mask_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.mask.width(), self.mask.height(), |x, y| {
            let v = self.mask.get_pixel(x, y).0[0];
            Rgb([v, v, v])
        })
    }

    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }
}

/// The main, top-level struct for the vision layer.
pub struct VisionPipeline {
    params: ProcessingParams,
    kernel: StructuringElement,
    mode: PipelineMode,
}

impl VisionPipeline {
    /// The full pipeline, used for continuous aiming.
    pub fn new(params: ProcessingParams) -> Result<Self> {
        Self::with_mode(params, PipelineMode::Full)
    }

    /// The fast pipeline, used for the fire-only loop.
    pub fn fast(params: ProcessingParams) -> Result<Self> {
        Self::with_mode(params, PipelineMode::Fast)
    }

    pub fn with_mode(params: ProcessingParams, mode: PipelineMode) -> Result<Self> {
        params.validate()?;
        let kernel = StructuringElement::new(params.morph_shape, params.morph_kernel)?;
        Ok(Self { params, kernel, mode })
    }

    pub fn params(&self) -> &ProcessingParams {
        &self.params
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub fn process(&self, frame: &Frame) -> Result<FrameAnalysis> {
        let p = &self.params;

        // Stage 1: Noise Suppression
        let blurred;
        let source = match self.mode {
            PipelineMode::Full => {
                blurred = filter::gaussian_blur(frame, p.blur_kernel)?;
                &blurred
            }
            PipelineMode::Fast => frame,
        };

        // Stage 2: Color Thresholding
        let mask = color::hsv_threshold(source, p.channel_order, &p.hsv_min, &p.hsv_max);

        // Stage 3: Morphological Cleanup
        let iterations = match self.mode {
            PipelineMode::Full => p.dilate_iterations,
            PipelineMode::Fast => p.fast_dilate_iterations,
        };
        let mut mask = morphology::clean_mask(&mask, &self.kernel, iterations);

        // Stage 4: Region Clearing
        if let (PipelineMode::Full, Some(region)) = (self.mode, p.mask_region) {
            clear_outside(&mut mask, &region);
        }

        // Stage 5: Labeling
        color::binarize(&mut mask, BINARIZE_LEVEL);
        let bboxes = blob_detector::find_blobs(&mask, p.connectivity);

        debug!(boxes = bboxes.len(), "frame processed");
        Ok(FrameAnalysis { mask, bboxes })
    }
}

fn clear_outside(mask: &mut GrayImage, region: &MaskRegion) {
    for (x, y, px) in mask.enumerate_pixels_mut() {
        if !region.contains(x, y) {
            *px = Luma([0]);
        }
    }
}
