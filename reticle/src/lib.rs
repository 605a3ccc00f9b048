// THEORY:
// This file is the main entry point for the `reticle` library crate. It exposes
// the engine as three layers plus an orchestrator:
//
// - `pipeline`: frame -> cleaned mask + candidate boxes (stateless).
// - `core_modules::tracker`: one persistent target slot, nearest-neighbor updates,
//   owning the per-axis `pid` controllers.
// - `control_loop`: the polling loops (aim and fire) that drive everything through
//   the collaborator traits in `core_modules::devices`.
//
// Platform specifics (window capture, input injection, on-screen rendering) stay
// behind those traits and are not part of this crate.

pub mod config;
pub mod control_loop;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use config::{KeyBindings, Settings};
pub use control_loop::{AimLoop, FireLoop, LoopControl, Telemetry, TelemetrySink};
pub use core_modules::color::{ChannelOrder, Frame, Hsv};
pub use core_modules::devices::{Actuator, FrameSource, Key, KeySampler, MouseButton};
pub use core_modules::geometry::{AcquisitionBounds, BoundingBox, Centroid, MaskRegion};
pub use core_modules::pid::{Limits, PidController, PidParams};
pub use core_modules::tracker::{TargetTracker, TrackerState};
pub use error::{Error, Result};
pub use pipeline::{FrameAnalysis, ProcessingParams, VisionPipeline};
