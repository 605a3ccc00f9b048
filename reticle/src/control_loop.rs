// THEORY:
// The `control_loop` module is the orchestrator that ties every layer together.
// It is a single-threaded polling loop: each iteration captures a frame, runs the
// vision pipeline, updates the tracker, and issues at most one actuator command.
//
// Key architectural principles:
// 1.  **Sequential Iterations**: capture blocks, processing runs inline, and there is
//     no suspension point. The loop runs as fast as capture and processing allow.
// 2.  **Measured Time**: `dt` is the wall-clock time of the iteration up to the
//     control step, fed straight into the PID controllers. It is never assumed
//     constant.
// 3.  **Manual Trigger**: the aim loop only moves the pointer while the engage key is
//     held. The tracker keeps following its target even when disengaged, so
//     re-engaging is instantaneous.
// 4.  **Single Telemetry Point**: every iteration ends with one `TelemetrySink::emit`
//     call carrying the processed mask and boxes. Rendering lives behind that trait.
// 5.  **Fail Fast**: any collaborator error ends the loop. Restart policy belongs to
//     whoever runs it.

use crate::config::{KeyBindings, Settings};
use crate::core_modules::color::Frame;
use crate::core_modules::devices::{Actuator, FrameSource, KeySampler, MouseButton};
use crate::core_modules::geometry::Centroid;
use crate::core_modules::keyboard::KeyboardState;
use crate::core_modules::tracker::TargetTracker;
use crate::core_modules::trigger;
use crate::error::Result;
use crate::pipeline::{FrameAnalysis, VisionPipeline};
use rand::Rng;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info};

const FPS_WINDOW: usize = 30;

/// Whether the loop should run another iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

/// Measures the duration of one iteration.
pub trait Stopwatch {
    /// Marks the beginning of an iteration.
    fn start(&mut self);
    /// Seconds since the last `start`.
    fn elapsed_secs(&self) -> f64;
}

/// Wall-clock stopwatch.
pub struct SystemStopwatch {
    started: Instant,
}

impl Default for SystemStopwatch {
    fn default() -> Self {
        Self { started: Instant::now() }
    }
}

impl Stopwatch for SystemStopwatch {
    fn start(&mut self) {
        self.started = Instant::now();
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Reports the same duration every iteration. Used for replays and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedStopwatch(pub f64);

impl Stopwatch for FixedStopwatch {
    fn start(&mut self) {}

    fn elapsed_secs(&self) -> f64 {
        self.0
    }
}

/// Rolling average of the per-iteration frame rate.
#[derive(Debug)]
pub struct FpsCounter {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl FpsCounter {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Records one iteration of `dt` seconds and returns the average rate.
    pub fn record(&mut self, dt: f64) -> f64 {
        if dt > 0.0 && dt.is_finite() {
            self.samples.push_back(1.0 / dt);
            if self.samples.len() > self.capacity {
                self.samples.pop_front();
            }
        }
        self.average()
    }

    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

/// What one iteration saw and did.
#[derive(Debug)]
pub struct Telemetry<'a> {
    pub iteration: u64,
    pub fps: f64,
    pub frame: &'a Frame,
    pub analysis: &'a FrameAnalysis,
    pub aim_point: Centroid,
    pub target: Option<Centroid>,
    /// Relative move issued this iteration, if any.
    pub moved: Option<(i32, i32)>,
    pub fired: bool,
}

/// Receives telemetry once at the end of every iteration.
pub trait TelemetrySink {
    fn emit(&mut self, telemetry: &Telemetry<'_>) -> Result<()>;
}

/// Discards telemetry.
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn emit(&mut self, _telemetry: &Telemetry<'_>) -> Result<()> {
        Ok(())
    }
}

/// Writes a one-line summary of every iteration to the `tracing` log.
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn emit(&mut self, t: &Telemetry<'_>) -> Result<()> {
        debug!(
            iteration = t.iteration,
            fps = t.fps.round(),
            boxes = t.analysis.bboxes.len(),
            target = ?t.target,
            moved = ?t.moved,
            fired = t.fired,
            "iteration"
        );
        Ok(())
    }
}

pub fn frame_center(frame: &Frame) -> Centroid {
    Centroid::new((frame.width() / 2) as i32, (frame.height() / 2) as i32)
}

/// Continuous aim-assist loop.
pub struct AimLoop<F, A, K, R> {
    source: F,
    actuator: A,
    keyboard: KeyboardState<K>,
    pipeline: VisionPipeline,
    tracker: TargetTracker<R>,
    keys: KeyBindings,
    telemetry: Box<dyn TelemetrySink>,
    stopwatch: Box<dyn Stopwatch>,
    fps: FpsCounter,
    iteration: u64,
}

impl<F, A, K, R> AimLoop<F, A, K, R>
where
    F: FrameSource,
    A: Actuator,
    K: KeySampler,
    R: Rng,
{
    pub fn new(source: F, actuator: A, sampler: K, rng: R, settings: &Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            source,
            actuator,
            keyboard: KeyboardState::new(sampler),
            pipeline: VisionPipeline::new(settings.processing.clone())?,
            tracker: TargetTracker::new(settings.acquisition, settings.yaw, settings.pitch, rng)?,
            keys: settings.keys,
            telemetry: Box::new(LogTelemetry),
            stopwatch: Box::new(SystemStopwatch::default()),
            fps: FpsCounter::new(FPS_WINDOW),
            iteration: 0,
        })
    }

    pub fn with_telemetry(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.telemetry = Box::new(sink);
        self
    }

    pub fn with_stopwatch(mut self, stopwatch: impl Stopwatch + 'static) -> Self {
        self.stopwatch = Box::new(stopwatch);
        self
    }

    pub fn tracker(&self) -> &TargetTracker<R> {
        &self.tracker
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn iterations(&self) -> u64 {
        self.iteration
    }

    /// Focuses the captured window, then iterates until a stop key is seen.
    pub fn run(&mut self) -> Result<()> {
        self.source.focus_current_window()?;
        info!("aim loop started");
        while self.run_iteration()? == LoopControl::Continue {}
        info!(iterations = self.iteration, "aim loop stopped");
        Ok(())
    }

    pub fn run_iteration(&mut self) -> Result<LoopControl> {
        self.stopwatch.start();

        self.keyboard.sample()?;
        if self.stop_requested() {
            self.keyboard.advance();
            return Ok(LoopControl::Stop);
        }

        let frame = self.source.take_screenshot()?;
        let analysis = self.pipeline.process(&frame)?;
        let aim_point = frame_center(&frame);

        if analysis.is_empty() || self.keyboard.was_released(self.keys.reset) {
            self.tracker.reset_target();
        }

        let dt = self.stopwatch.elapsed_secs();
        let mut moved = None;
        if self.keyboard.is_held(self.keys.engage) {
            self.tracker.choose_target(&analysis.bboxes);
            if let Some(correction) = self.tracker.correction(dt, aim_point)? {
                let (dx, dy) = correction.as_move();
                self.actuator.move_by(dx, dy)?;
                moved = Some((dx, dy));
            }
        }

        self.tracker.update_current_target(&analysis.bboxes);

        let fps = self.fps.record(dt);
        self.telemetry.emit(&Telemetry {
            iteration: self.iteration,
            fps,
            frame: &frame,
            analysis: &analysis,
            aim_point,
            target: self.tracker.target(),
            moved,
            fired: false,
        })?;

        self.keyboard.advance();
        self.iteration += 1;
        Ok(LoopControl::Continue)
    }

    fn stop_requested(&self) -> bool {
        let stop = self.keyboard.was_pressed(self.keys.quit) || self.keyboard.is_held(self.keys.emergency_stop);
        if stop {
            info!("stop key seen");
        }
        stop
    }
}

/// Stateless fire-only loop: clicks whenever the aim point lies inside a box.
pub struct FireLoop<F, A, K, R> {
    source: F,
    actuator: A,
    keyboard: KeyboardState<K>,
    pipeline: VisionPipeline,
    rng: R,
    button: MouseButton,
    keys: KeyBindings,
    telemetry: Box<dyn TelemetrySink>,
    stopwatch: Box<dyn Stopwatch>,
    fps: FpsCounter,
    iteration: u64,
}

impl<F, A, K, R> FireLoop<F, A, K, R>
where
    F: FrameSource,
    A: Actuator,
    K: KeySampler,
    R: Rng,
{
    pub fn new(source: F, actuator: A, sampler: K, rng: R, settings: &Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            source,
            actuator,
            keyboard: KeyboardState::new(sampler),
            pipeline: VisionPipeline::fast(settings.processing.clone())?,
            rng,
            button: settings.fire_button.0,
            keys: settings.keys,
            telemetry: Box::new(LogTelemetry),
            stopwatch: Box::new(SystemStopwatch::default()),
            fps: FpsCounter::new(FPS_WINDOW),
            iteration: 0,
        })
    }

    pub fn with_telemetry(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.telemetry = Box::new(sink);
        self
    }

    pub fn with_stopwatch(mut self, stopwatch: impl Stopwatch + 'static) -> Self {
        self.stopwatch = Box::new(stopwatch);
        self
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn iterations(&self) -> u64 {
        self.iteration
    }

    pub fn run(&mut self) -> Result<()> {
        self.source.focus_current_window()?;
        info!("fire loop started");
        while self.run_iteration()? == LoopControl::Continue {}
        info!(iterations = self.iteration, "fire loop stopped");
        Ok(())
    }

    pub fn run_iteration(&mut self) -> Result<LoopControl> {
        self.stopwatch.start();

        self.keyboard.sample()?;
        if self.keyboard.was_pressed(self.keys.quit) || self.keyboard.is_held(self.keys.emergency_stop) {
            info!("stop key seen");
            self.keyboard.advance();
            return Ok(LoopControl::Stop);
        }

        let frame = self.source.take_screenshot()?;
        let analysis = self.pipeline.process(&frame)?;
        let aim_point = frame_center(&frame);

        let fired = trigger::should_fire(aim_point, &analysis.bboxes, &mut self.rng);
        if fired {
            self.actuator.click(self.button)?;
        }

        let fps = self.fps.record(self.stopwatch.elapsed_secs());
        self.telemetry.emit(&Telemetry {
            iteration: self.iteration,
            fps,
            frame: &frame,
            analysis: &analysis,
            aim_point,
            target: None,
            moved: None,
            fired,
        })?;

        self.keyboard.advance();
        self.iteration += 1;
        Ok(LoopControl::Continue)
    }
}
