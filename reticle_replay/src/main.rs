mod overlay;
mod source;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use reticle::control_loop::{FixedStopwatch, LogTelemetry};
use reticle::core_modules::devices::{ActuatorCommand, RecordingActuator};
use reticle::{AimLoop, FireLoop, Settings};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use overlay::OverlaySink;
use source::{ImageSequenceSource, ReplayKeys};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Continuous aim correction.
    Aim,
    /// Click when the frame center overlaps a target.
    Fire,
}

/// Replays a directory of captured frames through a control loop and reports
/// the actuator commands it would have issued.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Directory of frames (png/jpg/bmp), played in file-name order.
    input_dir: PathBuf,

    /// Write annotated frames here.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// JSON settings file; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Mode::Aim)]
    mode: Mode,

    /// Do not hold the engage key (aim mode only moves while it is held).
    #[arg(long)]
    disengaged: bool,

    /// Fixed per-iteration time step in seconds instead of wall-clock time.
    #[arg(long)]
    dt: Option<f64>,

    /// Seed for target selection and fire margins.
    #[arg(long)]
    seed: Option<u64>,

    /// Print the default settings as JSON and exit.
    #[arg(long)]
    print_default_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.print_default_config {
        println!("{}", Settings::default().to_json_pretty()?);
        return Ok(());
    }

    let settings = match &args.config {
        Some(path) => Settings::from_json_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };

    let source = ImageSequenceSource::from_dir(&args.input_dir, settings.processing.channel_order)
        .context("opening replay directory")?;
    let frames = source.len();
    let engage = (!args.disengaged).then_some(settings.keys.engage);
    let keys = ReplayKeys::new(engage, settings.keys.quit, frames);
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let commands = match args.mode {
        Mode::Aim => {
            let mut aim = AimLoop::new(source, RecordingActuator::new(), keys, rng, &settings)?;
            if let Some(dt) = args.dt {
                aim = aim.with_stopwatch(FixedStopwatch(dt));
            }
            aim = match &args.output_dir {
                Some(dir) => aim.with_telemetry(OverlaySink::new(dir.clone(), settings.processing.channel_order)?),
                None => aim.with_telemetry(LogTelemetry),
            };
            aim.run().context("aim loop failed")?;
            aim.actuator_mut().take_commands()
        }
        Mode::Fire => {
            let mut fire = FireLoop::new(source, RecordingActuator::new(), keys, rng, &settings)?;
            if let Some(dt) = args.dt {
                fire = fire.with_stopwatch(FixedStopwatch(dt));
            }
            if let Some(dir) = &args.output_dir {
                fire = fire.with_telemetry(OverlaySink::new(dir.clone(), settings.processing.channel_order)?);
            }
            fire.run().context("fire loop failed")?;
            fire.actuator().commands().to_vec()
        }
    };

    let mut moved = (0i64, 0i64);
    let mut clicks = 0usize;
    for cmd in &commands {
        match cmd {
            ActuatorCommand::MoveBy { dx, dy } => {
                moved.0 += *dx as i64;
                moved.1 += *dy as i64;
                println!("move {dx} {dy}");
            }
            ActuatorCommand::Release(button) => {
                clicks += 1;
                println!("click {button}");
            }
            ActuatorCommand::Press(_) => {}
        }
    }

    info!(
        frames,
        commands = commands.len(),
        total_dx = moved.0,
        total_dy = moved.1,
        clicks,
        "replay complete"
    );
    Ok(())
}
