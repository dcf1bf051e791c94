use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use talava_reps::config::{Config, ExerciseKind};
use talava_reps::recording::{write_recording, SyntheticSession};

/// Write a synthetic landmark recording for replay.
#[derive(Parser, Debug)]
#[command(name = "generate_frames", version)]
struct Args {
    /// Output file (JSON lines)
    output: PathBuf,

    #[arg(short, long, default_value = "squat")]
    exercise: ExerciseKind,

    #[arg(short, long, default_value_t = 5)]
    reps: usize,

    /// Rep depth in inches
    #[arg(short, long, default_value_t = 12.0)]
    depth: f32,

    /// Ascent slowdown per rep (0.08 = 8%)
    #[arg(long, default_value_t = 0.08)]
    fatigue: f32,

    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::load_or_default(&args.config);
    let session = SyntheticSession {
        reps: args.reps,
        depth_inches: args.depth,
        ascent_growth: args.fatigue,
        body_height_inches: config.app.body_height_inches,
        ..Default::default()
    };
    let frames = session.generate(config.profile(args.exercise));
    write_recording(&args.output, &frames)?;
    log::info!(
        "{} frames ({} {} reps) -> {}",
        frames.len(),
        args.reps,
        args.exercise,
        args.output.display()
    );
    Ok(())
}
