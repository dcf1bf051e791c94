use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use talava_reps::config::{Config, ExerciseKind};
use talava_reps::recording::read_recording;
use talava_reps::tracker::{Effect, RepCounter};
use talava_reps::GIT_VERSION;

/// Replay a JSON-lines landmark recording through the rep counter.
#[derive(Parser, Debug)]
#[command(name = "talava-reps", version)]
struct Args {
    /// Recording to replay (one frame per line)
    recording: PathBuf,

    /// Config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured exercise (squat | press)
    #[arg(short, long)]
    exercise: Option<ExerciseKind>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::load_or_default(&args.config);
    let kind = args.exercise.unwrap_or(config.app.exercise);
    log::info!("talava-reps {} ({})", GIT_VERSION, kind);

    let frames = read_recording(&args.recording)?;
    log::info!("{} frames from {}", frames.len(), args.recording.display());

    let mut counter = RepCounter::new(&config, kind);
    let start = Instant::now();

    for (i, frame) in frames.iter().enumerate() {
        let now = start + Duration::from_millis(frame.t_ms);
        let output = counter.process_landmarks(&frame.landmarks(), now)?;
        for effect in &output.effects {
            match effect {
                Effect::Feedback { text, delay: None } => println!("[{:>6}ms] {}", frame.t_ms, text),
                Effect::Feedback { .. } => {}
                Effect::Status(phase) => log::debug!("frame {}: {}", i, phase),
                Effect::RepCounter(_) => {}
                Effect::RepCompleted(rep) => println!(
                    "[{:>6}ms] rep {} depth {:.1} in ascent {:.2}s score {:.1} ({})",
                    frame.t_ms, rep.rep, rep.depth_inches, rep.ascent_secs, rep.speed_score, rep.quality
                ),
            }
        }
    }

    let summary = counter.summary();
    println!();
    println!("Reps: {}", counter.state().rep_count);
    for rep in &summary {
        println!(
            "  #{:<3} {:>6.1}  {:>+6.1}%  {:?}",
            rep.rep, rep.speed_score, -rep.drop_percent, rep.level
        );
    }
    Ok(())
}
