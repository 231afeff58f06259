//! demo - scripted synthetic run of the capture gate
//!
//! Replays a fixed label script against a synthetic camera on a simulated
//! clock, so the grace-period behaviour can be watched without waiting for it.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;

use capture_gate::classify::StubBackend;
use capture_gate::ingest::{Scene, SyntheticSource};
use capture_gate::{
    Clock, Lifecycle, LifecycleError, ManualClock, QualityLabel, RecordingSurface,
    SimulatedTicks, DEFAULT_GRACE_PERIOD,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Comma-separated labels, one per tick (the last one repeats).
    #[arg(
        long,
        default_value = "good_quality,blurry,blurry,blurry,blurry,blurry,too_dark,good_quality"
    )]
    script: String,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 10)]
    ticks: u64,
    /// Simulated seconds between ticks.
    #[arg(long, default_value_t = 5)]
    step_secs: u64,
    /// Grace period in seconds.
    #[arg(long, default_value_t = DEFAULT_GRACE_PERIOD.as_secs())]
    grace_secs: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let labels = check_args(&args)?;

    let clock = ManualClock::new();
    let mut lifecycle = Lifecycle::new(
        RecordingSurface::new(),
        Box::new(clock.clone()),
        Duration::from_secs(args.grace_secs),
    );
    lifecycle.load_model(|| Ok(Box::new(StubBackend::labels(labels))))?;
    lifecycle.start_camera(|| Ok(Box::new(SyntheticSource::new(Scene::Good, 64, 48))))?;

    let mut ticks = SimulatedTicks::new(
        clock.clone(),
        Duration::from_secs(args.step_secs),
        args.ticks,
    );

    println!("{:>6}  {:<13} {:<16} {:<13} overlay", "t", "label", "state", "button");
    let mut last_outcome = None;
    let summary = lifecycle.run_with(&mut ticks, |lifecycle| {
        let t = clock.now().as_secs();
        let label = lifecycle
            .gate()
            .last_label()
            .map(|label| label.as_str())
            .unwrap_or("-");
        let surface = lifecycle.surface();
        let button = format!(
            "{}{}",
            surface.button_label,
            if surface.capture_enabled { "" } else { " (off)" }
        );
        println!(
            "{:>5}s  {:<13} {:<16} {:<13} {}",
            t,
            label,
            format!("{:?}", lifecycle.gate().state()),
            button,
            surface.overlay.as_deref().unwrap_or("")
        );
        last_outcome = Some(match lifecycle.take_picture() {
            Ok(png) => format!("picture allowed ({} bytes)", png.len()),
            Err(LifecycleError::CaptureBlocked) => "picture blocked".to_string(),
            Err(err) => err.to_string(),
        });
    })?;

    println!();
    println!(
        "demo: {} ticks, {} classified, final state {:?}",
        summary.ticks, summary.frames_classified, summary.final_state
    );
    if let Some(outcome) = last_outcome {
        println!("demo: last capture attempt: {}", outcome);
    }
    // Every tick should have produced a verdict.
    if summary.frames_classified != summary.ticks {
        return Err(anyhow!(
            "expected every tick to classify, {} of {} did",
            summary.frames_classified,
            summary.ticks
        ));
    }
    Ok(())
}

/// Reject settings the gate cannot run with and parse the label script.
fn check_args(args: &Args) -> Result<Vec<QualityLabel>> {
    if args.step_secs == 0 {
        return Err(anyhow!("step-secs must be >= 1"));
    }
    if args.grace_secs == 0 {
        return Err(anyhow!("grace-secs must be >= 1"));
    }
    let labels = args
        .script
        .split(',')
        .map(str::parse)
        .collect::<Result<Vec<QualityLabel>>>()?;
    if labels.is_empty() {
        return Err(anyhow!("script must name at least one label"));
    }
    Ok(labels)
}
