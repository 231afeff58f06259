//! capture_gate - live frame-quality gate for a camera capture button
//!
//! This binary:
//! 1. Loads the classifier backend (tract model, cpu heuristic or stub)
//! 2. Opens the configured camera (synthetic, still images or V4L2)
//! 3. Classifies one frame per tick and gates the capture button on quality
//! 4. Takes a picture when Enter is pressed and the gate allows it

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;

use capture_gate::{
    load_backend, open_source, GateConfig, IntervalScheduler, Lifecycle, LifecycleError,
    MonotonicClock, TerminalSurface, Ui,
};

#[derive(Parser, Debug)]
#[command(
    name = "capture_gate",
    about = "Gate a camera capture button on live frame quality"
)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(long, env = "CAPTURE_GATE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Camera: stub://<scene>, /dev/videoN, or a directory of images
    #[arg(long)]
    device: Option<String>,

    /// Classifier backend (tract|cpu|stub)
    #[arg(long)]
    backend: Option<String>,

    /// ONNX model path for the tract backend
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Frames classified per second
    #[arg(long)]
    fps: Option<u32>,

    /// Seconds a poor-quality streak blocks capture
    #[arg(long, value_name = "SECS")]
    grace_secs: Option<f64>,

    /// Stop after this many frames (runs until Ctrl-C otherwise)
    #[arg(long)]
    frames: Option<u64>,

    /// Directory for pictures taken with Enter
    #[arg(long, default_value = "captures", value_name = "DIR")]
    save_dir: PathBuf,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        load_config(&args)?
    };
    log::info!(
        "capture_gate {} device={} backend={:?} fps={} grace={:?}",
        env!("CARGO_PKG_VERSION"),
        cfg.camera.device,
        cfg.model.backend,
        cfg.camera.target_fps,
        cfg.grace
    );

    let mut lifecycle = Lifecycle::new(
        TerminalSurface::new(),
        Box::new(MonotonicClock::new()),
        cfg.grace,
    );

    {
        let mut stage = ui.stage("Load model");
        if let Err(err) = lifecycle.load_model(|| load_backend(&cfg.model)) {
            stage.fail();
            return Err(err.into());
        }
    }
    {
        let mut stage = ui.stage("Start camera");
        if let Err(err) = lifecycle.start_camera(|| open_source(&cfg.camera)) {
            stage.fail();
            return Err(err.into());
        }
    }

    let mut scheduler = IntervalScheduler::new(cfg.camera.target_fps).with_limit(args.frames);
    let stop = scheduler.stop_handle();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let captures = spawn_capture_requests();
    let mut saved = 0u64;
    log::info!("press Enter to take a picture, Ctrl-C to stop");

    let summary = lifecycle.run_with(&mut scheduler, |lifecycle| {
        while captures.try_recv().is_ok() {
            match lifecycle.take_picture() {
                Ok(png) => match save_picture(&args.save_dir, saved, &png) {
                    Ok(path) => {
                        saved += 1;
                        log::info!("picture saved to {}", path.display());
                    }
                    Err(err) => log::warn!("picture not saved: {:#}", err),
                },
                Err(LifecycleError::CaptureBlocked) => {
                    log::warn!("capture is blocked until frame quality improves")
                }
                Err(err) => log::warn!("{}", err),
            }
        }
    })?;

    println!(
        "capture_gate: {} ticks, {} classified, {} skipped ({} inference failures), {} pictures, final state {:?}",
        summary.ticks,
        summary.frames_classified,
        summary.skipped_frames,
        summary.inference_failures,
        saved,
        summary.final_state
    );
    Ok(())
}

fn load_config(args: &Args) -> Result<GateConfig> {
    let mut cfg = GateConfig::load_from(args.config.as_deref())?;
    if let Some(device) = &args.device {
        cfg.camera.device = device.clone();
    }
    if let Some(backend) = &args.backend {
        cfg.model.backend = backend.parse()?;
    }
    if let Some(model) = &args.model {
        cfg.model.path = model.clone();
    }
    if let Some(fps) = args.fps {
        cfg.camera.target_fps = fps;
    }
    if let Some(secs) = args.grace_secs {
        cfg.grace = Duration::try_from_secs_f64(secs)
            .map_err(|_| anyhow!("--grace-secs must be a positive number of seconds"))?;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// One message per line read from stdin.
fn spawn_capture_requests() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

fn save_picture(dir: &std::path::Path, index: u64, png: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create capture directory {}", dir.display()))?;
    let path = dir.join(format!("capture-{:04}.png", index));
    std::fs::write(&path, png).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
