//! drone_guard - watch a camera and alert on drones seen outside of screens

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use drone_guard::config::GuardConfig;
use drone_guard::detect::{backend_for, DetectParams};
use drone_guard::display::display_for;
use drone_guard::{AlertManager, DetectionWorker, FrameSource, RenderLoop, StopSignal};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "DRONE_GUARD_CONFIG")]
    config: Option<PathBuf>,
    /// Camera index, device node, or stub://name for a synthetic camera.
    #[arg(long)]
    device: Option<String>,
    /// Detector backend (stub|tract).
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model path for the tract backend.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Minimum seconds between audible alerts.
    #[arg(long)]
    cooldown_secs: Option<f64>,
    /// Run without a window.
    #[arg(long)]
    headless: bool,
    /// Stop after rendering this many frames.
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn load_config(args: &Args) -> Result<GuardConfig> {
    let mut cfg = GuardConfig::load_from(args.config.as_deref())?;
    if let Some(device) = &args.device {
        cfg.camera.device = device.clone();
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.clone();
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = model.clone();
    }
    if let Some(secs) = args.cooldown_secs {
        cfg.set_cooldown_secs(secs)?;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::new(
        ui::UiMode::parse(&args.ui),
        std::io::stderr().is_terminal(),
        log::log_enabled!(log::Level::Debug),
    );

    let cfg = ui.stage("Load configuration").check(load_config(&args))?;
    let display = display_for(args.headless)?;

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        if handler_stop.raise() {
            log::info!("shutdown signal received, stopping...");
        }
    })
    .context("failed to install Ctrl-C handler")?;

    let mut source = ui
        .stage("Open camera")
        .check(FrameSource::from_settings(&cfg.camera, stop.clone()))?;
    let backend = ui.stage("Load detector").check(backend_for(&cfg.detector))?;

    source.start()?;
    let worker = DetectionWorker::new(
        backend,
        DetectParams::from_settings(&cfg.detector),
        cfg.classes.clone(),
        source.slot(),
        stop.clone(),
    )
    .spawn()?;

    let mut render = RenderLoop::new(
        cfg.classes.clone(),
        AlertManager::from_settings(&cfg.alert),
        cfg.alert.banner_text.clone(),
        display,
        stop.clone(),
    )
    .with_max_frames(args.max_frames);
    log::info!(
        "drone_guard running on {} (press q in the window or Ctrl-C to quit)",
        cfg.camera.device
    );
    let outcome = render.run(&mut source, &worker.results());

    stop.raise();
    let worker_stats = worker.join();
    let source_stats = source.stats();
    log::info!(
        "shutdown: {} frames captured from {}, {} detection passes ({} failed, last {:?})",
        source_stats.frames_captured,
        source_stats.device,
        worker_stats.passes,
        worker_stats.failures,
        worker_stats.last_latency
    );
    outcome.map(|_| ())
}
