//! cambotd - PTZ subject tracking daemon
//!
//! This daemon:
//! 1. Connects to the camera controller (VISCA over TCP)
//! 2. Reads frames from the camera stream on a background thread
//! 3. Detects the subject in the latest frame
//! 4. Pans and tilts to keep the subject centered, returning home when it is gone
//!
//! Ctrl-C stops the camera and exits.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ptz_tracker::{
    detect, CambotConfig, ControlLoop, LatestFrameReader, MonitoredCamera, StreamCapture,
    ViscaCamera,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Track a subject with a PTZ camera")]
struct Args {
    /// Configuration file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "CAMBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Video stream URL (overrides camera.stream).
    #[arg(long)]
    stream: Option<String>,

    /// USB capture device index (overrides the stream URL).
    #[arg(long)]
    usb: Option<u32>,

    /// Detector backend: luma or tract:<model.onnx>.
    #[arg(long)]
    detector: Option<String>,

    /// Skip the initial return to home.
    #[arg(long)]
    no_home: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = CambotConfig::load(args.config.as_deref())?;
    if let Some(stream) = args.stream {
        cfg.camera.stream = stream;
    }
    if args.usb.is_some() {
        cfg.camera.usb_device = args.usb;
    }
    if let Some(detector) = args.detector {
        cfg.tracker.detector = detector;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_handler.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let visca = cfg.visca_config();
    log::info!("connecting to camera at {}:{}", visca.host, visca.port);
    let camera = ViscaCamera::connect(visca)
        .with_context(|| format!("camera {}:{} unavailable", cfg.camera.host, cfg.camera.port))?;
    let camera = MonitoredCamera::new(
        camera,
        cfg.tracker.max_consecutive_failures,
        cfg.tracker.retry_interval,
    );

    let mut detector = detect::backend_from_name(
        &cfg.tracker.detector,
        cfg.scene.image_width,
        cfg.scene.image_height,
    )?;
    detector.warm_up()?;

    let mut capture = StreamCapture::new(cfg.capture_config())?;
    capture.connect()?;
    let mut reader = LatestFrameReader::spawn(capture)?;

    let mut control = ControlLoop::new(cfg.tracker_settings(), camera);
    if cfg.tracker.home_on_start && !args.no_home {
        control.home();
    }

    log::info!(
        "cambotd running. stream={} detector={}",
        reader.source_name(),
        detector.name()
    );
    control.run(&mut reader, detector.as_mut(), &shutdown);

    let stats = reader.stats();
    log::info!(
        "frames captured={} dropped={} capture_errors={} reconnects={} processed={}",
        stats.frames_captured,
        stats.frames_dropped,
        stats.capture_errors,
        stats.reconnects,
        control.frames()
    );
    log::info!("actuator health at exit: {:?}", control.camera().health());
    reader.stop();
    Ok(())
}
