//! ptz_probe - exercise a PTZ camera with a fixed command sequence
//!
//! Pans left and right, returns home, nudges with relative moves, then
//! autofocuses and locks focus. Useful when commissioning a new camera or
//! checking the controller address and port.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use ptz_tracker::{CambotConfig, CameraCommandSink, Command, Direction, ViscaCamera};

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a fixed test sequence to a PTZ camera")]
struct Args {
    /// Configuration file supplying the camera address.
    #[arg(long, env = "CAMBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Camera host (overrides the configuration).
    #[arg(long)]
    host: Option<String>,

    /// Camera VISCA port (overrides the configuration).
    #[arg(long)]
    port: Option<u16>,

    /// Pan speed for the left/right sweep.
    #[arg(long, default_value_t = 6)]
    speed: u8,

    /// Pause between commands, in seconds.
    #[arg(long, default_value_t = 2.0)]
    pause: f64,
}

fn sequence(speed: u8) -> Vec<(&'static str, Command)> {
    let pan = |direction| Command::PanTilt {
        direction,
        pan_speed: speed,
        tilt_speed: speed,
    };
    vec![
        ("pan left", pan(Direction::Left)),
        ("stop", Command::Stop),
        ("pan right", pan(Direction::Right)),
        ("stop", Command::Stop),
        ("home", Command::Home),
        (
            "step right",
            Command::IncrementalMove {
                pan_delta: 25,
                tilt_delta: 0,
                speed: 5,
            },
        ),
        (
            "step left",
            Command::IncrementalMove {
                pan_delta: -25,
                tilt_delta: 0,
                speed: 5,
            },
        ),
        ("autofocus", Command::Autofocus),
        ("focus lock", Command::FocusLock(true)),
    ]
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = CambotConfig::load(args.config.as_deref())?;
    let mut visca = cfg.visca_config();
    if let Some(host) = args.host {
        visca.host = host;
    }
    if let Some(port) = args.port {
        visca.port = port;
    }
    let pause = ptz_tracker::interval::secs_to_duration(args.pause);

    log::info!("probing camera at {}:{}", visca.host, visca.port);
    let target = format!("{}:{}", visca.host, visca.port);
    let mut camera =
        ViscaCamera::connect(visca).with_context(|| format!("camera {} unavailable", target))?;

    let mut failures = 0usize;
    let steps = sequence(args.speed);
    for (index, (label, command)) in steps.iter().enumerate() {
        log::info!("{} ({})", label, command);
        if let Err(e) = camera.send(*command) {
            failures += 1;
            log::warn!("{} failed: {}", label, e);
        }
        if index + 1 < steps.len() && pause > Duration::ZERO {
            std::thread::sleep(pause);
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} of {} probe commands failed", failures, steps.len()));
    }
    log::info!("probe sequence complete");
    Ok(())
}
