//! Camera command seam.
//!
//! The tracker drives the camera through `CameraCommandSink`, a narrow trait
//! with one required method. Implementations:
//! - `ViscaCamera`: VISCA over TCP (PTZOptics-style controllers)
//! - `RecordingCamera`: in-memory command log
//! - `MonitoredCamera`: wraps another sink and raises an unreachable alarm
//!   after repeated failures

pub mod monitor;
pub mod recording;
pub mod visca;

use std::fmt;

pub use monitor::{ActuatorHealth, MonitoredCamera};
pub use recording::RecordingCamera;
pub use visca::{ViscaCamera, ViscaConfig};

/// Pan/tilt drive direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
    LeftUp,
    LeftDown,
    RightUp,
    RightDown,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::LeftUp => "left_up",
            Direction::LeftDown => "left_down",
            Direction::RightUp => "right_up",
            Direction::RightDown => "right_down",
        }
    }
}

/// One camera command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Stop,
    Home,
    ZoomTo(u16),
    PanTilt {
        direction: Direction,
        pan_speed: u8,
        tilt_speed: u8,
    },
    IncrementalMove {
        pan_delta: i16,
        tilt_delta: i16,
        speed: u8,
    },
    Autofocus,
    FocusLock(bool),
}

impl Command {
    /// True for commands that start pan/tilt motion.
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            Command::PanTilt { .. } | Command::IncrementalMove { .. }
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Stop => write!(f, "stop"),
            Command::Home => write!(f, "home"),
            Command::ZoomTo(level) => write!(f, "zoom_to({})", level),
            Command::PanTilt {
                direction,
                pan_speed,
                tilt_speed,
            } => write!(f, "{}({}, {})", direction.as_str(), pan_speed, tilt_speed),
            Command::IncrementalMove {
                pan_delta,
                tilt_delta,
                speed,
            } => write!(f, "move_by({}, {}, {})", pan_delta, tilt_delta, speed),
            Command::Autofocus => write!(f, "autofocus"),
            Command::FocusLock(locked) => write!(f, "focus_lock({})", locked),
        }
    }
}

/// Camera command failure.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("camera is not connected")]
    NotConnected,
    #[error("camera rejected command (visca error {code:#04x})")]
    Rejected { code: u8 },
    #[error("malformed camera reply: {0}")]
    Protocol(String),
    #[error("actuator unreachable after {failures} consecutive failures")]
    Unreachable { failures: u32 },
}

pub type CameraResult = Result<(), CameraError>;

/// Sink for camera commands.
///
/// Each operation reports whether the command reached the camera; nothing is
/// known about whether the motion physically happened.
pub trait CameraCommandSink {
    fn send(&mut self, command: Command) -> CameraResult;

    fn stop(&mut self) -> CameraResult {
        self.send(Command::Stop)
    }

    fn home(&mut self) -> CameraResult {
        self.send(Command::Home)
    }

    fn zoom_to(&mut self, level: u16) -> CameraResult {
        self.send(Command::ZoomTo(level))
    }

    fn pan_tilt(&mut self, direction: Direction, pan_speed: u8, tilt_speed: u8) -> CameraResult {
        self.send(Command::PanTilt {
            direction,
            pan_speed,
            tilt_speed,
        })
    }

    fn incremental_move(&mut self, pan_delta: i16, tilt_delta: i16, speed: u8) -> CameraResult {
        self.send(Command::IncrementalMove {
            pan_delta,
            tilt_delta,
            speed,
        })
    }

    fn autofocus(&mut self) -> CameraResult {
        self.send(Command::Autofocus)
    }

    fn set_focus_lock(&mut self, locked: bool) -> CameraResult {
        self.send(Command::FocusLock(locked))
    }
}

impl<S: CameraCommandSink + ?Sized> CameraCommandSink for Box<S> {
    fn send(&mut self, command: Command) -> CameraResult {
        (**self).send(command)
    }
}
