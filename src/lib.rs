//! PTZ subject tracker
//!
//! Keeps a human subject centered in a pan-tilt-zoom camera's view by turning
//! per-frame detections into debounced camera motion.
//!
//! # Architecture
//!
//! Each control loop iteration runs three stages in order:
//!
//! 1. **Presence** (`presence`): found/lost per frame, with a grace window so
//!    a missed detection does not read as "gone".
//! 2. **Position** (`position`): offset from the frame center, per-axis
//!    zones with a dead zone between "centered" and "far", and a volatility
//!    measure over the last ten samples.
//! 3. **Direction** (`director`): at most one stop and one motion command
//!    per frame, plus the home/zoom-safety bookkeeping.
//!
//! # Module Structure
//!
//! - `camera`: command sink seam, VISCA over TCP, recording sink, health monitor
//! - `frame` / `ingest`: frames, synthetic and GStreamer captures, latest-frame reader
//! - `detect`: detector backends (luma blob, scripted, ONNX via tract)
//! - `tracker`: the control loop
//! - `config`: JSON/TOML configuration with environment overrides

pub mod camera;
pub mod config;
pub mod detect;
pub mod director;
pub mod frame;
pub mod ingest;
pub mod interval;
pub mod position;
pub mod presence;
pub mod stats;
pub mod tracker;

pub use camera::{
    ActuatorHealth, CameraCommandSink, CameraError, CameraResult, Command, Direction,
    MonitoredCamera, RecordingCamera, ViscaCamera, ViscaConfig,
};
pub use config::CambotConfig;
pub use detect::{BoundingBox, DetectionResult, DetectorBackend};
pub use director::{DirectorConfig, DirectorState, MotionDirector};
pub use frame::Frame;
pub use ingest::{CaptureConfig, FrameCapture, FrameSource, LatestFrameReader, StreamCapture};
pub use interval::Interval;
pub use position::{Axis, PositionEstimator, PositionState, Zone};
pub use presence::{PresenceState, PresenceTracker};
pub use stats::FramerateCounter;
pub use tracker::{ControlLoop, StepOutcome, TrackerSettings};
