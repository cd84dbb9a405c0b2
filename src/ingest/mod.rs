//! Frame acquisition.
//!
//! - `FrameCapture`: blocking pull of the next frame from a video feed
//! - `FrameSource`: non-blocking "latest frame, if any" for the control loop
//! - `LatestFrameReader`: bridges the two on a background thread
//! - `StreamCapture`: synthetic `stub://` scenes, RTSP and USB via GStreamer
//!   (feature: capture-gstreamer)

pub mod capture;
pub mod latest;

use anyhow::Result;

use crate::frame::Frame;

pub use capture::{CaptureConfig, CaptureStats, StreamCapture};
pub use latest::{LatestFrameReader, ReaderStats};

/// Blocking frame producer.
pub trait FrameCapture: Send {
    /// Wait for and return the next decoded frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Human-readable source name for logs.
    fn describe(&self) -> String;

    /// Restart the feed after repeated failures.
    fn reconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Non-blocking frame consumer side.
pub trait FrameSource {
    /// The newest frame not yet taken, or `None` when nothing new arrived.
    fn try_latest_frame(&mut self) -> Option<Frame>;
}
