//! Camera video capture.
//!
//! `StreamCapture` pulls frames from the camera's video feed:
//! - `stub://…` streams render a synthetic scene with a moving subject
//! - `rtsp://…` streams and USB devices go through GStreamer
//!   (feature: capture-gstreamer)
//!
//! Captures are blocking; the control loop never calls them directly but reads
//! through a `LatestFrameReader`.

#[cfg(feature = "capture-gstreamer")]
use anyhow::Context;
use anyhow::Result;
use rand::Rng;
use std::time::{Duration, Instant};

use super::FrameCapture;
use crate::frame::Frame;

/// Configuration for a stream capture.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Stream URL (e.g., "rtsp://192.168.100.88:554/1" or "stub://camera").
    pub stream: String,
    /// USB device index, used instead of `stream` when set.
    pub usb_device: Option<u32>,
    /// Target frame rate. Synthetic captures pace themselves to it.
    pub target_fps: u32,
    /// Frame width for synthetic frames.
    pub width: u32,
    /// Frame height for synthetic frames.
    pub height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            stream: "stub://camera".to_string(),
            usb_device: None,
            target_fps: 15,
            width: 640,
            height: 480,
        }
    }
}

/// Video capture from the camera stream.
pub struct StreamCapture {
    backend: CaptureBackend,
}

enum CaptureBackend {
    Synthetic(SyntheticCapture),
    #[cfg(feature = "capture-gstreamer")]
    Gstreamer(GstreamerCapture),
}

impl StreamCapture {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        if config.usb_device.is_none() && config.stream.starts_with("stub://") {
            Ok(Self {
                backend: CaptureBackend::Synthetic(SyntheticCapture::new(config)),
            })
        } else {
            #[cfg(feature = "capture-gstreamer")]
            {
                Ok(Self {
                    backend: CaptureBackend::Gstreamer(GstreamerCapture::new(config)?),
                })
            }
            #[cfg(not(feature = "capture-gstreamer"))]
            {
                anyhow::bail!("stream capture requires the capture-gstreamer feature")
            }
        }
    }

    /// Start the stream.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "capture-gstreamer")]
            CaptureBackend::Gstreamer(source) => source.connect(),
        }
    }

    /// Get capture statistics.
    pub fn stats(&self) -> CaptureStats {
        match &self.backend {
            CaptureBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "capture-gstreamer")]
            CaptureBackend::Gstreamer(source) => source.stats(),
        }
    }
}

impl FrameCapture for StreamCapture {
    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "capture-gstreamer")]
            CaptureBackend::Gstreamer(source) => source.next_frame(),
        }
    }

    fn describe(&self) -> String {
        self.stats().stream
    }

    fn reconnect(&mut self) -> Result<()> {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "capture-gstreamer")]
            CaptureBackend::Gstreamer(source) => source.reconnect(),
        }
    }
}

/// Statistics for a stream capture.
#[derive(Clone, Debug)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub stream: String,
}

// ----------------------------------------------------------------------------
// Synthetic capture (stub://)
// ----------------------------------------------------------------------------

const BACKGROUND_LUMA: u8 = 16;
const SUBJECT_LUMA: u8 = 240;
/// Frames per full left-right sweep of the synthetic subject.
const SWEEP_FRAMES: f64 = 240.0;
/// The subject drops out for the last `DROPOUT_FRAMES` of every cycle.
const DROPOUT_EVERY: u64 = 150;
const DROPOUT_FRAMES: u64 = 4;
/// A second subject is present for the last `CROWD_FRAMES` of every cycle.
const CROWD_EVERY: u64 = 400;
const CROWD_FRAMES: u64 = 30;

struct SyntheticCapture {
    config: CaptureConfig,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticCapture {
    fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    /// Synthetic captures are always "connected".
    fn connect(&mut self) -> Result<()> {
        log::info!("StreamCapture: connected to {} (synthetic)", self.config.stream);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.pace();
        self.frame_count += 1;
        let pixels = self.render();
        Frame::from_rgb(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }

    fn pace(&mut self) {
        if self.config.target_fps > 0 {
            let budget = Duration::from_secs(1) / self.config.target_fps;
            if let Some(last) = self.last_frame_at {
                let elapsed = last.elapsed();
                if elapsed < budget {
                    std::thread::sleep(budget - elapsed);
                }
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    /// Dark background with one bright square sweeping left and right.
    ///
    /// The subject vanishes for a few frames now and then, and a second
    /// subject occasionally appears, so the tracker sees dropouts and
    /// ambiguous frames.
    fn render(&self) -> Vec<u8> {
        let (width, height) = (self.config.width, self.config.height);
        let mut pixels = vec![BACKGROUND_LUMA; (width * height * 3) as usize];
        let size = (height / 6).max(1);
        let mut rng = rand::thread_rng();

        if self.frame_count % DROPOUT_EVERY < DROPOUT_EVERY - DROPOUT_FRAMES {
            let phase = self.frame_count as f64 / SWEEP_FRAMES * std::f64::consts::TAU;
            let cx = width as f64 / 2.0 + phase.sin() * width as f64 * 0.35;
            let cy = height as f64 / 2.0 + (phase / 3.0).sin() * height as f64 * 0.2;
            let jitter: (f64, f64) = (rng.gen_range(-3.0..=3.0), rng.gen_range(-3.0..=3.0));
            paint_square(
                &mut pixels,
                width,
                height,
                cx + jitter.0,
                cy + jitter.1,
                size,
            );
        }

        if self.frame_count % CROWD_EVERY >= CROWD_EVERY - CROWD_FRAMES {
            paint_square(
                &mut pixels,
                width,
                height,
                width as f64 * 0.1,
                height as f64 * 0.8,
                size,
            );
        }

        pixels
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frame_count,
            stream: self.config.stream.clone(),
        }
    }
}

fn paint_square(pixels: &mut [u8], width: u32, height: u32, cx: f64, cy: f64, size: u32) {
    let half = size as f64 / 2.0;
    let x0 = (cx - half).max(0.0) as u32;
    let y0 = (cy - half).max(0.0) as u32;
    let x1 = ((cx + half).max(0.0) as u32).min(width);
    let y1 = ((cy + half).max(0.0) as u32).min(height);
    for y in y0..y1 {
        for x in x0..x1 {
            let idx = ((y * width + x) * 3) as usize;
            pixels[idx..idx + 3].fill(SUBJECT_LUMA);
        }
    }
}

// ----------------------------------------------------------------------------
// Production capture using GStreamer
// ----------------------------------------------------------------------------

#[cfg(feature = "capture-gstreamer")]
const SINK_NAME: &str = "frames";

/// `<source> ! decodebin ! videoconvert ! RGB appsink` keeping one buffer.
#[cfg(feature = "capture-gstreamer")]
fn pipeline_description(config: &CaptureConfig) -> String {
    let source = match config.usb_device {
        Some(index) => format!("v4l2src device=/dev/video{}", index),
        None => format!("rtspsrc location={} latency=0", config.stream),
    };
    format!(
        "{} ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
         appsink name={} sync=false max-buffers=1 drop=true",
        source, SINK_NAME
    )
}

/// Four frame periods, never less than half a second.
#[cfg(feature = "capture-gstreamer")]
fn pull_timeout_ms(target_fps: u32) -> u64 {
    4_000u64
        .checked_div(u64::from(target_fps))
        .unwrap_or(0)
        .max(500)
}

#[cfg(feature = "capture-gstreamer")]
struct GstreamerCapture {
    config: CaptureConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    pull_timeout: gstreamer::ClockTime,
    frame_count: u64,
}

#[cfg(feature = "capture-gstreamer")]
impl GstreamerCapture {
    fn new(config: CaptureConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let description = pipeline_description(&config);
        let pipeline = gstreamer::parse::launch(&description)
            .with_context(|| format!("build capture pipeline `{}`", description))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow::anyhow!("`{}` is not a pipeline", description))?;
        let appsink = pipeline
            .by_name(SINK_NAME)
            .and_then(|element| element.downcast::<gstreamer_app::AppSink>().ok())
            .context("capture pipeline has no appsink")?;
        let pull_timeout = gstreamer::ClockTime::from_mseconds(pull_timeout_ms(config.target_fps));

        Ok(Self {
            config,
            pipeline,
            appsink,
            pull_timeout,
            frame_count: 0,
        })
    }

    fn describe(&self) -> String {
        match self.config.usb_device {
            Some(index) => format!("usb:{}", index),
            None => self.config.stream.clone(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .with_context(|| format!("start capture from {}", self.describe()))?;
        log::info!("StreamCapture: connected to {}", self.describe());
        Ok(())
    }

    /// Tear the pipeline down to Null and start it again.
    fn reconnect(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Null)
            .with_context(|| format!("stop capture from {}", self.describe()))?;
        self.connect()
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if let Some(failure) = self.bus_failure() {
            anyhow::bail!("{} failed: {}", self.describe(), failure);
        }

        let sample = self
            .appsink
            .try_pull_sample(self.pull_timeout)
            .with_context(|| format!("no frame from {} within {}", self.describe(), self.pull_timeout))?;
        self.frame_count += 1;
        sample_to_frame(&sample, self.frame_count)
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frame_count,
            stream: self.describe(),
        }
    }

    /// First error or end-of-stream queued on the pipeline bus.
    fn bus_failure(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        while let Some(message) = bus.pop() {
            match message.view() {
                gstreamer::MessageView::Error(err) => {
                    return Some(format!("pipeline error: {}", err.error()));
                }
                gstreamer::MessageView::Eos(..) => return Some("end of stream".to_string()),
                _ => {}
            }
        }
        None
    }
}

#[cfg(feature = "capture-gstreamer")]
impl Drop for GstreamerCapture {
    fn drop(&mut self) {
        if let Err(err) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("failed to release capture pipeline: {}", err);
        }
    }
}

/// Copy an RGB sample into a packed frame, dropping any row padding.
#[cfg(feature = "capture-gstreamer")]
fn sample_to_frame(sample: &gstreamer::Sample, sequence: u64) -> Result<Frame> {
    let buffer = sample.buffer().context("sample has no buffer")?;
    let info = sample
        .caps()
        .and_then(|caps| gstreamer_video::VideoInfo::from_caps(caps).ok())
        .context("sample has no video caps")?;
    let (width, height) = (info.width(), info.height());
    let row_bytes = width as usize * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer.map_readable().context("map sample buffer")?;
    let data = map.as_slice();
    let pixels = if stride == row_bytes {
        data.to_vec()
    } else {
        data.chunks(stride)
            .take(height as usize)
            .map(|row| row.get(..row_bytes).context("sample row shorter than frame width"))
            .collect::<Result<Vec<_>>>()?
            .concat()
    };
    Frame::from_rgb(pixels, width, height, sequence)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CaptureConfig {
        CaptureConfig {
            stream: "stub://test".to_string(),
            usb_device: None,
            target_fps: 0,
            width: 320,
            height: 240,
        }
    }

    #[test]
    fn synthetic_capture_produces_frames() -> Result<()> {
        let mut capture = StreamCapture::new(stub_config())?;
        capture.connect()?;

        let frame = capture.next_frame()?;
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert_eq!(frame.sequence, 1);
        assert_eq!(capture.stats().frames_captured, 1);

        Ok(())
    }

    #[test]
    fn synthetic_frames_contain_a_bright_subject() -> Result<()> {
        let mut capture = StreamCapture::new(stub_config())?;
        capture.connect()?;

        let frame = capture.next_frame()?;
        let gray = frame.prepare(320, 240)?;
        assert!(gray.pixels().any(|p| p.0[0] >= SUBJECT_LUMA - 1));

        Ok(())
    }

    #[test]
    fn synthetic_capture_survives_reconnect() -> Result<()> {
        let mut capture = StreamCapture::new(stub_config())?;
        capture.connect()?;
        capture.next_frame()?;

        capture.reconnect()?;
        let frame = capture.next_frame()?;
        assert_eq!(frame.sequence, 2);

        Ok(())
    }

    #[cfg(feature = "capture-gstreamer")]
    #[test]
    fn usb_devices_use_v4l2_and_timeouts_have_a_floor() {
        let config = CaptureConfig {
            usb_device: Some(2),
            ..stub_config()
        };
        let description = pipeline_description(&config);
        assert!(description.starts_with("v4l2src device=/dev/video2 !"));
        assert!(description.contains("appsink name=frames"));

        assert_eq!(pull_timeout_ms(0), 500);
        assert_eq!(pull_timeout_ms(30), 500);
        assert_eq!(pull_timeout_ms(5), 800);
    }

    #[cfg(not(feature = "capture-gstreamer"))]
    #[test]
    fn network_streams_require_gstreamer() {
        let config = CaptureConfig {
            stream: "rtsp://camera/1".to_string(),
            ..stub_config()
        };
        assert!(StreamCapture::new(config).is_err());
    }
}
