//! The tracking control loop.
//!
//! One iteration: take the latest frame, prepare it, run the detector, then
//! presence -> position -> director, and finally the homing policy. The loop
//! owns all tracking state; frames arrive from a `FrameSource` and commands
//! leave through a `CameraCommandSink`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::camera::{CameraCommandSink, Command};
use crate::detect::{DetectionResult, DetectorBackend};
use crate::director::{DirectorConfig, MotionDirector};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::interval::Interval;
use crate::position::PositionEstimator;
use crate::presence::PresenceTracker;
use crate::stats::FramerateCounter;

/// Pause between polls when no new frame is available.
const IDLE_POLL: Duration = Duration::from_millis(5);

#[derive(Clone, Debug, PartialEq)]
pub struct TrackerSettings {
    pub image_width: u32,
    pub image_height: u32,
    pub recent_threshold: Duration,
    pub centered_percent_variance: f64,
    pub off_center_percent_variance: f64,
    pub director: DirectorConfig,
    pub stats_interval: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            image_width: 640,
            image_height: 480,
            recent_threshold: Duration::from_secs(2),
            centered_percent_variance: 10.0,
            off_center_percent_variance: 50.0,
            director: DirectorConfig::default(),
            stats_interval: Duration::from_secs(10),
        }
    }
}

/// What one iteration did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    /// Last command issued by the director.
    pub command: Command,
    /// The zoom safety limit ran out and the camera was sent home.
    pub homed: bool,
}

pub struct ControlLoop<S> {
    settings: TrackerSettings,
    camera: S,
    presence: PresenceTracker,
    position: PositionEstimator,
    director: MotionDirector,
    fps: FramerateCounter,
    stats_interval: Interval,
    frames: u64,
}

impl<S: CameraCommandSink> ControlLoop<S> {
    pub fn new(settings: TrackerSettings, camera: S) -> Self {
        Self::new_at(settings, camera, Instant::now())
    }

    pub fn new_at(settings: TrackerSettings, camera: S, now: Instant) -> Self {
        let presence = PresenceTracker::new(settings.recent_threshold);
        let position = PositionEstimator::new(
            settings.centered_percent_variance,
            settings.off_center_percent_variance,
        );
        let director = MotionDirector::new_at(settings.director.clone(), now);
        let stats_interval = Interval::new_at(settings.stats_interval, false, now);
        Self {
            settings,
            camera,
            presence,
            position,
            director,
            fps: FramerateCounter::new(),
            stats_interval,
            frames: 0,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn camera(&self) -> &S {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut S {
        &mut self.camera
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn position(&self) -> &PositionEstimator {
        &self.position
    }

    pub fn director(&self) -> &MotionDirector {
        &self.director
    }

    /// Frames processed by `run`.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_camera(self) -> S {
        self.camera
    }

    /// Send the camera home and hold for the home pause.
    pub fn home(&mut self) {
        self.director.go_home(&mut self.camera);
    }

    /// Run one iteration on an already computed detection result.
    pub fn step(&mut self, detection: &DetectionResult, now: Instant) -> StepOutcome {
        self.presence.update_at(detection, now);
        self.position.evaluate(
            self.presence.state(),
            self.settings.image_width,
            self.settings.image_height,
        );
        let command = self.director.track_subject_at(
            &mut self.camera,
            self.presence.state(),
            &self.position,
            detection.count(),
            now,
        );

        let homed = !self.presence.state().recently_visible
            && !self.director.at_home()
            && self.director.zoom_safety_expired(now);
        if homed {
            log::info!("subject lost and zoom safety limit reached");
            self.director.go_home(&mut self.camera);
        }

        log::debug!(
            "{} conf={:.0} cmd={} state={:?}",
            self.position.status_text(),
            self.director.confidence(),
            command,
            self.director.state()
        );
        StepOutcome { command, homed }
    }

    /// Prepare a frame, detect, and step.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        detector: &mut dyn DetectorBackend,
        now: Instant,
    ) -> Result<StepOutcome> {
        let image = frame.prepare(self.settings.image_width, self.settings.image_height)?;
        let detection = detector
            .detect(&image)
            .with_context(|| format!("detector {} failed", detector.name()))?;
        Ok(self.step(&detection, now))
    }

    /// Track until `shutdown` is raised. A missing frame skips the iteration.
    /// A frame that fails preparation or detection counts as a frame without
    /// a subject, so the grace window runs out and motion stops. The camera
    /// is stopped before returning.
    pub fn run<F: FrameSource + ?Sized>(
        &mut self,
        source: &mut F,
        detector: &mut dyn DetectorBackend,
        shutdown: &AtomicBool,
    ) {
        log::info!(
            "tracking at {}x{} with detector {}",
            self.settings.image_width,
            self.settings.image_height,
            detector.name()
        );

        while !shutdown.load(Ordering::SeqCst) {
            let Some(frame) = source.try_latest_frame() else {
                std::thread::sleep(IDLE_POLL);
                continue;
            };

            let now = Instant::now();
            self.fps.tick_at(now);
            self.frames += 1;
            if let Err(e) = self.process_frame(&frame, detector, now) {
                log::warn!("frame {} has no detection: {:#}", frame.sequence, e);
                self.step(&DetectionResult::empty(), now);
            }

            if self.stats_interval.has_elapsed_at(now) {
                log::info!("{:3.2} fps (processing)", self.fps.framerate());
                log::info!(
                    "subject has been seen for {:3.2} seconds",
                    self.presence.age_at(now).as_secs_f64()
                );
            }
        }

        log::info!("shutdown requested after {} frames, stopping camera", self.frames);
        if let Err(e) = self.camera.stop() {
            log::warn!("final stop failed: {}", e);
        }
    }
}
