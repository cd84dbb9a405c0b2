use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use image::GrayImage;
use ptz_tracker::camera::{ActuatorHealth, MonitoredCamera};
use ptz_tracker::detect::{LumaBlobBackend, ScriptedBackend};
use ptz_tracker::{
    Axis, BoundingBox, CaptureConfig, Command, ControlLoop, DetectionResult, Direction,
    DetectorBackend, DirectorConfig, LatestFrameReader, RecordingCamera, StreamCapture, TrackerSettings,
};

fn settings() -> TrackerSettings {
    TrackerSettings {
        image_width: 640,
        image_height: 480,
        recent_threshold: Duration::from_secs(2),
        centered_percent_variance: 10.0,
        off_center_percent_variance: 50.0,
        director: DirectorConfig {
            min_confidence: 50.0,
            home_pause: Duration::ZERO,
            zoom_max_safety: Duration::from_secs(30),
            home_zoom: 0,
            motion_speed: 2,
        },
        stats_interval: Duration::from_secs(10),
    }
}

/// A 40x40 box centered on (x, y).
fn boxed(x: f32, y: f32) -> BoundingBox {
    BoundingBox::new(x - 20.0, y - 20.0, 40.0, 40.0)
}

fn one_subject(x: f32, y: f32) -> DetectionResult {
    DetectionResult::new(vec![boxed(x, y)])
}

fn pan_tilt(direction: Direction) -> Command {
    Command::PanTilt {
        direction,
        pan_speed: 2,
        tilt_speed: 2,
    }
}

#[test]
fn centered_subject_is_centered_on_both_axes() {
    let t0 = Instant::now();
    let camera = RecordingCamera::new();
    let mut control = ControlLoop::new_at(settings(), camera.clone(), t0);

    control.step(&one_subject(320.0, 240.0), t0);

    let state = control.position().state();
    assert!(state.is_centered(Axis::Horizontal));
    assert!(state.is_centered(Axis::Vertical));
    assert!(!state.is_far_left() && !state.is_far_right());
    assert!(!state.is_far_top() && !state.is_far_bottom());
    assert_eq!(control.director().confidence(), 100.0);
    assert_eq!(camera.commands(), vec![Command::Stop]);
}

#[test]
fn subject_near_left_edge_is_far_left() {
    let t0 = Instant::now();
    let camera = RecordingCamera::new();
    let mut control = ControlLoop::new_at(settings(), camera.clone(), t0);

    control.step(&one_subject(100.0, 240.0), t0);
    let state = control.position().state();
    assert_eq!(state.percent_variance, 137.5);
    assert!(state.is_far_left());

    camera.take();
    let outcome = control.step(&one_subject(100.0, 240.0), t0 + Duration::from_millis(66));
    assert_eq!(outcome.command, pan_tilt(Direction::Left));
    assert_eq!(camera.commands(), vec![pan_tilt(Direction::Left)]);
}

#[test]
fn confidence_follows_candidate_count() {
    let t0 = Instant::now();
    let camera = RecordingCamera::new();
    let mut control = ControlLoop::new_at(settings(), camera.clone(), t0);

    let two = DetectionResult::new(vec![boxed(320.0, 240.0), boxed(100.0, 100.0)]);
    control.step(&two, t0);
    assert_eq!(control.director().confidence(), 50.0);

    // a fresh loop that has never seen anyone
    let camera = RecordingCamera::new();
    let mut control = ControlLoop::new_at(settings(), camera.clone(), t0);
    control.step(&DetectionResult::empty(), t0);
    assert_eq!(control.director().confidence(), 0.0);
    assert_eq!(camera.commands(), vec![Command::Stop]);
}

#[test]
fn stale_subject_away_from_home_gets_exactly_one_stop() {
    let t0 = Instant::now();
    let camera = RecordingCamera::new();
    let mut control = ControlLoop::new_at(settings(), camera.clone(), t0);

    control.step(&one_subject(100.0, 240.0), t0);
    control.step(&one_subject(100.0, 240.0), t0 + Duration::from_millis(66));
    assert!(!control.director().at_home());
    camera.take();

    let outcome = control.step(&DetectionResult::empty(), t0 + Duration::from_secs(3));
    assert!(!outcome.homed);
    assert!(!control.presence().state().recently_visible);
    assert_eq!(camera.commands(), vec![Command::Stop]);
}

#[test]
fn centered_but_high_subject_stops_then_tilts_up() {
    let t0 = Instant::now();
    let camera = RecordingCamera::new();
    let mut control = ControlLoop::new_at(settings(), camera.clone(), t0);

    // two identical samples make the position steady
    control.step(&one_subject(320.0, 30.0), t0);
    camera.take();
    control.step(&one_subject(320.0, 30.0), t0 + Duration::from_millis(66));

    assert!(!control.position().is_volatile());
    assert!(control.position().state().is_far_top());
    assert_eq!(
        camera.commands(),
        vec![Command::Stop, pan_tilt(Direction::Up)]
    );
}

#[test]
fn short_dropout_keeps_tracking_state() {
    let t0 = Instant::now();
    let camera = RecordingCamera::new();
    let mut control = ControlLoop::new_at(settings(), camera.clone(), t0);

    control.step(&one_subject(600.0, 240.0), t0);
    control.step(&one_subject(600.0, 240.0), t0 + Duration::from_millis(66));
    camera.take();

    // one missed frame: still recently visible, position frozen
    control.step(&DetectionResult::empty(), t0 + Duration::from_millis(133));
    assert!(control.presence().state().recently_visible);
    assert!(control.position().state().is_far_right());
    assert_eq!(camera.commands(), vec![Command::Stop, pan_tilt(Direction::Right)]);
}

#[test]
fn unreachable_actuator_is_reported_but_tracking_continues() {
    let t0 = Instant::now();
    let recorder = RecordingCamera::new();
    recorder.set_failing(true);
    let camera = MonitoredCamera::new(recorder.clone(), 3, Duration::from_secs(3600));
    let mut control = ControlLoop::new_at(settings(), camera, t0);

    for tick in 0..5u64 {
        control.step(
            &one_subject(600.0, 240.0),
            t0 + Duration::from_millis(tick * 66),
        );
    }
    assert!(matches!(
        control.camera().health(),
        ActuatorHealth::Unreachable { .. }
    ));
    assert_eq!(recorder.len(), 3);
    assert!(control.position().state().is_far_right());
}

#[test]
fn scripted_detections_through_run() {
    struct Frames(Vec<ptz_tracker::Frame>, Arc<AtomicBool>);
    impl ptz_tracker::FrameSource for Frames {
        fn try_latest_frame(&mut self) -> Option<ptz_tracker::Frame> {
            let frame = self.0.pop();
            if frame.is_none() {
                self.1.store(true, Ordering::SeqCst);
            }
            frame
        }
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let frames = (0..3)
        .map(|seq| ptz_tracker::Frame::from_rgb(vec![0; 320 * 240 * 3], 320, 240, seq).unwrap())
        .collect();
    let mut source = Frames(frames, shutdown.clone());
    let mut detector = ScriptedBackend::new(vec![
        one_subject(600.0, 240.0),
        one_subject(600.0, 240.0),
        one_subject(600.0, 240.0),
    ]);
    let camera = RecordingCamera::new();
    let mut control = ControlLoop::new(settings(), camera.clone());

    control.run(&mut source, &mut detector, &shutdown);

    assert_eq!(control.frames(), 3);
    let commands = camera.commands();
    assert!(commands.contains(&pan_tilt(Direction::Right)));
    assert_eq!(commands.last(), Some(&Command::Stop));
}

/// Replays `good` far-right detections, then fails on every frame.
struct FailingDetector {
    good: usize,
}

impl DetectorBackend for FailingDetector {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn detect(&mut self, _image: &GrayImage) -> Result<DetectionResult> {
        if self.good == 0 {
            bail!("inference failed");
        }
        self.good -= 1;
        Ok(one_subject(600.0, 240.0))
    }
}

#[test]
fn detector_failures_count_as_missed_frames() {
    struct Frames(Vec<ptz_tracker::Frame>, Arc<AtomicBool>);
    impl ptz_tracker::FrameSource for Frames {
        fn try_latest_frame(&mut self) -> Option<ptz_tracker::Frame> {
            let frame = self.0.pop();
            if frame.is_none() {
                self.1.store(true, Ordering::SeqCst);
            }
            frame
        }
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let frames = (0..20)
        .map(|seq| ptz_tracker::Frame::from_rgb(vec![0; 320 * 240 * 3], 320, 240, seq).unwrap())
        .collect();
    let mut source = Frames(frames, shutdown.clone());
    let mut detector = FailingDetector { good: 2 };
    let camera = RecordingCamera::new();
    let mut control = ControlLoop::new(settings(), camera.clone());

    control.run(&mut source, &mut detector, &shutdown);

    assert_eq!(control.frames(), 20);
    assert!(!control.presence().state().visible);
    assert_eq!(control.director().confidence(), 0.0);

    // every failed frame stops the camera, not just the shutdown
    let commands = camera.commands();
    let first_pan = commands
        .iter()
        .position(|c| *c == pan_tilt(Direction::Right))
        .unwrap();
    let stops_while_failing = commands[first_pan..commands.len() - 1]
        .iter()
        .filter(|c| **c == Command::Stop)
        .count();
    assert!(stops_while_failing >= 18);
}

#[test]
fn synthetic_stream_end_to_end() {
    let capture = StreamCapture::new(CaptureConfig {
        stream: "stub://test".to_string(),
        usb_device: None,
        target_fps: 30,
        width: 320,
        height: 240,
    })
    .unwrap();
    let mut reader = LatestFrameReader::spawn(capture).unwrap();
    let mut detector = LumaBlobBackend::new();
    let camera = RecordingCamera::new();
    let mut control = ControlLoop::new(
        TrackerSettings {
            image_width: 320,
            image_height: 240,
            ..settings()
        },
        camera.clone(),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let stopper = {
        let shutdown = shutdown.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(600));
            shutdown.store(true, Ordering::SeqCst);
        })
    };
    control.run(&mut reader, &mut detector, &shutdown);
    stopper.join().unwrap();
    reader.stop();

    assert!(control.frames() > 0);
    assert!(control.presence().state().last_seen.is_some());
    assert_eq!(camera.commands().last(), Some(&Command::Stop));
}
