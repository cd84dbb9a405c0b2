//! Motion decisions.
//!
//! `MotionDirector` turns one frame's presence and position into at most one
//! stop and at most one motion command. It never fails: sink errors are
//! logged here and counted by the actuator monitor wrapping the sink.

use std::time::{Duration, Instant};

use crate::camera::{CameraCommandSink, Command, Direction};
use crate::interval::Interval;
use crate::position::{Axis, PositionEstimator};
use crate::presence::PresenceState;

pub const DEFAULT_MOTION_SPEED: u8 = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct DirectorConfig {
    /// Minimum confidence (percent) to keep moving.
    pub min_confidence: f64,
    pub home_pause: Duration,
    /// Longest time away from home before the loop may force a return.
    pub zoom_max_safety: Duration,
    pub home_zoom: u16,
    /// Pan and tilt speed for every tracking motion.
    pub motion_speed: u8,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 50.0,
            home_pause: Duration::from_secs(5),
            zoom_max_safety: Duration::from_secs(30),
            home_zoom: 0,
            motion_speed: DEFAULT_MOTION_SPEED,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectorState {
    AtHome,
    Tracking,
    Stopped,
}

pub struct MotionDirector {
    config: DirectorConfig,
    at_home: bool,
    confidence: f64,
    requested_zoom: Option<u16>,
    home_pause: Interval,
    zoom_timer: Interval,
    last_command: Option<Command>,
}

impl MotionDirector {
    pub fn new(config: DirectorConfig) -> Self {
        Self::new_at(config, Instant::now())
    }

    pub fn new_at(config: DirectorConfig, now: Instant) -> Self {
        let home_pause = Interval::new_at(config.home_pause, false, now);
        let zoom_timer = Interval::new_at(config.zoom_max_safety, false, now);
        Self {
            config,
            at_home: false,
            confidence: 0.0,
            requested_zoom: None,
            home_pause,
            zoom_timer,
            last_command: None,
        }
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    pub fn at_home(&self) -> bool {
        self.at_home
    }

    /// Confidence from the last `track_subject` call, `100 / count`.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn requested_zoom(&self) -> Option<u16> {
        self.requested_zoom
    }

    pub fn state(&self) -> DirectorState {
        if self.at_home {
            DirectorState::AtHome
        } else if self.last_command.is_some_and(|command| command.is_motion()) {
            DirectorState::Tracking
        } else {
            DirectorState::Stopped
        }
    }

    /// Return to the home preset and hold there for the home pause.
    pub fn go_home<S: CameraCommandSink + ?Sized>(&mut self, sink: &mut S) {
        log::info!(
            "returning home (zoom {}, pause {:?})",
            self.config.home_zoom,
            self.config.home_pause
        );
        self.issue(sink, Command::Home);
        self.issue(sink, Command::ZoomTo(self.config.home_zoom));
        self.at_home = true;
        self.requested_zoom = Some(self.config.home_zoom);
        self.home_pause.reset();
        self.home_pause.wait();
    }

    /// True once the camera has been away from home longer than the safety limit.
    pub fn zoom_safety_expired(&self, now: Instant) -> bool {
        !self.at_home && self.zoom_timer.is_due_at(now)
    }

    pub fn track_subject<S: CameraCommandSink + ?Sized>(
        &mut self,
        sink: &mut S,
        presence: &PresenceState,
        position: &PositionEstimator,
        detection_count: usize,
    ) -> Command {
        self.track_subject_at(sink, presence, position, detection_count, Instant::now())
    }

    /// Decide and issue this frame's command; returns the last command issued.
    ///
    /// A suppressing condition issues a stop but does not end the iteration,
    /// so a far subject can still get a motion command afterwards. At most
    /// one stop is sent per call.
    pub fn track_subject_at<S: CameraCommandSink + ?Sized>(
        &mut self,
        sink: &mut S,
        presence: &PresenceState,
        position: &PositionEstimator,
        detection_count: usize,
        now: Instant,
    ) -> Command {
        self.confidence = if detection_count > 0 {
            100.0 / detection_count as f64
        } else {
            0.0
        };
        let volatile = position.is_volatile();
        let mut stopped = false;

        if self.confidence < self.config.min_confidence
            || !presence.recently_visible
            || volatile
            || position.is_centered(Axis::Horizontal)
        {
            log::debug!(
                "suppressing motion: confidence {:.0}, recent {}, volatile {}",
                self.confidence,
                presence.recently_visible,
                volatile
            );
            self.issue(sink, Command::Stop);
            stopped = true;
        }

        if !presence.recently_visible {
            return Command::Stop;
        }

        // Any tracking decision, moving or holding, means the camera is no
        // longer parked at home.
        if self.at_home {
            self.zoom_timer.reset_at(now);
        }
        self.at_home = false;

        match self.select_motion(position) {
            Some(command) => {
                self.issue(sink, command);
                command
            }
            None => {
                if !stopped {
                    self.issue(sink, Command::Stop);
                }
                Command::Stop
            }
        }
    }

    fn select_motion(&self, position: &PositionEstimator) -> Option<Command> {
        let state = position.state();
        let direction = if state.is_far_top() {
            if state.is_far_left() {
                Direction::LeftUp
            } else if state.is_far_right() {
                Direction::RightUp
            } else {
                Direction::Up
            }
        } else if state.is_far_bottom() {
            if state.is_far_left() {
                Direction::LeftDown
            } else if state.is_far_right() {
                Direction::RightDown
            } else {
                Direction::Down
            }
        } else if state.is_far_left() {
            Direction::Left
        } else if state.is_far_right() {
            Direction::Right
        } else {
            return None;
        };
        let speed = self.config.motion_speed;
        Some(Command::PanTilt {
            direction,
            pan_speed: speed,
            tilt_speed: speed,
        })
    }

    fn issue<S: CameraCommandSink + ?Sized>(&mut self, sink: &mut S, command: Command) {
        log::debug!("camera <- {}", command);
        if let Err(err) = sink.send(command) {
            log::debug!("{} not delivered: {}", command, err);
        }
        self.last_command = Some(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::RecordingCamera;
    use crate::presence::PresenceTracker;

    fn config() -> DirectorConfig {
        DirectorConfig {
            min_confidence: 50.0,
            home_pause: Duration::ZERO,
            zoom_max_safety: Duration::from_secs(30),
            home_zoom: 0x1000,
            motion_speed: DEFAULT_MOTION_SPEED,
        }
    }

    /// Presence and a settled position for a subject seen at (x, y) twice.
    fn steady_subject(x: f64, y: f64, t0: Instant) -> (PresenceTracker, PositionEstimator) {
        let mut presence = PresenceTracker::new(Duration::from_secs(2));
        let mut position = PositionEstimator::new(10.0, 50.0);
        for tick in 0..2 {
            presence.found_at(x, y, t0 + Duration::from_millis(tick * 100));
            position.evaluate(presence.state(), 640, 480);
        }
        (presence, position)
    }

    fn up(speed: u8) -> Command {
        Command::PanTilt {
            direction: Direction::Up,
            pan_speed: speed,
            tilt_speed: speed,
        }
    }

    #[test]
    fn centered_subject_only_stops() {
        let t0 = Instant::now();
        let (presence, position) = steady_subject(320.0, 240.0, t0);
        let mut director = MotionDirector::new_at(config(), t0);
        let mut camera = RecordingCamera::new();

        let command = director.track_subject_at(&mut camera, presence.state(), &position, 1, t0);
        assert_eq!(command, Command::Stop);
        assert_eq!(director.confidence(), 100.0);
        assert_eq!(camera.commands(), vec![Command::Stop]);
        assert_eq!(director.state(), DirectorState::Stopped);
    }

    #[test]
    fn confidence_is_inverse_of_count() {
        let t0 = Instant::now();
        let (presence, position) = steady_subject(320.0, 240.0, t0);
        let mut director = MotionDirector::new_at(config(), t0);
        let mut camera = RecordingCamera::new();

        director.track_subject_at(&mut camera, presence.state(), &position, 2, t0);
        assert_eq!(director.confidence(), 50.0);
        director.track_subject_at(&mut camera, presence.state(), &position, 4, t0);
        assert_eq!(director.confidence(), 25.0);
    }

    #[test]
    fn unseen_subject_with_no_detections_stops_once() {
        let t0 = Instant::now();
        let presence = PresenceTracker::new(Duration::from_secs(2));
        let position = PositionEstimator::new(10.0, 50.0);
        let mut director = MotionDirector::new_at(config(), t0);
        let mut camera = RecordingCamera::new();

        director.track_subject_at(&mut camera, presence.state(), &position, 0, t0);
        assert_eq!(director.confidence(), 0.0);
        assert_eq!(camera.commands(), vec![Command::Stop]);
    }

    #[test]
    fn stale_subject_away_from_home_gets_one_stop() {
        let t0 = Instant::now();
        let (mut presence, mut position) = steady_subject(100.0, 240.0, t0);
        let mut director = MotionDirector::new_at(config(), t0);
        let mut camera = RecordingCamera::new();

        director.track_subject_at(&mut camera, presence.state(), &position, 1, t0);
        assert!(!director.at_home());
        camera.take();

        let later = t0 + Duration::from_secs(10);
        presence.lost_at(later);
        position.evaluate(presence.state(), 640, 480);
        director.track_subject_at(&mut camera, presence.state(), &position, 0, later);

        assert_eq!(camera.commands(), vec![Command::Stop]);
    }

    #[test]
    fn suppression_stop_falls_through_to_tilt() {
        let t0 = Instant::now();
        // centered horizontally, far top
        let (presence, position) = steady_subject(320.0, 20.0, t0);
        let mut director = MotionDirector::new_at(config(), t0);
        let mut camera = RecordingCamera::new();

        let command = director.track_subject_at(&mut camera, presence.state(), &position, 1, t0);
        assert_eq!(command, up(2));
        assert_eq!(camera.commands(), vec![Command::Stop, up(2)]);
        assert_eq!(director.state(), DirectorState::Tracking);
    }

    #[test]
    fn diagonal_and_horizontal_motion() {
        let t0 = Instant::now();
        let cases = [
            ((20.0, 20.0), Direction::LeftUp),
            ((620.0, 20.0), Direction::RightUp),
            ((20.0, 460.0), Direction::LeftDown),
            ((620.0, 460.0), Direction::RightDown),
            ((288.0, 460.0), Direction::Down),
            ((20.0, 240.0), Direction::Left),
            ((620.0, 240.0), Direction::Right),
        ];
        for ((x, y), direction) in cases {
            let (presence, position) = steady_subject(x, y, t0);
            let mut director = MotionDirector::new_at(config(), t0);
            let mut camera = RecordingCamera::new();
            let command =
                director.track_subject_at(&mut camera, presence.state(), &position, 1, t0);
            assert_eq!(
                command,
                Command::PanTilt {
                    direction,
                    pan_speed: 2,
                    tilt_speed: 2
                },
                "subject at ({}, {})",
                x,
                y
            );
            assert_eq!(camera.len(), 1, "no suppression stop expected");
        }
    }

    #[test]
    fn volatile_subject_stops_before_moving() {
        let t0 = Instant::now();
        let mut presence = PresenceTracker::new(Duration::from_secs(2));
        let mut position = PositionEstimator::new(10.0, 50.0);
        presence.found_at(20.0, 240.0, t0);
        position.evaluate(presence.state(), 640, 480);
        let mut director = MotionDirector::new_at(config(), t0);
        let mut camera = RecordingCamera::new();

        // a single sample is volatile
        director.track_subject_at(&mut camera, presence.state(), &position, 1, t0);
        assert_eq!(
            camera.commands(),
            vec![
                Command::Stop,
                Command::PanTilt {
                    direction: Direction::Left,
                    pan_speed: 2,
                    tilt_speed: 2
                }
            ]
        );
    }

    #[test]
    fn dead_zone_stop_clears_at_home() {
        let t0 = Instant::now();
        let (presence, position) = steady_subject(288.0, 240.0, t0);
        let mut director = MotionDirector::new_at(config(), t0);
        let mut camera = RecordingCamera::new();
        director.go_home(&mut camera);
        camera.take();

        let held = t0 + Duration::from_secs(5);
        director.track_subject_at(&mut camera, presence.state(), &position, 1, held);
        assert_eq!(camera.commands(), vec![Command::Stop]);
        assert!(!director.at_home());
        assert_eq!(director.state(), DirectorState::Stopped);
        // the safety timer starts from the dead-zone decision
        assert!(!director.zoom_safety_expired(held + Duration::from_secs(29)));
        assert!(director.zoom_safety_expired(held + Duration::from_secs(30)));
    }

    #[test]
    fn stale_subject_keeps_at_home() {
        let t0 = Instant::now();
        let (mut presence, mut position) = steady_subject(100.0, 240.0, t0);
        let mut director = MotionDirector::new_at(config(), t0);
        let mut camera = RecordingCamera::new();
        director.go_home(&mut camera);

        let later = t0 + Duration::from_secs(10);
        presence.lost_at(later);
        position.evaluate(presence.state(), 640, 480);
        director.track_subject_at(&mut camera, presence.state(), &position, 0, later);
        assert!(director.at_home());
    }

    #[test]
    fn go_home_sends_home_and_zoom() {
        let mut director = MotionDirector::new(config());
        let mut camera = RecordingCamera::new();
        director.go_home(&mut camera);

        assert_eq!(camera.commands(), vec![Command::Home, Command::ZoomTo(0x1000)]);
        assert!(director.at_home());
        assert_eq!(director.requested_zoom(), Some(0x1000));
        assert_eq!(director.state(), DirectorState::AtHome);
    }

    #[test]
    fn zoom_timer_restarts_when_leaving_home() {
        let t0 = Instant::now();
        let (presence, position) = steady_subject(20.0, 240.0, t0);
        let mut director = MotionDirector::new_at(config(), t0);
        let mut camera = RecordingCamera::new();
        director.go_home(&mut camera);
        assert!(!director.zoom_safety_expired(t0 + Duration::from_secs(60)));

        let left_home = t0 + Duration::from_secs(20);
        director.track_subject_at(&mut camera, presence.state(), &position, 1, left_home);
        assert!(!director.at_home());
        assert!(!director.zoom_safety_expired(left_home + Duration::from_secs(29)));
        assert!(director.zoom_safety_expired(left_home + Duration::from_secs(30)));
    }

    #[test]
    fn sink_failures_do_not_stop_the_director() {
        let t0 = Instant::now();
        let (presence, position) = steady_subject(20.0, 240.0, t0);
        let mut director = MotionDirector::new_at(config(), t0);
        let mut camera = RecordingCamera::new();
        camera.set_failing(true);

        let command = director.track_subject_at(&mut camera, presence.state(), &position, 1, t0);
        assert!(command.is_motion());
        assert_eq!(camera.len(), 1);
    }

    #[test]
    fn configured_speed_is_used() {
        let t0 = Instant::now();
        let (presence, position) = steady_subject(320.0, 20.0, t0);
        let mut director = MotionDirector::new_at(
            DirectorConfig {
                motion_speed: 7,
                ..config()
            },
            t0,
        );
        let mut camera = RecordingCamera::new();
        assert_eq!(
            director.track_subject_at(&mut camera, presence.state(), &position, 1, t0),
            up(7)
        );
    }
}
