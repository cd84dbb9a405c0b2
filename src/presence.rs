//! Subject presence with a "recently seen" grace window.
//!
//! `visible` is this frame's truth. `recently_visible` stays true for up to
//! `recent_threshold` after the last positive detection, so a single missed
//! frame does not halt tracking. Downstream code uses the pair to tell "gone"
//! apart from "flickering".

use std::time::{Duration, Instant};

use crate::detect::DetectionResult;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PresenceState {
    pub visible: bool,
    pub recently_visible: bool,
    /// Set only on the frame where a visible subject was lost.
    pub did_disappear: bool,
    /// Start of the current unbroken visible streak.
    pub first_seen: Option<Instant>,
    pub last_seen: Option<Instant>,
    /// Last known detection center (x, y).
    pub center: Option<(f64, f64)>,
}

#[derive(Clone, Debug)]
pub struct PresenceTracker {
    recent_threshold: Duration,
    state: PresenceState,
}

impl PresenceTracker {
    pub fn new(recent_threshold: Duration) -> Self {
        Self {
            recent_threshold,
            state: PresenceState::default(),
        }
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    pub fn recent_threshold(&self) -> Duration {
        self.recent_threshold
    }

    /// Feed one frame's detection result.
    pub fn update(&mut self, detection: &DetectionResult) {
        self.update_at(detection, Instant::now());
    }

    pub fn update_at(&mut self, detection: &DetectionResult, now: Instant) {
        match detection.primary() {
            Some(primary) => {
                let (hcenter, vcenter) = primary.center();
                self.found_at(hcenter, vcenter, now);
            }
            None => self.lost_at(now),
        }
    }

    pub fn found(&mut self, hcenter: f64, vcenter: f64) {
        self.found_at(hcenter, vcenter, Instant::now());
    }

    pub fn found_at(&mut self, hcenter: f64, vcenter: f64, now: Instant) {
        let state = &mut self.state;
        if !state.visible {
            state.first_seen = Some(now);
        }
        state.last_seen = Some(now);
        state.center = Some((hcenter, vcenter));
        state.visible = true;
        state.recently_visible = true;
        state.did_disappear = false;
    }

    pub fn lost(&mut self) {
        self.lost_at(Instant::now());
    }

    pub fn lost_at(&mut self, now: Instant) {
        let state = &mut self.state;
        if state.visible {
            state.did_disappear = true;
            state.first_seen = None;
        } else {
            state.did_disappear = false;
        }
        state.recently_visible = match state.last_seen {
            Some(last_seen) => now.saturating_duration_since(last_seen) <= self.recent_threshold,
            None => false,
        };
        state.visible = false;
    }

    /// Length of the current unbroken visible streak; zero when not visible.
    pub fn age(&self) -> Duration {
        self.age_at(Instant::now())
    }

    pub fn age_at(&self, now: Instant) -> Duration {
        match self.state.first_seen {
            Some(first_seen) => now.saturating_duration_since(first_seen),
            None => Duration::ZERO,
        }
    }
}
