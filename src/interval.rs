//! Interval tracking for timers in the control loop.
//!
//! An `Interval` remembers when it last fired and how long its period is.
//! Polling (`has_elapsed`) fires at most once per period and rearms itself;
//! `wait` blocks the caller until the period has run out.

use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct Interval {
    period: Duration,
    /// `None` only for an interval built to fire on its first check.
    last_fired: Option<Instant>,
}

impl Interval {
    /// Create an interval. With `fire_immediately` the first check fires;
    /// otherwise the first check fires one full period after construction.
    pub fn new(period: Duration, fire_immediately: bool) -> Self {
        Self::new_at(period, fire_immediately, Instant::now())
    }

    pub fn new_at(period: Duration, fire_immediately: bool, now: Instant) -> Self {
        Self {
            period,
            last_fired: if fire_immediately { None } else { Some(now) },
        }
    }

    pub fn from_secs_f64(seconds: f64, fire_immediately: bool) -> Self {
        Self::new(secs_to_duration(seconds), fire_immediately)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns true and rearms when the period has run out.
    pub fn has_elapsed(&mut self) -> bool {
        self.has_elapsed_at(Instant::now())
    }

    pub fn has_elapsed_at(&mut self, now: Instant) -> bool {
        if self.is_due_at(now) {
            self.last_fired = Some(now);
            true
        } else {
            false
        }
    }

    /// Non-rearming check.
    pub fn is_due_at(&self, now: Instant) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        }
    }

    /// Time left until the next firing, zero when already due.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        match self.last_fired {
            None => Duration::ZERO,
            Some(last) => self
                .period
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    /// Restart the period from `now`.
    pub fn reset_at(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// Block until the period has run out, then rearm.
    pub fn wait(&mut self) {
        let remaining = self.remaining_at(Instant::now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        self.last_fired = Some(Instant::now());
    }
}

/// Seconds from configuration to a `Duration`; negative and NaN become zero.
pub fn secs_to_duration(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}
