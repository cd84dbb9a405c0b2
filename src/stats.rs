//! Processing rate statistics.

use std::time::Instant;

/// Weight kept from the previous estimate on each tick.
const DEFAULT_SMOOTHING: f64 = 0.9;

/// Frame-rate estimate as an exponentially weighted average of the
/// instantaneous rate between consecutive ticks.
#[derive(Clone, Debug)]
pub struct FramerateCounter {
    smoothing: f64,
    last_tick: Option<Instant>,
    framerate: f64,
    ticks: u64,
}

impl Default for FramerateCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FramerateCounter {
    pub fn new() -> Self {
        Self::with_smoothing(DEFAULT_SMOOTHING)
    }

    /// `smoothing` is clamped to `[0, 1)`; zero reports the last interval only.
    pub fn with_smoothing(smoothing: f64) -> Self {
        let smoothing = if smoothing.is_finite() {
            smoothing.clamp(0.0, 0.999)
        } else {
            DEFAULT_SMOOTHING
        };
        Self {
            smoothing,
            last_tick: None,
            framerate: 0.0,
            ticks: 0,
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.ticks += 1;
        let Some(last) = self.last_tick.replace(now) else {
            return;
        };
        let elapsed = now.saturating_duration_since(last).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        let instant_rate = 1.0 / elapsed;
        self.framerate = if self.ticks == 2 {
            instant_rate
        } else {
            self.smoothing * self.framerate + (1.0 - self.smoothing) * instant_rate
        };
    }

    /// Frames per second; zero until two ticks have been seen.
    pub fn framerate(&self) -> f64 {
        self.framerate
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
