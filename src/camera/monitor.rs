//! Actuator health tracking.
//!
//! `MonitoredCamera` counts consecutive command failures. Once the count
//! reaches the configured threshold the actuator is declared unreachable:
//! commands are no longer forwarded except for one attempt per retry interval,
//! and callers get `CameraError::Unreachable`. The first successful command
//! clears the alarm.

use std::time::Duration;

use super::{CameraCommandSink, CameraError, CameraResult, Command};
use crate::interval::Interval;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActuatorHealth {
    Healthy,
    /// Failing, but below the alarm threshold.
    Degraded { failures: u32 },
    Unreachable { failures: u32 },
}

pub struct MonitoredCamera<S> {
    inner: S,
    max_consecutive_failures: u32,
    consecutive_failures: u32,
    unreachable: bool,
    retry: Interval,
}

impl<S: CameraCommandSink> MonitoredCamera<S> {
    /// `max_consecutive_failures == 0` disables the alarm.
    pub fn new(inner: S, max_consecutive_failures: u32, retry_period: Duration) -> Self {
        Self {
            inner,
            max_consecutive_failures,
            consecutive_failures: 0,
            unreachable: false,
            retry: Interval::new(retry_period, false),
        }
    }

    pub fn health(&self) -> ActuatorHealth {
        match (self.unreachable, self.consecutive_failures) {
            (true, failures) => ActuatorHealth::Unreachable { failures },
            (false, 0) => ActuatorHealth::Healthy,
            (false, failures) => ActuatorHealth::Degraded { failures },
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.unreachable
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn record_success(&mut self) {
        if self.unreachable {
            log::info!(
                "actuator reachable again after {} failed commands",
                self.consecutive_failures
            );
        }
        self.unreachable = false;
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self, command: Command, err: &CameraError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        log::warn!(
            "camera command {} failed ({} in a row): {}",
            command,
            self.consecutive_failures,
            err
        );
        if !self.unreachable
            && self.max_consecutive_failures > 0
            && self.consecutive_failures >= self.max_consecutive_failures
        {
            self.unreachable = true;
            self.retry.reset();
            log::error!(
                "actuator unreachable: {} consecutive command failures, probing every {:?}",
                self.consecutive_failures,
                self.retry.period()
            );
        }
    }
}

impl<S: CameraCommandSink> CameraCommandSink for MonitoredCamera<S> {
    fn send(&mut self, command: Command) -> CameraResult {
        if self.unreachable && !self.retry.has_elapsed() {
            return Err(CameraError::Unreachable {
                failures: self.consecutive_failures,
            });
        }
        match self.inner.send(command) {
            Ok(()) => {
                self.record_success();
                Ok(())
            }
            Err(err) => {
                self.record_failure(command, &err);
                Err(err)
            }
        }
    }
}
