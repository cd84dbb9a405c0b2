use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{CameraCommandSink, CameraError, CameraResult, Command};

/// In-memory sink that records every command it is asked to send.
///
/// Clones share the same log, so a test can hand one clone to the tracker
/// and inspect the other. `set_failing(true)` makes every send fail with a
/// transport error (the attempt is still recorded).
#[derive(Clone, Default)]
pub struct RecordingCamera {
    log: Arc<Mutex<Vec<Command>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All commands recorded so far.
    pub fn commands(&self) -> Vec<Command> {
        self.lock().clone()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Command>> {
        match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl CameraCommandSink for RecordingCamera {
    fn send(&mut self, command: Command) -> CameraResult {
        self.lock().push(command);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CameraError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "recording camera set to fail",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_log() {
        let camera = RecordingCamera::new();
        let mut handle = camera.clone();
        handle.stop().unwrap();
        handle.home().unwrap();

        assert_eq!(camera.commands(), vec![Command::Stop, Command::Home]);
        assert_eq!(camera.take().len(), 2);
        assert!(camera.is_empty());
    }

    #[test]
    fn failing_camera_records_attempts() {
        let mut camera = RecordingCamera::new();
        camera.set_failing(true);
        assert!(camera.autofocus().is_err());
        assert_eq!(camera.len(), 1);
    }
}
