//! Latest-frame-wins reader.
//!
//! A dedicated thread pulls frames from a blocking `FrameCapture` and keeps
//! only the newest one in a single slot. The control loop takes from the slot
//! without blocking; frames it did not get to in time are overwritten, never
//! queued. After several consecutive capture errors the reader asks the
//! capture to reconnect. Dropping the reader stops and joins the thread, which
//! releases the capture on every exit path.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use super::{FrameCapture, FrameSource};
use crate::frame::Frame;

/// Pause after a capture error before trying again.
const CAPTURE_ERROR_BACKOFF: Duration = Duration::from_millis(200);
/// Consecutive capture errors before the feed is restarted.
const RECONNECT_AFTER_ERRORS: u32 = 5;

#[derive(Default)]
struct Counters {
    captured: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    reconnects: AtomicU64,
}

/// Snapshot of reader counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub frames_captured: u64,
    /// Frames overwritten before the consumer took them.
    pub frames_dropped: u64,
    pub capture_errors: u64,
    pub reconnects: u64,
}

pub struct LatestFrameReader {
    slot: Arc<Mutex<Option<Frame>>>,
    shutdown: Arc<AtomicBool>,
    counters: Arc<Counters>,
    source_name: String,
    join: Option<JoinHandle<()>>,
}

impl LatestFrameReader {
    /// Start reading from `capture` on a new thread.
    pub fn spawn<C>(capture: C) -> Result<Self>
    where
        C: FrameCapture + 'static,
    {
        let slot = Arc::new(Mutex::new(None));
        let shutdown = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());
        let source_name = capture.describe();

        let slot_thread = slot.clone();
        let shutdown_thread = shutdown.clone();
        let counters_thread = counters.clone();
        let join = std::thread::Builder::new()
            .name("frame-reader".to_string())
            .spawn(move || read_frames(capture, slot_thread, shutdown_thread, counters_thread))
            .context("failed to spawn frame reader thread")?;

        log::info!("frame reader started for {}", source_name);
        Ok(Self {
            slot,
            shutdown,
            counters,
            source_name,
            join: Some(join),
        })
    }

    pub fn stats(&self) -> ReaderStats {
        ReaderStats {
            frames_captured: self.counters.captured.load(Ordering::SeqCst),
            frames_dropped: self.counters.dropped.load(Ordering::SeqCst),
            capture_errors: self.counters.errors.load(Ordering::SeqCst),
            reconnects: self.counters.reconnects.load(Ordering::SeqCst),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Stop the reader thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("frame reader thread for {} panicked", self.source_name);
            } else {
                log::info!("frame reader stopped for {}", self.source_name);
            }
        }
    }
}

impl FrameSource for LatestFrameReader {
    fn try_latest_frame(&mut self) -> Option<Frame> {
        lock_slot(&self.slot).take()
    }
}

impl Drop for LatestFrameReader {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

fn read_frames<C: FrameCapture>(
    mut capture: C,
    slot: Arc<Mutex<Option<Frame>>>,
    shutdown: Arc<AtomicBool>,
    counters: Arc<Counters>,
) {
    let mut consecutive_errors = 0u32;
    while !shutdown.load(Ordering::SeqCst) {
        match capture.next_frame() {
            Ok(frame) => {
                consecutive_errors = 0;
                if lock_slot(&slot).replace(frame).is_some() {
                    counters.dropped.fetch_add(1, Ordering::SeqCst);
                }
                counters.captured.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                counters.errors.fetch_add(1, Ordering::SeqCst);
                consecutive_errors += 1;
                log::warn!("capture from {} failed: {:#}", capture.describe(), err);
                if consecutive_errors >= RECONNECT_AFTER_ERRORS {
                    consecutive_errors = 0;
                    counters.reconnects.fetch_add(1, Ordering::SeqCst);
                    match capture.reconnect() {
                        Ok(()) => log::info!("restarted capture from {}", capture.describe()),
                        Err(err) => {
                            log::warn!("restart of {} failed: {:#}", capture.describe(), err)
                        }
                    }
                }
                std::thread::sleep(CAPTURE_ERROR_BACKOFF);
            }
        }
    }
}

/// A poisoned slot still holds a valid frame or nothing, so keep using it.
fn lock_slot(slot: &Mutex<Option<Frame>>) -> MutexGuard<'_, Option<Frame>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
