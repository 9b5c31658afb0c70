// SPDX-License-Identifier: GPL-3.0-only
//! Frame delivery thread
//!
//! Frames are pulled from the frame reader on a dedicated thread and handed to
//! the decoder together with the resolved frame rotation. The loop never
//! touches the capture session, so control operations and frame delivery
//! cannot block each other.

use super::orientation::OrientationResolver;
use super::{CameraHardware, FrameReader};
use crate::constants::FRAME_WAIT_TIMEOUT;
use crate::frame_processor::FrameDecoder;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a loop running in a separate thread
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Start a new loop in a separate thread
    ///
    /// The closure is called repeatedly until it returns `LoopAction::Stop`
    /// or the controller's `stop()` method is called.
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started");

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                match loop_fn() {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }
            }

            info!(name = %name_clone, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopped from inside the loop; the signal is enough
                return;
            }
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

/// Counters shared between the frame loop and its owner
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl DeliveryStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Build one iteration of the frame delivery loop
///
/// Each iteration waits briefly for a frame, takes the newest one, and
/// forwards it with the rotation resolved against the current display
/// rotation. Missing frames, reader errors, and decoder panics are logged and
/// the frame is dropped.
pub fn frame_delivery<H>(
    reader: Arc<dyn FrameReader>,
    hardware: Arc<H>,
    resolver: OrientationResolver,
    decoder: Arc<dyn FrameDecoder>,
    stats: Arc<DeliveryStats>,
) -> impl FnMut() -> LoopAction + Send + 'static
where
    H: CameraHardware + ?Sized + 'static,
{
    move || {
        if !reader.wait_for_frame(FRAME_WAIT_TIMEOUT) {
            return LoopAction::Continue;
        }

        let frame = match reader.acquire_latest_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                trace!("Frame notification without a frame");
                return LoopAction::Continue;
            }
            Err(e) => {
                warn!(error = %e, "Failed to acquire frame");
                stats.dropped.fetch_add(1, Ordering::Relaxed);
                return LoopAction::Continue;
            }
        };

        let rotation = resolver.resolve(hardware.display_rotation());
        let delivered = catch_unwind(AssertUnwindSafe(|| decoder.decode(&frame, rotation)));
        match delivered {
            Ok(()) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                trace!(sequence = frame.sequence, %rotation, "Frame delivered");
            }
            Err(_) => {
                stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(sequence = frame.sequence, "Decoder panicked, frame dropped");
            }
        }
        LoopAction::Continue
    }
}
