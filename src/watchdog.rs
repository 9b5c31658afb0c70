// SPDX-License-Identifier: GPL-3.0-only

//! Heartbeat watchdog
//!
//! Fires a callback once if no heartbeat arrives within the timeout. Used to
//! stop the camera when the embedding application stops reporting that it is
//! still displaying the preview.

use crate::constants::WATCHDOG_THREAD_NAME;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

struct Beat {
    last_beat: Instant,
    stopped: bool,
}

type Shared = Arc<(Mutex<Beat>, Condvar)>;

fn lock(shared: &Shared) -> MutexGuard<'_, Beat> {
    shared.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Running heartbeat timer
pub struct Watchdog {
    shared: Shared,
    timeout: Duration,
    thread_handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Arm a watchdog. `on_expire` runs on the watchdog thread, at most once.
    pub fn start<F>(timeout: Duration, on_expire: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let shared: Shared = Arc::new((
            Mutex::new(Beat {
                last_beat: Instant::now(),
                stopped: false,
            }),
            Condvar::new(),
        ));
        let thread_shared = Arc::clone(&shared);

        let thread_handle = thread::Builder::new()
            .name(WATCHDOG_THREAD_NAME.to_string())
            .spawn(move || {
                let mut beat = lock(&thread_shared);
                loop {
                    if beat.stopped {
                        debug!("Watchdog stopped");
                        return;
                    }
                    let deadline = beat.last_beat + timeout;
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    beat = match thread_shared.1.wait_timeout(beat, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    };
                }
                beat.stopped = true;
                drop(beat);

                warn!(timeout_ms = timeout.as_millis() as u64, "Heartbeat timed out");
                on_expire();
            })?;

        info!(timeout_ms = timeout.as_millis() as u64, "Watchdog armed");
        Ok(Self {
            shared,
            timeout,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Push the deadline out by one timeout from now
    pub fn beat(&self) {
        let mut beat = lock(&self.shared);
        beat.last_beat = Instant::now();
        self.shared.1.notify_all();
    }

    /// False once stopped or expired
    pub fn is_running(&self) -> bool {
        !lock(&self.shared).stopped
    }

    /// Disarm and wait for the thread. Safe to call repeatedly.
    pub fn stop(&mut self) {
        {
            let mut beat = lock(&self.shared);
            beat.stopped = true;
            self.shared.1.notify_all();
        }
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("Watchdog thread panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
