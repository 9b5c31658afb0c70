// SPDX-License-Identifier: GPL-3.0-only

//! Scanner handle
//!
//! The handle provides:
//! - Lifecycle actor startup and shutdown
//! - Thread-safe control operations (start, stop, zoom, torch, lens)
//! - Queries answered by the actor
//!
//! Control operations block until the actor has applied them. Start
//! listeners run on their own dispatcher thread and may call any operation,
//! including `stop()`. The decoder callback must not call `stop()`,
//! `set_lens_facing()` or drop the last handle: those join the frame thread
//! the decoder is running on. Calls made on the actor thread itself, from
//! hardware or surface callbacks, are queued without waiting and queries
//! there return nothing.

use super::lifecycle::{
    CameraLifecycle, Command, Event, LifecycleState, ScannerStatus, StartListener,
    spawn_listener_dispatcher,
};
use super::types::*;
use super::{CameraHardware, PreviewSurface};
use crate::config::ScannerConfig;
use crate::constants::LIFECYCLE_THREAD_NAME;
use crate::errors::{AppResult, ScannerError, ScannerResult};
use crate::frame_processor::FrameDecoder;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Owns the actor and listener threads; the last handle clone shuts them down
struct ScannerInner {
    events: UnboundedSender<Event>,
    actor_id: ThreadId,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
}

fn take_handle(slot: &mut Mutex<Option<JoinHandle<()>>>) -> Option<JoinHandle<()>> {
    match slot.get_mut() {
        Ok(handle) => handle.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

/// Join `handle` unless it is the calling thread
fn join_thread(handle: JoinHandle<()>, name: &str) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        warn!(thread = name, "Scanner thread panicked");
    } else {
        debug!(thread = name, "Scanner thread joined");
    }
}

impl Drop for ScannerInner {
    fn drop(&mut self) {
        let _ = self.events.send(Event::Shutdown);
        if thread::current().id() == self.actor_id {
            // Both threads finish once the actor returns
            return;
        }
        // The dispatcher exits once the actor has dropped its sender
        if let Some(handle) = take_handle(&mut self.thread_handle) {
            join_thread(handle, "lifecycle");
        }
        if let Some(handle) = take_handle(&mut self.listener_handle) {
            join_thread(handle, "listeners");
        }
    }
}

/// QR scanner camera session
///
/// Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct QrScanner {
    inner: Arc<ScannerInner>,
}

impl QrScanner {
    /// Validate the configuration and spawn the lifecycle actor
    pub fn new(
        config: ScannerConfig,
        hardware: Arc<dyn CameraHardware>,
        surface: Arc<dyn PreviewSurface>,
        decoder: Arc<dyn FrameDecoder>,
    ) -> AppResult<Self> {
        config.validate()?;
        info!(
            target_width = config.target_width,
            target_height = config.target_height,
            zoom = config.zoom_factor,
            facing = %config.lens_facing,
            heartbeat_ms = config.heartbeat_timeout_ms,
            "Creating QR scanner"
        );

        let (listeners, listener_handle) = spawn_listener_dispatcher()?;
        let (events, receiver) = mpsc::unbounded_channel();
        let lifecycle = CameraLifecycle::new(
            &config,
            hardware,
            surface,
            decoder,
            events.clone(),
            listeners,
        );
        let thread_handle = thread::Builder::new()
            .name(LIFECYCLE_THREAD_NAME.to_string())
            .spawn(move || lifecycle.run(receiver))?;

        Ok(Self {
            inner: Arc::new(ScannerInner {
                events,
                actor_id: thread_handle.thread().id(),
                thread_handle: Mutex::new(Some(thread_handle)),
                listener_handle: Mutex::new(Some(listener_handle)),
            }),
        })
    }

    /// Whether the caller is the lifecycle actor, which cannot wait on itself
    fn on_actor_thread(&self) -> bool {
        let current = thread::current().id() == self.inner.actor_id;
        if current {
            debug!("Scanner called from the lifecycle thread, not waiting");
        }
        current
    }

    fn send(&self, command: Command) -> bool {
        let sent = self.inner.events.send(Event::Command(command)).is_ok();
        if !sent {
            warn!("Lifecycle actor is gone, command dropped");
        }
        sent
    }

    /// Send a command and wait for the actor to acknowledge it
    fn send_and_wait(&self, build: impl FnOnce(oneshot::Sender<()>) -> Command) {
        let (reply, ack) = oneshot::channel();
        if self.send(build(reply)) && !self.on_actor_thread() {
            let _ = ack.blocking_recv();
        }
    }

    fn query(&self) -> Option<ScannerStatus> {
        if self.on_actor_thread() {
            return None;
        }
        let (reply, answer) = oneshot::channel();
        if !self.send(Command::Query { reply }) {
            return None;
        }
        answer.blocking_recv().ok()
    }

    // ===== Lifecycle =====

    /// Start the camera. The listener hears the outcome exactly once.
    pub fn start(&self, listener: impl StartListener + 'static) {
        let listener: Box<dyn StartListener> = Box::new(listener);
        if let Err(err) = self.inner.events.send(Event::Command(Command::Start { listener })) {
            warn!("Lifecycle actor is gone, start rejected");
            if let Event::Command(Command::Start { listener }) = err.0 {
                listener.starting_failed(ScannerError::Cancelled);
            }
        }
    }

    /// Start the camera and wait for the outcome. Not for use inside a start
    /// listener, which would wait on its own dispatcher thread.
    pub fn start_blocking(&self) -> ScannerResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.start(move |result: ScannerResult<()>| {
            let _ = reply.send(result);
        });
        outcome
            .blocking_recv()
            .unwrap_or(Err(ScannerError::Cancelled))
    }

    /// Stop the camera and release the hardware. No-op when stopped.
    pub fn stop(&self) {
        self.send_and_wait(|reply| Command::Stop { reply: Some(reply) });
    }

    // ===== Capture controls =====

    /// Set the zoom factor. Only 1.0, 2.0 and 4.0 are honoured.
    pub fn set_zoom_factor(&self, factor: f32) {
        self.send_and_wait(|reply| Command::SetZoom { factor, reply });
    }

    pub fn toggle_torch(&self) {
        self.send_and_wait(|reply| Command::ToggleTorch { reply });
    }

    pub fn set_lens_facing(&self, facing: LensFacing) {
        self.set_lens_facing_raw(facing.to_hardware());
    }

    /// Set the lens facing from its hardware encoding. Unknown values are
    /// ignored.
    pub fn set_lens_facing_raw(&self, raw: i32) {
        self.send_and_wait(|reply| Command::SetLensFacing { raw, reply });
    }

    /// Keep the heartbeat watchdog from stopping the camera
    pub fn heart_beat(&self) {
        self.send(Command::Heartbeat);
    }

    // ===== Queries =====

    /// Snapshot of the scanner, `None` if the actor is gone
    pub fn status(&self) -> Option<ScannerStatus> {
        self.query()
    }

    pub fn state(&self) -> LifecycleState {
        self.query()
            .map(|status| status.state)
            .unwrap_or(LifecycleState::Error)
    }

    pub fn zoom_factor(&self) -> f32 {
        self.query()
            .map(|status| status.zoom_factor())
            .unwrap_or_default()
    }

    pub fn lens_facing(&self) -> LensFacing {
        self.query()
            .map(|status| status.lens_facing())
            .unwrap_or_default()
    }

    pub fn torch_on(&self) -> bool {
        self.query().is_some_and(|status| status.torch_on())
    }

    /// Negotiated preview size of the open device
    pub fn preview_size(&self) -> Option<Size> {
        self.query().and_then(|status| status.preview_size)
    }

    /// Sensor orientation for display, with 270 reported as 90
    pub fn orientation(&self) -> Option<i32> {
        self.query().and_then(|status| status.orientation)
    }

    /// Poll until the lifecycle reaches `state` or `timeout` elapses
    pub fn wait_for_state(&self, state: LifecycleState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state() == state {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}
