// SPDX-License-Identifier: GPL-3.0-only

//! Camera lifecycle actor
//!
//! A single thread owns the [`CaptureSession`] and consumes one event queue.
//! Public operations arrive as commands; hardware outcomes arrive through the
//! callback objects in [`super::callbacks`]. Every start attempt gets a new
//! generation number, and callbacks carrying an older generation are treated
//! as late: whatever they hand over is closed on the spot.
//!
//! Start listeners never run on the actor thread. Outcomes are handed to a
//! dispatcher thread, so a listener may call back into the scanner.

use super::callbacks::{DeviceStateCallback, SessionStateCallback};
use super::capture_session::{CaptureSession, CaptureState, SessionHandle, negotiate_sizes};
use super::frame_loop::{CaptureLoopController, DeliveryStats, frame_delivery};
use super::types::*;
use super::{CameraHardware, HardwareDevice, HardwareSession, PreviewSurface};
use crate::config::ScannerConfig;
use crate::constants::{FRAME_LOOP_NAME, FRAME_READER_MAX_IMAGES, LISTENER_THREAD_NAME};
use crate::errors::{ScannerError, ScannerResult};
use crate::frame_processor::FrameDecoder;
use crate::watchdog::Watchdog;
use std::fmt;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Enumerating,
    Opening,
    Configuring,
    Previewing,
    Stopping,
    Error,
}

impl LifecycleState {
    /// States in which hardware is being acquired or held
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            LifecycleState::Opening | LifecycleState::Configuring | LifecycleState::Previewing
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Enumerating => "enumerating",
            LifecycleState::Opening => "opening",
            LifecycleState::Configuring => "configuring",
            LifecycleState::Previewing => "previewing",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Receives the outcome of one `start()`, exactly once
pub trait StartListener: Send {
    fn started(self: Box<Self>);
    fn starting_failed(self: Box<Self>, error: ScannerError);
}

impl<F> StartListener for F
where
    F: FnOnce(ScannerResult<()>) + Send,
{
    fn started(self: Box<Self>) {
        (*self)(Ok(()))
    }

    fn starting_failed(self: Box<Self>, error: ScannerError) {
        (*self)(Err(error))
    }
}

/// A start outcome waiting to be delivered to its listener
pub(crate) enum Notification {
    Started(Box<dyn StartListener>),
    Failed(Box<dyn StartListener>, ScannerError),
}

impl Notification {
    fn deliver(self) {
        match self {
            Notification::Started(listener) => listener.started(),
            Notification::Failed(listener, error) => listener.starting_failed(error),
        }
    }
}

/// Spawn the thread that runs start listeners. It exits once every sender
/// is gone and the queue is drained.
pub(crate) fn spawn_listener_dispatcher()
-> io::Result<(UnboundedSender<Notification>, JoinHandle<()>)> {
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel::<Notification>();
    let handle = thread::Builder::new()
        .name(LISTENER_THREAD_NAME.to_string())
        .spawn(move || {
            while let Some(notification) = receiver.blocking_recv() {
                if catch_unwind(AssertUnwindSafe(|| notification.deliver())).is_err() {
                    warn!("Start listener panicked");
                }
            }
            debug!("Listener dispatcher finished");
        })?;
    Ok((sender, handle))
}

/// Snapshot of the scanner answered by the actor
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerStatus {
    pub state: LifecycleState,
    pub capture: CaptureState,
    pub camera_id: Option<String>,
    pub preview_size: Option<Size>,
    pub frame_size: Option<Size>,
    /// Sensor orientation as reported for display
    pub orientation: Option<i32>,
    /// Repeating requests accepted by the current session
    pub submissions: u64,
    pub last_request: Option<CaptureRequest>,
    pub frames_delivered: u64,
}

impl ScannerStatus {
    pub fn zoom_factor(&self) -> f32 {
        self.capture.zoom.factor()
    }

    pub fn lens_facing(&self) -> LensFacing {
        self.capture.lens_facing
    }

    pub fn torch_on(&self) -> bool {
        self.capture.torch_on
    }
}

pub(crate) enum Command {
    Start {
        listener: Box<dyn StartListener>,
    },
    Stop {
        reply: Option<oneshot::Sender<()>>,
    },
    SetZoom {
        factor: f32,
        reply: oneshot::Sender<()>,
    },
    ToggleTorch {
        reply: oneshot::Sender<()>,
    },
    SetLensFacing {
        raw: i32,
        reply: oneshot::Sender<()>,
    },
    Heartbeat,
    Query {
        reply: oneshot::Sender<ScannerStatus>,
    },
}

pub(crate) enum Event {
    Command(Command),
    DeviceOpened {
        generation: u64,
        device: Box<dyn HardwareDevice>,
    },
    DeviceDisconnected {
        generation: u64,
    },
    DeviceError {
        generation: u64,
        code: i32,
    },
    SessionConfigured {
        generation: u64,
        session: Box<dyn HardwareSession>,
    },
    SessionConfigureFailed {
        generation: u64,
    },
    WatchdogExpired {
        epoch: u64,
    },
    Shutdown,
}

fn close_device(mut device: Box<dyn HardwareDevice>) {
    if let Err(e) = device.close() {
        warn!(camera = device.id(), error = %e, "Failed to close camera device");
    }
}

fn close_session(mut session: Box<dyn HardwareSession>) {
    if let Err(e) = session.close() {
        warn!(error = %e, "Failed to close capture session");
    }
}

fn reply<T>(sender: oneshot::Sender<T>, value: T) {
    // The caller may have given up waiting
    let _ = sender.send(value);
}

pub(crate) struct CameraLifecycle {
    hardware: Arc<dyn CameraHardware>,
    surface: Arc<dyn PreviewSurface>,
    decoder: Arc<dyn FrameDecoder>,
    target: Size,
    heartbeat_timeout: Option<Duration>,
    events: UnboundedSender<Event>,
    listeners: UnboundedSender<Notification>,

    state: LifecycleState,
    generation: u64,
    capture: CaptureSession,
    pending_start: Option<Box<dyn StartListener>>,
    /// Characteristics of the device currently being opened
    opening: Option<CameraCharacteristics>,
    frame_loop: Option<CaptureLoopController>,
    delivery: Arc<DeliveryStats>,
    watchdog: Option<Watchdog>,
    watchdog_epoch: u64,
}

impl CameraLifecycle {
    pub(crate) fn new(
        config: &ScannerConfig,
        hardware: Arc<dyn CameraHardware>,
        surface: Arc<dyn PreviewSurface>,
        decoder: Arc<dyn FrameDecoder>,
        events: UnboundedSender<Event>,
        listeners: UnboundedSender<Notification>,
    ) -> Self {
        Self {
            hardware,
            surface,
            decoder,
            target: config.target(),
            heartbeat_timeout: config.heartbeat_timeout(),
            events,
            listeners,
            state: LifecycleState::Idle,
            generation: 0,
            capture: CaptureSession::new(CaptureState::new(
                config.initial_zoom(),
                config.lens_facing,
            )),
            pending_start: None,
            opening: None,
            frame_loop: None,
            delivery: Arc::new(DeliveryStats::default()),
            watchdog: None,
            watchdog_epoch: 0,
        }
    }

    /// Consume events until shutdown, then release the hardware
    pub(crate) fn run(mut self, mut events: UnboundedReceiver<Event>) {
        info!(target_size = %self.target, "Camera lifecycle running");
        while let Some(event) = events.blocking_recv() {
            if !self.handle_event(event) {
                break;
            }
        }
        self.stop();
        info!("Camera lifecycle shut down");
    }

    /// Returns false on shutdown
    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Command(command) => self.handle_command(command),
            Event::DeviceOpened { generation, device } => self.on_device_opened(generation, device),
            Event::DeviceDisconnected { generation } => self.on_device_lost(
                generation,
                ScannerError::device_access(BackendError::Disconnected),
            ),
            Event::DeviceError { generation, code } => self.on_device_lost(
                generation,
                ScannerError::DeviceAccessFailure(format!("device error {}", code)),
            ),
            Event::SessionConfigured {
                generation,
                session,
            } => self.on_session_configured(generation, session),
            Event::SessionConfigureFailed { generation } => {
                self.on_session_configure_failed(generation)
            }
            Event::WatchdogExpired { epoch } => self.on_watchdog_expired(epoch),
            Event::Shutdown => return false,
        }
        true
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { listener } => self.start(listener),
            Command::Stop { reply: sender } => {
                self.stop();
                if let Some(sender) = sender {
                    reply(sender, ());
                }
            }
            Command::SetZoom { factor, reply: sender } => {
                if let Err(e) = self.capture.apply_zoom(factor) {
                    warn!(factor, error = %e, "Zoom change not applied");
                }
                reply(sender, ());
            }
            Command::ToggleTorch { reply: sender } => {
                if let Err(e) = self.capture.toggle_torch() {
                    warn!(error = %e, "Torch change not applied");
                }
                reply(sender, ());
            }
            Command::SetLensFacing { raw, reply: sender } => {
                self.set_lens_facing(raw);
                reply(sender, ());
            }
            Command::Heartbeat => {
                if let Some(watchdog) = &self.watchdog {
                    watchdog.beat();
                }
            }
            Command::Query { reply: sender } => reply(sender, self.status()),
        }
    }

    fn set_state(&mut self, state: LifecycleState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Lifecycle transition");
            self.state = state;
        }
    }

    fn notify(&self, notification: Notification) {
        if let Err(err) = self.listeners.send(notification) {
            // Dispatcher gone; deliver here rather than lose the outcome
            warn!("Listener dispatcher is gone, delivering on the lifecycle thread");
            err.0.deliver();
        }
    }

    fn status(&self) -> ScannerStatus {
        let handle = self.capture.handle();
        ScannerStatus {
            state: self.state,
            capture: self.capture.state(),
            camera_id: handle.map(|h| h.camera_id().to_string()),
            preview_size: handle.map(|h| h.preview_size()),
            frame_size: handle.map(|h| h.frame_size()),
            orientation: handle.map(|h| h.orientation().display_orientation()),
            submissions: self.capture.submissions(),
            last_request: self.capture.last_request().cloned(),
            frames_delivered: self.delivery.delivered(),
        }
    }

    // ===== Start =====

    fn start(&mut self, listener: Box<dyn StartListener>) {
        if !matches!(self.state, LifecycleState::Idle | LifecycleState::Error) {
            warn!(state = %self.state, "Start requested while running");
            self.notify(Notification::Failed(listener, ScannerError::AlreadyRunning));
            return;
        }

        self.pending_start = Some(listener);
        self.set_state(LifecycleState::Enumerating);

        if !self.hardware.has_camera_hardware() {
            self.fail(ScannerError::NoHardware);
            return;
        }
        if !self.hardware.has_camera_permission() {
            self.fail(ScannerError::NoPermission);
            return;
        }

        self.arm_watchdog();
        self.open_camera();
    }

    /// Find the device for the current lens facing and start opening it
    fn open_camera(&mut self) {
        self.generation += 1;
        self.set_state(LifecycleState::Enumerating);

        let facing = self.capture.state().lens_facing;
        let (camera_id, chars) = match self.find_camera(facing) {
            Ok(found) => found,
            Err(e) => {
                self.fail(e);
                return;
            }
        };

        info!(
            camera = %camera_id,
            %facing,
            generation = self.generation,
            "Opening camera"
        );
        self.opening = Some(chars);
        self.set_state(LifecycleState::Opening);

        let callback = DeviceStateCallback::new(self.generation, self.events.clone());
        if let Err(e) = self.hardware.open_device(&camera_id, callback) {
            self.fail(ScannerError::device_access(e));
        }
    }

    fn find_camera(&self, facing: LensFacing) -> ScannerResult<(String, CameraCharacteristics)> {
        let ids = self
            .hardware
            .camera_ids()
            .map_err(ScannerError::device_access)?;
        debug!(count = ids.len(), "Enumerated cameras");

        for id in ids {
            let chars = self
                .hardware
                .characteristics(&id)
                .map_err(ScannerError::device_access)?;
            if chars.facing() == Some(facing) {
                return Ok((id, chars));
            }
        }
        Err(ScannerError::NoMatchingLens)
    }

    fn on_device_opened(&mut self, generation: u64, device: Box<dyn HardwareDevice>) {
        if generation != self.generation || self.state != LifecycleState::Opening {
            info!(
                camera = device.id(),
                generation,
                current = self.generation,
                "Closing device from a superseded open"
            );
            close_device(device);
            return;
        }
        let Some(chars) = self.opening.take() else {
            close_device(device);
            return;
        };

        self.set_state(LifecycleState::Configuring);
        if let Err(e) = self.configure(device, &chars) {
            self.fail(e);
        }
    }

    /// Size the outputs, attach the device and request session configuration
    fn configure(
        &mut self,
        device: Box<dyn HardwareDevice>,
        chars: &CameraCharacteristics,
    ) -> ScannerResult<()> {
        let (preview_size, frame_size) = match negotiate_sizes(chars, self.target) {
            Ok(sizes) => sizes,
            Err(e) => {
                close_device(device);
                return Err(e);
            }
        };
        let reader = match self
            .hardware
            .create_frame_reader(frame_size, FRAME_READER_MAX_IMAGES)
        {
            Ok(reader) => reader,
            Err(e) => {
                close_device(device);
                return Err(ScannerError::session_config(e));
            }
        };

        info!(
            camera = device.id(),
            preview = %preview_size,
            frame = %frame_size,
            sensor_orientation = chars.sensor_orientation(),
            "Configuring capture session"
        );
        self.surface.set_default_buffer_size(preview_size);
        self.capture
            .attach(SessionHandle::new(device, reader, chars, preview_size));
        self.capture
            .configure(SessionStateCallback::new(self.generation, self.events.clone()))
    }

    fn on_session_configured(&mut self, generation: u64, session: Box<dyn HardwareSession>) {
        if generation != self.generation || self.state != LifecycleState::Configuring {
            info!(generation, "Closing session from a superseded open");
            close_session(session);
            return;
        }

        if let Err(e) = self.capture.start_repeating(session) {
            self.fail(e);
            return;
        }
        if let Err(e) = self.capture.init_autofocus() {
            warn!(error = %e, "Autofocus not applied");
        }

        self.start_frame_loop();
        self.set_state(LifecycleState::Previewing);
        info!(
            camera = ?self.capture.handle().map(|h| h.camera_id()),
            zoom = %self.capture.state().zoom,
            "Preview started"
        );

        if let Some(listener) = self.pending_start.take() {
            self.notify(Notification::Started(listener));
        }
    }

    fn on_session_configure_failed(&mut self, generation: u64) {
        if generation != self.generation {
            debug!(generation, "Ignoring configure failure from a superseded open");
            return;
        }
        self.fail(ScannerError::SessionConfigFailure(
            "hardware rejected the session outputs".into(),
        ));
    }

    fn on_device_lost(&mut self, generation: u64, error: ScannerError) {
        if generation != self.generation || !self.state.is_active() {
            debug!(generation, state = %self.state, "Ignoring device loss outside a session");
            return;
        }
        self.fail(error);
    }

    fn start_frame_loop(&mut self) {
        let Some(handle) = self.capture.handle() else {
            return;
        };
        let delivery = frame_delivery(
            handle.frame_reader(),
            Arc::clone(&self.hardware),
            handle.orientation(),
            Arc::clone(&self.decoder),
            Arc::clone(&self.delivery),
        );
        self.frame_loop = Some(CaptureLoopController::start(FRAME_LOOP_NAME, delivery));
    }

    // ===== Stop and failure =====

    /// Watchdog first, then frame delivery, then the hardware handles
    fn release(&mut self) {
        if let Some(mut watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
        if let Some(mut frame_loop) = self.frame_loop.take() {
            frame_loop.stop();
        }
        self.opening = None;
        self.capture.close();
    }

    fn fail(&mut self, error: ScannerError) {
        error!(
            error = %error,
            reason = error.reason(),
            state = %self.state,
            "Camera lifecycle failed"
        );
        self.release();
        self.generation += 1;
        self.set_state(LifecycleState::Error);
        if let Some(listener) = self.pending_start.take() {
            self.notify(Notification::Failed(listener, error));
        }
    }

    fn stop(&mut self) {
        if self.state == LifecycleState::Idle {
            debug!("Stop requested while idle");
            return;
        }
        info!(state = %self.state, "Stopping camera");
        self.set_state(LifecycleState::Stopping);
        self.release();
        self.generation += 1;
        if let Some(listener) = self.pending_start.take() {
            self.notify(Notification::Failed(listener, ScannerError::Cancelled));
        }
        self.set_state(LifecycleState::Idle);
    }

    // ===== Lens facing =====

    fn set_lens_facing(&mut self, raw: i32) {
        let Some(facing) = LensFacing::from_hardware(raw) else {
            warn!(value = raw, "Ignoring unrecognized lens facing");
            return;
        };
        if !self.capture.set_lens_facing(facing) {
            debug!(%facing, "Lens facing unchanged");
            return;
        }

        info!(%facing, state = %self.state, "Lens facing changed");
        if self.state.is_active() {
            self.set_state(LifecycleState::Stopping);
            self.release();
            self.arm_watchdog();
            self.open_camera();
        }
    }

    // ===== Watchdog =====

    fn arm_watchdog(&mut self) {
        if let Some(mut old) = self.watchdog.take() {
            old.stop();
        }
        let Some(timeout) = self.heartbeat_timeout else {
            return;
        };

        self.watchdog_epoch += 1;
        let epoch = self.watchdog_epoch;
        let events = self.events.clone();
        match Watchdog::start(timeout, move || {
            let _ = events.send(Event::WatchdogExpired { epoch });
        }) {
            Ok(watchdog) => self.watchdog = Some(watchdog),
            Err(e) => warn!(error = %e, "Failed to start heartbeat watchdog"),
        }
    }

    fn on_watchdog_expired(&mut self, epoch: u64) {
        if epoch != self.watchdog_epoch || self.watchdog.is_none() {
            debug!(epoch, "Ignoring expiry of a retired watchdog");
            return;
        }
        warn!("No heartbeat received, stopping camera");
        self.stop();
    }
}
