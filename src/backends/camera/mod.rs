// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The scanner core talks to camera hardware only through the traits in this
//! module. Asynchronous hardware notifications (device opened, session
//! configured) come back through one-shot callback objects that feed the
//! lifecycle actor's event queue.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  QrScanner (handle) │  ← Any thread: start/stop/zoom/torch/lens
//! └──────────┬──────────┘
//!            │ commands
//!            ▼
//! ┌─────────────────────┐
//! │   CameraLifecycle   │  ← Single-threaded actor, owns CaptureSession
//! └──────────┬──────────┘
//!            │ trait calls          ▲ callback events
//!            ▼                      │
//! ┌─────────────────────┐           │
//! │ CameraHardware Trait│ ──────────┘
//! └──────────┬──────────┘
//!            ▼
//!   ┌────────────────┐
//!   │ Virtual camera │  ← In-process implementation
//!   └────────────────┘
//! ```

pub mod callbacks;
pub mod capture_session;
pub mod frame_loop;
pub mod lifecycle;
pub mod manager;
pub mod orientation;
pub mod size_negotiator;
pub mod types;
pub mod zoom;

pub use callbacks::{DeviceStateCallback, SessionStateCallback};
pub use capture_session::{CaptureSession, CaptureState, SessionHandle, build_request};
pub use lifecycle::{LifecycleState, ScannerStatus, StartListener};
pub use manager::QrScanner;
pub use orientation::OrientationResolver;
pub use size_negotiator::SizeNegotiator;
pub use types::*;
pub use zoom::{SensorGeometry, ZoomController, ZoomLevel};

use std::sync::Arc;
use std::time::Duration;

/// Camera service of the platform
///
/// Implementations deliver the `open_device` outcome through the callback
/// exactly once, from any thread, and keep the callback while the device is
/// open to report a later disconnection or error.
pub trait CameraHardware: Send + Sync {
    // ===== Presence =====

    /// Whether the platform has any camera at all
    fn has_camera_hardware(&self) -> bool;

    /// Whether the application may use the camera
    fn has_camera_permission(&self) -> bool;

    // ===== Enumeration =====

    /// Identifiers of all cameras, in platform order
    fn camera_ids(&self) -> BackendResult<Vec<String>>;

    /// Static characteristics of one camera
    fn characteristics(&self, camera_id: &str) -> BackendResult<CameraCharacteristics>;

    // ===== Lifecycle =====

    /// Start opening a device. The outcome, and any later loss of the open
    /// device, is reported through `callback`.
    fn open_device(&self, camera_id: &str, callback: DeviceStateCallback) -> BackendResult<()>;

    /// Allocate a frame reader delivering frames of `size`
    fn create_frame_reader(
        &self,
        size: Size,
        max_images: usize,
    ) -> BackendResult<Arc<dyn FrameReader>>;

    // ===== Environment =====

    /// Current rotation of the display relative to its natural orientation
    fn display_rotation(&self) -> Rotation;
}

/// An open camera device
pub trait HardwareDevice: Send {
    fn id(&self) -> &str;

    /// Start configuring a capture session over `outputs`. The outcome is
    /// reported through `callback`.
    fn create_capture_session(
        &mut self,
        outputs: &[OutputTarget],
        callback: SessionStateCallback,
    ) -> BackendResult<()>;

    /// Close the device. Closing twice is harmless.
    fn close(&mut self) -> BackendResult<()>;
}

/// A configured capture session
pub trait HardwareSession: Send {
    /// Replace the repeating request
    fn set_repeating_request(&mut self, request: &CaptureRequest) -> BackendResult<()>;

    fn close(&mut self) -> BackendResult<()>;
}

/// Buffer pool receiving frames for analysis
pub trait FrameReader: Send + Sync {
    fn size(&self) -> Size;

    /// Block up to `timeout` until a frame may be available
    fn wait_for_frame(&self, timeout: Duration) -> bool;

    /// Newest frame, discarding older ones; `None` when nothing is queued
    fn acquire_latest_frame(&self) -> BackendResult<Option<CameraFrame>>;

    fn close(&self) -> BackendResult<()>;
}

/// Display surface the preview stream renders into
pub trait PreviewSurface: Send + Sync {
    fn set_default_buffer_size(&self, size: Size);
}
