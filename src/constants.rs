// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

// ===== Zoom =====

/// Zoom factor with no crop applied
pub const DEFAULT_ZOOM_FACTOR: f32 = 1.0;
/// Allowed logical zoom steps
pub const ZOOM_1X: f32 = 1.0;
pub const ZOOM_2X: f32 = 2.0;
pub const ZOOM_4X: f32 = 4.0;

// ===== Capture =====

/// Frame reader depth (buffers held by the reader at once)
pub const FRAME_READER_MAX_IMAGES: usize = 5;

/// How long the frame loop waits for a frame before rechecking its stop signal
pub const FRAME_WAIT_TIMEOUT: Duration = Duration::from_millis(50);

/// Default target resolution
pub const DEFAULT_TARGET_WIDTH: u32 = 640;
pub const DEFAULT_TARGET_HEIGHT: u32 = 480;

// ===== Threads =====

/// Name of the lifecycle actor thread
pub const LIFECYCLE_THREAD_NAME: &str = "qr-camera-lifecycle";
/// Name of the frame delivery loop
pub const FRAME_LOOP_NAME: &str = "qr-camera-frames";
/// Name of the heartbeat watchdog thread
pub const WATCHDOG_THREAD_NAME: &str = "qr-camera-watchdog";
/// Name of the thread that runs start listeners
pub const LISTENER_THREAD_NAME: &str = "qr-camera-listeners";

// ===== Detection =====

/// Frames are downscaled to this maximum dimension before QR detection
pub const QR_MAX_DIMENSION: u32 = 640;

/// Interval at which the virtual camera synthesizes frames (~30 fps)
pub const VIRTUAL_FRAME_INTERVAL: Duration = Duration::from_millis(33);
