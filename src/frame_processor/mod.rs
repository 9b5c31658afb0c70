// SPDX-License-Identifier: GPL-3.0-only

//! Frame analysis
//!
//! The camera hands every delivered frame to a [`FrameDecoder`] along with the
//! rotation that makes it upright. Decoding runs on the frame delivery thread.

pub mod qr_detector;
pub mod types;

pub use qr_detector::{DetectionHandler, RqrrDecoder};
pub use types::{BarcodeFormat, FrameRegion, QrDetection};

use crate::backends::camera::{CameraFrame, Rotation};

/// Consumer of camera frames
pub trait FrameDecoder: Send + Sync {
    /// Analyse one frame. `rotation` is the clockwise rotation that turns the
    /// frame upright for the current display orientation.
    fn decode(&self, frame: &CameraFrame, rotation: Rotation);
}
