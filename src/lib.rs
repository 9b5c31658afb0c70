// SPDX-License-Identifier: GPL-3.0-only

//! QR Camera - camera session lifecycle for real-time QR scanning
//!
//! This library opens a camera, negotiates preview and analysis sizes, keeps
//! zoom, torch and autofocus in a consistent repeating capture request, and
//! feeds every analysis frame to a decoder with the rotation that makes it
//! upright.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera hardware traits, the lifecycle actor and a virtual camera
//! - [`frame_processor`]: Frame decoder trait and the QR decoder
//! - [`watchdog`]: Heartbeat timer that stops an abandoned camera
//! - [`config`]: Construction-time scanner settings
//!
//! # Example
//!
//! ```no_run
//! use qr_camera::backends::camera::{PreviewSurface, QrScanner, Size};
//! use qr_camera::backends::virtual_camera::VirtualCamera;
//! use qr_camera::frame_processor::{BarcodeFormat, QrDetection, RqrrDecoder};
//! use qr_camera::ScannerConfig;
//! use std::sync::Arc;
//!
//! struct Surface;
//! impl PreviewSurface for Surface {
//!     fn set_default_buffer_size(&self, _size: Size) {}
//! }
//!
//! let decoder = RqrrDecoder::new(&[BarcodeFormat::QrCode], Box::new(|codes: Vec<QrDetection>| {
//!     for code in codes {
//!         println!("{}", code.content);
//!     }
//! }));
//! let scanner = QrScanner::new(
//!     ScannerConfig::default(),
//!     Arc::new(VirtualCamera::default()),
//!     Arc::new(Surface),
//!     Arc::new(decoder),
//! )?;
//! scanner.start_blocking()?;
//! scanner.set_zoom_factor(2.0);
//! scanner.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod watchdog;

// Re-export commonly used types
pub use backends::camera::{LifecycleState, QrScanner, ScannerStatus, StartListener};
pub use config::ScannerConfig;
pub use errors::{AppError, AppResult, ScannerError, ScannerResult};
pub use frame_processor::{FrameDecoder, QrDetection};
