// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera capture
//!
//! This module provides:
//! - The camera hardware traits and the scanner lifecycle built on them
//! - An in-process virtual camera implementing those traits
//!
//! # Modules
//!
//! - [`camera`]: Hardware traits, capture session and lifecycle
//! - [`virtual_camera`]: Simulated camera service with fault injection

pub mod camera;
pub mod virtual_camera;
