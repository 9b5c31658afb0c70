// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the camera hardware boundary

//! Shared types for camera backends
//!
//! Everything that crosses the hardware seam lives here: geometry, output
//! sizes, the capture request value, frames, and the enums that replace the
//! platform's integer constants. Raw hardware encodings are only converted in
//! this module.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

// ===== Hardware encodings =====

/// Lens facing: front camera
pub const LENS_FACING_FRONT: i32 = 0;
/// Lens facing: back camera
pub const LENS_FACING_BACK: i32 = 1;
/// Lens facing: external camera (never selectable)
pub const LENS_FACING_EXTERNAL: i32 = 2;

/// Autofocus mode: single sweep, needs a trigger
pub const AF_MODE_AUTO: i32 = 1;
/// Autofocus mode: continuous, tuned for video
pub const AF_MODE_CONTINUOUS_VIDEO: i32 = 3;
/// Autofocus mode: continuous, tuned for stills
pub const AF_MODE_CONTINUOUS_PICTURE: i32 = 4;

/// Integer rectangle in sensor pixel coordinates (right/bottom exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the origin
    pub fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// True if `other` lies entirely inside this rectangle
    pub fn contains(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{},{} - {},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Output resolution advertised by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width and height exchanged
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which way the selected lens points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    Front,
    #[default]
    Back,
}

impl LensFacing {
    /// Decode a hardware lens-facing value. External and unknown values are
    /// not selectable and map to `None`.
    pub fn from_hardware(value: i32) -> Option<Self> {
        match value {
            LENS_FACING_FRONT => Some(LensFacing::Front),
            LENS_FACING_BACK => Some(LensFacing::Back),
            _ => None,
        }
    }

    pub fn to_hardware(self) -> i32 {
        match self {
            LensFacing::Front => LENS_FACING_FRONT,
            LensFacing::Back => LENS_FACING_BACK,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            LensFacing::Front => LensFacing::Back,
            LensFacing::Back => LensFacing::Front,
        }
    }

    /// Parse "front" / "back" (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "front" => Some(LensFacing::Front),
            "back" | "rear" => Some(LensFacing::Back),
            _ => None,
        }
    }
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
        }
    }
}

/// Autofocus mode, in the order the session prefers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AfMode {
    /// Continuous autofocus tuned for video
    ContinuousVideo,
    /// Continuous autofocus tuned for still capture
    ContinuousPicture,
    /// Single autofocus sweep started by a trigger
    Auto,
}

impl AfMode {
    /// Selection priority when a session starts
    pub const PRIORITY: [AfMode; 3] = [
        AfMode::ContinuousVideo,
        AfMode::ContinuousPicture,
        AfMode::Auto,
    ];

    pub fn from_hardware(value: i32) -> Option<Self> {
        match value {
            AF_MODE_CONTINUOUS_VIDEO => Some(AfMode::ContinuousVideo),
            AF_MODE_CONTINUOUS_PICTURE => Some(AfMode::ContinuousPicture),
            AF_MODE_AUTO => Some(AfMode::Auto),
            _ => None,
        }
    }

    pub fn to_hardware(self) -> i32 {
        match self {
            AfMode::ContinuousVideo => AF_MODE_CONTINUOUS_VIDEO,
            AfMode::ContinuousPicture => AF_MODE_CONTINUOUS_PICTURE,
            AfMode::Auto => AF_MODE_AUTO,
        }
    }

    /// Pick the preferred mode out of what the device advertises
    pub fn select(available: &[AfMode]) -> Option<AfMode> {
        Self::PRIORITY
            .into_iter()
            .find(|mode| available.contains(mode))
    }
}

/// Autofocus trigger sent alongside the AF mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AfTrigger {
    Start,
    Cancel,
}

/// Flash unit mode in a capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlashMode {
    #[default]
    Off,
    /// Flash LED stays on continuously
    Torch,
}

/// 3A control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlMode {
    #[default]
    Auto,
}

/// Request template the device builds defaults from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestTemplate {
    #[default]
    Preview,
}

/// Stream outputs attached to a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputTarget {
    /// Frame reader feeding the decoder
    FrameReader,
    /// Display surface
    Preview,
}

/// Rotation in 90 degree steps (clockwise)
///
/// Used both for the display rotation reported by the platform and for the
/// rotation attached to each delivered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::None,
        Rotation::Rotate90,
        Rotation::Rotate180,
        Rotation::Rotate270,
    ];

    /// Exact bucket for a degree value, `None` for anything that is not a
    /// multiple of 90 after normalisation.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Rotate90),
            180 => Some(Rotation::Rotate180),
            270 => Some(Rotation::Rotate270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Frame rotation code understood by decoders (0..=3)
    pub fn frame_code(&self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 1,
            Rotation::Rotate180 => 2,
            Rotation::Rotate270 => 3,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Static characteristics of one camera, in hardware encoding
///
/// Optional fields mirror what a platform may leave unreported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraCharacteristics {
    pub lens_facing: Option<i32>,
    pub sensor_orientation: Option<i32>,
    pub flash_available: Option<bool>,
    pub active_array_size: Option<Rect>,
    pub max_digital_zoom: Option<f32>,
    pub af_available_modes: Option<Vec<i32>>,
    /// Sizes supported by the preview surface output
    pub preview_sizes: Vec<Size>,
    /// Sizes supported by the still/frame output
    pub frame_sizes: Vec<Size>,
}

impl CameraCharacteristics {
    pub fn facing(&self) -> Option<LensFacing> {
        self.lens_facing.and_then(LensFacing::from_hardware)
    }

    /// Sensor mounting orientation in degrees, 0 when unreported
    pub fn sensor_orientation(&self) -> i32 {
        self.sensor_orientation.unwrap_or(0)
    }

    pub fn has_flash(&self) -> bool {
        self.flash_available.unwrap_or(false)
    }

    /// Recognised autofocus modes; unknown encodings are skipped
    pub fn af_modes(&self) -> Vec<AfMode> {
        self.af_available_modes
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|&mode| AfMode::from_hardware(mode))
            .collect()
    }
}

/// A fully built repeating capture request
///
/// Requests are plain values: the session builds a fresh one from its state
/// for every submission and never edits one in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    pub targets: Vec<OutputTarget>,
    pub control_mode: ControlMode,
    /// Digital zoom crop; `None` uses the full active array
    pub crop_region: Option<Rect>,
    pub flash_mode: FlashMode,
    pub af_mode: Option<AfMode>,
    pub af_trigger: Option<AfTrigger>,
}

/// Pixel layout of a delivered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Planar 4:2:0, luma plane first
    Yuv420,
    /// 8-bit luma only
    Gray8,
}

impl PixelFormat {
    /// Total buffer size for a tightly packed frame
    pub fn buffer_len(&self, width: u32, height: u32) -> usize {
        let luma = width as usize * height as usize;
        match self {
            PixelFormat::Yuv420 => luma + luma / 2,
            PixelFormat::Gray8 => luma,
        }
    }
}

/// A single frame from the frame reader
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Frame bytes; the luma plane always comes first
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Luma row stride in bytes
    pub stride: u32,
    /// Monotonic frame counter assigned by the reader
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Luma value at (x, y), 0 outside the buffer
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let offset = y as usize * self.stride as usize + x as usize;
        self.data.get(offset).copied().unwrap_or(0)
    }

    /// Luma plane without stride padding
    pub fn luma_plane(&self) -> Vec<u8> {
        let width = self.width as usize;
        let stride = self.stride as usize;
        let mut plane = Vec::with_capacity(width * self.height as usize);
        for row in 0..self.height as usize {
            let start = row * stride;
            let end = start + width;
            if end <= self.data.len() {
                plane.extend_from_slice(&self.data[start..end]);
            }
        }
        plane
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for hardware operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Camera device not found
    DeviceNotFound(String),
    /// Hardware refused or failed the call
    AccessFailed(String),
    /// Device went away
    Disconnected,
    /// Handle was already closed
    Closed,
    /// Stream configuration rejected
    ConfigurationFailed(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::AccessFailed(msg) => write!(f, "Camera access failed: {}", msg),
            BackendError::Disconnected => write!(f, "Camera disconnected"),
            BackendError::Closed => write!(f, "Handle already closed"),
            BackendError::ConfigurationFailed(msg) => {
                write!(f, "Stream configuration failed: {}", msg)
            }
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lens_facing_hardware_mapping() {
        assert_eq!(LensFacing::from_hardware(0), Some(LensFacing::Front));
        assert_eq!(LensFacing::from_hardware(1), Some(LensFacing::Back));
        assert_eq!(LensFacing::from_hardware(LENS_FACING_EXTERNAL), None);
        assert_eq!(LensFacing::from_hardware(-1), None);
        for facing in [LensFacing::Front, LensFacing::Back] {
            assert_eq!(LensFacing::from_hardware(facing.to_hardware()), Some(facing));
        }
    }

    #[test]
    fn test_af_mode_selection_priority() {
        let all = [AfMode::Auto, AfMode::ContinuousPicture, AfMode::ContinuousVideo];
        assert_eq!(AfMode::select(&all), Some(AfMode::ContinuousVideo));
        assert_eq!(
            AfMode::select(&[AfMode::Auto, AfMode::ContinuousPicture]),
            Some(AfMode::ContinuousPicture)
        );
        assert_eq!(AfMode::select(&[AfMode::Auto]), Some(AfMode::Auto));
        assert_eq!(AfMode::select(&[]), None);
    }

    #[test]
    fn test_characteristics_defaults() {
        let chars = CameraCharacteristics {
            af_available_modes: Some(vec![0, AF_MODE_AUTO, 99]),
            ..Default::default()
        };
        assert_eq!(chars.sensor_orientation(), 0);
        assert!(!chars.has_flash());
        assert_eq!(chars.facing(), None);
        assert_eq!(chars.af_modes(), vec![AfMode::Auto]);
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Rotate270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Rotate90));
        assert_eq!(Rotation::from_degrees(45), None);
        assert!(Rotation::Rotate270.swaps_dimensions());
    }

    #[test]
    fn test_luma_plane_strips_padding() {
        let frame = CameraFrame {
            width: 2,
            height: 2,
            data: Arc::from(&[1u8, 2, 0, 3, 4, 0][..]),
            format: PixelFormat::Gray8,
            stride: 3,
            sequence: 0,
            captured_at: Instant::now(),
        };
        assert_eq!(frame.luma_plane(), vec![1, 2, 3, 4]);
        assert_eq!(frame.luma(1, 1), 4);
        assert_eq!(frame.luma(5, 5), 0);
    }
}
