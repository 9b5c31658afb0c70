// SPDX-License-Identifier: GPL-3.0-only

//! Core types for frame analysis results

use crate::backends::camera::Rotation;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions,
/// so they stay valid regardless of the frame size the detector worked at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            x: x as f32 / frame_width as f32,
            y: y as f32 / frame_height as f32,
            width: width as f32 / frame_width as f32,
            height: height as f32 / frame_height as f32,
        }
    }

    /// Bounding box of a set of pixel corners, clamped to the frame
    pub fn from_corners(
        corners: &[(i32, i32)],
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        let clamp_x = |x: i32| x.clamp(0, frame_width as i32) as u32;
        let clamp_y = |y: i32| y.clamp(0, frame_height as i32) as u32;

        let min_x = corners.iter().map(|&(x, _)| clamp_x(x)).min()?;
        let max_x = corners.iter().map(|&(x, _)| clamp_x(x)).max()?;
        let min_y = corners.iter().map(|&(_, y)| clamp_y(y)).min()?;
        let max_y = corners.iter().map(|&(_, y)| clamp_y(y)).max()?;

        Some(Self::from_pixels(
            min_x,
            min_y,
            max_x - min_x,
            max_y - min_y,
            frame_width,
            frame_height,
        ))
    }
}

/// A decoded QR code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QrDetection {
    /// Decoded payload
    pub content: String,
    /// Location within the (unrotated) frame
    pub region: FrameRegion,
    /// Rotation the frame needed to appear upright
    #[serde(serialize_with = "serialize_rotation")]
    pub rotation: Rotation,
}

fn serialize_rotation<S: serde::Serializer>(rotation: &Rotation, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i32(rotation.degrees())
}

/// Barcode symbologies a scanner can be configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarcodeFormat {
    Aztec,
    Codabar,
    Code39,
    Code93,
    Code128,
    DataMatrix,
    Ean8,
    Ean13,
    Itf,
    Pdf417,
    QrCode,
    UpcA,
    UpcE,
}

impl BarcodeFormat {
    pub const ALL: [BarcodeFormat; 13] = [
        BarcodeFormat::Aztec,
        BarcodeFormat::Codabar,
        BarcodeFormat::Code39,
        BarcodeFormat::Code93,
        BarcodeFormat::Code128,
        BarcodeFormat::DataMatrix,
        BarcodeFormat::Ean8,
        BarcodeFormat::Ean13,
        BarcodeFormat::Itf,
        BarcodeFormat::Pdf417,
        BarcodeFormat::QrCode,
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let format = match name.trim().to_ascii_uppercase().as_str() {
            "AZTEC" => BarcodeFormat::Aztec,
            "CODABAR" => BarcodeFormat::Codabar,
            "CODE_39" => BarcodeFormat::Code39,
            "CODE_93" => BarcodeFormat::Code93,
            "CODE_128" => BarcodeFormat::Code128,
            "DATA_MATRIX" => BarcodeFormat::DataMatrix,
            "EAN_8" => BarcodeFormat::Ean8,
            "EAN_13" => BarcodeFormat::Ean13,
            "ITF" => BarcodeFormat::Itf,
            "PDF417" | "PDF_417" => BarcodeFormat::Pdf417,
            "QR_CODE" => BarcodeFormat::QrCode,
            "UPC_A" => BarcodeFormat::UpcA,
            "UPC_E" => BarcodeFormat::UpcE,
            _ => return None,
        };
        Some(format)
    }

    /// Parse a list of format names. "ALL_FORMATS" enables every format;
    /// unknown names are skipped with a warning.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Vec<BarcodeFormat> {
        let mut formats = Vec::new();
        for name in names {
            let name = name.as_ref();
            if name.trim().eq_ignore_ascii_case("ALL_FORMATS") {
                return Self::ALL.to_vec();
            }
            match Self::from_name(name) {
                Some(format) if !formats.contains(&format) => formats.push(format),
                Some(_) => {}
                None => warn!(format = name, "Ignoring unknown barcode format"),
            }
        }
        formats
    }

    pub fn name(&self) -> &'static str {
        match self {
            BarcodeFormat::Aztec => "AZTEC",
            BarcodeFormat::Codabar => "CODABAR",
            BarcodeFormat::Code39 => "CODE_39",
            BarcodeFormat::Code93 => "CODE_93",
            BarcodeFormat::Code128 => "CODE_128",
            BarcodeFormat::DataMatrix => "DATA_MATRIX",
            BarcodeFormat::Ean8 => "EAN_8",
            BarcodeFormat::Ean13 => "EAN_13",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::Pdf417 => "PDF417",
            BarcodeFormat::QrCode => "QR_CODE",
            BarcodeFormat::UpcA => "UPC_A",
            BarcodeFormat::UpcE => "UPC_E",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
