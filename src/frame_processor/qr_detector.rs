// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection
//!
//! Decodes QR codes from the luma plane of each frame using the rqrr crate.
//! Large frames are downscaled first; detections are reported in normalized
//! coordinates of the original frame.

use super::FrameDecoder;
use super::types::{BarcodeFormat, FrameRegion, QrDetection};
use crate::backends::camera::{CameraFrame, Rotation};
use crate::constants::QR_MAX_DIMENSION;
use image::GrayImage;
use image::imageops::{self, FilterType};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Callback receiving the detections of one frame
pub type DetectionHandler = Box<dyn Fn(Vec<QrDetection>) + Send + Sync>;

/// QR decoder backed by rqrr
pub struct RqrrDecoder {
    /// Frames are downscaled so neither side exceeds this
    max_dimension: u32,
    enabled: bool,
    on_detect: DetectionHandler,
}

impl RqrrDecoder {
    /// Decoder for the given formats. Only QR codes are decoded; with QR not
    /// among `formats` every frame is skipped.
    pub fn new(formats: &[BarcodeFormat], on_detect: DetectionHandler) -> Self {
        let enabled = formats.contains(&BarcodeFormat::QrCode);
        if !enabled {
            warn!(?formats, "QR_CODE not enabled, frames will not be decoded");
        }
        Self {
            max_dimension: QR_MAX_DIMENSION,
            enabled,
            on_detect,
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl FrameDecoder for RqrrDecoder {
    fn decode(&self, frame: &CameraFrame, rotation: Rotation) {
        if !self.enabled {
            return;
        }
        let detections = detect_sync(frame, rotation, self.max_dimension);
        if !detections.is_empty() {
            (self.on_detect)(detections);
        }
    }
}

/// Luma plane of `frame` as an image, downscaled to fit `max_dimension`.
/// Returns the image and the factor mapping its pixels back to the frame.
fn prepare_luma(frame: &CameraFrame, max_dimension: u32) -> Option<(GrayImage, f32)> {
    let Some(image) = GrayImage::from_raw(frame.width, frame.height, frame.luma_plane()) else {
        warn!(
            width = frame.width,
            height = frame.height,
            len = frame.data.len(),
            "Frame buffer too small for its dimensions"
        );
        return None;
    };

    if frame.width <= max_dimension && frame.height <= max_dimension {
        return Some((image, 1.0));
    }

    let scale = (frame.width as f32 / max_dimension as f32)
        .max(frame.height as f32 / max_dimension as f32);
    let new_width = ((frame.width as f32 / scale) as u32).max(1);
    let new_height = ((frame.height as f32 / scale) as u32).max(1);
    let resized = imageops::resize(&image, new_width, new_height, FilterType::Triangle);
    Some((resized, scale))
}

fn detect_sync(frame: &CameraFrame, rotation: Rotation, max_dimension: u32) -> Vec<QrDetection> {
    let start = Instant::now();
    if frame.width == 0 || frame.height == 0 {
        return Vec::new();
    }

    let Some((luma, scale)) = prepare_luma(frame, max_dimension) else {
        return Vec::new();
    };
    trace!(
        proc_width = luma.width(),
        proc_height = luma.height(),
        scale,
        "Prepared luma image"
    );

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        luma.width() as usize,
        luma.height() as usize,
        |x, y| luma.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();

    let mut detections = Vec::with_capacity(grids.len());
    for grid in grids {
        let content = match grid.decode() {
            Ok((_, content)) => content,
            Err(e) => {
                debug!(error = ?e, "Failed to decode QR grid");
                continue;
            }
        };

        let corners: Vec<(i32, i32)> = grid
            .bounds
            .iter()
            .map(|p| ((p.x as f32 * scale) as i32, (p.y as f32 * scale) as i32))
            .collect();
        let Some(region) = FrameRegion::from_corners(&corners, frame.width, frame.height) else {
            continue;
        };

        debug!(
            content = %content,
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            %rotation,
            "Detected QR code"
        );
        detections.push(QrDetection {
            content,
            region,
            rotation,
        });
    }

    if !detections.is_empty() {
        debug!(
            count = detections.len(),
            total_ms = start.elapsed().as_millis() as u64,
            sequence = frame.sequence,
            "QR detection found codes"
        );
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::PixelFormat;
    use std::sync::{Arc, Mutex};

    fn gray_frame(width: u32, height: u32, stride: u32, value: u8) -> CameraFrame {
        CameraFrame {
            width,
            height,
            data: Arc::from(vec![value; (stride * height) as usize]),
            format: PixelFormat::Gray8,
            stride,
            sequence: 1,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_prepare_luma_downscales_large_frames() {
        let (image, scale) = prepare_luma(&gray_frame(1280, 960, 1280, 128), 640).unwrap();
        assert_eq!((image.width(), image.height()), (640, 480));
        assert_eq!(scale, 2.0);

        let (image, scale) = prepare_luma(&gray_frame(320, 240, 336, 128), 640).unwrap();
        assert_eq!((image.width(), image.height()), (320, 240));
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn test_truncated_frame_is_skipped() {
        let mut frame = gray_frame(64, 64, 64, 0);
        frame.data = Arc::from(vec![0u8; 100]);
        assert!(prepare_luma(&frame, 640).is_none());
        assert!(detect_sync(&frame, Rotation::None, 640).is_empty());
    }

    #[test]
    fn test_blank_frame_reports_nothing() {
        let calls = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&calls);
        let decoder = RqrrDecoder::new(
            &[BarcodeFormat::QrCode],
            Box::new(move |_| *sink.lock().unwrap() += 1),
        );
        decoder.decode(&gray_frame(64, 48, 64, 255), Rotation::Rotate90);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_disabled_without_qr_format() {
        let decoder = RqrrDecoder::new(&[BarcodeFormat::Ean13], Box::new(|_| {}));
        assert!(!decoder.is_enabled());
        let decoder = RqrrDecoder::new(&BarcodeFormat::ALL, Box::new(|_| {}));
        assert!(decoder.is_enabled());
    }
}
