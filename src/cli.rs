// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing the virtual cameras
//! - Running a scanning session against the virtual camera
//! - Printing the frame rotation table

use chrono::Local;
use qr_camera::backends::camera::capture_session::negotiate_sizes;
use qr_camera::backends::camera::orientation::{display_orientation, resolve_frame_rotation};
use qr_camera::backends::camera::{
    LensFacing, LifecycleState, PreviewSurface, QrScanner, Rotation, Size,
};
use qr_camera::backends::virtual_camera::{FrameSource, VirtualCamera, load_image_as_frame};
use qr_camera::config::ScannerConfig;
use qr_camera::constants::VIRTUAL_FRAME_INTERVAL;
use qr_camera::frame_processor::{QrDetection, RqrrDecoder};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// List the virtual cameras with their sizes
pub fn list_cameras(width: u32, height: u32) -> Result<(), Box<dyn std::error::Error>> {
    let camera = VirtualCamera::default();
    let target = Size::new(width, height);

    println!("Virtual cameras:");
    println!();
    for device in camera.devices() {
        let chars = &device.characteristics;
        let facing = device
            .facing()
            .map(|f| f.to_string())
            .unwrap_or_else(|| "external".to_string());
        println!("  [{}] {} camera", device.id, facing);
        println!(
            "      Sensor: {}° mounted, flash {}, max zoom {:.1}x",
            chars.sensor_orientation(),
            if chars.has_flash() { "yes" } else { "no" },
            chars.max_digital_zoom.unwrap_or(1.0)
        );
        println!("      Preview sizes: {}", join_sizes(&chars.preview_sizes));
        println!("      Frame sizes: {}", join_sizes(&chars.frame_sizes));
        match negotiate_sizes(chars, target) {
            Ok((preview, frame)) => {
                println!("      For {}: preview {}, frames {}", target, preview, frame)
            }
            Err(e) => println!("      For {}: {}", target, e),
        }
        println!();
    }

    Ok(())
}

fn join_sizes(sizes: &[Size]) -> String {
    sizes
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print which rotation frames get for each display rotation
pub fn print_rotation_table(sensor: Option<i32>) -> Result<(), Box<dyn std::error::Error>> {
    let sensors = match sensor {
        Some(angle) => vec![angle],
        None => vec![0, 90, 180, 270],
    };

    println!("sensor  display  frame  reported");
    for sensor in sensors {
        for display in Rotation::ALL {
            println!(
                "{:>5}°  {:>6}  {:>5}  {:>7}°",
                sensor,
                display.to_string(),
                resolve_frame_rotation(display, sensor).to_string(),
                display_orientation(sensor)
            );
        }
    }
    Ok(())
}

/// Options for [`simulate`]
pub struct SimulateOptions {
    pub config: Option<PathBuf>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub zoom: Option<f32>,
    pub facing: Option<String>,
    pub heartbeat_ms: Option<u64>,
    pub no_heartbeat: bool,
    pub duration: u64,
    pub rotation: i32,
    pub image: Option<PathBuf>,
    pub torch: bool,
}

impl SimulateOptions {
    /// Config file (or defaults) with command-line overrides applied
    fn scanner_config(&self) -> Result<ScannerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ScannerConfig::load(path)?,
            None => ScannerConfig::default(),
        };
        if let Some(width) = self.width {
            config.target_width = width;
        }
        if let Some(height) = self.height {
            config.target_height = height;
        }
        if let Some(zoom) = self.zoom {
            config.zoom_factor = zoom;
        }
        if let Some(facing) = &self.facing {
            config.lens_facing = LensFacing::from_name(facing)
                .ok_or_else(|| format!("Unknown lens facing '{}'", facing))?;
        }
        if let Some(timeout) = self.heartbeat_ms {
            config.heartbeat_timeout_ms = timeout;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Surface that only reports the size it is given
struct LoggingSurface;

impl PreviewSurface for LoggingSurface {
    fn set_default_buffer_size(&self, size: Size) {
        println!("Preview surface sized to {}", size);
    }
}

fn print_detections(detections: Vec<QrDetection>) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    for detection in detections {
        println!(
            "[{}] QR ({}): {}",
            timestamp, detection.rotation, detection.content
        );
    }
}

/// Run one scanning session against the virtual camera
pub fn simulate(options: SimulateOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = options.scanner_config()?;
    let rotation = Rotation::from_degrees(options.rotation)
        .ok_or_else(|| format!("Display rotation must be 0, 90, 180 or 270, got {}", options.rotation))?;

    let camera = VirtualCamera::default();
    camera.set_display_rotation(rotation);
    let source = match &options.image {
        Some(path) => FrameSource::Still(load_image_as_frame(path)?),
        None => FrameSource::Gradient,
    };
    camera.set_frame_source(source, VIRTUAL_FRAME_INTERVAL);

    let decoder = RqrrDecoder::new(&config.barcode_formats(), Box::new(print_detections));
    let scanner = QrScanner::new(
        config,
        Arc::new(camera.clone()),
        Arc::new(LoggingSurface),
        Arc::new(decoder),
    )?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;

    scanner.start_blocking()?;
    if options.torch {
        scanner.toggle_torch();
    }

    if let Some(status) = scanner.status() {
        println!(
            "Previewing camera {} ({}) at {} zoom, frames {}, orientation {}°, torch {}",
            status.camera_id.as_deref().unwrap_or("?"),
            status.lens_facing(),
            status.capture.zoom,
            status
                .frame_size
                .map(|s| s.to_string())
                .unwrap_or_default(),
            status.orientation.unwrap_or(0),
            if status.torch_on() { "on" } else { "off" }
        );
    }
    println!("Scanning for {}s, press Ctrl+C to stop", options.duration);

    let deadline = Instant::now() + Duration::from_secs(options.duration);
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(100));
        if !options.no_heartbeat {
            scanner.heart_beat();
        }
        if scanner.state() != LifecycleState::Previewing {
            println!("Camera left preview ({})", scanner.state());
            break;
        }
    }

    let frames = scanner
        .status()
        .map(|status| status.frames_delivered)
        .unwrap_or(0);
    scanner.stop();

    println!();
    println!("Frames delivered: {}", frames);
    println!("Requests submitted: {}", camera.submitted_requests().len());
    println!("Devices still open: {}", camera.open_device_count());

    Ok(())
}
