// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources for the virtual camera
//!
//! The frame reader is a bounded queue filled either by tests pushing frames
//! directly or by a synthesizer thread producing frames at a fixed interval.

use crate::backends::camera::types::{
    BackendError, BackendResult, CameraFrame, PixelFormat, Size,
};
use crate::backends::camera::FrameReader;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Load an image file as a grayscale frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let luma = img.to_luma8();
    let width = luma.width();
    let height = luma.height();
    let data: Vec<u8> = luma.into_raw();

    info!(width, height, "Image loaded successfully");

    Ok(CameraFrame {
        data: Arc::from(data.into_boxed_slice()),
        width,
        height,
        stride: width,
        format: PixelFormat::Gray8,
        sequence: 0,
        captured_at: Instant::now(),
    })
}

/// A moving diagonal gradient in YUV 4:2:0
pub fn gradient_frame(size: Size, sequence: u64) -> CameraFrame {
    let width = size.width as usize;
    let height = size.height as usize;
    let mut data = vec![128u8; PixelFormat::Yuv420.buffer_len(size.width, size.height)];

    let shift = (sequence * 4) as usize;
    for y in 0..height {
        let row = &mut data[y * width..(y + 1) * width];
        for (x, value) in row.iter_mut().enumerate() {
            *value = ((x + y + shift) % 256) as u8;
        }
    }

    CameraFrame {
        width: size.width,
        height: size.height,
        data: Arc::from(data.into_boxed_slice()),
        format: PixelFormat::Yuv420,
        stride: size.width,
        sequence,
        captured_at: Instant::now(),
    }
}

/// What a synthesizer feeds into the reader
#[derive(Debug, Clone)]
pub enum FrameSource {
    /// Generated gradient at the reader's size
    Gradient,
    /// The same still frame over and over
    Still(CameraFrame),
}

/// Bounded frame queue implementing [`FrameReader`]
#[derive(Debug)]
pub struct VirtualFrameReader {
    size: Size,
    max_images: usize,
    queue: Mutex<VecDeque<CameraFrame>>,
    ready: Condvar,
    closed: AtomicBool,
    sequence: AtomicU64,
    dropped: AtomicU64,
}

impl VirtualFrameReader {
    pub fn new(size: Size, max_images: usize) -> Self {
        Self {
            size,
            max_images: max_images.max(1),
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            closed: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<CameraFrame>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a frame, evicting the oldest one when full. Returns false once
    /// the reader is closed.
    pub fn push_frame(&self, mut frame: CameraFrame) -> bool {
        let mut queue = self.queue();
        if self.is_closed() {
            return false;
        }
        frame.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        while queue.len() >= self.max_images {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(frame);
        self.ready.notify_all();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.queue().len()
    }

    /// Frames discarded without being acquired
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }
}

impl FrameReader for VirtualFrameReader {
    fn size(&self) -> Size {
        self.size
    }

    fn wait_for_frame(&self, timeout: Duration) -> bool {
        let queue = self.queue();
        if !queue.is_empty() {
            return true;
        }
        let (queue, _) = self
            .ready
            .wait_timeout(queue, timeout)
            .unwrap_or_else(|e| e.into_inner());
        !queue.is_empty()
    }

    fn acquire_latest_frame(&self) -> BackendResult<Option<CameraFrame>> {
        if self.is_closed() {
            return Err(BackendError::Closed);
        }
        let mut queue = self.queue();
        let latest = queue.pop_back();
        let stale = queue.len() as u64;
        queue.clear();
        if stale > 0 {
            self.dropped.fetch_add(stale, Ordering::Relaxed);
        }
        Ok(latest)
    }

    fn close(&self) -> BackendResult<()> {
        let mut queue = self.queue();
        if !self.closed.swap(true, Ordering::SeqCst) {
            queue.clear();
            self.ready.notify_all();
            debug!(size = %self.size, "Frame reader closed");
        }
        Ok(())
    }
}

/// Feed `reader` from `source` every `interval` until the reader closes
pub fn spawn_synthesizer(reader: Arc<VirtualFrameReader>, source: FrameSource, interval: Duration) {
    let spawned = thread::Builder::new()
        .name("virtual-camera-frames".to_string())
        .spawn(move || {
            debug!(interval_ms = interval.as_millis() as u64, "Frame synthesizer started");
            let mut sequence = 0u64;
            loop {
                let frame = match &source {
                    FrameSource::Gradient => gradient_frame(reader.size(), sequence),
                    FrameSource::Still(frame) => CameraFrame {
                        captured_at: Instant::now(),
                        ..frame.clone()
                    },
                };
                if !reader.push_frame(frame) {
                    break;
                }
                sequence += 1;
                thread::sleep(interval);
            }
            debug!(frames = sequence, "Frame synthesizer finished");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start frame synthesizer");
    }
}
