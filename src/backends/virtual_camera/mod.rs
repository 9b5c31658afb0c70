// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! An in-process implementation of the camera hardware traits. Devices are
//! described by [`VirtualDeviceSpec`]; open and configure outcomes are
//! delivered from helper threads the way a platform camera service would.
//! Every submitted capture request is recorded, and faults can be injected
//! at each step, which makes the backend usable both for the CLI simulation
//! and for exercising the lifecycle in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  open_device   ┌─────────────────┐
//! │  CameraLifecycle │ ─────────────► │  VirtualCamera  │
//! └──────────────────┘                └────────┬────────┘
//!          ▲                                   │ helper thread
//!          │ DeviceStateCallback::opened       ▼
//!          └──────────────────────────  VirtualDevice ──► VirtualSession
//!                                              │
//!                                              ▼
//!                                     VirtualFrameReader ◄── synthesizer
//! ```

mod frame_source;

pub use frame_source::{
    FrameSource, VirtualFrameReader, gradient_frame, load_image_as_frame, spawn_synthesizer,
};

use crate::backends::camera::types::*;
use crate::backends::camera::{
    CameraHardware, DeviceStateCallback, FrameReader, HardwareDevice, HardwareSession,
    SessionStateCallback,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Description of one virtual device
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDeviceSpec {
    pub id: String,
    pub characteristics: CameraCharacteristics,
}

impl VirtualDeviceSpec {
    /// Rear camera with flash, 8x digital zoom and every autofocus mode
    pub fn back_camera() -> Self {
        Self {
            id: "0".to_string(),
            characteristics: CameraCharacteristics {
                lens_facing: Some(LENS_FACING_BACK),
                sensor_orientation: Some(90),
                flash_available: Some(true),
                active_array_size: Some(Rect::from_size(4000, 3000)),
                max_digital_zoom: Some(8.0),
                af_available_modes: Some(vec![
                    AF_MODE_AUTO,
                    AF_MODE_CONTINUOUS_VIDEO,
                    AF_MODE_CONTINUOUS_PICTURE,
                ]),
                preview_sizes: vec![
                    Size::new(1920, 1080),
                    Size::new(1280, 720),
                    Size::new(640, 480),
                    Size::new(320, 240),
                ],
                frame_sizes: vec![
                    Size::new(4000, 3000),
                    Size::new(1920, 1080),
                    Size::new(1280, 960),
                    Size::new(640, 480),
                ],
            },
        }
    }

    /// Front camera without flash or autofocus
    pub fn front_camera() -> Self {
        Self {
            id: "1".to_string(),
            characteristics: CameraCharacteristics {
                lens_facing: Some(LENS_FACING_FRONT),
                sensor_orientation: Some(270),
                flash_available: Some(false),
                active_array_size: Some(Rect::from_size(2592, 1944)),
                max_digital_zoom: Some(4.0),
                af_available_modes: None,
                preview_sizes: vec![Size::new(1280, 720), Size::new(640, 480)],
                frame_sizes: vec![
                    Size::new(2592, 1944),
                    Size::new(1280, 960),
                    Size::new(640, 480),
                ],
            },
        }
    }

    pub fn facing(&self) -> Option<LensFacing> {
        self.characteristics.facing()
    }
}

/// Failures the virtual camera can be told to produce
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultInjection {
    /// `open_device` returns an error immediately
    pub fail_open: bool,
    /// The open callback reports a disconnection instead of a device
    pub disconnect_on_open: bool,
    /// The open callback reports this device error code instead of a device
    pub error_on_open: Option<i32>,
    /// Session configuration reports failure
    pub fail_configure: bool,
    /// Repeating requests are rejected
    pub fail_submit: bool,
    /// A successfully opened device disconnects after this long
    pub disconnect_after_open: Option<Duration>,
}

/// Device handed out and not yet closed, with the callback it reports to
struct LiveDevice {
    serial: u64,
    camera_id: String,
    callback: DeviceStateCallback,
}

struct VirtualState {
    devices: Vec<VirtualDeviceSpec>,
    has_hardware: bool,
    has_permission: bool,
    display_rotation: Rotation,
    open_delay: Duration,
    faults: FaultInjection,
    frame_source: Option<(FrameSource, Duration)>,
    requests: Vec<CaptureRequest>,
    opened_ids: Vec<String>,
    open_devices: usize,
    open_sessions: usize,
    readers: Vec<Arc<VirtualFrameReader>>,
    live_devices: Vec<LiveDevice>,
    next_serial: u64,
}

type SharedState = Arc<Mutex<VirtualState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, VirtualState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Detach the callbacks of live devices matching `matches`. A lost device
/// reports once; closing it afterwards only updates the counters.
fn take_callbacks(
    state: &SharedState,
    matches: impl Fn(&LiveDevice) -> bool,
) -> Vec<DeviceStateCallback> {
    let mut state = lock(state);
    let (lost, kept) = std::mem::take(&mut state.live_devices)
        .into_iter()
        .partition::<Vec<_>, _>(|device| matches(device));
    state.live_devices = kept;
    lost.into_iter().map(|device| device.callback).collect()
}

/// In-process camera service
///
/// Cheap to clone; clones share devices, faults and records.
#[derive(Clone)]
pub struct VirtualCamera {
    state: SharedState,
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self::new(vec![
            VirtualDeviceSpec::back_camera(),
            VirtualDeviceSpec::front_camera(),
        ])
    }
}

impl VirtualCamera {
    pub fn new(devices: Vec<VirtualDeviceSpec>) -> Self {
        info!(count = devices.len(), "Creating virtual camera");
        Self {
            state: Arc::new(Mutex::new(VirtualState {
                devices,
                has_hardware: true,
                has_permission: true,
                display_rotation: Rotation::None,
                open_delay: Duration::ZERO,
                faults: FaultInjection::default(),
                frame_source: None,
                requests: Vec::new(),
                opened_ids: Vec::new(),
                open_devices: 0,
                open_sessions: 0,
                readers: Vec::new(),
                live_devices: Vec::new(),
                next_serial: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, VirtualState> {
        lock(&self.state)
    }

    // ===== Setup =====

    pub fn devices(&self) -> Vec<VirtualDeviceSpec> {
        self.state().devices.clone()
    }

    pub fn set_has_hardware(&self, present: bool) {
        self.state().has_hardware = present;
    }

    pub fn set_has_permission(&self, granted: bool) {
        self.state().has_permission = granted;
    }

    pub fn set_display_rotation(&self, rotation: Rotation) {
        self.state().display_rotation = rotation;
    }

    /// Delay before the open callback fires
    pub fn set_open_delay(&self, delay: Duration) {
        self.state().open_delay = delay;
    }

    pub fn set_faults(&self, faults: FaultInjection) {
        self.state().faults = faults;
    }

    /// Feed every new frame reader from `source` at `interval`
    pub fn set_frame_source(&self, source: FrameSource, interval: Duration) {
        self.state().frame_source = Some((source, interval));
    }

    // ===== Records =====

    /// Every repeating request accepted so far, oldest first
    pub fn submitted_requests(&self) -> Vec<CaptureRequest> {
        self.state().requests.clone()
    }

    pub fn last_request(&self) -> Option<CaptureRequest> {
        self.state().requests.last().cloned()
    }

    /// Ids of devices handed out by successful opens, in order
    pub fn opened_ids(&self) -> Vec<String> {
        self.state().opened_ids.clone()
    }

    /// Devices handed out and not yet closed
    pub fn open_device_count(&self) -> usize {
        self.state().open_devices
    }

    pub fn open_session_count(&self) -> usize {
        self.state().open_sessions
    }

    pub fn readers_created(&self) -> usize {
        self.state().readers.len()
    }

    pub fn readers_closed(&self) -> usize {
        self.state()
            .readers
            .iter()
            .filter(|reader| reader.is_closed())
            .count()
    }

    /// Most recently created frame reader, if still open
    pub fn active_reader(&self) -> Option<Arc<VirtualFrameReader>> {
        self.state()
            .readers
            .last()
            .filter(|reader| !reader.is_closed())
            .cloned()
    }

    /// Report every open device with `camera_id` as disconnected. Returns how
    /// many devices were affected.
    pub fn disconnect_device(&self, camera_id: &str) -> usize {
        let callbacks = take_callbacks(&self.state, |device| device.camera_id == camera_id);
        info!(camera = camera_id, count = callbacks.len(), "Disconnecting virtual device");
        for callback in &callbacks {
            callback.disconnected();
        }
        callbacks.len()
    }

    /// Report a device error on every open device with `camera_id`
    pub fn report_device_error(&self, camera_id: &str, code: i32) -> usize {
        let callbacks = take_callbacks(&self.state, |device| device.camera_id == camera_id);
        warn!(camera = camera_id, code, count = callbacks.len(), "Virtual device error");
        for callback in &callbacks {
            callback.error(code);
        }
        callbacks.len()
    }

    /// Push a frame into the active reader. False when no reader is open.
    pub fn push_frame(&self, frame: CameraFrame) -> bool {
        self.active_reader()
            .is_some_and(|reader| reader.push_frame(frame))
    }
}

impl CameraHardware for VirtualCamera {
    fn has_camera_hardware(&self) -> bool {
        let state = self.state();
        state.has_hardware && !state.devices.is_empty()
    }

    fn has_camera_permission(&self) -> bool {
        self.state().has_permission
    }

    fn camera_ids(&self) -> BackendResult<Vec<String>> {
        Ok(self.state().devices.iter().map(|d| d.id.clone()).collect())
    }

    fn characteristics(&self, camera_id: &str) -> BackendResult<CameraCharacteristics> {
        self.state()
            .devices
            .iter()
            .find(|d| d.id == camera_id)
            .map(|d| d.characteristics.clone())
            .ok_or_else(|| BackendError::DeviceNotFound(camera_id.to_string()))
    }

    fn open_device(&self, camera_id: &str, callback: DeviceStateCallback) -> BackendResult<()> {
        let (delay, faults) = {
            let state = self.state();
            if !state.devices.iter().any(|d| d.id == camera_id) {
                return Err(BackendError::DeviceNotFound(camera_id.to_string()));
            }
            (state.open_delay, state.faults.clone())
        };
        if faults.fail_open {
            return Err(BackendError::AccessFailed(format!(
                "camera {} is in use",
                camera_id
            )));
        }

        debug!(camera = camera_id, delay_ms = delay.as_millis() as u64, "Opening virtual device");
        let shared = Arc::clone(&self.state);
        let id = camera_id.to_string();
        thread::Builder::new()
            .name(format!("virtual-open-{}", id))
            .spawn(move || {
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                if faults.disconnect_on_open {
                    callback.disconnected();
                } else if let Some(code) = faults.error_on_open {
                    callback.error(code);
                } else {
                    let serial = {
                        let mut state = lock(&shared);
                        state.open_devices += 1;
                        state.opened_ids.push(id.clone());
                        state.next_serial += 1;
                        let serial = state.next_serial;
                        state.live_devices.push(LiveDevice {
                            serial,
                            camera_id: id.clone(),
                            callback: callback.clone(),
                        });
                        serial
                    };
                    callback.opened(Box::new(VirtualDevice {
                        id,
                        serial,
                        state: Arc::clone(&shared),
                        closed: false,
                    }));

                    if let Some(after) = faults.disconnect_after_open {
                        thread::sleep(after);
                        for callback in take_callbacks(&shared, |device| device.serial == serial) {
                            debug!(serial, "Virtual device dropping off");
                            callback.disconnected();
                        }
                    }
                }
            })
            .map_err(|e| BackendError::Other(format!("Failed to spawn open thread: {}", e)))?;
        Ok(())
    }

    fn create_frame_reader(
        &self,
        size: Size,
        max_images: usize,
    ) -> BackendResult<Arc<dyn FrameReader>> {
        let reader = Arc::new(VirtualFrameReader::new(size, max_images));
        let source = {
            let mut state = self.state();
            state.readers.push(Arc::clone(&reader));
            state.frame_source.clone()
        };
        if let Some((source, interval)) = source {
            spawn_synthesizer(Arc::clone(&reader), source, interval);
        }
        debug!(%size, max_images, "Created virtual frame reader");
        Ok(reader)
    }

    fn display_rotation(&self) -> Rotation {
        self.state().display_rotation
    }
}

/// A device handed out by [`VirtualCamera::open_device`]
pub struct VirtualDevice {
    id: String,
    serial: u64,
    state: SharedState,
    closed: bool,
}

impl HardwareDevice for VirtualDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_capture_session(
        &mut self,
        outputs: &[OutputTarget],
        callback: SessionStateCallback,
    ) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Closed);
        }
        let fail = lock(&self.state).faults.fail_configure;
        debug!(camera = %self.id, ?outputs, "Configuring virtual session");

        let shared = Arc::clone(&self.state);
        let id = self.id.clone();
        thread::Builder::new()
            .name(format!("virtual-session-{}", id))
            .spawn(move || {
                if fail {
                    callback.configure_failed();
                    return;
                }
                lock(&shared).open_sessions += 1;
                callback.configured(Box::new(VirtualSession {
                    camera_id: id,
                    state: shared,
                    closed: false,
                }));
            })
            .map_err(|e| BackendError::Other(format!("Failed to spawn session thread: {}", e)))?;
        Ok(())
    }

    fn close(&mut self) -> BackendResult<()> {
        if !self.closed {
            self.closed = true;
            let mut state = lock(&self.state);
            state.open_devices -= 1;
            state.live_devices.retain(|device| device.serial != self.serial);
            debug!(camera = %self.id, "Virtual device closed");
        }
        Ok(())
    }
}

/// A configured session; records every accepted request
pub struct VirtualSession {
    camera_id: String,
    state: SharedState,
    closed: bool,
}

impl HardwareSession for VirtualSession {
    fn set_repeating_request(&mut self, request: &CaptureRequest) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Closed);
        }
        let mut state = lock(&self.state);
        if state.faults.fail_submit {
            warn!(camera = %self.camera_id, "Rejecting repeating request");
            return Err(BackendError::AccessFailed("request rejected".into()));
        }
        state.requests.push(request.clone());
        Ok(())
    }

    fn close(&mut self) -> BackendResult<()> {
        if !self.closed {
            self.closed = true;
            lock(&self.state).open_sessions -= 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_devices() {
        let camera = VirtualCamera::default();
        assert!(camera.has_camera_hardware());
        assert_eq!(camera.camera_ids().unwrap(), vec!["0", "1"]);
        assert_eq!(
            camera.characteristics("1").unwrap().facing(),
            Some(LensFacing::Front)
        );
        assert_eq!(
            camera.characteristics("9").unwrap_err(),
            BackendError::DeviceNotFound("9".into())
        );
    }

    #[test]
    fn test_no_devices_means_no_hardware() {
        let camera = VirtualCamera::new(Vec::new());
        assert!(!camera.has_camera_hardware());
    }

    #[test]
    fn test_reader_tracking() {
        let camera = VirtualCamera::default();
        let reader = camera.create_frame_reader(Size::new(64, 48), 5).unwrap();
        assert_eq!(camera.readers_created(), 1);
        assert!(camera.push_frame(gradient_frame(Size::new(64, 48), 0)));

        reader.close().unwrap();
        assert_eq!(camera.readers_closed(), 1);
        assert!(camera.active_reader().is_none());
        assert!(!camera.push_frame(gradient_frame(Size::new(64, 48), 1)));
    }

    #[test]
    fn test_open_device_reports_later_disconnect() {
        use crate::backends::camera::lifecycle::Event;

        let camera = VirtualCamera::default();
        let (events, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        camera
            .open_device("0", DeviceStateCallback::new(7, events))
            .unwrap();

        let mut device = match receiver.blocking_recv() {
            Some(Event::DeviceOpened { generation, device }) => {
                assert_eq!(generation, 7);
                device
            }
            _ => panic!("expected an opened device"),
        };
        assert_eq!(camera.open_device_count(), 1);

        assert_eq!(camera.disconnect_device("0"), 1);
        assert!(matches!(
            receiver.blocking_recv(),
            Some(Event::DeviceDisconnected { generation: 7 })
        ));
        // Reported once
        assert_eq!(camera.disconnect_device("0"), 0);

        device.close().unwrap();
        assert_eq!(camera.open_device_count(), 0);
        assert_eq!(camera.report_device_error("0", 4), 0);
    }
}
