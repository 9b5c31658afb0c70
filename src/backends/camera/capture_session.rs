// SPDX-License-Identifier: GPL-3.0-only

//! Capture parameter state and the repeating request
//!
//! `CaptureSession` holds the one mutable copy of the capture parameters.
//! Every change goes through [`CaptureSession::commit`]: a candidate state is
//! turned into a complete request by [`build_request`], submitted, and only
//! adopted once the hardware has accepted it. A rejected submission leaves the
//! previous state in place.

use super::orientation::OrientationResolver;
use super::size_negotiator::SizeNegotiator;
use super::types::*;
use super::zoom::{SensorGeometry, ZoomController, ZoomLevel};
use super::{FrameReader, HardwareDevice, HardwareSession, SessionStateCallback};
use crate::errors::{ScannerError, ScannerResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output streams every session is configured with, in submission order
pub const SESSION_OUTPUTS: [OutputTarget; 2] = [OutputTarget::FrameReader, OutputTarget::Preview];

/// The user-controllable capture parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureState {
    pub zoom: ZoomLevel,
    pub torch_on: bool,
    pub lens_facing: LensFacing,
    pub af_mode: Option<AfMode>,
}

impl CaptureState {
    pub fn new(zoom: ZoomLevel, lens_facing: LensFacing) -> Self {
        Self {
            zoom,
            lens_facing,
            ..Default::default()
        }
    }
}

/// Build the complete repeating request for `state`
pub fn build_request(
    state: &CaptureState,
    zoom: &ZoomController,
    targets: &[OutputTarget],
) -> CaptureRequest {
    let af_trigger = state.af_mode.map(|mode| match mode {
        AfMode::Auto => AfTrigger::Start,
        AfMode::ContinuousVideo | AfMode::ContinuousPicture => AfTrigger::Cancel,
    });

    CaptureRequest {
        template: RequestTemplate::Preview,
        targets: targets.to_vec(),
        control_mode: ControlMode::Auto,
        crop_region: zoom.crop_region(state.zoom.factor()),
        flash_mode: if state.torch_on {
            FlashMode::Torch
        } else {
            FlashMode::Off
        },
        af_mode: state.af_mode,
        af_trigger,
    }
}

/// Output sizes for a device, negotiated against one target resolution
pub fn negotiate_sizes(
    chars: &CameraCharacteristics,
    target: Size,
) -> ScannerResult<(Size, Size)> {
    let negotiator = SizeNegotiator::new(target);
    let orientation = chars.sensor_orientation();

    let preview = negotiator
        .select(&chars.preview_sizes, orientation)
        .ok_or_else(|| ScannerError::SessionConfigFailure("no preview sizes".into()))?;
    let frame = negotiator
        .select(&chars.frame_sizes, orientation)
        .ok_or_else(|| ScannerError::SessionConfigFailure("no frame sizes".into()))?;
    Ok((preview, frame))
}

/// Open device, its frame reader, and (once configured) its capture session
pub struct SessionHandle {
    camera_id: String,
    device: Box<dyn HardwareDevice>,
    session: Option<Box<dyn HardwareSession>>,
    frame_reader: Arc<dyn FrameReader>,
    zoom: ZoomController,
    flash_supported: bool,
    af_modes: Vec<AfMode>,
    orientation: OrientationResolver,
    preview_size: Size,
    frame_size: Size,
}

impl SessionHandle {
    pub fn new(
        device: Box<dyn HardwareDevice>,
        frame_reader: Arc<dyn FrameReader>,
        chars: &CameraCharacteristics,
        preview_size: Size,
    ) -> Self {
        Self {
            camera_id: device.id().to_string(),
            device,
            session: None,
            frame_size: frame_reader.size(),
            frame_reader,
            zoom: ZoomController::new(SensorGeometry::from_characteristics(chars)),
            flash_supported: chars.has_flash(),
            af_modes: chars.af_modes(),
            orientation: OrientationResolver::new(chars.sensor_orientation()),
            preview_size,
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn frame_reader(&self) -> Arc<dyn FrameReader> {
        Arc::clone(&self.frame_reader)
    }

    pub fn zoom(&self) -> &ZoomController {
        &self.zoom
    }

    pub fn flash_supported(&self) -> bool {
        self.flash_supported
    }

    pub fn orientation(&self) -> OrientationResolver {
        self.orientation
    }

    pub fn preview_size(&self) -> Size {
        self.preview_size
    }

    pub fn frame_size(&self) -> Size {
        self.frame_size
    }

    /// Release everything. Each close is attempted even if another failed.
    fn close(mut self) {
        if let Some(mut session) = self.session.take()
            && let Err(e) = session.close()
        {
            warn!(camera = %self.camera_id, error = %e, "Failed to close capture session");
        }
        if let Err(e) = self.device.close() {
            warn!(camera = %self.camera_id, error = %e, "Failed to close camera device");
        }
        if let Err(e) = self.frame_reader.close() {
            warn!(camera = %self.camera_id, error = %e, "Failed to close frame reader");
        }
        debug!(camera = %self.camera_id, "Session handle released");
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("camera_id", &self.camera_id)
            .field("configured", &self.session.is_some())
            .field("preview_size", &self.preview_size)
            .field("frame_size", &self.frame_size)
            .finish()
    }
}

/// Single owner of the capture state and the open hardware handles
#[derive(Debug)]
pub struct CaptureSession {
    state: CaptureState,
    handle: Option<SessionHandle>,
    last_request: Option<CaptureRequest>,
    submissions: u64,
}

impl CaptureSession {
    pub fn new(initial: CaptureState) -> Self {
        Self {
            state: initial,
            handle: None,
            last_request: None,
            submissions: 0,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn handle(&self) -> Option<&SessionHandle> {
        self.handle.as_ref()
    }

    /// True once a capture session is configured and streaming
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| handle.session.is_some())
    }

    /// Last request the hardware accepted
    pub fn last_request(&self) -> Option<&CaptureRequest> {
        self.last_request.as_ref()
    }

    /// Number of accepted submissions over the session's lifetime
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    /// Take ownership of a freshly opened device
    pub fn attach(&mut self, handle: SessionHandle) {
        self.close();
        info!(camera = %handle.camera_id, "Attached camera device");
        self.handle = Some(handle);
    }

    /// Ask the attached device to configure the session outputs
    pub fn configure(&mut self, callback: SessionStateCallback) -> ScannerResult<()> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| ScannerError::SessionConfigFailure("no device attached".into()))?;
        handle
            .device
            .create_capture_session(&SESSION_OUTPUTS, callback)
            .map_err(ScannerError::session_config)
    }

    /// Adopt a configured session and submit the first repeating request,
    /// including any zoom level remembered while inactive.
    pub fn start_repeating(&mut self, session: Box<dyn HardwareSession>) -> ScannerResult<()> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| ScannerError::SessionConfigFailure("no device attached".into()))?;
        handle.session = Some(session);
        self.commit(self.state)
    }

    /// Pick the best advertised autofocus mode and apply it
    pub fn init_autofocus(&mut self) -> ScannerResult<()> {
        let Some(handle) = self.handle.as_ref() else {
            return Ok(());
        };
        let Some(mode) = AfMode::select(&handle.af_modes) else {
            debug!("No supported autofocus mode, leaving autofocus unset");
            return Ok(());
        };
        info!(af_mode = ?mode, hardware = mode.to_hardware(), "Setting autofocus mode");
        self.commit(CaptureState {
            af_mode: Some(mode),
            ..self.state
        })
    }

    /// Apply one of the allowed zoom factors. Other factors are ignored.
    pub fn apply_zoom(&mut self, factor: f32) -> ScannerResult<()> {
        let Some(level) = ZoomLevel::from_factor(factor) else {
            warn!(factor, "Ignoring unsupported zoom factor");
            return Ok(());
        };
        if !self.is_active() {
            debug!(%level, "Session inactive, remembering zoom level");
        }
        self.commit(CaptureState {
            zoom: level,
            ..self.state
        })
    }

    /// Flip the torch, if the device has a flash unit
    pub fn toggle_torch(&mut self) -> ScannerResult<()> {
        let flash_supported = self
            .handle
            .as_ref()
            .is_some_and(|handle| handle.flash_supported);
        if !self.is_active() || !flash_supported {
            debug!(active = self.is_active(), flash_supported, "Torch toggle ignored");
            return Ok(());
        }
        self.commit(CaptureState {
            torch_on: !self.state.torch_on,
            ..self.state
        })
    }

    /// Record a new lens facing. Returns true if it differs from the current
    /// one; reopening the device is up to the caller.
    pub fn set_lens_facing(&mut self, facing: LensFacing) -> bool {
        if self.state.lens_facing == facing {
            return false;
        }
        self.state.lens_facing = facing;
        true
    }

    /// Build a request from `candidate`, submit it, and adopt `candidate` on
    /// success. With no streaming session the candidate is adopted directly.
    pub fn commit(&mut self, candidate: CaptureState) -> ScannerResult<()> {
        let Some(handle) = self.handle.as_mut() else {
            self.state = candidate;
            return Ok(());
        };
        let Some(session) = handle.session.as_mut() else {
            self.state = candidate;
            return Ok(());
        };

        let request = build_request(&candidate, &handle.zoom, &SESSION_OUTPUTS);
        match session.set_repeating_request(&request) {
            Ok(()) => {
                debug!(
                    camera = %handle.camera_id,
                    zoom = %candidate.zoom,
                    torch = candidate.torch_on,
                    af_mode = ?candidate.af_mode,
                    "Repeating request submitted"
                );
                self.state = candidate;
                self.last_request = Some(request);
                self.submissions += 1;
                Ok(())
            }
            Err(e) => {
                warn!(camera = %handle.camera_id, error = %e, "Repeating request rejected");
                Err(ScannerError::submission(e))
            }
        }
    }

    /// Close device, session, and frame reader. Torch and autofocus reset
    /// with the device; zoom and lens facing are kept for the next open.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
            self.state.torch_on = false;
            self.state.af_mode = None;
            self.last_request = None;
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::BackendResult;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<CaptureRequest>>,
        reject: AtomicBool,
        closes: AtomicUsize,
    }

    struct FakeSession(Arc<Recorder>);

    impl HardwareSession for FakeSession {
        fn set_repeating_request(&mut self, request: &CaptureRequest) -> BackendResult<()> {
            if self.0.reject.load(Ordering::SeqCst) {
                return Err(BackendError::AccessFailed("rejected".into()));
            }
            self.0.requests.lock().unwrap().push(request.clone());
            Ok(())
        }

        fn close(&mut self) -> BackendResult<()> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeDevice(Arc<Recorder>);

    impl HardwareDevice for FakeDevice {
        fn id(&self) -> &str {
            "fake"
        }

        fn create_capture_session(
            &mut self,
            _outputs: &[OutputTarget],
            _callback: SessionStateCallback,
        ) -> BackendResult<()> {
            Ok(())
        }

        fn close(&mut self) -> BackendResult<()> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Other("device close failure".into()))
        }
    }

    struct FakeReader(Arc<Recorder>);

    impl FrameReader for FakeReader {
        fn size(&self) -> Size {
            Size::new(1280, 720)
        }

        fn wait_for_frame(&self, _timeout: Duration) -> bool {
            false
        }

        fn acquire_latest_frame(&self) -> BackendResult<Option<CameraFrame>> {
            Ok(None)
        }

        fn close(&self) -> BackendResult<()> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn chars(flash: bool, af: Vec<i32>) -> CameraCharacteristics {
        CameraCharacteristics {
            lens_facing: Some(LENS_FACING_BACK),
            sensor_orientation: Some(90),
            flash_available: Some(flash),
            active_array_size: Some(Rect::from_size(4000, 3000)),
            max_digital_zoom: Some(8.0),
            af_available_modes: Some(af),
            preview_sizes: vec![Size::new(1280, 720)],
            frame_sizes: vec![Size::new(1280, 720)],
        }
    }

    fn streaming(flash: bool, af: Vec<i32>) -> (CaptureSession, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut capture = CaptureSession::new(CaptureState::default());
        capture.attach(SessionHandle::new(
            Box::new(FakeDevice(Arc::clone(&recorder))),
            Arc::new(FakeReader(Arc::clone(&recorder))),
            &chars(flash, af),
            Size::new(1280, 720),
        ));
        capture
            .start_repeating(Box::new(FakeSession(Arc::clone(&recorder))))
            .unwrap();
        (capture, recorder)
    }

    #[test]
    fn test_build_request_is_complete() {
        let zoom = ZoomController::new(SensorGeometry::new(Rect::from_size(4000, 3000), 8.0));
        let state = CaptureState {
            zoom: ZoomLevel::X2,
            torch_on: true,
            lens_facing: LensFacing::Back,
            af_mode: Some(AfMode::Auto),
        };
        let request = build_request(&state, &zoom, &SESSION_OUTPUTS);
        assert_eq!(request.targets, SESSION_OUTPUTS.to_vec());
        assert_eq!(request.crop_region, Some(Rect::new(1000, 750, 3000, 2250)));
        assert_eq!(request.flash_mode, FlashMode::Torch);
        assert_eq!(request.af_trigger, Some(AfTrigger::Start));

        let request = build_request(
            &CaptureState {
                af_mode: Some(AfMode::ContinuousVideo),
                ..state
            },
            &zoom,
            &SESSION_OUTPUTS,
        );
        assert_eq!(request.af_trigger, Some(AfTrigger::Cancel));
    }

    #[test]
    fn test_zoom_remembered_while_inactive() {
        let mut capture = CaptureSession::new(CaptureState::default());
        capture.apply_zoom(4.0).unwrap();
        assert_eq!(capture.state().zoom, ZoomLevel::X4);
        assert_eq!(capture.submissions(), 0);
    }

    #[test]
    fn test_remembered_zoom_applied_at_start() {
        let recorder = Arc::new(Recorder::default());
        let mut capture = CaptureSession::new(CaptureState::new(ZoomLevel::X2, LensFacing::Back));
        capture.attach(SessionHandle::new(
            Box::new(FakeDevice(Arc::clone(&recorder))),
            Arc::new(FakeReader(Arc::clone(&recorder))),
            &chars(false, vec![]),
            Size::new(1280, 720),
        ));
        capture
            .start_repeating(Box::new(FakeSession(Arc::clone(&recorder))))
            .unwrap();
        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].crop_region, Some(Rect::new(1000, 750, 3000, 2250)));
    }

    #[test]
    fn test_invalid_zoom_is_ignored() {
        let (mut capture, recorder) = streaming(false, vec![]);
        capture.apply_zoom(3.0).unwrap();
        assert_eq!(capture.state().zoom, ZoomLevel::X1);
        assert_eq!(recorder.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_torch_without_flash_never_rebuilds() {
        let (mut capture, recorder) = streaming(false, vec![]);
        capture.toggle_torch().unwrap();
        capture.toggle_torch().unwrap();
        assert!(!capture.state().torch_on);
        assert_eq!(recorder.requests.lock().unwrap().len(), 1);
        assert_eq!(capture.submissions(), 1);
    }

    #[test]
    fn test_torch_with_flash_toggles() {
        let (mut capture, recorder) = streaming(true, vec![]);
        capture.toggle_torch().unwrap();
        assert!(capture.state().torch_on);
        assert_eq!(
            recorder.requests.lock().unwrap().last().unwrap().flash_mode,
            FlashMode::Torch
        );
        capture.toggle_torch().unwrap();
        assert!(!capture.state().torch_on);
    }

    #[test]
    fn test_rejected_submission_keeps_last_good_state() {
        let (mut capture, recorder) = streaming(true, vec![]);
        capture.apply_zoom(2.0).unwrap();
        let good = capture.last_request().cloned();

        recorder.reject.store(true, Ordering::SeqCst);
        let err = capture.apply_zoom(4.0).unwrap_err();
        assert!(matches!(err, ScannerError::CaptureSubmissionFailure(_)));
        assert!(capture.toggle_torch().is_err());

        assert_eq!(capture.state().zoom, ZoomLevel::X2);
        assert!(!capture.state().torch_on);
        assert_eq!(capture.last_request().cloned(), good);
    }

    #[test]
    fn test_autofocus_priority() {
        let (mut capture, _) = streaming(false, vec![AF_MODE_AUTO, AF_MODE_CONTINUOUS_PICTURE]);
        capture.init_autofocus().unwrap();
        assert_eq!(capture.state().af_mode, Some(AfMode::ContinuousPicture));

        let (mut capture, recorder) = streaming(false, vec![AF_MODE_AUTO]);
        capture.init_autofocus().unwrap();
        let last = recorder.requests.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.af_mode, Some(AfMode::Auto));
        assert_eq!(last.af_trigger, Some(AfTrigger::Start));

        let (mut capture, recorder) = streaming(false, vec![]);
        capture.init_autofocus().unwrap();
        assert_eq!(capture.state().af_mode, None);
        assert_eq!(recorder.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_close_is_idempotent_and_attempts_every_close() {
        let (mut capture, recorder) = streaming(true, vec![]);
        capture.toggle_torch().unwrap();
        capture.close();
        // session + device (fails) + reader
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 3);
        assert!(!capture.state().torch_on);
        assert!(!capture.is_active());

        capture.close();
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_lens_facing_change_detection() {
        let mut capture = CaptureSession::new(CaptureState::default());
        assert!(!capture.set_lens_facing(LensFacing::Back));
        assert!(capture.set_lens_facing(LensFacing::Front));
        assert_eq!(capture.state().lens_facing, LensFacing::Front);
    }

    #[test]
    fn test_negotiate_sizes_requires_entries() {
        let mut c = chars(false, vec![]);
        assert_eq!(
            negotiate_sizes(&c, Size::new(640, 480)).unwrap(),
            (Size::new(1280, 720), Size::new(1280, 720))
        );
        c.frame_sizes.clear();
        assert!(matches!(
            negotiate_sizes(&c, Size::new(640, 480)),
            Err(ScannerError::SessionConfigFailure(_))
        ));
    }
}
