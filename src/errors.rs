// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using ScannerError
pub type ScannerResult<T> = Result<T, ScannerError>;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Failures surfaced by the camera lifecycle
///
/// Startup failures reach the caller through the started-callback; runtime
/// failures during an active session are logged and absorbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerError {
    /// The platform reports no camera hardware
    NoHardware,
    /// Camera permission not granted
    NoPermission,
    /// No device with the requested lens facing
    NoMatchingLens,
    /// Enumeration, open, or disconnection failures
    DeviceAccessFailure(String),
    /// Streams could not be configured
    SessionConfigFailure(String),
    /// The hardware rejected a repeating request
    CaptureSubmissionFailure(String),
    /// `start()` while a session is already starting or running
    AlreadyRunning,
    /// A pending start was superseded by `stop()`
    Cancelled,
}

impl ScannerError {
    /// Short machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            ScannerError::NoHardware => "noHardware",
            ScannerError::NoPermission => "noPermissions",
            ScannerError::NoMatchingLens => "noBackCamera",
            ScannerError::DeviceAccessFailure(_) => "deviceAccess",
            ScannerError::SessionConfigFailure(_) => "sessionConfig",
            ScannerError::CaptureSubmissionFailure(_) => "captureSubmission",
            ScannerError::AlreadyRunning => "alreadyRunning",
            ScannerError::Cancelled => "cancelled",
        }
    }

    /// Whether this error prevents a session from starting at all
    pub fn is_startup_blocking(&self) -> bool {
        matches!(
            self,
            ScannerError::NoHardware | ScannerError::NoPermission | ScannerError::NoMatchingLens
        )
    }

    pub(crate) fn device_access(err: BackendError) -> Self {
        ScannerError::DeviceAccessFailure(err.to_string())
    }

    pub(crate) fn session_config(err: BackendError) -> Self {
        ScannerError::SessionConfigFailure(err.to_string())
    }

    pub(crate) fn submission(err: BackendError) -> Self {
        ScannerError::CaptureSubmissionFailure(err.to_string())
    }
}

impl fmt::Display for ScannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerError::NoHardware => write!(f, "No camera hardware available"),
            ScannerError::NoPermission => write!(f, "Camera permission not granted"),
            ScannerError::NoMatchingLens => write!(f, "No camera with the requested lens facing"),
            ScannerError::DeviceAccessFailure(msg) => write!(f, "Device access failed: {}", msg),
            ScannerError::SessionConfigFailure(msg) => {
                write!(f, "Session configuration failed: {}", msg)
            }
            ScannerError::CaptureSubmissionFailure(msg) => {
                write!(f, "Capture request rejected: {}", msg)
            }
            ScannerError::AlreadyRunning => write!(f, "Scanner is already running"),
            ScannerError::Cancelled => write!(f, "Start was cancelled by stop"),
        }
    }
}

impl std::error::Error for ScannerError {}

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera lifecycle errors
    Scanner(ScannerError),
    /// Hardware backend errors outside a session
    Backend(BackendError),
    /// Configuration errors
    Config(String),
    /// I/O errors
    Io(String),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Scanner(e) => write!(f, "Scanner error: {}", e),
            AppError::Backend(e) => write!(f, "Backend error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ScannerError> for AppError {
    fn from(err: ScannerError) -> Self {
        AppError::Scanner(err)
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(ScannerError::NoHardware.reason(), "noHardware");
        assert_eq!(ScannerError::NoPermission.reason(), "noPermissions");
        assert_eq!(ScannerError::NoMatchingLens.reason(), "noBackCamera");
    }

    #[test]
    fn test_startup_blocking_classification() {
        assert!(ScannerError::NoHardware.is_startup_blocking());
        assert!(ScannerError::NoMatchingLens.is_startup_blocking());
        assert!(!ScannerError::CaptureSubmissionFailure("x".into()).is_startup_blocking());
    }

    #[test]
    fn test_backend_error_conversion() {
        let err = ScannerError::device_access(BackendError::Disconnected);
        assert_eq!(
            err,
            ScannerError::DeviceAccessFailure("Camera disconnected".into())
        );
        let app: AppError = err.into();
        assert!(app.to_string().starts_with("Scanner error"));
    }
}
