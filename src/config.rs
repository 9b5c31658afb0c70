// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{LensFacing, Size, ZoomLevel};
use crate::constants::{DEFAULT_TARGET_HEIGHT, DEFAULT_TARGET_WIDTH, DEFAULT_ZOOM_FACTOR};
use crate::errors::{AppError, AppResult};
use crate::frame_processor::BarcodeFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Construction-time scanner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Requested frame width, in natural display orientation
    pub target_width: u32,
    /// Requested frame height, in natural display orientation
    pub target_height: u32,
    /// Initial zoom factor (1.0, 2.0 or 4.0)
    pub zoom_factor: f32,
    /// Lens to open on start
    pub lens_facing: LensFacing,
    /// Stop the camera if no heartbeat arrives for this long (0 disables)
    pub heartbeat_timeout_ms: u64,
    /// Barcode formats to decode, e.g. "QR_CODE" or "ALL_FORMATS"
    pub formats: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            target_height: DEFAULT_TARGET_HEIGHT,
            zoom_factor: DEFAULT_ZOOM_FACTOR,
            lens_facing: LensFacing::Back,
            heartbeat_timeout_ms: 0,
            formats: vec!["ALL_FORMATS".to_string()],
        }
    }
}

impl ScannerConfig {
    pub fn target(&self) -> Size {
        Size::new(self.target_width, self.target_height)
    }

    pub fn heartbeat_timeout(&self) -> Option<Duration> {
        (self.heartbeat_timeout_ms > 0).then(|| Duration::from_millis(self.heartbeat_timeout_ms))
    }

    /// Initial zoom level; factors outside the allowed steps fall back to 1x
    pub fn initial_zoom(&self) -> ZoomLevel {
        ZoomLevel::from_factor(self.zoom_factor).unwrap_or_default()
    }

    pub fn barcode_formats(&self) -> Vec<BarcodeFormat> {
        BarcodeFormat::parse_list(&self.formats)
    }

    /// Reject settings the scanner cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(AppError::Config(format!(
                "target size must be non-zero, got {}",
                self.target()
            )));
        }
        if ZoomLevel::from_factor(self.zoom_factor).is_none() {
            return Err(AppError::Config(format!(
                "zoom factor must be 1.0, 2.0 or 4.0, got {}",
                self.zoom_factor
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> AppResult<Self> {
        debug!(path = %path.display(), "Loading scanner config");
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        info!(path = %path.display(), "Loaded scanner config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_zero_disables() {
        let mut config = ScannerConfig::default();
        assert_eq!(config.heartbeat_timeout(), None);
        config.heartbeat_timeout_ms = 250;
        assert_eq!(config.heartbeat_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ScannerConfig {
            zoom_factor: 3.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let config = ScannerConfig {
            target_width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
