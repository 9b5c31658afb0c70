// SPDX-License-Identifier: GPL-3.0-only

//! Digital zoom via sensor crop regions
//!
//! Zoom is emulated by cropping the sensor's active pixel array around its
//! center. The controller is stateless apart from the geometry it was built
//! from, so the same factor always yields the same crop.

use super::types::{CameraCharacteristics, Rect};
use crate::constants::{DEFAULT_ZOOM_FACTOR, ZOOM_1X, ZOOM_2X, ZOOM_4X};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Logical zoom steps a caller may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ZoomLevel {
    #[default]
    X1,
    X2,
    X4,
}

impl ZoomLevel {
    pub const ALL: [ZoomLevel; 3] = [ZoomLevel::X1, ZoomLevel::X2, ZoomLevel::X4];

    /// Exact match against the allowed factors; anything else is rejected
    pub fn from_factor(factor: f32) -> Option<Self> {
        if factor == ZOOM_1X {
            Some(ZoomLevel::X1)
        } else if factor == ZOOM_2X {
            Some(ZoomLevel::X2)
        } else if factor == ZOOM_4X {
            Some(ZoomLevel::X4)
        } else {
            None
        }
    }

    pub fn factor(&self) -> f32 {
        match self {
            ZoomLevel::X1 => ZOOM_1X,
            ZoomLevel::X2 => ZOOM_2X,
            ZoomLevel::X4 => ZOOM_4X,
        }
    }
}

impl std::fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.factor())
    }
}

/// Sensor bounds and zoom capability, read once when a device is opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorGeometry {
    active_array: Rect,
    max_zoom: f32,
    zoom_supported: bool,
}

impl SensorGeometry {
    pub fn new(active_array: Rect, max_zoom: f32) -> Self {
        let max_zoom = if max_zoom.is_nan() || max_zoom < DEFAULT_ZOOM_FACTOR {
            DEFAULT_ZOOM_FACTOR
        } else {
            max_zoom
        };
        Self {
            active_array,
            max_zoom,
            zoom_supported: max_zoom > DEFAULT_ZOOM_FACTOR && !active_array.is_empty(),
        }
    }

    /// Geometry without a known active array: zoom unsupported
    pub fn unsupported() -> Self {
        Self {
            active_array: Rect::default(),
            max_zoom: DEFAULT_ZOOM_FACTOR,
            zoom_supported: false,
        }
    }

    pub fn from_characteristics(chars: &CameraCharacteristics) -> Self {
        match chars.active_array_size {
            Some(active_array) => Self::new(
                active_array,
                chars.max_digital_zoom.unwrap_or(DEFAULT_ZOOM_FACTOR),
            ),
            None => Self::unsupported(),
        }
    }

    pub fn active_array(&self) -> Rect {
        self.active_array
    }

    pub fn max_zoom(&self) -> f32 {
        self.max_zoom
    }

    pub fn has_zoom_support(&self) -> bool {
        self.zoom_supported
    }
}

/// Converts zoom factors into crop rectangles for one sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomController {
    geometry: SensorGeometry,
}

impl ZoomController {
    pub fn new(geometry: SensorGeometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &SensorGeometry {
        &self.geometry
    }

    /// Clamp a factor into `[1.0, max_zoom]`
    pub fn clamp(&self, factor: f32) -> f32 {
        if factor.is_nan() {
            return DEFAULT_ZOOM_FACTOR;
        }
        factor.clamp(DEFAULT_ZOOM_FACTOR, self.geometry.max_zoom)
    }

    /// Crop region for `factor`, or `None` when the sensor cannot zoom
    ///
    /// Coordinates are relative to the active array, whose top-left corner
    /// is `(0, 0)` whatever its position on the sensor. The crop is centered
    /// on the array and never leaves it; a factor of 1.0 on even dimensions
    /// yields the full array.
    pub fn crop_region(&self, factor: f32) -> Option<Rect> {
        if !self.geometry.zoom_supported {
            return None;
        }

        let factor = self.clamp(factor);
        let sensor = self.geometry.active_array;
        let width = sensor.width();
        let height = sensor.height();

        let center_x = width / 2;
        let center_y = height / 2;
        let delta_x = ((0.5 * width as f32) / factor) as i32;
        let delta_y = ((0.5 * height as f32) / factor) as i32;

        let crop = Rect::new(
            center_x - delta_x,
            center_y - delta_y,
            center_x + delta_x,
            center_y + delta_y,
        );
        trace!(factor, %crop, "Computed zoom crop region");
        Some(crop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(width: i32, height: i32, max_zoom: f32) -> ZoomController {
        ZoomController::new(SensorGeometry::new(Rect::from_size(width, height), max_zoom))
    }

    #[test]
    fn test_zoom_level_from_factor() {
        assert_eq!(ZoomLevel::from_factor(1.0), Some(ZoomLevel::X1));
        assert_eq!(ZoomLevel::from_factor(2.0), Some(ZoomLevel::X2));
        assert_eq!(ZoomLevel::from_factor(4.0), Some(ZoomLevel::X4));
        assert_eq!(ZoomLevel::from_factor(3.0), None);
        assert_eq!(ZoomLevel::from_factor(f32::NAN), None);
    }

    #[test]
    fn test_unit_zoom_is_full_sensor() {
        let zoom = controller(4000, 3000, 8.0);
        assert_eq!(zoom.crop_region(1.0), Some(Rect::from_size(4000, 3000)));
    }

    #[test]
    fn test_2x_zoom_halves_each_dimension() {
        let zoom = controller(4000, 3000, 8.0);
        assert_eq!(zoom.crop_region(2.0), Some(Rect::new(1000, 750, 3000, 2250)));
    }

    #[test]
    fn test_factor_is_clamped() {
        let zoom = controller(4000, 3000, 2.0);
        assert_eq!(zoom.clamp(4.0), 2.0);
        assert_eq!(zoom.clamp(0.25), 1.0);
        assert_eq!(zoom.crop_region(4.0), zoom.crop_region(2.0));
        assert_eq!(zoom.crop_region(0.5), zoom.crop_region(1.0));
    }

    #[test]
    fn test_no_crop_without_support() {
        assert_eq!(controller(4000, 3000, 1.0).crop_region(2.0), None);
        assert_eq!(controller(4000, 3000, 0.5).crop_region(2.0), None);
        assert_eq!(ZoomController::new(SensorGeometry::unsupported()).crop_region(2.0), None);
    }

    #[test]
    fn test_geometry_from_characteristics() {
        let chars = CameraCharacteristics {
            active_array_size: Some(Rect::from_size(640, 480)),
            max_digital_zoom: None,
            ..Default::default()
        };
        let geometry = SensorGeometry::from_characteristics(&chars);
        assert_eq!(geometry.max_zoom(), 1.0);
        assert!(!geometry.has_zoom_support());

        let geometry = SensorGeometry::from_characteristics(&CameraCharacteristics {
            max_digital_zoom: Some(4.0),
            ..Default::default()
        });
        assert!(!geometry.has_zoom_support());
    }

    #[test]
    fn test_crop_is_relative_to_array_origin() {
        let zoom = ZoomController::new(SensorGeometry::new(Rect::new(8, 8, 4008, 3008), 4.0));
        let crop = zoom.crop_region(2.0).unwrap();
        assert_eq!(crop, Rect::new(1000, 750, 3000, 2250));
        assert_eq!(zoom.crop_region(1.0), Some(Rect::from_size(4000, 3000)));
    }
}
