// SPDX-License-Identifier: GPL-3.0-only

//! Frame orientation correction
//!
//! Combines the display rotation reported by the platform with the sensor's
//! fixed mounting orientation into the rotation the decoder should apply to
//! each frame.

use super::types::Rotation;
use tracing::error;

/// Compensation for each display rotation, before the sensor angle is added
fn display_compensation(device_rotation: Rotation) -> i32 {
    match device_rotation {
        Rotation::None => 90,
        Rotation::Rotate90 => 0,
        Rotation::Rotate180 => 270,
        Rotation::Rotate270 => 180,
    }
}

/// Frame rotation for a display rotation and sensor mounting angle
///
/// Values that do not land on a 90 degree bucket are logged and treated as
/// no rotation.
pub fn resolve_frame_rotation(device_rotation: Rotation, sensor_orientation: i32) -> Rotation {
    let compensation =
        (display_compensation(device_rotation) + sensor_orientation + 270).rem_euclid(360);

    match compensation {
        0 => Rotation::None,
        90 => Rotation::Rotate90,
        180 => Rotation::Rotate180,
        270 => Rotation::Rotate270,
        other => {
            error!(
                compensation = other,
                sensor_orientation,
                %device_rotation,
                "Bad rotation value"
            );
            Rotation::None
        }
    }
}

/// Orientation reported to consumers for display
///
/// Reverse-landscape sensors (270) are reported as 90 because the platform
/// already rotates their output.
pub fn display_orientation(sensor_orientation: i32) -> i32 {
    if sensor_orientation == 270 {
        90
    } else {
        sensor_orientation
    }
}

/// Orientation resolver bound to one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrientationResolver {
    sensor_orientation: i32,
}

impl OrientationResolver {
    pub fn new(sensor_orientation: i32) -> Self {
        Self { sensor_orientation }
    }

    pub fn sensor_orientation(&self) -> i32 {
        self.sensor_orientation
    }

    pub fn resolve(&self, device_rotation: Rotation) -> Rotation {
        resolve_frame_rotation(device_rotation, self.sensor_orientation)
    }

    pub fn display_orientation(&self) -> i32 {
        display_orientation(self.sensor_orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rotation_combinations() {
        // (display rotation, sensor orientation, expected frame rotation)
        let table = [
            (Rotation::None, 0, 0),
            (Rotation::None, 90, 90),
            (Rotation::None, 180, 180),
            (Rotation::None, 270, 270),
            (Rotation::Rotate90, 0, 270),
            (Rotation::Rotate90, 90, 0),
            (Rotation::Rotate90, 180, 90),
            (Rotation::Rotate90, 270, 180),
            (Rotation::Rotate180, 0, 180),
            (Rotation::Rotate180, 90, 270),
            (Rotation::Rotate180, 180, 0),
            (Rotation::Rotate180, 270, 90),
            (Rotation::Rotate270, 0, 90),
            (Rotation::Rotate270, 90, 180),
            (Rotation::Rotate270, 180, 270),
            (Rotation::Rotate270, 270, 0),
        ];

        for (device, sensor, expected) in table {
            let resolved = resolve_frame_rotation(device, sensor);
            assert_eq!(
                resolved.degrees(),
                expected,
                "display {} sensor {}",
                device,
                sensor
            );
        }
    }

    #[test]
    fn test_unrecognised_sensor_angle_defaults_to_none() {
        assert_eq!(resolve_frame_rotation(Rotation::None, 45), Rotation::None);
        assert_eq!(resolve_frame_rotation(Rotation::Rotate90, 10), Rotation::None);
    }

    #[test]
    fn test_display_orientation_fold() {
        assert_eq!(display_orientation(270), 90);
        for sensor in [0, 90, 180] {
            assert_eq!(display_orientation(sensor), sensor);
        }
        assert_eq!(OrientationResolver::new(270).display_orientation(), 90);
    }
}
