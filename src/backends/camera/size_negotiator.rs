// SPDX-License-Identifier: GPL-3.0-only

//! Output size selection
//!
//! Devices advertise their supported sizes either ascending or descending by
//! area. The negotiator detects the order from the first two entries and
//! walks the list towards the target resolution.

use super::types::Size;
use tracing::debug;

/// Picks one supported output size for a fixed target resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeNegotiator {
    target: Size,
}

impl SizeNegotiator {
    pub fn new(target: Size) -> Self {
        Self { target }
    }

    pub fn target(&self) -> Size {
        self.target
    }

    /// Select a size from `sizes` for a sensor mounted at `sensor_orientation`
    /// degrees. Returns `None` only for an empty list.
    ///
    /// Ascending lists yield the first entry strictly larger than the target
    /// in both dimensions (or the last entry); descending lists yield the
    /// smallest entry that still meets the target (or the first entry).
    pub fn select(&self, sizes: &[Size], sensor_orientation: i32) -> Option<Size> {
        let (&first, rest) = sizes.split_first()?;
        let Some(&second) = rest.first() else {
            return Some(first);
        };

        // Sensors mounted sideways deliver portrait-for-landscape buffers
        let target = if sensor_orientation % 180 == 0 {
            self.target
        } else {
            self.target.transposed()
        };

        let ascending = second.width > first.width || second.height > first.height;

        let mut selected = first;
        if ascending {
            for &size in sizes {
                selected = size;
                if size.height > target.height && size.width > target.width {
                    break;
                }
            }
        } else {
            for &size in sizes {
                if size.height < target.height || size.width < target.width {
                    break;
                }
                selected = size;
            }
        }

        debug!(
            target = %self.target,
            sensor_orientation,
            ascending,
            selected = %selected,
            "Negotiated output size"
        );
        Some(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(list: &[(u32, u32)]) -> Vec<Size> {
        list.iter().map(|&(w, h)| Size::new(w, h)).collect()
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(SizeNegotiator::new(Size::new(640, 480)).select(&[], 0), None);
    }

    #[test]
    fn test_single_entry_ignores_target() {
        let only = sizes(&[(320, 240)]);
        let negotiator = SizeNegotiator::new(Size::new(4000, 3000));
        assert_eq!(negotiator.select(&only, 90), Some(Size::new(320, 240)));
    }

    #[test]
    fn test_ascending_overshoots_to_first_larger() {
        let list = sizes(&[(320, 240), (640, 480), (1280, 720), (1920, 1080)]);
        let negotiator = SizeNegotiator::new(Size::new(640, 480));
        // 640x480 is not strictly larger, so the walk continues one step
        assert_eq!(negotiator.select(&list, 0), Some(Size::new(1280, 720)));
    }

    #[test]
    fn test_ascending_falls_back_to_last() {
        let list = sizes(&[(320, 240), (640, 480)]);
        let negotiator = SizeNegotiator::new(Size::new(1920, 1080));
        assert_eq!(negotiator.select(&list, 0), Some(Size::new(640, 480)));
    }

    #[test]
    fn test_ascending_swaps_target_for_sideways_sensor() {
        let list = sizes(&[(480, 320), (720, 600), (1280, 800)]);
        let negotiator = SizeNegotiator::new(Size::new(500, 700));
        // Upright: needs width > 500 and height > 700 -> 1280x800
        assert_eq!(negotiator.select(&list, 0), Some(Size::new(1280, 800)));
        // Sideways: needs width > 700 and height > 500 -> 720x600
        assert_eq!(negotiator.select(&list, 90), Some(Size::new(720, 600)));
        assert_eq!(negotiator.select(&list, 270), Some(Size::new(720, 600)));
    }

    #[test]
    fn test_descending_keeps_smallest_meeting_target() {
        let list = sizes(&[(1920, 1080), (1280, 720), (640, 480), (320, 240)]);
        let negotiator = SizeNegotiator::new(Size::new(640, 480));
        assert_eq!(negotiator.select(&list, 0), Some(Size::new(640, 480)));

        let negotiator = SizeNegotiator::new(Size::new(800, 600));
        assert_eq!(negotiator.select(&list, 180), Some(Size::new(1280, 720)));
    }

    #[test]
    fn test_descending_keeps_first_when_all_too_small() {
        let list = sizes(&[(640, 480), (320, 240)]);
        let negotiator = SizeNegotiator::new(Size::new(1920, 1080));
        assert_eq!(negotiator.select(&list, 0), Some(Size::new(640, 480)));
    }

    #[test]
    fn test_descending_sideways_sensor() {
        let list = sizes(&[(1920, 1080), (1280, 720), (640, 480)]);
        let negotiator = SizeNegotiator::new(Size::new(720, 1280));
        assert_eq!(negotiator.select(&list, 90), Some(Size::new(1280, 720)));
    }

    #[test]
    fn test_selection_is_repeatable() {
        let list = sizes(&[(1920, 1080), (1280, 720), (640, 480)]);
        let negotiator = SizeNegotiator::new(Size::new(1000, 700));
        assert_eq!(negotiator.select(&list, 0), negotiator.select(&list, 0));
    }
}
