// SPDX-License-Identifier: GPL-3.0-only

//! Property tests for the geometric helpers

use proptest::prelude::*;
use qr_camera::backends::camera::orientation::resolve_frame_rotation;
use qr_camera::backends::camera::{
    Rect, Rotation, SensorGeometry, Size, SizeNegotiator, ZoomController,
};

fn active_array() -> impl Strategy<Value = Rect> {
    (0i32..500, 0i32..500, 1i32..8000, 1i32..6000)
        .prop_map(|(left, top, width, height)| Rect::new(left, top, left + width, top + height))
}

fn size() -> impl Strategy<Value = Size> {
    (1u32..5000, 1u32..5000).prop_map(|(w, h)| Size::new(w, h))
}

fn sensor_orientation() -> impl Strategy<Value = i32> {
    prop_oneof![Just(0), Just(90), Just(180), Just(270)]
}

proptest! {
    #[test]
    fn crop_stays_inside_active_array_bounds(
        array in active_array(),
        max_zoom in 1.01f32..10.0,
        factor in -10.0f32..50.0,
    ) {
        let zoom = ZoomController::new(SensorGeometry::new(array, max_zoom));
        let crop = zoom.crop_region(factor).unwrap();
        let bounds = Rect::from_size(array.width(), array.height());
        prop_assert!(bounds.contains(&crop), "{} not inside {}", crop, bounds);
        prop_assert!(!crop.is_empty() || array.width() < 2 || array.height() < 2);
    }

    #[test]
    fn crop_is_centered(
        array in active_array(),
        max_zoom in 1.01f32..10.0,
        factor in 1.0f32..10.0,
    ) {
        let zoom = ZoomController::new(SensorGeometry::new(array, max_zoom));
        let crop = zoom.crop_region(factor).unwrap();
        let center_x = array.width() / 2;
        let center_y = array.height() / 2;
        prop_assert_eq!(crop.left + crop.right, 2 * center_x);
        prop_assert_eq!(crop.top + crop.bottom, 2 * center_y);
    }

    #[test]
    fn zoom_factor_is_clamped(max_zoom in 1.0f32..10.0, factor in -100.0f32..100.0) {
        let zoom = ZoomController::new(SensorGeometry::new(Rect::from_size(4000, 3000), max_zoom));
        let clamped = zoom.clamp(factor);
        prop_assert!((1.0..=max_zoom).contains(&clamped));
    }

    #[test]
    fn no_crop_without_zoom_support(array in active_array(), max_zoom in -5.0f32..=1.0, factor in 0.0f32..10.0) {
        let zoom = ZoomController::new(SensorGeometry::new(array, max_zoom));
        prop_assert_eq!(zoom.crop_region(factor), None);
    }

    #[test]
    fn negotiated_size_comes_from_list(
        target in size(),
        sizes in prop::collection::vec(size(), 1..12),
        orientation in sensor_orientation(),
    ) {
        let selected = SizeNegotiator::new(target).select(&sizes, orientation).unwrap();
        prop_assert!(sizes.contains(&selected));
    }

    #[test]
    fn negotiation_is_idempotent(
        target in size(),
        sizes in prop::collection::vec(size(), 1..12),
        orientation in sensor_orientation(),
    ) {
        let negotiator = SizeNegotiator::new(target);
        let first = negotiator.select(&sizes, orientation);
        prop_assert_eq!(first, negotiator.select(&sizes, orientation));
        let selected = first.unwrap();
        prop_assert_eq!(negotiator.select(&[selected], orientation), Some(selected));
    }

    #[test]
    fn single_size_is_always_chosen(target in size(), only in size(), orientation in any::<i32>()) {
        prop_assert_eq!(SizeNegotiator::new(target).select(&[only], orientation), Some(only));
    }

    #[test]
    fn rotation_is_a_quarter_turn(orientation in sensor_orientation()) {
        for display in Rotation::ALL {
            let frame = resolve_frame_rotation(display, orientation);
            let expected = (orientation - display.degrees()).rem_euclid(360);
            prop_assert_eq!(frame.degrees(), expected);
        }
    }
}

#[test]
fn empty_size_list_yields_nothing() {
    assert_eq!(SizeNegotiator::new(Size::new(640, 480)).select(&[], 90), None);
}
