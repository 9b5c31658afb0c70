// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use qr_camera::backends::camera::ZoomLevel;
use qr_camera::constants::*;

#[test]
fn test_zoom_steps_match_levels() {
    let factors: Vec<f32> = ZoomLevel::ALL.iter().map(|level| level.factor()).collect();
    assert_eq!(factors, vec![ZOOM_1X, ZOOM_2X, ZOOM_4X]);
    assert_eq!(DEFAULT_ZOOM_FACTOR, ZOOM_1X);
}

#[test]
fn test_frame_reader_depth() {
    assert_eq!(FRAME_READER_MAX_IMAGES, 5);
}

#[test]
fn test_frame_wait_is_short() {
    // The frame loop only notices its stop signal between waits
    assert!(FRAME_WAIT_TIMEOUT.as_millis() <= 100);
    assert!(VIRTUAL_FRAME_INTERVAL > FRAME_WAIT_TIMEOUT / 10);
}

#[test]
fn test_thread_names_are_distinct() {
    assert_ne!(LIFECYCLE_THREAD_NAME, FRAME_LOOP_NAME);
    assert_ne!(LIFECYCLE_THREAD_NAME, WATCHDOG_THREAD_NAME);
    assert_ne!(FRAME_LOOP_NAME, WATCHDOG_THREAD_NAME);
    assert_ne!(LISTENER_THREAD_NAME, LIFECYCLE_THREAD_NAME);
}
