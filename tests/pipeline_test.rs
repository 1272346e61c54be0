//! End-to-end tests for the measurement pipeline on synthetic frames

use crabcaliper::testing::{
    blank_frame, multi_rectangle_frame, rectangle_frame, rotated_rectangle_frame, speckle_frame,
};
use crabcaliper::{Calibration, CalibrationState, CrabCaliperConfig, FramePipeline, MeasureError};

fn pipeline() -> FramePipeline {
    FramePipeline::from_config(&CrabCaliperConfig::default()).unwrap()
}

#[test]
fn test_calibration_round_trip_on_known_rectangle() {
    let calibration = Calibration::default();
    calibration.set_calibration_width("3.0").unwrap();

    let frame = rectangle_frame(800, 600, (150, 200, 300, 150));
    let out = pipeline().process(&frame, &calibration).unwrap();

    assert_eq!(out.measurements.len(), 1);
    let m = &out.measurements[0];
    let ppm = out.calibration.pixels_per_metric.unwrap();
    assert!((ppm - m.pixel_width / 3.0).abs() < 1e-9);
    assert!((m.width.unwrap() - 3.0).abs() < 1e-9);
    assert!((m.pixel_width - 300.0).abs() < 6.0, "dB = {}", m.pixel_width);
    assert!(!out.calibration.pending);
}

#[test]
fn test_zero_contours_is_identity() {
    let calibration = Calibration::default();
    for frame in [blank_frame(800, 600), speckle_frame(800, 600, 24)] {
        let out = pipeline().process(&frame, &calibration).unwrap();
        assert!(out.measurements.is_empty());
        assert_eq!(out.frame.data, frame.data);
        assert_eq!((out.frame.width, out.frame.height), (800, 600));
    }
}

#[test]
fn test_pending_request_survives_empty_frames() {
    let calibration = Calibration::default();
    calibration.set_calibration_width("2").unwrap();

    pipeline()
        .process(&blank_frame(800, 600), &calibration)
        .unwrap();
    let snapshot = calibration.snapshot().unwrap();
    assert!(snapshot.pending);
    assert_eq!(snapshot.pixels_per_metric, Some(40.0));
}

#[test]
fn test_scalar_resolves_exactly_once() {
    let calibration = Calibration::default();
    calibration.set_calibration_width("2").unwrap();
    let pipeline = pipeline();

    let first = pipeline
        .process(&rectangle_frame(800, 600, (100, 100, 200, 100)), &calibration)
        .unwrap();
    let resolved = first.calibration.pixels_per_metric.unwrap();

    let second = pipeline
        .process(&rectangle_frame(800, 600, (100, 100, 400, 100)), &calibration)
        .unwrap();
    assert_eq!(second.calibration.pixels_per_metric, Some(resolved));

    // twice as wide, so twice the reference width
    let width = second.measurements[0].width.unwrap();
    assert!((width - 4.0).abs() < 0.1, "width {}", width);
}

#[test]
fn test_processing_is_idempotent() {
    let frame = rectangle_frame(800, 600, (250, 150, 180, 220));
    let mut state = CalibrationState::new(Some(25.0));
    let pipeline = pipeline();

    let a = pipeline.process_with_state(&frame, &mut state).unwrap();
    let b = pipeline.process_with_state(&frame, &mut state).unwrap();
    assert_eq!(a.frame.data, b.frame.data);
    assert_eq!(a.measurements, b.measurements);
}

#[test]
fn test_leftmost_object_calibrates() {
    let calibration = Calibration::default();
    calibration.set_calibration_width("4").unwrap();

    // listed right-to-left to exercise the sort
    let frame = multi_rectangle_frame(800, 600, &[(500, 300, 100, 100), (100, 100, 200, 150)]);
    let out = pipeline().process(&frame, &calibration).unwrap();

    assert_eq!(out.measurements.len(), 2);
    let left = &out.measurements[0];
    let right = &out.measurements[1];
    assert!(left.bounding_box.top_left.x < right.bounding_box.top_left.x);
    assert!((left.width.unwrap() - 4.0).abs() < 1e-9);
    assert!((right.width.unwrap() - 2.0).abs() < 0.1, "right {:?}", right.width);
}

#[test]
fn test_large_frames_are_resized_to_working_width() {
    let frame = rectangle_frame(1600, 1200, (400, 400, 480, 240));
    let out = pipeline().process(&frame, &Calibration::default()).unwrap();

    assert_eq!((out.frame.width, out.frame.height), (800, 600));
    assert_eq!(out.measurements.len(), 1);
    let m = &out.measurements[0];
    assert!((m.pixel_width - 240.0).abs() < 6.0, "dB = {}", m.pixel_width);
    assert!((m.pixel_height - 120.0).abs() < 6.0, "dA = {}", m.pixel_height);
}

#[test]
fn test_rotated_rectangle_dimensions() {
    let frame = rotated_rectangle_frame(800, 600, (400.0, 300.0), (200.0, 100.0), 0.4);
    let out = pipeline().process(&frame, &Calibration::default()).unwrap();

    assert_eq!(out.measurements.len(), 1);
    let m = &out.measurements[0];
    let mut sides = [m.pixel_width, m.pixel_height];
    sides.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert!((sides[0] - 100.0).abs() < 6.0, "short side {}", sides[0]);
    assert!((sides[1] - 200.0).abs() < 6.0, "long side {}", sides[1]);

    let bbox = &m.bounding_box;
    assert!(bbox.top_left.x <= bbox.top_right.x);
    assert!(bbox.bottom_left.x <= bbox.bottom_right.x);
}

#[test]
fn test_invalid_calibration_leaves_state_unchanged() {
    let calibration = Calibration::default();
    let before = calibration.snapshot().unwrap();
    for input in ["", "abc", "-5"] {
        assert!(matches!(
            calibration.set_calibration_width(input),
            Err(MeasureError::InvalidCalibration(_))
        ));
    }
    assert_eq!(calibration.snapshot().unwrap(), before);
    assert!(!before.pending);
}
