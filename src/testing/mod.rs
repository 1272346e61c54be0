//! Testing utilities for CrabCaliper
//!
//! Synthetic frames with objects of known pixel size, for exercising the
//! measurement pipeline without a camera.

pub mod synthetic_data;

pub use synthetic_data::{
    blank_frame, multi_rectangle_frame, paint_rectangle, rectangle_frame,
    rotated_rectangle_frame, speckle_frame,
};
