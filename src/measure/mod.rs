//! Frame measurement pipeline
//!
//! Detects objects in a frame and measures them:
//! 1. Resize to the working width and build a closed edge map
//! 2. Extract external contours, sorted left to right
//! 3. Fit a minimum-area rotated box to each contour large enough to matter
//! 4. Measure the edge-midpoint distances and convert them with the calibration
//! 5. Draw the annotations on an overlay and blend it back

pub mod annotate;
pub mod contours;
pub mod edges;
pub mod pipeline;

pub use annotate::LabelFont;
pub use contours::DetectedContour;
pub use pipeline::FramePipeline;
