//! CrabCaliper: live object measurement from camera frames
//!
//! Each frame is turned into an edge map, its external contours are fitted
//! with minimum-area rotated boxes, and the box dimensions are converted to
//! real-world units through a pixels-per-metric calibration that the user can
//! re-derive from a reference object of known width.
//!
//! # Features
//! - Canny edge detection with morphological gap closing
//! - Rotated bounding boxes with canonically ordered corners
//! - Runtime calibration from the leftmost object
//! - Annotated overlays blended onto the frame
//! - Capture thread with a latest-frame consumer
//!
//! # Usage
//! ```rust,no_run
//! use crabcaliper::{Calibration, CrabCaliperConfig, FramePipeline};
//! use crabcaliper::testing::rectangle_frame;
//!
//! # fn main() -> Result<(), crabcaliper::MeasureError> {
//! let config = CrabCaliperConfig::default();
//! let pipeline = FramePipeline::from_config(&config)?;
//! let calibration = Calibration::from_config(&config.calibration)?;
//!
//! calibration.set_calibration_width("2.5")?;
//! let annotated = pipeline.process(&rectangle_frame(800, 600, (100, 100, 200, 120)), &calibration)?;
//! for m in &annotated.measurements {
//!     println!("{:?} x {:?}", m.width, m.height);
//! }
//! # Ok(())
//! # }
//! ```
pub mod calibration;
pub mod capture;
pub mod config;
pub mod errors;
pub mod geometry;
pub mod measure;
pub mod types;

// Testing utilities - synthetic scenes for offline testing
pub mod testing;

// Re-exports for convenience
pub use calibration::{Calibration, CalibrationSnapshot, CalibrationState};
pub use capture::{FrameSequence, FrameSource, ImageFileSource, MeasurementSession};
pub use config::CrabCaliperConfig;
pub use errors::MeasureError;
pub use measure::FramePipeline;
pub use types::{AnnotatedFrame, BoundingBox, EdgeMidpoints, Frame, ObjectMeasurement, Point2};

#[cfg(feature = "camera")]
pub use capture::CameraSource;

/// Initialize logging for the measurement system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabcaliper=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        camera_support: cfg!(feature = "camera"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub camera_support: bool,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "crabcaliper");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
        assert_eq!(info.camera_support, cfg!(feature = "camera"));
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
    }
}
