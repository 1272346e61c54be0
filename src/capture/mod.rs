//! Frame acquisition and the measurement session.
//!
//! A [`FrameSource`] produces frames; a [`MeasurementSession`] runs them
//! through the pipeline on a dedicated thread and keeps only the freshest
//! results for the consumer.

#[cfg(feature = "camera")]
pub mod camera;
pub mod session;
pub mod source;

#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use session::MeasurementSession;
pub use source::{FrameSequence, FrameSource, ImageFileSource};
