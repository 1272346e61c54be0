//! Pixel-to-metric calibration
//!
//! The calibration scalar starts at a prior value. A user request stores a
//! reference width and marks the scalar for recomputation; the next frame with
//! a qualifying contour clears it and the first measured box resolves it as
//! `pixel_width / reference_width`. The resolved value is kept until the next
//! request.

use crate::errors::MeasureError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Prior pixels-per-unit used before any calibration request
pub const DEFAULT_PIXELS_PER_METRIC: f64 = 40.0;

/// Parse a user-entered reference width.
///
/// Accepts any finite, strictly positive decimal after trimming whitespace.
pub fn parse_calibration_width(input: &str) -> Result<f64, MeasureError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(MeasureError::InvalidCalibration(
            "nothing entered".to_string(),
        ));
    }

    let width: f64 = trimmed
        .parse()
        .map_err(|_| MeasureError::InvalidCalibration(format!("not a number: {:?}", trimmed)))?;

    validate_width(width)
}

fn validate_width(width: f64) -> Result<f64, MeasureError> {
    if !width.is_finite() {
        return Err(MeasureError::InvalidCalibration(format!(
            "width must be finite, got {}",
            width
        )));
    }
    if width <= 0.0 {
        return Err(MeasureError::InvalidCalibration(format!(
            "width must be positive, got {}",
            width
        )));
    }
    Ok(width)
}

/// Calibration scalar plus the pending-recompute request
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationState {
    pixels_per_metric: Option<f64>,
    calibration_width: Option<f64>,
    pending: bool,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self::new(Some(DEFAULT_PIXELS_PER_METRIC))
    }
}

impl CalibrationState {
    /// `prior` must be positive to be used; anything else starts uncalibrated
    pub fn new(prior: Option<f64>) -> Self {
        Self {
            pixels_per_metric: prior.filter(|p| p.is_finite() && *p > 0.0),
            calibration_width: None,
            pending: false,
        }
    }

    pub fn pixels_per_metric(&self) -> Option<f64> {
        self.pixels_per_metric
    }

    pub fn calibration_width(&self) -> Option<f64> {
        self.calibration_width
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Store a reference width and flag the scalar for recomputation
    pub fn request_width(&mut self, width: f64) -> Result<f64, MeasureError> {
        let width = validate_width(width)?;
        self.calibration_width = Some(width);
        self.pending = true;
        Ok(width)
    }

    /// Called once per frame before measuring.
    ///
    /// A pending request is consumed only when the frame has something to
    /// calibrate against; returns true when the scalar was cleared.
    pub fn begin_frame(&mut self, qualifying_contours: usize) -> bool {
        if self.pending && qualifying_contours > 0 {
            self.pixels_per_metric = None;
            self.pending = false;
            return true;
        }
        false
    }

    /// Resolve an unset scalar from the reference edge of a measured box.
    ///
    /// Returns the value that was set, or `None` when already resolved or
    /// when there is no usable reference.
    pub fn resolve(&mut self, reference_px: f64) -> Option<f64> {
        if self.pixels_per_metric.is_some() {
            return None;
        }
        let width = self.calibration_width?;
        if !(reference_px.is_finite() && reference_px > 0.0) {
            return None;
        }
        let ppm = reference_px / width;
        self.pixels_per_metric = Some(ppm);
        Some(ppm)
    }

    /// Convert a pixel distance, if calibrated
    pub fn to_metric(&self, pixels: f64) -> Option<f64> {
        self.pixels_per_metric
            .filter(|ppm| *ppm > 0.0)
            .map(|ppm| pixels / ppm)
    }

    pub fn snapshot(&self) -> CalibrationSnapshot {
        CalibrationSnapshot {
            pixels_per_metric: self.pixels_per_metric,
            calibration_width: self.calibration_width,
            pending: self.pending,
        }
    }
}

/// Point-in-time copy of the calibration state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub pixels_per_metric: Option<f64>,
    pub calibration_width: Option<f64>,
    pub pending: bool,
}

/// Shared calibration handle for the capture loop and the request handler
#[derive(Debug, Clone, Default)]
pub struct Calibration {
    inner: Arc<Mutex<CalibrationState>>,
}

impl Calibration {
    pub fn new(state: CalibrationState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn from_config(config: &crate::config::CalibrationConfig) -> Result<Self, MeasureError> {
        let mut state = CalibrationState::new(config.default_pixels_per_metric);
        if let Some(width) = config.initial_width {
            state.request_width(width)?;
        }
        Ok(Self::new(state))
    }

    /// Handle a free-form calibration submission.
    ///
    /// Invalid input is logged and leaves the state untouched.
    pub fn set_calibration_width(&self, input: &str) -> Result<f64, MeasureError> {
        log::info!("Calibration entered: {:?}", input);
        let width = match parse_calibration_width(input) {
            Ok(width) => width,
            Err(e) => {
                log::warn!("Rejected calibration input: {}", e);
                return Err(e);
            }
        };
        self.request_width(width)
    }

    pub fn request_width(&self, width: f64) -> Result<f64, MeasureError> {
        let width = self.lock()?.request_width(width)?;
        log::info!("Calibration width set: {}", width);
        Ok(width)
    }

    pub fn snapshot(&self) -> Result<CalibrationSnapshot, MeasureError> {
        Ok(self.lock()?.snapshot())
    }

    /// Exclusive access for the duration of one frame
    pub fn lock(&self) -> Result<MutexGuard<'_, CalibrationState>, MeasureError> {
        self.inner.lock().map_err(|_| MeasureError::PoisonedLock)
    }
}
