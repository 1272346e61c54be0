//! Configuration management for CrabCaliper
//!
//! Provides configuration loading, saving, and management for the measurement
//! pipeline, calibration defaults, annotation style and capture loop.

use crate::errors::MeasureError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `CRABCALIPER_PIPELINE__WORKING_WIDTH=640`
pub const ENV_PREFIX: &str = "CRABCALIPER";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrabCaliperConfig {
    pub pipeline: PipelineConfig,
    pub calibration: CalibrationConfig,
    pub annotation: AnnotationConfig,
    pub capture: CaptureConfig,
}

/// Edge detection and contour filtering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Frames are resized to this width before processing
    pub working_width: u32,
    /// Gaussian kernel size (odd, >= 3)
    pub blur_kernel: u32,
    /// Canny low hysteresis threshold
    pub canny_low: f32,
    /// Canny high hysteresis threshold
    pub canny_high: f32,
    /// Contours with a smaller area (px²) are treated as noise
    pub min_contour_area: f64,
    /// Weight of the annotation overlay when blended back (0.0-1.0)
    pub overlay_opacity: f32,
}

/// Pixel-to-metric calibration defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Prior pixels-per-unit used until the first calibration request.
    /// `None` starts uncalibrated.
    pub default_pixels_per_metric: Option<f64>,
    /// Unit label appended to rendered measurements
    pub unit: String,
    /// Reference width submitted at startup, as if entered by the user
    pub initial_width: Option<f64>,
}

/// Overlay text settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationConfig {
    /// TrueType font for labels; the built-in bitmap glyphs are used when unset
    pub font_path: Option<String>,
    /// Integer scale of the bitmap glyphs (pixel height is 7 * scale)
    pub text_scale: u32,
    /// Also render the vertical measurement above the top midpoint
    pub show_height: bool,
}

/// Capture loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Annotated frames kept for the consumer before the oldest is dropped
    pub buffer_capacity: usize,
    /// How long `stop` waits for the capture thread, in milliseconds
    pub join_timeout_ms: u64,
    /// Requested camera resolution [width, height]
    pub resolution: [u32; 2],
    /// Requested camera frame rate
    pub fps: u32,
}

impl Default for CrabCaliperConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            calibration: CalibrationConfig::default(),
            annotation: AnnotationConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_width: 800,
            blur_kernel: 7,
            canny_low: 50.0,
            canny_high: 100.0,
            min_contour_area: 100.0,
            overlay_opacity: 0.5,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            default_pixels_per_metric: Some(crate::calibration::DEFAULT_PIXELS_PER_METRIC),
            unit: "in".to_string(),
            initial_width: None,
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            text_scale: 2,
            show_height: false,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 2,
            join_timeout_ms: 1000,
            resolution: [1280, 720],
            fps: 30,
        }
    }
}

impl PipelineConfig {
    /// Gaussian sigma for the configured kernel size
    pub fn blur_sigma(&self) -> f32 {
        let k = self.blur_kernel as f32;
        0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
    }
}

impl CrabCaliperConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, MeasureError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| MeasureError::Config(format!("Failed to read config file: {}", e)))?;

        let config: CrabCaliperConfig = toml::from_str(&contents)
            .map_err(|e| MeasureError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Merge defaults, the optional TOML file and `CRABCALIPER_*` environment variables
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, MeasureError> {
        let path = path.as_ref();

        let defaults = toml::to_string(&Self::default())
            .map_err(|e| MeasureError::Config(format!("Failed to serialize defaults: {}", e)))?;

        let settings = config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Toml))
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| MeasureError::Config(format!("Failed to build config: {}", e)))?;

        let config: CrabCaliperConfig = settings
            .try_deserialize()
            .map_err(|e| MeasureError::Config(format!("Failed to deserialize config: {}", e)))?;

        config.validate().map_err(MeasureError::Config)?;
        log::debug!("Layered configuration resolved from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MeasureError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    MeasureError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| MeasureError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| MeasureError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabcaliper.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let p = &self.pipeline;
        if p.working_width < 16 {
            return Err("Working width must be at least 16 pixels".to_string());
        }
        if p.blur_kernel < 3 || p.blur_kernel % 2 == 0 {
            return Err("Blur kernel must be odd and at least 3".to_string());
        }
        if !(p.canny_low > 0.0 && p.canny_low <= p.canny_high) {
            return Err("Canny thresholds must satisfy 0 < low <= high".to_string());
        }
        if !(p.min_contour_area >= 0.0) {
            return Err("Minimum contour area must be non-negative".to_string());
        }
        if !(0.0..=1.0).contains(&p.overlay_opacity) {
            return Err("Overlay opacity must be between 0.0 and 1.0".to_string());
        }

        let c = &self.calibration;
        if let Some(ppm) = c.default_pixels_per_metric {
            if !(ppm.is_finite() && ppm > 0.0) {
                return Err("Default pixels per metric must be positive".to_string());
            }
        }
        if let Some(width) = c.initial_width {
            if !(width.is_finite() && width > 0.0) {
                return Err("Initial calibration width must be positive".to_string());
            }
        }

        if self.annotation.text_scale == 0 || self.annotation.text_scale > 16 {
            return Err("Text scale must be between 1 and 16".to_string());
        }

        let cap = &self.capture;
        if cap.buffer_capacity == 0 {
            return Err("Buffer capacity must be at least 1".to_string());
        }
        if cap.resolution[0] == 0 || cap.resolution[1] == 0 {
            return Err("Invalid capture resolution".to_string());
        }
        if cap.fps == 0 || cap.fps > 240 {
            return Err("Invalid capture FPS (must be 1-240)".to_string());
        }

        Ok(())
    }
}
