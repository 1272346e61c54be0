use crate::calibration::CalibrationSnapshot;
use crate::errors::MeasureError;
use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// A single RGB8 frame travelling through the measurement pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: String,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Frame {
    /// Wrap a tightly packed RGB8 buffer
    pub fn new(data: Vec<u8>, width: u32, height: u32, device_id: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            data,
            width,
            height,
            format: "RGB8".to_string(),
            device_id,
            timestamp: Utc::now(),
        }
    }

    pub fn from_rgb_image(image: RgbImage, device_id: impl Into<String>) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, device_id.into())
    }

    pub fn with_format(mut self, format: String) -> Self {
        self.format = format;
        self
    }

    /// Expected buffer length for the frame dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }

    /// Borrowing conversion into an `RgbImage` (copies the buffer)
    pub fn to_rgb_image(&self) -> Result<RgbImage, MeasureError> {
        if !self.is_valid() {
            return Err(MeasureError::InvalidFrame(format!(
                "{}x{} frame carries {} bytes, expected {}",
                self.width,
                self.height,
                self.data.len(),
                self.expected_len()
            )));
        }
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| MeasureError::InvalidFrame("buffer does not match dimensions".to_string()))
    }
}

/// Sub-pixel image coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn as_f32(&self) -> (f32, f32) {
        (self.x as f32, self.y as f32)
    }

    pub fn as_i32(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

/// Rotated bounding box with canonically ordered corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top_left: Point2,
    pub top_right: Point2,
    pub bottom_right: Point2,
    pub bottom_left: Point2,
}

impl BoundingBox {
    /// Corners in drawing order: tl, tr, br, bl
    pub fn corners(&self) -> [Point2; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }
}

/// Midpoints of the four box edges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeMidpoints {
    pub top: Point2,
    pub bottom: Point2,
    pub left: Point2,
    pub right: Point2,
}

/// Measurement of one qualifying contour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeasurement {
    pub bounding_box: BoundingBox,
    pub midpoints: EdgeMidpoints,
    /// Contour area in px²
    pub area_px: f64,
    /// Top-mid to bottom-mid distance (dA)
    pub pixel_height: f64,
    /// Left-mid to right-mid distance (dB)
    pub pixel_width: f64,
    /// dA in calibration units, when calibrated
    pub height: Option<f64>,
    /// dB in calibration units, when calibrated
    pub width: Option<f64>,
}

/// Pipeline output handed to the consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub measurements: Vec<ObjectMeasurement>,
    pub calibration: CalibrationSnapshot,
    pub processing_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip_through_image() {
        let mut img = RgbImage::new(4, 3);
        img.put_pixel(1, 2, image::Rgb([10, 20, 30]));
        let frame = Frame::from_rgb_image(img.clone(), "test");
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 3);
        assert_eq!(frame.format, "RGB8");
        assert_eq!(frame.to_rgb_image().unwrap(), img);
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let frame = Frame::new(vec![0u8; 10], 4, 4, "test".to_string());
        assert!(!frame.is_valid());
        assert!(matches!(
            frame.to_rgb_image(),
            Err(MeasureError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_frames_get_unique_ids() {
        let a = Frame::new(vec![0u8; 3], 1, 1, "test".to_string());
        let b = Frame::new(vec![0u8; 3], 1, 1, "test".to_string());
        assert_ne!(a.id, b.id);
    }
}
