use super::source::FrameSource;
use crate::config::CaptureConfig;
use crate::errors::MeasureError;
use crate::types::Frame;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};

/// Live camera frames through nokhwa, decoded to RGB8
pub struct CameraSource {
    camera: CallbackCamera,
    device_id: String,
}

impl CameraSource {
    /// Open the camera at `device_id` (a numeric index)
    pub fn open(device_id: &str, config: &CaptureConfig) -> Result<Self, MeasureError> {
        let index = device_id
            .parse::<u32>()
            .map_err(|_| MeasureError::Initialization(format!("Invalid device ID: {}", device_id)))?;

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            nokhwa::utils::CameraFormat::new_from(
                config.resolution[0],
                config.resolution[1],
                nokhwa::utils::FrameFormat::MJPEG,
                config.fps,
            ),
        ));

        let camera = CallbackCamera::new(CameraIndex::Index(index), requested, |_| {}).map_err(
            |e| MeasureError::Initialization(format!("Failed to initialize camera: {}", e)),
        )?;

        log::info!("Opened camera {}", device_id);
        Ok(Self {
            camera,
            device_id: device_id.to_string(),
        })
    }

    /// List camera indices and names
    pub fn list() -> Result<Vec<(String, String)>, MeasureError> {
        let cameras = nokhwa::query(nokhwa::utils::ApiBackend::Auto)
            .map_err(|e| MeasureError::Initialization(format!("Failed to query cameras: {}", e)))?;
        Ok(cameras
            .into_iter()
            .map(|info| (info.index().to_string(), info.human_name()))
            .collect())
    }
}

impl FrameSource for CameraSource {
    fn start(&mut self) -> Result<(), MeasureError> {
        self.camera
            .open_stream()
            .map_err(|e| MeasureError::Initialization(format!("Failed to start stream: {}", e)))
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, MeasureError> {
        let buffer = self
            .camera
            .poll_frame()
            .map_err(|e| MeasureError::Capture(format!("Failed to capture frame: {}", e)))?;

        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| MeasureError::Capture(format!("Failed to decode frame: {}", e)))?;

        let (width, height) = (decoded.width(), decoded.height());
        Ok(Some(Frame::new(
            decoded.into_raw(),
            width,
            height,
            self.device_id.clone(),
        )))
    }

    fn stop(&mut self) -> Result<(), MeasureError> {
        self.camera
            .stop_stream()
            .map_err(|e| MeasureError::Capture(format!("Failed to stop stream: {}", e)))
    }

    fn describe(&self) -> String {
        format!("camera({})", self.device_id)
    }
}
