//! Per-frame measurement pipeline
//!
//! Detection and drawing run without touching the calibration; only the
//! short calibrate step in between needs the shared state.

use super::annotate::{self, LabelFont, TEXT_COLOR};
use super::contours::{external_contours, qualifying, sort_left_to_right};
use super::edges::{edge_map, resize_to_width};
use crate::calibration::{Calibration, CalibrationSnapshot, CalibrationState};
use crate::config::{AnnotationConfig, CrabCaliperConfig, PipelineConfig};
use crate::errors::MeasureError;
use crate::geometry::{edge_midpoints, euclidean, rotated_bounding_box};
use crate::types::{AnnotatedFrame, BoundingBox, EdgeMidpoints, Frame, ObjectMeasurement};
use image::RgbImage;
use std::time::Instant;

/// Width label offset from the right-edge midpoint
const WIDTH_LABEL_OFFSET: (i32, i32) = (10, 0);
/// Height label offset from the top-edge midpoint
const HEIGHT_LABEL_OFFSET: (i32, i32) = (-15, -10);

/// Box fitted to one qualifying contour, before calibration
struct DetectedObject {
    bounding_box: BoundingBox,
    midpoints: EdgeMidpoints,
    area_px: f64,
    pixel_height: f64,
    pixel_width: f64,
}

/// Lock-free part of a frame: the working image and what was found in it
struct Detection {
    working: RgbImage,
    qualifying: usize,
    objects: Vec<DetectedObject>,
}

/// Turns raw frames into annotated frames, reading and resolving calibration
pub struct FramePipeline {
    config: PipelineConfig,
    annotation: AnnotationConfig,
    unit: String,
    font: LabelFont,
}

impl FramePipeline {
    pub fn new(
        config: PipelineConfig,
        annotation: AnnotationConfig,
        unit: impl Into<String>,
    ) -> Result<Self, MeasureError> {
        let font = LabelFont::from_config(&annotation)?;
        Ok(Self {
            config,
            annotation,
            unit: unit.into(),
            font,
        })
    }

    pub fn from_config(config: &CrabCaliperConfig) -> Result<Self, MeasureError> {
        config.validate().map_err(MeasureError::Config)?;
        Self::new(
            config.pipeline.clone(),
            config.annotation.clone(),
            config.calibration.unit.clone(),
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process a frame against the shared calibration.
    ///
    /// The lock is taken once, around clearing, resolving and converting, so
    /// a request submitted meanwhile lands either before or after this
    /// frame's calibration step.
    pub fn process(
        &self,
        frame: &Frame,
        calibration: &Calibration,
    ) -> Result<AnnotatedFrame, MeasureError> {
        let started = Instant::now();
        let detection = self.detect(frame)?;
        let (measurements, snapshot) = {
            let mut state = calibration.lock()?;
            self.calibrate(&detection, &mut state)
        };
        self.finish(frame, detection, measurements, snapshot, started)
    }

    /// Process a frame against calibration state owned by the caller
    pub fn process_with_state(
        &self,
        frame: &Frame,
        state: &mut CalibrationState,
    ) -> Result<AnnotatedFrame, MeasureError> {
        let started = Instant::now();
        let detection = self.detect(frame)?;
        let (measurements, snapshot) = self.calibrate(&detection, state);
        self.finish(frame, detection, measurements, snapshot, started)
    }

    fn detect(&self, frame: &Frame) -> Result<Detection, MeasureError> {
        let source = frame.to_rgb_image()?;
        let working = resize_to_width(&source, self.config.working_width);

        let edges = edge_map(&working, &self.config);
        let mut contours = external_contours(&edges);
        if contours.len() > 1 {
            sort_left_to_right(&mut contours);
        }

        let measurable = qualifying(&contours, self.config.min_contour_area);
        log::debug!(
            "Frame {}: {} external contours, {} qualifying",
            frame.id,
            contours.len(),
            measurable.len()
        );

        let objects = measurable
            .iter()
            .filter_map(|contour| {
                let bounding_box = rotated_bounding_box(&contour.points)?;
                let midpoints = edge_midpoints(&bounding_box);
                Some(DetectedObject {
                    bounding_box,
                    midpoints,
                    area_px: contour.area,
                    pixel_height: euclidean(midpoints.top, midpoints.bottom),
                    pixel_width: euclidean(midpoints.left, midpoints.right),
                })
            })
            .collect();

        Ok(Detection {
            working,
            qualifying: measurable.len(),
            objects,
        })
    }

    /// Clear a pending request, resolve from the leftmost object and convert
    fn calibrate(
        &self,
        detection: &Detection,
        state: &mut CalibrationState,
    ) -> (Vec<ObjectMeasurement>, CalibrationSnapshot) {
        if state.begin_frame(detection.qualifying) {
            log::info!("Calibration cleared, resolving from leftmost object");
        }

        let measurements = detection
            .objects
            .iter()
            .map(|object| {
                if let Some(ppm) = state.resolve(object.pixel_width) {
                    log::info!(
                        "Resolved {:.4} px/{} from {:.1} px reference",
                        ppm,
                        self.unit,
                        object.pixel_width
                    );
                }
                log::debug!(
                    "Contour area {:.0}px²: {:.1}x{:.1}px",
                    object.area_px,
                    object.pixel_width,
                    object.pixel_height
                );
                ObjectMeasurement {
                    bounding_box: object.bounding_box,
                    midpoints: object.midpoints,
                    area_px: object.area_px,
                    pixel_height: object.pixel_height,
                    pixel_width: object.pixel_width,
                    height: state.to_metric(object.pixel_height),
                    width: state.to_metric(object.pixel_width),
                }
            })
            .collect();

        (measurements, state.snapshot())
    }

    fn finish(
        &self,
        frame: &Frame,
        detection: Detection,
        measurements: Vec<ObjectMeasurement>,
        calibration: CalibrationSnapshot,
        started: Instant,
    ) -> Result<AnnotatedFrame, MeasureError> {
        let working = detection.working;
        let annotated = if detection.qualifying == 0 {
            working
        } else {
            let mut overlay = working.clone();
            for m in &measurements {
                self.draw_measurement(&mut overlay, m);
            }
            annotate::blend(&overlay, &working, self.config.overlay_opacity)?
        };

        Ok(AnnotatedFrame {
            frame: into_frame(annotated, frame),
            measurements,
            calibration,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn draw_measurement(&self, overlay: &mut RgbImage, m: &ObjectMeasurement) {
        let mids = &m.midpoints;
        annotate::draw_box(overlay, &m.bounding_box, mids);

        match m.width {
            Some(w) => {
                let (x, y) = mids.right.as_i32();
                self.font.draw_on_baseline(
                    overlay,
                    TEXT_COLOR,
                    x + WIDTH_LABEL_OFFSET.0,
                    y + WIDTH_LABEL_OFFSET.1,
                    &annotate::format_measurement(w, &self.unit),
                );
            }
            None => log::debug!("Uncalibrated, skipping label for contour"),
        }

        if self.annotation.show_height {
            if let Some(h) = m.height {
                let (x, y) = mids.top.as_i32();
                self.font.draw_on_baseline(
                    overlay,
                    TEXT_COLOR,
                    x + HEIGHT_LABEL_OFFSET.0,
                    y + HEIGHT_LABEL_OFFSET.1,
                    &annotate::format_measurement(h, &self.unit),
                );
            }
        }
    }
}

fn into_frame(image: RgbImage, source: &Frame) -> Frame {
    let (width, height) = image.dimensions();
    Frame {
        id: source.id.clone(),
        data: image.into_raw(),
        width,
        height,
        format: "RGB8".to_string(),
        device_id: source.device_id.clone(),
        timestamp: source.timestamp,
    }
}
