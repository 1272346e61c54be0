//! External contour extraction and ordering

use crate::geometry::{bounding_x, polygon_area};
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// Outer boundary of a connected edge region
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedContour {
    pub points: Vec<Point<i32>>,
    pub area: f64,
}

impl DetectedContour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        let area = polygon_area(&points);
        Self { points, area }
    }

    pub fn bounding_x(&self) -> i32 {
        bounding_x(&self.points)
    }
}

/// Outermost contours only; holes and anything nested inside them are skipped
pub fn external_contours(edges: &GrayImage) -> Vec<DetectedContour> {
    find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| !c.points.is_empty())
        .map(|c| DetectedContour::new(c.points))
        .collect()
}

/// Stable left-to-right sort on the bounding-rect x
pub fn sort_left_to_right(contours: &mut [DetectedContour]) {
    contours.sort_by_key(|c| c.bounding_x());
}

/// Contours large enough to measure
pub fn qualifying(contours: &[DetectedContour], min_area: f64) -> Vec<&DetectedContour> {
    contours.iter().filter(|c| c.area >= min_area).collect()
}
