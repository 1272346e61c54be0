//! Box geometry helpers: corner ordering, midpoints, distances and areas.

use crate::types::{BoundingBox, EdgeMidpoints, Point2};
use imageproc::point::Point;
use std::cmp::Ordering;

/// Midpoint of a segment
pub fn midpoint(a: Point2, b: Point2) -> Point2 {
    Point2::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)
}

/// Euclidean distance between two points
pub fn euclidean(a: Point2, b: Point2) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn by_y_then_x(a: &Point2, b: &Point2) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

fn by_x_then_y(a: &Point2, b: &Point2) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

/// Label the four corners of a rectangle as tl, tr, br, bl.
///
/// The two points with the smallest `(y, x)` form the top pair and the other
/// two the bottom pair; inside each pair the smaller `(x, y)` is the left
/// corner. A rectangle's topmost and bottommost corners are opposite each
/// other, so the top pair is always an edge and the labels walk the outline
/// clockwise (in image coordinates) whatever order the input came in.
pub fn order_corners(points: [Point2; 4]) -> BoundingBox {
    let mut sorted = points;
    sorted.sort_by(by_y_then_x);

    let mut top = [sorted[0], sorted[1]];
    let mut bottom = [sorted[2], sorted[3]];
    top.sort_by(by_x_then_y);
    bottom.sort_by(by_x_then_y);

    BoundingBox {
        top_left: top[0],
        top_right: top[1],
        bottom_right: bottom[1],
        bottom_left: bottom[0],
    }
}

/// Midpoints of the top, bottom, left and right edges
pub fn edge_midpoints(bbox: &BoundingBox) -> EdgeMidpoints {
    EdgeMidpoints {
        top: midpoint(bbox.top_left, bbox.top_right),
        bottom: midpoint(bbox.bottom_left, bbox.bottom_right),
        left: midpoint(bbox.top_left, bbox.bottom_left),
        right: midpoint(bbox.top_right, bbox.bottom_right),
    }
}

/// Shoelace area of a closed polygon
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 * 0.5
}

/// Leftmost x coordinate, i.e. the x of the axis-aligned bounding rect
pub fn bounding_x(points: &[Point<i32>]) -> i32 {
    points.iter().map(|p| p.x).min().unwrap_or(i32::MAX)
}

/// Minimum-area rotated rectangle around a contour, corners ordered
pub fn rotated_bounding_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    if points.len() < 3 {
        return None;
    }
    let rect = imageproc::geometry::min_area_rect(points);
    let corners = rect.map(|p| Point2::new(p.x as f64, p.y as f64));
    Some(order_corners(corners))
}
