//! Synthetic scenes for offline testing
//!
//! Bright objects on a dark background, drawn with a one-pixel soft border
//! so the edge detector sees a single gradient peak per edge, the way a real
//! camera blurs object outlines.

use crate::types::Frame;
use image::{Rgb, RgbImage};

const DEVICE_ID: &str = "synthetic";
const FOREGROUND: u8 = 255;
const SOFT_EDGE: u8 = 128;
const SUPERSAMPLE: u32 = 4;

/// Uniform black frame
pub fn blank_frame(width: u32, height: u32) -> Frame {
    Frame::from_rgb_image(RgbImage::new(width, height), DEVICE_ID)
}

/// Paint an axis-aligned rectangle of exactly `w`x`h` pixels at (x, y)
pub fn paint_rectangle(image: &mut RgbImage, (x, y, w, h): (u32, u32, u32, u32)) {
    let x_end = (x + w).min(image.width());
    let y_end = (y + h).min(image.height());
    for py in y..y_end {
        for px in x..x_end {
            let border = px == x || py == y || px + 1 == x_end || py + 1 == y_end;
            let v = if border { SOFT_EDGE } else { FOREGROUND };
            image.put_pixel(px, py, Rgb([v, v, v]));
        }
    }
}

/// Frame with one axis-aligned rectangle given as (x, y, width, height)
pub fn rectangle_frame(width: u32, height: u32, rect: (u32, u32, u32, u32)) -> Frame {
    multi_rectangle_frame(width, height, &[rect])
}

/// Frame with several axis-aligned rectangles
pub fn multi_rectangle_frame(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> Frame {
    let mut image = RgbImage::new(width, height);
    for rect in rects {
        paint_rectangle(&mut image, *rect);
    }
    Frame::from_rgb_image(image, DEVICE_ID)
}

/// Frame with a `w`x`h` rectangle centred at (cx, cy) rotated by `angle` radians.
///
/// Pixel values are the supersampled coverage, giving anti-aliased edges.
pub fn rotated_rectangle_frame(
    width: u32,
    height: u32,
    center: (f64, f64),
    size: (f64, f64),
    angle: f64,
) -> Frame {
    let (cx, cy) = center;
    let (half_w, half_h) = (size.0 * 0.5, size.1 * 0.5);
    let (sin, cos) = angle.sin_cos();
    let step = 1.0 / SUPERSAMPLE as f64;
    let samples = (SUPERSAMPLE * SUPERSAMPLE) as f64;

    let mut image = RgbImage::new(width, height);
    for (px, py, pixel) in image.enumerate_pixels_mut() {
        let mut hits = 0u32;
        for sy in 0..SUPERSAMPLE {
            for sx in 0..SUPERSAMPLE {
                let x = px as f64 + (sx as f64 + 0.5) * step - cx;
                let y = py as f64 + (sy as f64 + 0.5) * step - cy;
                // rotate sample into the rectangle's frame
                let u = x * cos + y * sin;
                let v = -x * sin + y * cos;
                if u.abs() <= half_w && v.abs() <= half_h {
                    hits += 1;
                }
            }
        }
        let value = (FOREGROUND as f64 * hits as f64 / samples).round() as u8;
        *pixel = Rgb([value, value, value]);
    }
    Frame::from_rgb_image(image, DEVICE_ID)
}

/// Tiny bright specks, each far below the minimum contour area
pub fn speckle_frame(width: u32, height: u32, spacing: u32) -> Frame {
    let mut image = RgbImage::new(width, height);
    let spacing = spacing.max(8);
    for y in (spacing / 2..height.saturating_sub(2)).step_by(spacing as usize) {
        for x in (spacing / 2..width.saturating_sub(2)).step_by(spacing as usize) {
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                image.put_pixel(x + dx, y + dy, Rgb([SOFT_EDGE, SOFT_EDGE, SOFT_EDGE]));
            }
        }
    }
    Frame::from_rgb_image(image, DEVICE_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_size() {
        let frame = blank_frame(320, 240);
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert_eq!(frame.data.len(), 320 * 240 * 3);
        assert!(frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rectangle_has_soft_border() {
        let frame = rectangle_frame(100, 100, (10, 20, 30, 40));
        let img = frame.to_rgb_image().unwrap();
        assert_eq!(img.get_pixel(10, 30)[0], SOFT_EDGE);
        assert_eq!(img.get_pixel(39, 30)[0], SOFT_EDGE);
        assert_eq!(img.get_pixel(20, 30)[0], FOREGROUND);
        assert_eq!(img.get_pixel(40, 30)[0], 0);
        assert_eq!(img.get_pixel(9, 30)[0], 0);
    }

    #[test]
    fn test_rotated_rectangle_coverage() {
        let frame = rotated_rectangle_frame(200, 200, (100.0, 100.0), (80.0, 40.0), 0.5);
        let img = frame.to_rgb_image().unwrap();
        assert_eq!(img.get_pixel(100, 100)[0], FOREGROUND);
        assert_eq!(img.get_pixel(5, 5)[0], 0);
        assert!(img.pixels().any(|p| p[0] > 0 && p[0] < FOREGROUND));
    }

    #[test]
    fn test_speckle_frame_has_specks() {
        let frame = speckle_frame(64, 64, 16);
        assert!(frame.data.iter().any(|&b| b == SOFT_EDGE));
    }
}
