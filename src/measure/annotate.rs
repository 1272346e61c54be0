//! Overlay drawing and blending
//!
//! Boxes, corner and midpoint markers and measurement labels are drawn on a
//! copy of the working frame which is then alpha-blended back.

use crate::config::AnnotationConfig;
use crate::errors::MeasureError;
use crate::types::{BoundingBox, EdgeMidpoints, Point2};
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut};

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const CORNER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const MIDPOINT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const DIMENSION_LINE_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const MARKER_RADIUS: i32 = 5;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// 5x7 glyphs, one byte per row, low five bits used, MSB on the left
fn bitmap_glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        'c' => [0x00, 0x00, 0x0E, 0x10, 0x10, 0x11, 0x0E],
        'f' => [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
        'i' => [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E],
        'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
        'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        't' => [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
        'x' => [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11],
        _ => return None,
    };
    Some(rows)
}

/// How measurement labels are rendered
pub enum LabelFont {
    /// Built-in 5x7 glyphs scaled by an integer factor
    Bitmap { scale: u32 },
    /// TrueType font loaded at startup
    Outline { font: FontVec, scale: PxScale },
}

impl LabelFont {
    pub fn from_config(config: &AnnotationConfig) -> Result<Self, MeasureError> {
        match &config.font_path {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    MeasureError::Config(format!("Failed to read font {}: {}", path, e))
                })?;
                let font = FontVec::try_from_vec(bytes).map_err(|e| {
                    MeasureError::Config(format!("Failed to load font {}: {}", path, e))
                })?;
                log::info!("Using label font {}", path);
                Ok(LabelFont::Outline {
                    font,
                    scale: PxScale::from((GLYPH_HEIGHT * config.text_scale.max(1)) as f32 * 1.4),
                })
            }
            None => Ok(LabelFont::Bitmap {
                scale: config.text_scale.max(1),
            }),
        }
    }

    /// Height from the baseline to the top of the tallest glyph
    pub fn ascent(&self) -> i32 {
        match self {
            LabelFont::Bitmap { scale } => (GLYPH_HEIGHT * scale) as i32,
            LabelFont::Outline { font, scale } => font.as_scaled(*scale).ascent().ceil() as i32,
        }
    }

    /// Draw `text` so that it sits on the baseline through (x, y)
    pub fn draw_on_baseline(
        &self,
        canvas: &mut RgbImage,
        color: Rgb<u8>,
        x: i32,
        y: i32,
        text: &str,
    ) {
        self.draw(canvas, color, x, y - self.ascent(), text);
    }

    /// Draw `text` with its top-left corner at (x, y)
    pub fn draw(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, text: &str) {
        match self {
            LabelFont::Outline { font, scale } => {
                draw_text_mut(canvas, color, x, y, *scale, font, text);
            }
            LabelFont::Bitmap { scale } => draw_bitmap_text(canvas, color, x, y, *scale, text),
        }
    }
}

fn draw_bitmap_text(canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, scale: u32, text: &str) {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    let scale = scale as i64;
    let advance = (GLYPH_WIDTH as i64 + 1) * scale;

    for (i, c) in text.chars().enumerate() {
        let Some(rows) = bitmap_glyph(c) else {
            continue;
        };
        let origin_x = x as i64 + i as i64 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH as i64 {
                if bits & (1 << (GLYPH_WIDTH as i64 - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = origin_x + col * scale + dx;
                        let py = y as i64 + row as i64 * scale + dy;
                        if px >= 0 && py >= 0 && px < width && py < height {
                            canvas.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}

/// Two-pixel-wide segment
pub fn draw_thick_segment(canvas: &mut RgbImage, a: Point2, b: Point2, color: Rgb<u8>) {
    let (ax, ay) = a.as_f32();
    let (bx, by) = b.as_f32();
    draw_line_segment_mut(canvas, (ax, ay), (bx, by), color);
    if (bx - ax).abs() >= (by - ay).abs() {
        draw_line_segment_mut(canvas, (ax, ay + 1.0), (bx, by + 1.0), color);
    } else {
        draw_line_segment_mut(canvas, (ax + 1.0, ay), (bx + 1.0, by), color);
    }
}

/// Box outline, corner markers, edge midpoints and the two dimension lines
pub fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox, mids: &EdgeMidpoints) {
    let corners = bbox.corners();
    for i in 0..4 {
        draw_thick_segment(canvas, corners[i], corners[(i + 1) % 4], BOX_COLOR);
    }
    for corner in corners {
        draw_filled_circle_mut(canvas, corner.as_i32(), MARKER_RADIUS, CORNER_COLOR);
    }
    for mid in [mids.top, mids.bottom, mids.left, mids.right] {
        draw_filled_circle_mut(canvas, mid.as_i32(), MARKER_RADIUS, MIDPOINT_COLOR);
    }
    draw_thick_segment(canvas, mids.top, mids.bottom, DIMENSION_LINE_COLOR);
    draw_thick_segment(canvas, mids.left, mids.right, DIMENSION_LINE_COLOR);
}

/// `overlay * opacity + base * (1 - opacity)`, rounded per channel.
///
/// Blending an unmodified copy returns the base exactly.
pub fn blend(overlay: &RgbImage, base: &RgbImage, opacity: f32) -> Result<RgbImage, MeasureError> {
    if overlay.dimensions() != base.dimensions() {
        return Err(MeasureError::InvalidFrame(format!(
            "overlay {:?} does not match frame {:?}",
            overlay.dimensions(),
            base.dimensions()
        )));
    }

    let alpha = opacity.clamp(0.0, 1.0);
    let mut out = base.clone();
    for (dst, (o, b)) in out
        .pixels_mut()
        .zip(overlay.pixels().zip(base.pixels()))
    {
        for c in 0..3 {
            if o[c] == b[c] {
                dst[c] = b[c];
            } else {
                let v = o[c] as f32 * alpha + b[c] as f32 * (1.0 - alpha);
                dst[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    Ok(out)
}

/// Measurement label such as `3.250in`
pub fn format_measurement(value: f64, unit: &str) -> String {
    format!("{:.3}{}", value, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_identity_on_unmodified_overlay() {
        let mut base = RgbImage::new(8, 8);
        for (x, y, p) in base.enumerate_pixels_mut() {
            *p = Rgb([(x * 30) as u8, (y * 30) as u8, 77]);
        }
        let out = blend(&base.clone(), &base, 0.5).unwrap();
        assert_eq!(out, base);
        let out = blend(&base.clone(), &base, 0.3).unwrap();
        assert_eq!(out, base);
    }

    #[test]
    fn test_blend_half_opacity() {
        let base = RgbImage::from_pixel(2, 2, Rgb([0, 100, 200]));
        let overlay = RgbImage::from_pixel(2, 2, Rgb([255, 0, 200]));
        let out = blend(&overlay, &base, 0.5).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgb([128, 50, 200]));
    }

    #[test]
    fn test_blend_dimension_mismatch() {
        let a = RgbImage::new(2, 2);
        let b = RgbImage::new(3, 2);
        assert!(blend(&a, &b, 0.5).is_err());
    }

    #[test]
    fn test_bitmap_text_draws_inside_canvas() {
        let mut canvas = RgbImage::new(100, 20);
        let font = LabelFont::Bitmap { scale: 1 };
        font.draw(&mut canvas, TEXT_COLOR, 2, 2, "1.250in");
        assert!(canvas.pixels().any(|p| *p == TEXT_COLOR));

        // partially off-canvas text must not panic
        font.draw(&mut canvas, TEXT_COLOR, 95, 15, "88.888in");
        font.draw(&mut canvas, TEXT_COLOR, -10, -3, "7");
    }

    #[test]
    fn test_baseline_text_sits_above_anchor() {
        let mut canvas = RgbImage::new(40, 40);
        let font = LabelFont::Bitmap { scale: 2 };
        assert_eq!(font.ascent(), 14);
        font.draw_on_baseline(&mut canvas, TEXT_COLOR, 5, 30, "1");

        let rows: Vec<u32> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == TEXT_COLOR)
            .map(|(_, y, _)| y)
            .collect();
        assert_eq!(rows.iter().min(), Some(&16));
        assert_eq!(rows.iter().max(), Some(&29));
    }

    #[test]
    fn test_unknown_glyphs_are_skipped() {
        let mut canvas = RgbImage::new(20, 10);
        LabelFont::Bitmap { scale: 1 }.draw(&mut canvas, TEXT_COLOR, 0, 0, "??");
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_missing_font_file_is_config_error() {
        let config = AnnotationConfig {
            font_path: Some("/nonexistent/font.ttf".to_string()),
            ..AnnotationConfig::default()
        };
        assert!(matches!(
            LabelFont::from_config(&config),
            Err(MeasureError::Config(_))
        ));
    }

    #[test]
    fn test_draw_box_marks_corners() {
        let mut canvas = RgbImage::new(100, 100);
        let bbox = crate::geometry::order_corners([
            Point2::new(20.0, 20.0),
            Point2::new(80.0, 20.0),
            Point2::new(80.0, 60.0),
            Point2::new(20.0, 60.0),
        ]);
        let mids = crate::geometry::edge_midpoints(&bbox);
        draw_box(&mut canvas, &bbox, &mids);
        assert_eq!(*canvas.get_pixel(20, 20), CORNER_COLOR);
        assert_eq!(*canvas.get_pixel(48, 20), MIDPOINT_COLOR);
        assert_eq!(*canvas.get_pixel(50, 40), DIMENSION_LINE_COLOR);
        assert_eq!(*canvas.get_pixel(35, 20), BOX_COLOR);
    }

    #[test]
    fn test_format_measurement() {
        assert_eq!(format_measurement(3.25, "in"), "3.250in");
    }
}
