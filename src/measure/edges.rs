//! Edge map preparation
//!
//! Resizes the frame to the working width, then grayscale, Gaussian blur,
//! Canny, and one dilate/erode pass to close small gaps in the edges.

use crate::config::PipelineConfig;
use image::{imageops, GrayImage, RgbImage};
use imageproc::distance_transform::Norm;

/// Resize to `working_width` keeping the aspect ratio.
///
/// Frames already at the working width are returned as-is so that an
/// unannotated frame comes back byte-identical.
pub fn resize_to_width(image: &RgbImage, working_width: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == working_width || width == 0 {
        return image.clone();
    }

    let ratio = working_width as f64 / width as f64;
    let new_height = ((height as f64 * ratio).round() as u32).max(1);
    log::debug!(
        "Resizing frame {}x{} -> {}x{}",
        width,
        height,
        working_width,
        new_height
    );
    imageops::resize(
        image,
        working_width,
        new_height,
        imageops::FilterType::Triangle,
    )
}

/// Normalized 1-D Gaussian taps; applied along both axes it gives a `size`x`size` blur
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let size = size.max(1) | 1;
    let half = (size / 2) as i32;
    let denom = 2.0 * sigma * sigma;
    let taps: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

/// Binary edge map (0 / 255) of an RGB frame
pub fn edge_map(image: &RgbImage, config: &PipelineConfig) -> GrayImage {
    let gray = imageops::grayscale(image);
    let kernel = gaussian_kernel(config.blur_kernel, config.blur_sigma());
    let blurred = imageproc::filter::separable_filter_equal(&gray, &kernel);
    let edges = imageproc::edges::canny(&blurred, config.canny_low, config.canny_high);

    // 3x3 square structuring element
    let closed = imageproc::morphology::dilate(&edges, Norm::LInf, 1);
    imageproc::morphology::erode(&closed, Norm::LInf, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_resize_preserves_aspect() {
        let img = RgbImage::new(1600, 1200);
        let resized = resize_to_width(&img, 800);
        assert_eq!(resized.dimensions(), (800, 600));
    }

    #[test]
    fn test_resize_is_noop_at_working_width() {
        let mut img = RgbImage::new(800, 10);
        img.put_pixel(3, 3, Rgb([1, 2, 3]));
        assert_eq!(resize_to_width(&img, 800), img);
    }

    #[test]
    fn test_gaussian_kernel_has_configured_support() {
        let kernel = gaussian_kernel(7, PipelineConfig::default().blur_sigma());
        assert_eq!(kernel.len(), 7);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(kernel[0], kernel[6]);
        assert!(kernel[3] > kernel[2] && kernel[2] > kernel[1]);
    }

    #[test]
    fn test_blur_does_not_reach_past_kernel_radius() {
        // a single bright pixel spreads exactly three pixels each way
        let mut gray = GrayImage::new(21, 21);
        gray.put_pixel(10, 10, image::Luma([255]));
        let kernel = gaussian_kernel(7, 1.4);
        let blurred = imageproc::filter::separable_filter_equal(&gray, &kernel);
        assert!(blurred.get_pixel(13, 10)[0] > 0);
        assert_eq!(blurred.get_pixel(14, 10)[0], 0);
        assert_eq!(blurred.get_pixel(10, 6)[0], 0);
    }

    #[test]
    fn test_flat_frame_has_no_edges() {
        let img = RgbImage::from_pixel(64, 48, Rgb([90, 90, 90]));
        let edges = edge_map(&img, &PipelineConfig::default());
        assert!(edges.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_square_produces_edges() {
        let mut img = RgbImage::new(64, 64);
        for y in 16..48 {
            for x in 16..48 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let edges = edge_map(&img, &PipelineConfig::default());
        assert!(edges.get_pixel(16, 32)[0] > 0 || edges.get_pixel(15, 32)[0] > 0);
        // interior and far background stay empty
        assert_eq!(edges.get_pixel(32, 32)[0], 0);
        assert_eq!(edges.get_pixel(2, 2)[0], 0);
    }
}
