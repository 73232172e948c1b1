//! Gaussian filtering on 8-bit grayscale images

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;

type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Sigma picked for a kernel size when none is given: `0.3*((k-1)*0.5 - 1) + 0.8`
pub fn default_sigma(ksize: usize) -> f64 {
    0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian kernel of odd length `ksize`
pub fn gaussian_kernel(ksize: usize) -> Vec<f32> {
    debug_assert!(ksize % 2 == 1, "kernel size must be odd");
    let sigma = default_sigma(ksize);
    let center = (ksize / 2) as f64;
    let scale = -0.5 / (sigma * sigma);

    let raw: Vec<f64> = (0..ksize)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();

    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

/// Correlate with `kernel` along rows and columns, rounding back to 8 bits.
///
/// Filtering happens in `f32` so a normalized kernel keeps flat areas exact;
/// borders are padded by continuity.
pub fn separable_blur(image: &GrayImage, kernel: &[f32]) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let float: FloatImage =
        ImageBuffer::from_fn(width, height, |x, y| Luma([f32::from(image.get_pixel(x, y)[0])]));
    let smoothed = separable_filter_equal(&float, kernel);

    GrayImage::from_fn(width, height, |x, y| {
        Luma([smoothed.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
    })
}

/// Gaussian blur with a square `ksize`×`ksize` kernel
pub fn gaussian_blur(image: &GrayImage, ksize: usize) -> GrayImage {
    separable_blur(image, &gaussian_kernel(ksize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sigma() {
        assert!((default_sigma(5) - 1.1).abs() < 1e-9);
        assert!((default_sigma(11) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(5);
        assert_eq!(kernel.len(), 5);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((kernel[0] - kernel[4]).abs() < 1e-7);
        assert!(kernel[2] > kernel[1]);
    }

    #[test]
    fn test_blur_keeps_flat_image() {
        let image = GrayImage::from_pixel(9, 7, Luma([120]));
        let blurred = gaussian_blur(&image, 5);
        assert!(blurred.pixels().all(|p| p[0] == 120));
    }

    #[test]
    fn test_blur_softens_edge() {
        let mut image = GrayImage::from_pixel(10, 1, Luma([0]));
        for x in 5..10 {
            image.put_pixel(x, 0, Luma([255]));
        }
        let blurred = gaussian_blur(&image, 5);
        let left = blurred.get_pixel(4, 0)[0];
        let right = blurred.get_pixel(5, 0)[0];
        assert!(left > 0 && left < 128);
        assert!(right > 128 && right < 255);
    }

    #[test]
    fn test_blur_is_symmetric_at_borders() {
        let image =
            GrayImage::from_fn(7, 1, |x, _| Luma([if x == 0 || x == 6 { 200 } else { 50 }]));
        let blurred = gaussian_blur(&image, 5);
        assert_eq!(blurred.get_pixel(0, 0), blurred.get_pixel(6, 0));
        assert!(blurred.get_pixel(0, 0)[0] > blurred.get_pixel(3, 0)[0]);
    }
}
