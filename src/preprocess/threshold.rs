//! Binarization: fixed, Otsu and adaptive Gaussian thresholds

use image::GrayImage;
use imageproc::contrast::otsu_level;

use super::filter::{gaussian_kernel, separable_blur};

/// `dst = 255 if src > level else 0`
pub fn binary(image: &GrayImage, level: u8) -> GrayImage {
    map_pixels(image, |v| if v > level { 255 } else { 0 })
}

/// `dst = 0 if src > level else 255`
pub fn binary_inverted(image: &GrayImage, level: u8) -> GrayImage {
    map_pixels(image, |v| if v > level { 0 } else { 255 })
}

/// Global threshold at the level minimizing intra-class variance
pub fn otsu(image: &GrayImage) -> GrayImage {
    let level = otsu_level(image);
    tracing::trace!(level, "otsu threshold level");
    binary(image, level)
}

/// Local threshold against the Gaussian-weighted neighborhood mean minus `c`.
///
/// `block_size` must be odd and greater than 1.
pub fn adaptive_gaussian(image: &GrayImage, block_size: usize, c: f64) -> GrayImage {
    debug_assert!(block_size % 2 == 1 && block_size > 1);
    let mean = separable_blur(image, &gaussian_kernel(block_size));
    let delta = c.ceil() as i32;

    let mut out = image.clone();
    for (dst, (src, m)) in out
        .iter_mut()
        .zip(image.as_raw().iter().zip(mean.as_raw().iter()))
    {
        *dst = if i32::from(*src) - i32::from(*m) > -delta {
            255
        } else {
            0
        };
    }
    out
}

fn map_pixels(image: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    let mut out = image.clone();
    for v in out.iter_mut() {
        *v = f(*v);
    }
    out
}
