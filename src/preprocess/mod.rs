//! Image preprocessing for the classical OCR engine
//!
//! Three fixed pipelines prepare a grayscale, height-normalized copy of the
//! upload before it reaches Tesseract:
//!
//! - `adaptive`: denoise → CLAHE (clip 3.0) → adaptive Gaussian threshold
//! - `otsu`: denoise → 5×5 Gaussian blur → Otsu threshold
//! - `simple`: CLAHE (clip 2.0) only
//!
//! All of them first upscale images shorter than [`TARGET_HEIGHT`] pixels.
//! Images that are, or would become, larger than [`MAX_PIXELS`] are refused.

mod clahe;
mod denoise;
mod filter;
mod threshold;

pub use clahe::clahe;
pub use denoise::{nl_means, NlMeansParams};
pub use filter::{gaussian_blur, gaussian_kernel};
pub use threshold::{adaptive_gaussian, binary, binary_inverted, otsu};

use image::{imageops::FilterType, DynamicImage, GrayImage, Luma};
use serde::Serialize;
use std::fmt;

use crate::ocr::OcrError;

/// Images shorter than this are upscaled to exactly this height
pub const TARGET_HEIGHT: u32 = 1000;

/// Largest pixel count accepted before or after upscaling
pub const MAX_PIXELS: u64 = 40_000_000;

const CLAHE_TILES: u32 = 8;
const ADAPTIVE_BLOCK_SIZE: usize = 11;
const ADAPTIVE_C: f64 = 2.0;
const OTSU_BLUR_KSIZE: usize = 5;

/// Preprocessing pipeline selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessMethod {
    Adaptive,
    Otsu,
    Simple,
}

impl PreprocessMethod {
    pub const ALL: [PreprocessMethod; 3] = [Self::Adaptive, Self::Otsu, Self::Simple];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adaptive => "adaptive",
            Self::Otsu => "otsu",
            Self::Simple => "simple",
        }
    }
}

impl fmt::Display for PreprocessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grayscale with BT.601 luma weights
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return gray.clone();
    }
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let luma = 0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2]);
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Size of `width`×`height` once normalized to [`TARGET_HEIGHT`]
pub fn normalized_dimensions(width: u32, height: u32) -> (u64, u64) {
    if height == 0 || height >= TARGET_HEIGHT {
        return (u64::from(width), u64::from(height));
    }
    let scale = f64::from(TARGET_HEIGHT) / f64::from(height);
    let new_width = ((f64::from(width) * scale) as u64).max(1);
    (new_width, u64::from(TARGET_HEIGHT))
}

/// Refuse images whose original or normalized size exceeds [`MAX_PIXELS`]
pub fn check_dimensions(width: u32, height: u32) -> Result<(), OcrError> {
    let (new_width, new_height) = normalized_dimensions(width, height);
    let original = u64::from(width) * u64::from(height);
    if original > MAX_PIXELS || new_width * new_height > MAX_PIXELS {
        return Err(OcrError::ImageTooLarge {
            width: new_width,
            height: new_height,
        });
    }
    Ok(())
}

/// Upscale to [`TARGET_HEIGHT`] with cubic interpolation, keeping aspect ratio
pub fn normalize_height(gray: GrayImage) -> Result<GrayImage, OcrError> {
    let (width, height) = gray.dimensions();
    check_dimensions(width, height)?;
    if height == 0 || height >= TARGET_HEIGHT {
        return Ok(gray);
    }
    let (new_width, _) = normalized_dimensions(width, height);
    let new_width = u32::try_from(new_width).map_err(|_| OcrError::ImageTooLarge {
        width: new_width,
        height: u64::from(TARGET_HEIGHT),
    })?;
    Ok(image::imageops::resize(&gray, new_width, TARGET_HEIGHT, FilterType::CatmullRom))
}

fn prepared_gray(image: &DynamicImage) -> Result<GrayImage, OcrError> {
    check_dimensions(image.width(), image.height())?;
    normalize_height(to_grayscale(image))
}

/// Run one pipeline end to end
pub fn preprocess(image: &DynamicImage, method: PreprocessMethod) -> Result<GrayImage, OcrError> {
    let gray = prepared_gray(image)?;
    let out = match method {
        PreprocessMethod::Adaptive => {
            adaptive_from_denoised(&nl_means(&gray, NlMeansParams::default()))
        }
        PreprocessMethod::Otsu => otsu_from_denoised(&nl_means(&gray, NlMeansParams::default())),
        PreprocessMethod::Simple => simple(&gray),
    };
    Ok(out)
}

fn adaptive_from_denoised(denoised: &GrayImage) -> GrayImage {
    let contrast = clahe(denoised, 3.0, CLAHE_TILES, CLAHE_TILES);
    adaptive_gaussian(&contrast, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_C)
}

fn otsu_from_denoised(denoised: &GrayImage) -> GrayImage {
    otsu(&gaussian_blur(denoised, OTSU_BLUR_KSIZE))
}

fn simple(gray: &GrayImage) -> GrayImage {
    clahe(gray, 2.0, CLAHE_TILES, CLAHE_TILES)
}

/// All three variants of one upload.
///
/// `adaptive` and `otsu` start from the same denoised image, so it is
/// computed once.
#[derive(Debug, Clone)]
pub struct PreprocessedSet {
    pub adaptive: GrayImage,
    pub otsu: GrayImage,
    pub simple: GrayImage,
}

impl PreprocessedSet {
    pub fn build(image: &DynamicImage) -> Result<Self, OcrError> {
        let gray = prepared_gray(image)?;
        let denoised = nl_means(&gray, NlMeansParams::default());

        Ok(Self {
            adaptive: adaptive_from_denoised(&denoised),
            otsu: otsu_from_denoised(&denoised),
            simple: simple(&gray),
        })
    }

    pub fn get(&self, method: PreprocessMethod) -> &GrayImage {
        match method {
            PreprocessMethod::Adaptive => &self.adaptive,
            PreprocessMethod::Otsu => &self.otsu,
            PreprocessMethod::Simple => &self.simple,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn is_binary(image: &GrayImage) -> bool {
        image.pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    #[test]
    fn test_grayscale_weights() {
        let rgb = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        let gray = to_grayscale(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
    }

    #[test]
    fn test_normalize_height_upscales_short_images() {
        let gray = GrayImage::new(300, 200);
        let out = normalize_height(gray).unwrap();
        assert_eq!(out.dimensions(), (1500, 1000));
    }

    #[test]
    fn test_normalize_height_truncates_width() {
        let gray = GrayImage::new(10, 3);
        let out = normalize_height(gray).unwrap();
        // 10 * (1000 / 3) = 3333.33
        assert_eq!(out.dimensions(), (3333, 1000));
    }

    #[test]
    fn test_normalize_height_keeps_tall_images() {
        let gray = GrayImage::new(20, 1200);
        let out = normalize_height(gray).unwrap();
        assert_eq!(out.dimensions(), (20, 1200));
    }

    #[test]
    fn test_simple_is_not_binarized_but_sized() {
        let image =
            DynamicImage::ImageLuma8(GrayImage::from_fn(8, 4, |x, _| Luma([(x * 30) as u8])));
        let out = preprocess(&image, PreprocessMethod::Simple).unwrap();
        assert_eq!(out.height(), TARGET_HEIGHT);
        assert_eq!(out.width(), 2000);
        assert!(!is_binary(&out));
    }

    #[test]
    fn test_binarizing_methods_on_tall_image() {
        // Tall enough that no upscaling happens, narrow enough to stay fast.
        let image = DynamicImage::ImageLuma8(GrayImage::from_fn(6, 1000, |_, y| {
            if (y / 50) % 2 == 0 { Luma([30]) } else { Luma([220]) }
        }));
        for method in [PreprocessMethod::Adaptive, PreprocessMethod::Otsu] {
            let out = preprocess(&image, method).unwrap();
            assert_eq!(out.dimensions(), (6, 1000));
            assert!(is_binary(&out), "{} produced non-binary output", method);
        }
    }

    #[test]
    fn test_extreme_aspect_ratio_is_refused() {
        // 30000x8 upscales to 3_750_000x1000 pixels.
        let image = DynamicImage::ImageLuma8(GrayImage::new(30_000, 8));
        assert_eq!(normalized_dimensions(30_000, 8), (3_750_000, 1000));
        assert!(matches!(
            PreprocessedSet::build(&image),
            Err(OcrError::ImageTooLarge { width: 3_750_000, height: 1000 })
        ));
        assert!(matches!(
            preprocess(&image, PreprocessMethod::Simple),
            Err(OcrError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn test_pixel_ceiling_bounds() {
        assert!(check_dimensions(40_000, 1000).is_ok());
        assert!(check_dimensions(40_001, 1000).is_err());
        assert!(check_dimensions(8_000, 5_001).is_err());
        assert!(check_dimensions(400, 10).is_ok());
        assert!(check_dimensions(401, 10).is_err());
    }

    fn striped_page() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(6, 1000, |x, y| {
            Luma([((x * 37 + y * 11) % 256) as u8])
        }))
    }

    #[test]
    fn test_build_is_deterministic() {
        let image = striped_page();
        let first = PreprocessedSet::build(&image).unwrap();
        let second = PreprocessedSet::build(&image).unwrap();
        for method in PreprocessMethod::ALL {
            assert_eq!(first.get(method), second.get(method), "{} differs between runs", method);
        }
    }

    #[test]
    fn test_build_matches_single_pipelines() {
        let image = striped_page();
        let set = PreprocessedSet::build(&image).unwrap();
        for method in PreprocessMethod::ALL {
            let single = preprocess(&image, method).unwrap();
            assert_eq!(set.get(method), &single, "{} differs from its own pipeline", method);
        }
    }

    #[test]
    fn test_method_names() {
        let names: Vec<_> = PreprocessMethod::ALL.iter().map(|m| m.as_str()).collect();
        assert_eq!(names, vec!["adaptive", "otsu", "simple"]);
    }
}
