//! Coarse text-region detection
//!
//! Counts dark connected blobs in the original upload. The count is reported
//! to the caller as `regions_count` and never influences recognition.

use image::{DynamicImage, GrayImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use serde::Serialize;

use crate::preprocess::{binary_inverted, to_grayscale};

/// Pixels at or below this intensity count as ink
pub const INK_THRESHOLD: u8 = 150;

/// Contours must enclose strictly more than this many square pixels
pub const MIN_REGION_AREA: f64 = 100.0;

/// Axis-aligned bounding box of a detected region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Bounding boxes of the outermost ink contours larger than [`MIN_REGION_AREA`]
pub fn detect_text_regions(image: &DynamicImage) -> Vec<Region> {
    detect_in_gray(&to_grayscale(image))
}

/// Number of regions [`detect_text_regions`] would return
pub fn count_text_regions(image: &DynamicImage) -> usize {
    detect_text_regions(image).len()
}

fn detect_in_gray(gray: &GrayImage) -> Vec<Region> {
    let ink = binary_inverted(gray, INK_THRESHOLD);
    let contours: Vec<Contour<i32>> = find_contours(&ink);

    contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| polygon_area(c) > MIN_REGION_AREA)
        .filter_map(bounding_rect)
        .collect()
}

/// Shoelace area of the contour's point chain
fn polygon_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y);
    }
    (twice_area as f64 / 2.0).abs()
}

fn bounding_rect(contour: &Contour<i32>) -> Option<Region> {
    let min_x = contour.points.iter().map(|p| p.x).min()?;
    let max_x = contour.points.iter().map(|p| p.x).max()?;
    let min_y = contour.points.iter().map(|p| p.y).min()?;
    let max_y = contour.points.iter().map(|p| p.y).max()?;

    Some(Region {
        x: min_x as u32,
        y: min_y as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}
