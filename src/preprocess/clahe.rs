//! Contrast-limited adaptive histogram equalization

use image::GrayImage;

const BINS: usize = 256;

/// CLAHE over a `tiles_x`×`tiles_y` grid.
///
/// Each tile gets a clipped, redistributed histogram turned into a lookup
/// table; output pixels bilinearly blend the four nearest tile tables.
pub fn clahe(image: &GrayImage, clip_limit: f64, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let tiles_x = tiles_x.clamp(1, width) as usize;
    let tiles_y = tiles_y.clamp(1, height) as usize;
    let (w, h) = (width as usize, height as usize);
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);
    let src = image.as_raw();

    let mut luts = vec![[0u8; BINS]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = (tx * tile_w).min(w);
            let y0 = (ty * tile_h).min(h);
            let x1 = ((tx + 1) * tile_w).min(w);
            let y1 = ((ty + 1) * tile_h).min(h);

            let mut hist = [0u32; BINS];
            for y in y0..y1 {
                for &v in &src[y * w + x0..y * w + x1] {
                    hist[v as usize] += 1;
                }
            }
            let area = ((x1 - x0) * (y1 - y0)).max(1);
            luts[ty * tiles_x + tx] = tile_lut(&mut hist, area, clip_limit);
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        let fy = y as f32 / tile_h as f32 - 0.5;
        let ty1 = fy.floor();
        let ya = fy - ty1;
        let ty2 = (ty1 as isize + 1).min(tiles_y as isize - 1).max(0) as usize;
        let ty1 = (ty1 as isize).max(0) as usize;

        for x in 0..w {
            let fx = x as f32 / tile_w as f32 - 0.5;
            let tx1 = fx.floor();
            let xa = fx - tx1;
            let tx2 = (tx1 as isize + 1).min(tiles_x as isize - 1).max(0) as usize;
            let tx1 = (tx1 as isize).max(0) as usize;

            let v = src[y * w + x] as usize;
            let top = f32::from(luts[ty1 * tiles_x + tx1][v]) * (1.0 - xa)
                + f32::from(luts[ty1 * tiles_x + tx2][v]) * xa;
            let bottom = f32::from(luts[ty2 * tiles_x + tx1][v]) * (1.0 - xa)
                + f32::from(luts[ty2 * tiles_x + tx2][v]) * xa;
            let value = top * (1.0 - ya) + bottom * ya;

            out[y * w + x] = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    GrayImage::from_raw(width, height, out).unwrap_or_else(|| image.clone())
}

/// Clip the histogram, spread the excess over all bins, return the CDF lookup
fn tile_lut(hist: &mut [u32; BINS], area: usize, clip_limit: f64) -> [u8; BINS] {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f64) / BINS as f64).max(1.0) as u32;
        let mut clipped = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                clipped += *bin - limit;
                *bin = limit;
            }
        }

        let batch = clipped / BINS as u32;
        let mut residual = (clipped - batch * BINS as u32) as usize;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (BINS / residual).max(1);
            let mut i = 0;
            while i < BINS && residual > 0 {
                hist[i] += 1;
                residual -= 1;
                i += step;
            }
        }
    }

    let scale = 255.0 / area as f64;
    let mut lut = [0u8; BINS];
    let mut sum = 0u64;
    for (i, bin) in hist.iter().enumerate() {
        sum += u64::from(*bin);
        lut[i] = (sum as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
