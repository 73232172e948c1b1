//! Non-local means denoising for 8-bit grayscale images
//!
//! Every pixel becomes a weighted average of the pixels in its search window,
//! weighted by how similar their surrounding template patches are. Patch
//! distances are computed one search offset at a time with running box sums,
//! so the cost is `O(pixels * search²)` independent of the template size.

use image::GrayImage;

/// Weights below this are treated as zero
const WEIGHT_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, Copy)]
pub struct NlMeansParams {
    /// Filter strength; larger removes more noise (and detail)
    pub h: f32,
    /// Odd side of the compared patches
    pub template_window: usize,
    /// Odd side of the area searched for similar patches
    pub search_window: usize,
}

impl Default for NlMeansParams {
    fn default() -> Self {
        Self {
            h: 10.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

pub fn nl_means(image: &GrayImage, params: NlMeansParams) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return image.clone();
    }

    let tr = params.template_window / 2;
    let sr = params.search_window / 2;
    let border = tr + sr;
    let padded = Padded::new(image, border);

    let template_area = (params.template_window * params.template_window) as f64;
    let h2 = f64::from(params.h) * f64::from(params.h);
    let weights = weight_table(template_area, h2);

    let dw = w + 2 * tr;
    let dh = h + 2 * tr;
    let mut diff = vec![0u32; dw * dh];
    let mut row_sums = vec![0u32; dh * w];
    let mut acc = vec![0f64; w * h];
    let mut weight_sum = vec![0f64; w * h];

    for dy in -(sr as isize)..=(sr as isize) {
        for dx in -(sr as isize)..=(sr as isize) {
            // squared difference between the image and its shifted copy,
            // over the image extended by the template radius
            for y in 0..dh {
                let py = y + sr;
                let qy = (py as isize + dy) as usize;
                for x in 0..dw {
                    let px = x + sr;
                    let qx = (px as isize + dx) as usize;
                    let d = i32::from(padded.get(px, py)) - i32::from(padded.get(qx, qy));
                    diff[y * dw + x] = (d * d) as u32;
                }
            }

            // horizontal template sums
            for y in 0..dh {
                let row = &diff[y * dw..(y + 1) * dw];
                let mut sum: u32 = row[..params.template_window].iter().sum();
                row_sums[y * w] = sum;
                for x in 1..w {
                    sum = sum + row[x + 2 * tr] - row[x - 1];
                    row_sums[y * w + x] = sum;
                }
            }

            // vertical template sums, then accumulate
            for x in 0..w {
                let mut ssd: u32 = (0..params.template_window)
                    .map(|y| row_sums[y * w + x])
                    .sum();
                for y in 0..h {
                    if y > 0 {
                        ssd = ssd + row_sums[(y + 2 * tr) * w + x] - row_sums[(y - 1) * w + x];
                    }
                    let weight = weights.get(ssd as usize).copied().unwrap_or(0.0);
                    if weight > 0.0 {
                        let qx = (x + border) as isize + dx;
                        let qy = (y + border) as isize + dy;
                        let value = padded.get(qx as usize, qy as usize);
                        acc[y * w + x] += weight * f64::from(value);
                        weight_sum[y * w + x] += weight;
                    }
                }
            }
        }
    }

    // The zero offset always contributes weight 1, so weight_sum > 0.
    let out: Vec<u8> = acc
        .iter()
        .zip(weight_sum.iter())
        .map(|(a, s)| (a / s).round().clamp(0.0, 255.0) as u8)
        .collect();

    GrayImage::from_raw(width, height, out).unwrap_or_else(|| image.clone())
}

/// `exp(-(ssd / template_area) / h²)` indexed by patch SSD, cut off at the threshold
fn weight_table(template_area: f64, h2: f64) -> Vec<f64> {
    let max_ssd = (-(WEIGHT_THRESHOLD.ln()) * h2 * template_area).ceil() as usize;
    (0..=max_ssd)
        .map(|ssd| {
            let weight = (-(ssd as f64 / template_area) / h2).exp();
            if weight < WEIGHT_THRESHOLD {
                0.0
            } else {
                weight
            }
        })
        .collect()
}

/// Image copy with a reflected (`dcb|abcd|cba`) border
struct Padded {
    data: Vec<u8>,
    stride: usize,
}

impl Padded {
    fn new(image: &GrayImage, border: usize) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 2 * border;
        let rows = h + 2 * border;
        let src = image.as_raw();

        let mut data = vec![0u8; stride * rows];
        for y in 0..rows {
            let sy = reflect(y as isize - border as isize, h);
            for x in 0..stride {
                let sx = reflect(x as isize - border as isize, w);
                data[y * stride + x] = src[sy * w + sx];
            }
        }
        Self { data, stride }
    }

    #[inline]
    fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.stride + x]
    }
}

fn reflect(i: isize, len: usize) -> usize {
    let n = len as isize;
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn small_params() -> NlMeansParams {
        NlMeansParams {
            h: 10.0,
            template_window: 3,
            search_window: 7,
        }
    }

    #[test]
    fn test_flat_image_unchanged() {
        let image = GrayImage::from_pixel(12, 9, Luma([77]));
        let out = nl_means(&image, NlMeansParams::default());
        assert_eq!(out, image);
    }

    #[test]
    fn test_reduces_isolated_noise() {
        let mut image = GrayImage::from_pixel(16, 16, Luma([100]));
        image.put_pixel(8, 8, Luma([110]));
        let out = nl_means(&image, small_params());
        let center = out.get_pixel(8, 8)[0];
        assert!(center < 110, "center stayed {}", center);
        assert!(center >= 100);
    }

    #[test]
    fn test_preserves_strong_edge() {
        let image =
            GrayImage::from_fn(20, 20, |x, _| if x < 10 { Luma([20]) } else { Luma([230]) });
        let out = nl_means(&image, small_params());
        assert!(out.get_pixel(2, 10)[0] < 40);
        assert!(out.get_pixel(17, 10)[0] > 210);
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(-1, 5), 1);
        assert_eq!(reflect(5, 5), 3);
        assert_eq!(reflect(-12, 5), 4);
        assert_eq!(reflect(3, 1), 0);
    }

    #[test]
    fn test_weight_table_cutoff() {
        let table = weight_table(49.0, 100.0);
        assert_eq!(table[0], 1.0);
        assert!(table.last().copied().unwrap_or(0.0) < 0.0011);
    }
}
