//! ONNX Runtime text reader
//!
//! PaddleOCR-format models: a DB text detector producing a probability map
//! and a CRNN line recognizer decoded with greedy CTC.

use std::fs;
use std::path::Path;

use image::{imageops::FilterType, DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use ndarray::{Array, Array4};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;

use super::neural::TextReader;
use super::types::{Detection, OcrError, Point};
use crate::config::OnnxModelConfig;

/// Longest side fed to the detector
const DET_LIMIT_SIDE: u32 = 960;
const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];
/// Probability above which a pixel belongs to text
const DET_THRESHOLD: f32 = 0.3;
/// Minimum mean probability of a kept box
const DET_BOX_THRESHOLD: f32 = 0.6;
const DET_UNCLIP_RATIO: f32 = 1.5;
const DET_MIN_SIDE: f32 = 3.0;

const REC_HEIGHT: u32 = 48;
const REC_MAX_WIDTH: u32 = 320;

/// Boxes whose tops differ by less than this are read left to right
const LINE_TOLERANCE: f32 = 10.0;

/// Detector + recognizer sessions
pub struct OnnxTextReader {
    detector: Mutex<Session>,
    recognizer: Mutex<Session>,
    /// CTC vocabulary: blank at 0, dictionary, trailing space
    keys: Vec<String>,
}

impl std::fmt::Debug for OnnxTextReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxTextReader")
            .field("detector", &"<Session>")
            .field("recognizer", &"<Session>")
            .field("keys", &self.keys.len())
            .finish()
    }
}

fn engine_error(e: impl std::fmt::Display) -> OcrError {
    OcrError::Engine(e.to_string())
}

fn load_session(path: &Path) -> Result<Session, OcrError> {
    if !path.exists() {
        return Err(OcrError::EngineUnavailable(format!(
            "model not found: {}",
            path.display()
        )));
    }
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|b| b.with_intra_threads(threads))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| OcrError::EngineUnavailable(format!("{}: {}", path.display(), e)))
}

impl OnnxTextReader {
    pub fn from_config(config: &OnnxModelConfig) -> Result<Self, OcrError> {
        let detector = load_session(&config.detection_model)?;
        let recognizer = load_session(&config.recognition_model)?;
        let dictionary = fs::read_to_string(&config.character_dict).map_err(|e| {
            OcrError::EngineUnavailable(format!("{}: {}", config.character_dict.display(), e))
        })?;

        tracing::info!(
            detector = %config.detection_model.display(),
            recognizer = %config.recognition_model.display(),
            "Loaded ONNX OCR models"
        );

        Ok(Self {
            detector: Mutex::new(detector),
            recognizer: Mutex::new(recognizer),
            keys: ctc_keys(&dictionary),
        })
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<[Point; 4]>, OcrError> {
        let (width, height) = image.dimensions();
        let (det_w, det_h) = detector_size(width, height);
        let resized = image::imageops::resize(image, det_w, det_h, FilterType::Triangle);
        let input = normalized_tensor(&resized, DET_MEAN, DET_STD);

        let (map_w, map_h, probabilities) = {
            let shape = input.shape().to_vec();
            let (data, _) = input.into_raw_vec_and_offset();
            let value = Value::from_array((shape.as_slice(), data)).map_err(engine_error)?;

            let mut session = self.detector.lock();
            let outputs = session
                .run(ort::inputs!["x" => value])
                .map_err(engine_error)?;
            let (out_shape, out_data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(engine_error)?;
            // [1, 1, H, W]
            let map_h = out_shape[2] as u32;
            let map_w = out_shape[3] as u32;
            (map_w, map_h, out_data.to_vec())
        };

        let boxes = boxes_from_probability_map(&probabilities, map_w, map_h);
        let scale_x = width as f32 / map_w as f32;
        let scale_y = height as f32 / map_h as f32;

        Ok(boxes
            .into_iter()
            .map(|b| {
                let x0 = (b.left * scale_x).clamp(0.0, width as f32 - 1.0);
                let y0 = (b.top * scale_y).clamp(0.0, height as f32 - 1.0);
                let x1 = (b.right * scale_x).clamp(0.0, width as f32 - 1.0);
                let y1 = (b.bottom * scale_y).clamp(0.0, height as f32 - 1.0);
                [
                    Point { x: x0, y: y0 },
                    Point { x: x1, y: y0 },
                    Point { x: x1, y: y1 },
                    Point { x: x0, y: y1 },
                ]
            })
            .collect())
    }

    fn recognize_line(&self, line: &RgbImage) -> Result<(String, f32), OcrError> {
        let (w, h) = line.dimensions();
        let target_w =
            ((REC_HEIGHT as f32 * w as f32 / h as f32).ceil() as u32).clamp(1, REC_MAX_WIDTH);
        let resized = image::imageops::resize(line, target_w, REC_HEIGHT, FilterType::Triangle);
        let input = normalized_tensor(&resized, [0.5; 3], [0.5; 3]);

        let (timesteps, vocab, logits) = {
            let shape = input.shape().to_vec();
            let (data, _) = input.into_raw_vec_and_offset();
            let value = Value::from_array((shape.as_slice(), data)).map_err(engine_error)?;

            let mut session = self.recognizer.lock();
            let outputs = session
                .run(ort::inputs!["x" => value])
                .map_err(engine_error)?;
            let (out_shape, out_data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(engine_error)?;
            // [1, T, V]
            (out_shape[1] as usize, out_shape[2] as usize, out_data.to_vec())
        };

        Ok(ctc_decode(&logits, timesteps, vocab, &self.keys))
    }
}

impl TextReader for OnnxTextReader {
    fn read_text(&self, image: &DynamicImage) -> Result<Vec<Detection>, OcrError> {
        let rgb = image.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Ok(Vec::new());
        }

        let mut detections = Vec::new();
        for polygon in self.detect(&rgb)? {
            let x = polygon[0].x as u32;
            let y = polygon[0].y as u32;
            let w = (polygon[2].x as u32).saturating_sub(x).max(1);
            let h = (polygon[2].y as u32).saturating_sub(y).max(1);
            let crop = image::imageops::crop_imm(&rgb, x, y, w, h).to_image();

            let (text, confidence) = self.recognize_line(&crop)?;
            if text.is_empty() {
                continue;
            }
            detections.push(Detection {
                polygon: polygon.to_vec(),
                text,
                confidence,
            });
        }

        tracing::debug!(count = detections.len(), "ONNX reader finished");
        Ok(detections)
    }
}

/// Vocabulary with the CTC blank inserted first and a space appended
fn ctc_keys(dictionary: &str) -> Vec<String> {
    let mut keys: Vec<String> = dictionary
        .lines()
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect();
    keys.insert(0, "#".to_string());
    keys.push(" ".to_string());
    keys
}

/// Greedy CTC decoding; confidence is the mean of the kept per-step maxima.
fn ctc_decode(logits: &[f32], timesteps: usize, vocab: usize, keys: &[String]) -> (String, f32) {
    let mut text = String::new();
    let mut scores = Vec::new();
    let mut last_index = 0;

    for t in 0..timesteps {
        let step = &logits[t * vocab..(t + 1) * vocab];
        let Some((index, value)) = step
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };

        if index > 0 && index < keys.len() && !(t > 0 && index == last_index) {
            text.push_str(&keys[index]);
            scores.push(*value);
        }
        last_index = index;
    }

    let confidence = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f32>() / scores.len() as f32
    };
    (text, confidence)
}

/// Detector input size: longest side capped, both sides multiples of 32
fn detector_size(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height) as f32;
    let ratio = if longest > DET_LIMIT_SIDE as f32 {
        DET_LIMIT_SIDE as f32 / longest
    } else {
        1.0
    };
    let round32 = |v: f32| (((v / 32.0).round() as u32) * 32).max(32);
    (round32(width as f32 * ratio), round32(height as f32 * ratio))
}

/// NCHW float tensor in BGR channel order, `(v / 255 - mean) / std`
fn normalized_tensor(image: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut tensor = Array::zeros((1, 3, h as usize, w as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            let source = 2 - c;
            let v = f32::from(pixel[source]) / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (v - mean[c]) / std[c];
        }
    }
    tensor
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TextBox {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

/// Expanded bounding boxes of confident text blobs, in reading order
fn boxes_from_probability_map(probabilities: &[f32], width: u32, height: u32) -> Vec<TextBox> {
    let mask = GrayImage::from_fn(width, height, |x, y| {
        let p = probabilities[(y * width + x) as usize];
        Luma([if p > DET_THRESHOLD { 255 } else { 0 }])
    });
    let contours: Vec<Contour<u32>> = find_contours(&mask);

    let mut boxes: Vec<TextBox> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(|c| {
            let left = c.points.iter().map(|p| p.x).min()?;
            let right = c.points.iter().map(|p| p.x).max()?;
            let top = c.points.iter().map(|p| p.y).min()?;
            let bottom = c.points.iter().map(|p| p.y).max()?;

            let box_w = (right - left + 1) as f32;
            let box_h = (bottom - top + 1) as f32;
            if box_w.min(box_h) < DET_MIN_SIDE {
                return None;
            }
            let score = mean_probability(probabilities, width, (left, top), (right, bottom));
            if score < DET_BOX_THRESHOLD {
                return None;
            }

            let distance = box_w * box_h * DET_UNCLIP_RATIO / (2.0 * (box_w + box_h));
            Some(TextBox {
                left: (left as f32 - distance).max(0.0),
                top: (top as f32 - distance).max(0.0),
                right: (right as f32 + distance).min(width as f32 - 1.0),
                bottom: (bottom as f32 + distance).min(height as f32 - 1.0),
            })
        })
        .collect();

    sort_reading_order(&mut boxes);
    boxes
}

fn mean_probability(
    probabilities: &[f32],
    width: u32,
    (left, top): (u32, u32),
    (right, bottom): (u32, u32),
) -> f32 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for y in top..=bottom {
        for x in left..=right {
            sum += probabilities[(y * width + x) as usize];
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// Top to bottom; boxes on roughly the same line left to right
fn sort_reading_order(boxes: &mut [TextBox]) {
    boxes.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left)));
    for i in 0..boxes.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            let (upper, lower) = (boxes[j], boxes[j + 1]);
            if (lower.top - upper.top).abs() < LINE_TOLERANCE && lower.left < upper.left {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
}
