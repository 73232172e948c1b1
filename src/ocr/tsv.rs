//! Tesseract TSV output parsing
//!
//! `tesseract <image> stdout tsv` prints one row per layout element
//! (page, block, paragraph, line, word) with its box and confidence.
//! Non-word rows carry the `-1` confidence sentinel.

use serde::Serialize;

use super::types::round2;

/// Minimum number of columns in a TSV data row
pub const TSV_MIN_FIELDS: usize = 11;

/// Layout level of word rows
pub const TSV_WORD_LEVEL: u32 = 5;

/// Confidence value meaning "no confidence"
pub const NO_CONFIDENCE: f64 = -1.0;

/// One row of the engine's per-token table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrToken {
    pub level: u32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f64,
    pub text: String,
}

/// Parse TSV output, skipping the header and malformed rows
pub fn parse_tsv(tsv_data: &str) -> Vec<OcrToken> {
    let mut tokens = Vec::new();

    for (line_num, line) in tsv_data.lines().enumerate() {
        if line_num == 0 && line.starts_with("level") {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < TSV_MIN_FIELDS {
            continue;
        }

        let Ok(level) = fields[0].trim().parse::<u32>() else {
            continue;
        };

        tokens.push(OcrToken {
            level,
            left: fields[6].trim().parse().unwrap_or(0),
            top: fields[7].trim().parse().unwrap_or(0),
            width: fields[8].trim().parse().unwrap_or(0),
            height: fields[9].trim().parse().unwrap_or(0),
            confidence: fields[10].trim().parse().unwrap_or(NO_CONFIDENCE),
            text: fields.get(11).map(|t| t.trim().to_string()).unwrap_or_default(),
        });
    }

    tokens
}

/// Mean of the token confidences that are positive once truncated to integers.
///
/// Sentinel (`-1`) and zero entries are excluded; the result is rounded to
/// two decimals and is 0 when nothing qualifies.
pub fn average_confidence(tokens: &[OcrToken]) -> f64 {
    let confidences: Vec<i64> = tokens
        .iter()
        .map(|t| t.confidence.trunc() as i64)
        .filter(|c| *c > 0)
        .collect();

    if confidences.is_empty() {
        return 0.0;
    }
    let sum: i64 = confidences.iter().sum();
    round2(sum as f64 / confidences.len() as f64)
}
