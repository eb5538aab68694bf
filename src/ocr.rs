//! OCR capability trait and candidate selection.
//!
//! The text-recognition engine is external; it hands back zero or more
//! `(text, confidence)` readings for one prepared crop. Selection reduces
//! those to a single usable string or nothing.

use anyhow::Result;
use image::GrayImage;

/// Readings shorter than this after normalization are OCR noise.
const MIN_PLATE_LEN: usize = 3;

/// One raw reading from the text-recognition engine.
#[derive(Debug, Clone)]
pub struct OcrCandidate {
    pub text: String,
    pub confidence: f32,
}

/// Text-recognition capability over a prepared single-channel crop.
pub trait PlateReader {
    fn read(&mut self, plate: &GrayImage) -> Result<Vec<OcrCandidate>>;
}

/// Uppercase and strip all whitespace.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Pick the best usable reading: normalize, drop anything shorter than
/// three characters, then take the strictly highest confidence. Ties keep
/// the earliest candidate (`>` not `>=`). `None` when nothing survives.
pub fn select_best(candidates: &[OcrCandidate]) -> Option<String> {
    let mut best_text = String::new();
    let mut best_score = 0.0f32;

    for candidate in candidates {
        let text = normalize(&candidate.text);
        if text.chars().count() >= MIN_PLATE_LEN && candidate.confidence > best_score {
            best_text = text;
            best_score = candidate.confidence;
        }
    }

    if best_text.is_empty() {
        None
    } else {
        Some(best_text)
    }
}
