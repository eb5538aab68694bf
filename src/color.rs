//! Dominant-color heuristic for vehicle crops.
//!
//! A cheap proxy, not a learned classifier: downsample, average the
//! channels, pick the strictly dominant one, otherwise band on brightness.
//! Deterministic and side-effect-free, so the fusion engine can cache the
//! first answer per track and never look again.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Crops are averaged at this fixed size regardless of input dimensions.
const SAMPLE_SIZE: u32 = 40;

const WHITE_BRIGHTNESS: f64 = 180.0;
const BLACK_BRIGHTNESS: f64 = 60.0;

/// Classify a vehicle crop into a closed label set. `None` or an empty
/// crop returns `"unknown"`.
pub fn classify_color(crop: Option<&RgbImage>) -> &'static str {
    let Some(crop) = crop else {
        return "unknown";
    };
    if crop.width() == 0 || crop.height() == 0 {
        return "unknown";
    }

    let small = imageops::resize(crop, SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle);
    let mut sums = [0.0f64; 3];
    for pixel in small.pixels() {
        sums[0] += f64::from(pixel[0]);
        sums[1] += f64::from(pixel[1]);
        sums[2] += f64::from(pixel[2]);
    }
    let n = f64::from(SAMPLE_SIZE * SAMPLE_SIZE);
    let (r, g, b) = (sums[0] / n, sums[1] / n, sums[2] / n);

    if r > g && r > b {
        return "red";
    }
    if g > r && g > b {
        return "green";
    }
    if b > r && b > g {
        return "blue";
    }

    let brightness = (r + g + b) / 3.0;
    if brightness > WHITE_BRIGHTNESS {
        "white"
    } else if brightness < BLACK_BRIGHTNESS {
        "black"
    } else {
        "other"
    }
}
