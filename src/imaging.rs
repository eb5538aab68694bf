//! Crop and enhancement utilities.
//!
//! Everything here is bounds-safe: detector boxes routinely poke outside
//! the frame, so crops are clamped first and degenerate regions come back
//! as `None` rather than panicking mid-run.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};

use crate::detector::BBox;

/// Plates shorter than this are upscaled before OCR; small crops otherwise
/// read unreliably.
const MIN_OCR_HEIGHT: u32 = 40;

/// Clamp `bbox` to the frame and return the crop, or `None` if the clamped
/// region has zero area.
pub fn safe_crop(frame: &RgbImage, bbox: BBox) -> Option<RgbImage> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let (w, h) = (width as i32, height as i32);

    let x1 = bbox.0.clamp(0, w - 1);
    let x2 = bbox.2.clamp(0, w);
    let y1 = bbox.1.clamp(0, h - 1);
    let y2 = bbox.3.clamp(0, h);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let crop = imageops::crop_imm(
        frame,
        x1 as u32,
        y1 as u32,
        (x2 - x1) as u32,
        (y2 - y1) as u32,
    );
    Some(crop.to_image())
}

/// Turn a plate box into the single-channel image the OCR engine reads:
/// clamped crop, grayscale, integer upscale for small plates, Otsu
/// binarization. `None` when the region is degenerate — the caller treats
/// that as "no candidate".
pub fn prepare_plate_crop(frame: &RgbImage, bbox: BBox) -> Option<GrayImage> {
    let crop = safe_crop(frame, bbox)?;
    let mut gray = imageops::grayscale(&crop);

    let (gw, gh) = gray.dimensions();
    if gh < MIN_OCR_HEIGHT {
        let scale = (MIN_OCR_HEIGHT / gh).max(2);
        gray = imageops::resize(&gray, gw * scale, gh * scale, FilterType::Triangle);
    }

    let level = otsu_level(&gray);
    Some(threshold(&gray, level, ThresholdType::Binary))
}
