//! Deterministic scripted backends and a painted demo scene.
//!
//! The real tracker, plate detector and OCR engine live outside this
//! crate. This module scripts all three over a small procedurally painted
//! street scene, so `ingest` runs end to end with no model weights and
//! the integration tests get repeatable detector output.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use image::{GrayImage, Rgb, RgbImage};

use crate::capture::{Frame, FrameSource};
use crate::detector::{BBox, BoxDetection, PlateDetector, VehicleTrack, VehicleTracker};
use crate::ocr::{OcrCandidate, PlateReader};

// ─── Scripted detectors ──────────────────────────────────────────────────────

/// Tracker whose per-frame output is fixed up front.
#[derive(Default)]
pub struct ScriptedVehicles {
    by_frame: HashMap<u64, Vec<VehicleTrack>>,
}

impl ScriptedVehicles {
    pub fn new(by_frame: HashMap<u64, Vec<VehicleTrack>>) -> Self {
        Self { by_frame }
    }
}

impl VehicleTracker for ScriptedVehicles {
    fn track(&mut self, frame: &Frame) -> Result<Vec<VehicleTrack>> {
        Ok(self.by_frame.get(&frame.index).cloned().unwrap_or_default())
    }
}

/// Plate detector whose per-frame output is fixed up front.
#[derive(Default)]
pub struct ScriptedPlates {
    by_frame: HashMap<u64, Vec<BoxDetection>>,
}

impl ScriptedPlates {
    pub fn new(by_frame: HashMap<u64, Vec<BoxDetection>>) -> Self {
        Self { by_frame }
    }
}

impl PlateDetector for ScriptedPlates {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoxDetection>> {
        Ok(self.by_frame.get(&frame.index).cloned().unwrap_or_default())
    }
}

/// OCR engine that replays a queue of readings in order.
///
/// Each `read` call consumes one queued reading; once the queue runs dry
/// it returns no candidates. The shared counter lets callers assert how
/// often OCR actually ran after the engine has consumed this value.
pub struct ScriptedOcr {
    queue: VecDeque<Vec<OcrCandidate>>,
    calls: Arc<AtomicU64>,
}

impl ScriptedOcr {
    pub fn new(readings: Vec<Vec<OcrCandidate>>) -> Self {
        Self {
            queue: readings.into(),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.calls)
    }
}

impl PlateReader for ScriptedOcr {
    fn read(&mut self, _plate: &GrayImage) -> Result<Vec<OcrCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.queue.pop_front().unwrap_or_default())
    }
}

// ─── Painted demo scene ──────────────────────────────────────────────────────

const SCENE_FRAMES: u64 = 30;
const SCENE_WIDTH: u32 = 640;
const SCENE_HEIGHT: u32 = 480;
const SCENE_FPS: f64 = 30.0;
const ROAD_GRAY: Rgb<u8> = Rgb([105, 105, 105]);

const CAR_BBOX: BBox = (80, 160, 330, 360);
const CAR_PAINT: Rgb<u8> = Rgb([190, 40, 35]);
const PLATE_BBOX: BBox = (150, 300, 260, 336);
const PLATE_PAINT: Rgb<u8> = Rgb([245, 245, 245]);
const TRUCK_BBOX: BBox = (360, 140, 620, 380);
const TRUCK_PAINT: Rgb<u8> = Rgb([40, 60, 180]);
const TRUCK_ENTERS_AT: u64 = 12;
const PERSON_BBOX: BBox = (10, 40, 70, 220);
const PERSON_PAINT: Rgb<u8> = Rgb([84, 70, 60]);
const PERSON_LEAVES_AT: u64 = 7;
const PLATE_VISIBLE_THROUGH: u64 = 10;

/// 30-frame street scene: a red car carrying a bright plate, a blue truck
/// entering mid-video and a pedestrian the allow-list drops.
pub struct SceneSource {
    cursor: u64,
}

impl SceneSource {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }
}

impl Default for SceneSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SceneSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.cursor >= SCENE_FRAMES {
            return Ok(None);
        }
        let image = paint_frame(self.cursor);
        self.cursor += 1;
        Ok(Some(image))
    }

    fn fps(&self) -> f64 {
        SCENE_FPS
    }
}

fn paint_frame(index: u64) -> RgbImage {
    let mut image = RgbImage::from_pixel(SCENE_WIDTH, SCENE_HEIGHT, ROAD_GRAY);
    fill_rect(&mut image, CAR_BBOX, CAR_PAINT);
    fill_rect(&mut image, PLATE_BBOX, PLATE_PAINT);
    if index >= TRUCK_ENTERS_AT {
        fill_rect(&mut image, TRUCK_BBOX, TRUCK_PAINT);
    }
    if index < PERSON_LEAVES_AT {
        fill_rect(&mut image, PERSON_BBOX, PERSON_PAINT);
    }
    image
}

fn fill_rect(image: &mut RgbImage, bbox: BBox, color: Rgb<u8>) {
    let (w, h) = image.dimensions();
    let x1 = bbox.0.clamp(0, w as i32) as u32;
    let y1 = bbox.1.clamp(0, h as i32) as u32;
    let x2 = bbox.2.clamp(0, w as i32) as u32;
    let y2 = bbox.3.clamp(0, h as i32) as u32;
    for y in y1..y2 {
        for x in x1..x2 {
            image.put_pixel(x, y, color);
        }
    }
}

/// Frame source for `ingest` runs without a configured frame directory.
pub fn demo_source() -> SceneSource {
    SceneSource::new()
}

/// Scripted detector trio matching [`demo_source`]'s scene.
///
/// The plate detector reports the plate for the first eleven frames only,
/// so later samples exercise the per-track plate cache. The one queued OCR
/// reading is deliberately messy: a spaced-out plate string plus a short
/// high-confidence fragment the length filter must drop.
pub fn demo_detectors() -> (ScriptedVehicles, ScriptedPlates, ScriptedOcr) {
    let mut vehicles: HashMap<u64, Vec<VehicleTrack>> = HashMap::new();
    let mut plates: HashMap<u64, Vec<BoxDetection>> = HashMap::new();

    for index in 0..SCENE_FRAMES {
        let mut tracks = vec![VehicleTrack {
            track_id: 1,
            label: "car".into(),
            bbox: CAR_BBOX,
            confidence: 0.88,
        }];
        if index >= TRUCK_ENTERS_AT {
            tracks.push(VehicleTrack {
                track_id: 2,
                label: "truck".into(),
                bbox: TRUCK_BBOX,
                confidence: 0.81,
            });
        }
        if index < PERSON_LEAVES_AT {
            tracks.push(VehicleTrack {
                track_id: 3,
                label: "person".into(),
                bbox: PERSON_BBOX,
                confidence: 0.74,
            });
        }
        vehicles.insert(index, tracks);

        if index <= PLATE_VISIBLE_THROUGH {
            plates.insert(
                index,
                vec![BoxDetection {
                    bbox: PLATE_BBOX,
                    confidence: 0.76,
                }],
            );
        }
    }

    let ocr = ScriptedOcr::new(vec![vec![
        OcrCandidate {
            text: "KA 01 AB 1234".into(),
            confidence: 0.88,
        },
        OcrCandidate {
            text: "KA".into(),
            confidence: 0.93,
        },
    ]]);

    (
        ScriptedVehicles::new(vehicles),
        ScriptedPlates::new(plates),
        ocr,
    )
}
