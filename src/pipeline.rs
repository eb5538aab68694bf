//! Detection fusion engine.
//!
//! Per sampled frame: pull tracked vehicles and plate boxes, filter by the
//! vehicle allow-list, resolve color and plate through the track-scoped
//! cache, and emit one event per qualifying vehicle. Processing is
//! frame-major, vehicle-minor, single-threaded — one frame finishes before
//! the next is read — and the emitted order is final.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::associate;
use crate::cache::TrackCache;
use crate::capture::{Frame, FrameSampler, FrameSource};
use crate::color::classify_color;
use crate::detector::{BoxDetection, PlateDetector, VehicleClass, VehicleTrack, VehicleTracker};
use crate::imaging::{prepare_plate_crop, safe_crop};
use crate::ocr::{select_best, PlateReader};

/// One output record. Immutable once emitted. `license_plate` is `""`
/// until a plate is read for the track — never null — and `color` carries
/// its own `"unknown"` sentinel, so the two stay distinguishable
/// downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub track_id: i64,
    pub frame_id: u64,
    pub timestamp: f64,
    pub label: String,
    pub confidence: f32,
    pub bbox: [i32; 4],
    pub color: String,
    pub license_plate: String,
}

/// Orchestrates the external capabilities against the injected cache.
pub struct FusionEngine<V, P, R> {
    vehicles: V,
    plates: P,
    ocr: R,
    cache: TrackCache,
    frames_processed: u64,
    frames_without_tracks: u64,
}

impl<V, P, R> FusionEngine<V, P, R>
where
    V: VehicleTracker,
    P: PlateDetector,
    R: PlateReader,
{
    pub fn new(vehicles: V, plates: P, ocr: R, cache: TrackCache) -> Self {
        Self {
            vehicles,
            plates,
            ocr,
            cache,
            frames_processed: 0,
            frames_without_tracks: 0,
        }
    }

    pub fn cache(&self) -> &TrackCache {
        &self.cache
    }

    /// Drain the sampler and return every emitted event in order.
    pub fn run<S: FrameSource>(&mut self, sampler: &mut FrameSampler<S>) -> Vec<DetectionEvent> {
        let mut events = Vec::new();
        while let Some(frame) = sampler.next_sampled() {
            self.frames_processed += 1;
            events.extend(self.process_frame(&frame));
        }
        info!(
            "Fusion done: {} sampled frames ({} without tracks), {} events, {} tracks colored, {} plates read",
            self.frames_processed,
            self.frames_without_tracks,
            events.len(),
            self.cache.colors.len(),
            self.cache.plates.len(),
        );
        events
    }

    /// Fuse one frame. A failing external call is absorbed as "this stage
    /// yielded nothing" so a single bad frame never kills the run.
    pub fn process_frame(&mut self, frame: &Frame) -> Vec<DetectionEvent> {
        let tracks = match self.vehicles.track(frame) {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("Vehicle tracker failed on frame {}: {}", frame.index, e);
                return Vec::new();
            }
        };

        let plate_boxes = match self.plates.detect(frame) {
            Ok(boxes) => boxes,
            Err(e) => {
                warn!("Plate detector failed on frame {}: {}", frame.index, e);
                Vec::new()
            }
        };

        // No active tracks: skip the whole frame. The plate boxes just
        // detected are discarded unused.
        if tracks.is_empty() {
            self.frames_without_tracks += 1;
            debug!("Frame {}: no active tracks, skipping", frame.index);
            return Vec::new();
        }

        let mut events = Vec::new();
        for vehicle in &tracks {
            let Some(class) = VehicleClass::from_label(&vehicle.label) else {
                debug!(
                    "Frame {}: dropping '{}' (track {})",
                    frame.index, vehicle.label, vehicle.track_id
                );
                continue;
            };

            let color = self.cache.colors.get_or_compute(vehicle.track_id, || {
                classify_color(safe_crop(&frame.image, vehicle.bbox).as_ref()).to_string()
            });

            let cached_plate = self
                .cache
                .plates
                .get(vehicle.track_id)
                .map(str::to_string);
            let license_plate = match cached_plate {
                Some(plate) => plate,
                None => self.resolve_plate(frame, vehicle, &plate_boxes),
            };

            events.push(DetectionEvent {
                track_id: vehicle.track_id,
                frame_id: frame.index,
                timestamp: frame.timestamp,
                label: class.as_str().to_string(),
                confidence: vehicle.confidence,
                bbox: [
                    vehicle.bbox.0,
                    vehicle.bbox.1,
                    vehicle.bbox.2,
                    vehicle.bbox.3,
                ],
                color,
                license_plate,
            });
        }
        events
    }

    /// Try the frame's plate boxes in reported order: the first one fully
    /// contained in the vehicle box that also yields usable OCR wins and
    /// is written to the cache. Everything else returns the empty-string
    /// sentinel for this frame.
    fn resolve_plate(
        &mut self,
        frame: &Frame,
        vehicle: &VehicleTrack,
        plate_boxes: &[BoxDetection],
    ) -> String {
        for candidate in plate_boxes {
            if !associate::contains(vehicle.bbox, candidate.bbox) {
                continue;
            }
            let Some(prepared) = prepare_plate_crop(&frame.image, candidate.bbox) else {
                continue;
            };
            let readings = match self.ocr.read(&prepared) {
                Ok(readings) => readings,
                Err(e) => {
                    warn!(
                        "OCR failed for track {} on frame {}: {}",
                        vehicle.track_id, frame.index, e
                    );
                    continue;
                }
            };
            if let Some(text) = select_best(&readings) {
                debug!(
                    "Frame {}: track {} plate resolved to {}",
                    frame.index, vehicle.track_id, text
                );
                self.cache.plates.insert(vehicle.track_id, text.clone());
                return text;
            }
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use crate::ocr::OcrCandidate;
    use image::RgbImage;

    fn frame(index: u64) -> Frame {
        Frame {
            index,
            timestamp: index as f64 / 30.0,
            image: RgbImage::from_pixel(200, 200, image::Rgb([100, 100, 100])),
        }
    }

    struct FixedTracks(Vec<VehicleTrack>);
    impl VehicleTracker for FixedTracks {
        fn track(&mut self, _frame: &Frame) -> Result<Vec<VehicleTrack>> {
            Ok(self.0.clone())
        }
    }

    struct FailingTracker;
    impl VehicleTracker for FailingTracker {
        fn track(&mut self, _frame: &Frame) -> Result<Vec<VehicleTrack>> {
            anyhow::bail!("model crashed")
        }
    }

    struct FixedPlates(Vec<BoxDetection>);
    impl PlateDetector for FixedPlates {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<BoxDetection>> {
            Ok(self.0.clone())
        }
    }

    struct NoOcr;
    impl PlateReader for NoOcr {
        fn read(&mut self, _plate: &image::GrayImage) -> Result<Vec<OcrCandidate>> {
            Ok(Vec::new())
        }
    }

    fn track(id: i64, label: &str) -> VehicleTrack {
        VehicleTrack {
            track_id: id,
            label: label.to_string(),
            bbox: (10, 10, 190, 190),
            confidence: 0.9,
        }
    }

    #[test]
    fn non_vehicle_labels_are_dropped() {
        let mut engine = FusionEngine::new(
            FixedTracks(vec![track(1, "person"), track(2, "Car")]),
            FixedPlates(Vec::new()),
            NoOcr,
            TrackCache::new(),
        );
        let events = engine.process_frame(&frame(0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].track_id, 2);
        assert_eq!(events[0].label, "car");
    }

    #[test]
    fn tracker_failure_is_absorbed() {
        let mut engine = FusionEngine::new(
            FailingTracker,
            FixedPlates(Vec::new()),
            NoOcr,
            TrackCache::new(),
        );
        assert!(engine.process_frame(&frame(0)).is_empty());
        assert!(engine.cache().colors.is_empty());
    }

    #[test]
    fn degenerate_vehicle_box_emits_unknown_color_without_caching() {
        let mut vehicle = track(4, "car");
        vehicle.bbox = (50, 50, 50, 120); // zero width
        let mut engine = FusionEngine::new(
            FixedTracks(vec![vehicle]),
            FixedPlates(Vec::new()),
            NoOcr,
            TrackCache::new(),
        );
        let events = engine.process_frame(&frame(0));
        assert_eq!(events[0].color, "unknown");
        // Not cached: a later frame with a valid box may still resolve it.
        assert!(engine.cache().colors.is_empty());
    }

    #[test]
    fn no_usable_ocr_leaves_the_empty_sentinel() {
        let mut engine = FusionEngine::new(
            FixedTracks(vec![track(6, "car")]),
            FixedPlates(vec![BoxDetection {
                bbox: (40, 120, 160, 150),
                confidence: 0.7,
            }]),
            NoOcr,
            TrackCache::new(),
        );
        let events = engine.process_frame(&frame(0));
        assert_eq!(events[0].license_plate, "");
        assert!(engine.cache().plates.is_empty());
    }

    #[test]
    fn plate_outside_vehicle_is_not_associated() {
        struct CountingOcr(u32);
        impl PlateReader for CountingOcr {
            fn read(&mut self, _plate: &image::GrayImage) -> Result<Vec<OcrCandidate>> {
                self.0 += 1;
                Ok(vec![OcrCandidate {
                    text: "ZZ999".into(),
                    confidence: 0.9,
                }])
            }
        }
        let mut vehicle = track(8, "truck");
        vehicle.bbox = (0, 0, 100, 100);
        let mut engine = FusionEngine::new(
            FixedTracks(vec![vehicle]),
            // Exceeds x2 — partial overlap must not reach OCR.
            FixedPlates(vec![BoxDetection {
                bbox: (90, 10, 120, 50),
                confidence: 0.7,
            }]),
            CountingOcr(0),
            TrackCache::new(),
        );
        let events = engine.process_frame(&frame(0));
        assert_eq!(events[0].license_plate, "");
        assert_eq!(engine.ocr.0, 0);
    }
}
