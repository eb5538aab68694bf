//! Detector-facing types and capability traits.
//!
//! The actual models (vehicle tracker, plate detector) are external: this
//! crate only consumes their output through the traits below, so tests and
//! the bundled demo substitute deterministic scripted backends.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use thiserror::Error;

use crate::capture::Frame;

/// Pixel-space box, `(x1, y1, x2, y2)`.
pub type BBox = (i32, i32, i32, i32);

/// Vehicle classes the fusion engine emits events for. Everything else the
/// tracker reports (pedestrians, bicycles, ...) is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleClass {
    Car,
    Truck,
    Bus,
    Motorcycle,
}

impl VehicleClass {
    pub const ALL: &'static [VehicleClass] = &[
        VehicleClass::Car,
        VehicleClass::Truck,
        VehicleClass::Bus,
        VehicleClass::Motorcycle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Truck => "truck",
            VehicleClass::Bus => "bus",
            VehicleClass::Motorcycle => "motorcycle",
        }
    }

    /// Allow-list lookup against the detector's label vocabulary,
    /// case-insensitive. `None` means "not a vehicle we report".
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.to_ascii_lowercase();
        Self::ALL.iter().copied().find(|c| c.as_str() == label)
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| LabelParseError(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("unknown vehicle label: {0}")]
pub struct LabelParseError(String);

/// One plate detection: box plus the detector's own confidence. Order in
/// the returned list is the detector's reported order and is significant —
/// the fusion engine tries candidates in exactly that order.
#[derive(Debug, Clone)]
pub struct BoxDetection {
    pub bbox: BBox,
    pub confidence: f32,
}

/// One tracked vehicle detection for a frame. `track_id` persistence across
/// frames is owned entirely by the external tracker.
#[derive(Debug, Clone)]
pub struct VehicleTrack {
    pub track_id: i64,
    /// Raw label from the tracker's vocabulary; filtered downstream via
    /// [`VehicleClass::from_label`].
    pub label: String,
    pub bbox: BBox,
    pub confidence: f32,
}

/// Vehicle detector + tracker capability.
pub trait VehicleTracker {
    fn track(&mut self, frame: &Frame) -> Result<Vec<VehicleTrack>>;
}

/// License-plate detector capability (no identity tracking).
pub trait PlateDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoxDetection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_is_case_insensitive() {
        assert_eq!(VehicleClass::from_label("Car"), Some(VehicleClass::Car));
        assert_eq!(VehicleClass::from_label("TRUCK"), Some(VehicleClass::Truck));
        assert_eq!(VehicleClass::from_label("bus"), Some(VehicleClass::Bus));
        assert_eq!(
            VehicleClass::from_label("Motorcycle"),
            Some(VehicleClass::Motorcycle)
        );
    }

    #[test]
    fn non_vehicles_are_rejected() {
        assert_eq!(VehicleClass::from_label("person"), None);
        assert_eq!(VehicleClass::from_label("bicycle"), None);
        assert_eq!(VehicleClass::from_label(""), None);
    }

    #[test]
    fn every_class_round_trips_through_its_label() {
        for class in VehicleClass::ALL {
            assert_eq!(VehicleClass::from_label(class.as_str()), Some(*class));
            assert_eq!(class.to_string(), class.as_str());
        }
    }

    #[test]
    fn parse_error_names_the_label() {
        let err = "tricycle".parse::<VehicleClass>().unwrap_err();
        assert_eq!(err.to_string(), "unknown vehicle label: tricycle");
    }
}
