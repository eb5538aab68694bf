//! Track-scoped memoization of color and plate results.
//!
//! OCR and color classification are the expensive calls in the pipeline,
//! so each runs at most once per tracked vehicle: the first non-default
//! result for a track is kept for the rest of the run and never
//! overwritten, even if the upstream tracker wrongly merged identities.
//! The cache is an explicit object handed to the fusion engine, not
//! module state, and has no eviction — one run covers one finite video.

use std::collections::HashMap;

/// `track_id -> value` map where the first non-default write wins.
pub struct WriteOnceMap {
    default_value: String,
    entries: HashMap<i64, String>,
}

impl WriteOnceMap {
    pub fn new(default_value: impl Into<String>) -> Self {
        Self {
            default_value: default_value.into(),
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, track_id: i64) -> Option<&str> {
        self.entries.get(&track_id).map(String::as_str)
    }

    /// Store `value` for the track unless the slot is already taken or the
    /// value equals the default sentinel. Returns whether it was stored.
    pub fn insert(&mut self, track_id: i64, value: impl Into<String>) -> bool {
        let value = value.into();
        if value == self.default_value || self.entries.contains_key(&track_id) {
            return false;
        }
        self.entries.insert(track_id, value);
        true
    }

    /// Cached value if present; otherwise run `compute`, store the result
    /// only when it differs from the default sentinel, and return it
    /// either way.
    pub fn get_or_compute(&mut self, track_id: i64, compute: impl FnOnce() -> String) -> String {
        if let Some(value) = self.entries.get(&track_id) {
            return value.clone();
        }
        let value = compute();
        if value != self.default_value {
            self.entries.insert(track_id, value.clone());
        }
        value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-run cache injected into the fusion engine: one write-once map per
/// key space. Color defaults to `"unknown"`, plate to the empty string.
pub struct TrackCache {
    pub colors: WriteOnceMap,
    pub plates: WriteOnceMap,
}

impl TrackCache {
    pub fn new() -> Self {
        Self {
            colors: WriteOnceMap::new("unknown"),
            plates: WriteOnceMap::new(""),
        }
    }
}

impl Default for TrackCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_wins() {
        let mut cache = TrackCache::new();
        assert!(cache.plates.insert(7, "AB123"));
        assert!(!cache.plates.insert(7, "ZZ999"));
        assert_eq!(cache.plates.get(7), Some("AB123"));
    }

    #[test]
    fn default_values_are_never_stored() {
        let mut cache = TrackCache::new();
        assert!(!cache.plates.insert(1, ""));
        assert!(!cache.colors.insert(1, "unknown"));
        assert!(cache.plates.is_empty());
        assert!(cache.colors.is_empty());
    }

    #[test]
    fn get_or_compute_runs_once_per_track() {
        let mut cache = TrackCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let color = cache.colors.get_or_compute(5, || {
                calls += 1;
                "red".to_string()
            });
            assert_eq!(color, "red");
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.colors.len(), 1);
    }

    #[test]
    fn unresolved_results_are_recomputed() {
        let mut cache = TrackCache::new();
        let mut calls = 0;
        let mut attempt = |cache: &mut TrackCache, value: &str| {
            cache.colors.get_or_compute(9, || {
                calls += 1;
                value.to_string()
            })
        };
        // "unknown" is returned but not cached, so the next frame tries
        // again; the first real color then sticks.
        assert_eq!(attempt(&mut cache, "unknown"), "unknown");
        assert_eq!(attempt(&mut cache, "blue"), "blue");
        assert_eq!(attempt(&mut cache, "red"), "blue");
        assert_eq!(calls, 2);
    }

    #[test]
    fn key_spaces_are_independent() {
        let mut cache = TrackCache::new();
        cache.colors.insert(3, "blue");
        assert_eq!(cache.plates.get(3), None);
        cache.plates.insert(3, "KA01AB1234");
        assert_eq!(cache.colors.get(3), Some("blue"));
        assert_eq!(cache.plates.get(3), Some("KA01AB1234"));
    }
}
