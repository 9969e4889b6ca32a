// SPDX-License-Identifier: GPL-3.0-only

//! Sketch ratio tables
//!
//! Two tables are built from device capability metadata:
//!
//! - the enable-ratio table: zoom ratio at which the sketch stream auto-starts
//! - the reference-fov table: ordered zoom ranges, each with the reference
//!   field-of-view ratio reported to listeners
//!
//! Both live in a [`RatioTables`] object shared by every sketch controller of
//! a session. A rebuild clears both tables before repopulating them, so a
//! rebuild from a device with fewer entries never leaves stale keys behind.
//!
//! Parsing is fail-open: malformed blocks are logged and skipped, and a
//! trailing incomplete group is dropped.

use crate::constants::{INVALID_RATIO, RATIO_EPSILON, SKETCH_FIXED_POINT_DIV, ratio_at_least};
use crate::device::{CameraMetadata, MetadataTag};
use crate::sketch::scene::{SceneFeature, SceneFeaturesMode, SceneMode, publish};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// One zoom range of the reference-fov table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SketchReferenceFovRange {
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub reference_value: f32,
}

impl SketchReferenceFovRange {
    pub fn new(zoom_min: f32, zoom_max: f32, reference_value: f32) -> Self {
        Self {
            zoom_min,
            zoom_max,
            reference_value,
        }
    }

    /// Half-open membership `[zoom_min, zoom_max)` with epsilon tolerance
    fn contains(&self, zoom: f32) -> bool {
        zoom - self.zoom_min >= -RATIO_EPSILON && zoom - self.zoom_max < -RATIO_EPSILON
    }
}

/// A header-delimited group of ranges from a bucketed ability block
#[derive(Debug, Clone, PartialEq)]
struct FovBucket<M> {
    mode: M,
    header_min: f32,
    header_max: f32,
    ranges: Vec<SketchReferenceFovRange>,
    /// Whether a range reached `header_max` and closed the bucket
    closed: bool,
}

/// Split `[mode, min, max, (zmin, zmax, ref)*]*` into buckets
///
/// A bucket closes when a range's `zmax` reaches the header max; the next
/// value then starts a new header. Values are converted with `to_ratio`.
fn scan_fov_buckets<T: Copy>(data: &[T], to_ratio: impl Fn(T) -> f32) -> Vec<FovBucket<T>> {
    let mut buckets: Vec<FovBucket<T>> = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let open = buckets.last().map(|b| !b.closed).unwrap_or(false);
        if !open {
            if i + 3 > data.len() {
                debug!(remaining = data.len() - i, "Dropping truncated bucket header");
                break;
            }
            buckets.push(FovBucket {
                mode: data[i],
                header_min: to_ratio(data[i + 1]),
                header_max: to_ratio(data[i + 2]),
                ranges: Vec::new(),
                closed: false,
            });
            i += 3;
            continue;
        }

        if i + 3 > data.len() {
            debug!(remaining = data.len() - i, "Dropping truncated range triple");
            break;
        }
        let range = SketchReferenceFovRange::new(
            to_ratio(data[i]),
            to_ratio(data[i + 1]),
            to_ratio(data[i + 2]),
        );
        i += 3;
        if let Some(bucket) = buckets.last_mut() {
            bucket.ranges.push(range);
            if ratio_at_least(range.zoom_max, bucket.header_max) {
                bucket.closed = true;
            }
        }
    }
    buckets
}

/// Parse `[mode, ratio]*` pairs of the enable-ratio block
pub fn parse_enable_ratios(data: &[f32]) -> Vec<(SceneFeaturesMode, f32)> {
    data.chunks_exact(2)
        .filter_map(|pair| match SceneMode::from_metadata_float(pair[0]) {
            Some(mode) => Some((SceneFeaturesMode::from_mode(mode), pair[1])),
            None => {
                warn!(mode = pair[0], "Skipping enable ratio for unknown scene mode");
                None
            }
        })
        .collect()
}

/// Parse the float reference-fov block
///
/// Buckets are keyed by the rounded mode with no features.
pub fn parse_reference_fov_ratios(
    data: &[f32],
) -> Vec<(SceneFeaturesMode, SketchReferenceFovRange)> {
    let mut entries = Vec::new();
    for bucket in scan_fov_buckets(data, |v| v) {
        let Some(mode) = SceneMode::from_metadata_float(bucket.mode) else {
            warn!(mode = bucket.mode, "Skipping reference fov bucket for unknown scene mode");
            continue;
        };
        let key = SceneFeaturesMode::from_mode(mode);
        entries.extend(bucket.ranges.into_iter().map(|r| (key.clone(), r)));
    }
    entries
}

/// Entries contributed by the moon-capture-boost block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoonCaptureBoostEntries {
    pub ranges: Vec<(SceneFeaturesMode, SketchReferenceFovRange)>,
    pub enable_ratios: Vec<(SceneFeaturesMode, f32)>,
}

/// Parse the fixed-point moon-capture-boost block
///
/// Same bucket grammar as the reference-fov block, with every value divided
/// by 100 and keys carrying the moon-capture-boost feature. Each closed
/// bucket also contributes its header min as the enable ratio.
pub fn parse_moon_capture_boost(data: &[u32]) -> MoonCaptureBoostEntries {
    let mut entries = MoonCaptureBoostEntries::default();
    // Header mode is an integer ordinal, never divided
    let buckets = scan_fov_buckets(data, |v| v as f32 / SKETCH_FIXED_POINT_DIV);
    for bucket in buckets {
        let Some(mode) = SceneMode::from_ordinal(bucket.mode) else {
            warn!(mode = bucket.mode, "Skipping moon capture boost bucket for unknown scene mode");
            continue;
        };
        let key = SceneFeaturesMode::new(mode, [SceneFeature::MoonCaptureBoost]);
        entries
            .ranges
            .extend(bucket.ranges.iter().map(|r| (key.clone(), *r)));
        if bucket.closed {
            entries.enable_ratios.push((key, bucket.header_min));
        }
    }
    entries
}

/// Enable-ratio and reference-fov caches
#[derive(Debug, Default)]
pub struct RatioTables {
    enable_ratios: Mutex<HashMap<SceneFeaturesMode, f32>>,
    reference_fov_ratios: Mutex<HashMap<SceneFeaturesMode, Vec<SketchReferenceFovRange>>>,
}

impl RatioTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear both tables and repopulate them from capability metadata
    pub fn rebuild(&self, metadata: &CameraMetadata) {
        self.clear();

        match metadata
            .find(MetadataTag::AbilitySketchEnableRatio)
            .and_then(|item| item.as_f32())
        {
            Some(data) if !data.is_empty() => {
                for (key, ratio) in parse_enable_ratios(data) {
                    self.insert_enable_ratio(&key, ratio);
                }
            }
            _ => debug!("No sketch enable ratio ability"),
        }

        match metadata
            .find(MetadataTag::AbilitySketchReferenceFovRatio)
            .and_then(|item| item.as_f32())
        {
            Some(data) if !data.is_empty() => {
                for (key, range) in parse_reference_fov_ratios(data) {
                    self.insert_reference_range(&key, range);
                }
            }
            _ => debug!("No sketch reference fov ability"),
        }

        match metadata
            .find(MetadataTag::AbilityMoonCaptureBoost)
            .and_then(|item| item.as_u32())
        {
            Some(data) if !data.is_empty() => {
                let moon = parse_moon_capture_boost(data);
                for (key, range) in moon.ranges {
                    self.insert_reference_range(&key, range);
                }
                for (key, ratio) in moon.enable_ratios {
                    self.insert_enable_ratio(&key, ratio);
                }
            }
            _ => debug!("No moon capture boost ability"),
        }

        info!(
            enable_keys = self.enable_ratio_count(),
            reference_keys = self.reference_key_count(),
            "Sketch ratio tables rebuilt"
        );
    }

    pub fn clear(&self) {
        self.enable_ratios
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.reference_fov_ratios
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Insert an enable ratio under `key` and every alias key
    pub fn insert_enable_ratio(&self, key: &SceneFeaturesMode, ratio: f32) {
        let mut table = self.enable_ratios.lock().unwrap_or_else(|e| e.into_inner());
        for (k, v) in publish(key, ratio) {
            table.insert(k, v);
        }
    }

    /// Append a range to `key`'s list, then mirror the whole list to every
    /// alias key
    pub fn insert_reference_range(&self, key: &SceneFeaturesMode, range: SketchReferenceFovRange) {
        let mut table = self
            .reference_fov_ratios
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let list = {
            let entry = table.entry(key.clone()).or_default();
            entry.push(range);
            entry.clone()
        };
        for (k, v) in publish(key, list) {
            table.insert(k, v);
        }
    }

    /// Zoom ratio at which the sketch stream auto-starts for `key`
    ///
    /// Returns [`INVALID_RATIO`] when the canonical key has no entry.
    pub fn enable_ratio(&self, key: &SceneFeaturesMode) -> f32 {
        let filtered = key.filtered();
        let table = self.enable_ratios.lock().unwrap_or_else(|e| e.into_inner());
        match table.get(&filtered) {
            Some(ratio) => *ratio,
            None => {
                debug!(key = %filtered, "No sketch enable ratio");
                INVALID_RATIO
            }
        }
    }

    /// Reference fov ratio for `key` at `zoom`
    ///
    /// Zoom values below the first range clamp to its value and values at or
    /// above the last range's max clamp to the last value. A zoom that falls
    /// in a gap between ranges yields [`INVALID_RATIO`].
    pub fn reference_fov_ratio(&self, key: &SceneFeaturesMode, zoom: f32) -> f32 {
        let filtered = key.filtered();
        let table = self
            .reference_fov_ratios
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let Some(ranges) = table.get(&filtered) else {
            debug!(key = %filtered, "No sketch reference fov ratio");
            return INVALID_RATIO;
        };
        lookup_reference_value(ranges, zoom)
    }

    pub fn enable_ratio_count(&self) -> usize {
        self.enable_ratios
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn reference_key_count(&self) -> usize {
        self.reference_fov_ratios
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Sorted snapshot of the enable-ratio table
    pub fn enable_ratio_entries(&self) -> Vec<(SceneFeaturesMode, f32)> {
        let table = self.enable_ratios.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<_> = table.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Sorted snapshot of the reference-fov table
    pub fn reference_entries(&self) -> Vec<(SceneFeaturesMode, Vec<SketchReferenceFovRange>)> {
        let table = self
            .reference_fov_ratios
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<_> = table.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

fn lookup_reference_value(ranges: &[SketchReferenceFovRange], zoom: f32) -> f32 {
    let (Some(first), Some(last)) = (ranges.first(), ranges.last()) else {
        return INVALID_RATIO;
    };
    if ranges.len() == 1 {
        return first.reference_value;
    }
    if zoom - first.zoom_min <= RATIO_EPSILON {
        return first.reference_value;
    }
    if ratio_at_least(zoom, last.zoom_max) {
        return last.reference_value;
    }
    ranges
        .iter()
        .find(|r| r.contains(zoom))
        .map(|r| r.reference_value)
        .unwrap_or(INVALID_RATIO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MetadataItem;

    fn capture() -> SceneFeaturesMode {
        SceneMode::Capture.into()
    }

    fn tables_with_capture_ranges() -> RatioTables {
        let tables = RatioTables::new();
        tables.insert_reference_range(&capture(), SketchReferenceFovRange::new(1.0, 2.0, 10.0));
        tables.insert_reference_range(&capture(), SketchReferenceFovRange::new(2.0, 5.0, 20.0));
        tables
    }

    #[test]
    fn test_lookup_clamps_below_first_and_above_last() {
        let tables = tables_with_capture_ranges();
        assert_eq!(tables.reference_fov_ratio(&capture(), 0.5), 10.0);
        assert_eq!(tables.reference_fov_ratio(&capture(), 1.0), 10.0);
        assert_eq!(tables.reference_fov_ratio(&capture(), 5.0), 20.0);
        assert_eq!(tables.reference_fov_ratio(&capture(), 9.0), 20.0);
    }

    #[test]
    fn test_lookup_uses_half_open_ranges() {
        let tables = tables_with_capture_ranges();
        assert_eq!(tables.reference_fov_ratio(&capture(), 1.5), 10.0);
        assert_eq!(tables.reference_fov_ratio(&capture(), 2.0), 20.0);
        assert_eq!(tables.reference_fov_ratio(&capture(), 4.99), 20.0);
    }

    #[test]
    fn test_lookup_gap_is_invalid() {
        let tables = RatioTables::new();
        tables.insert_reference_range(&capture(), SketchReferenceFovRange::new(1.0, 2.0, 10.0));
        tables.insert_reference_range(&capture(), SketchReferenceFovRange::new(3.0, 5.0, 20.0));
        assert_eq!(tables.reference_fov_ratio(&capture(), 2.5), INVALID_RATIO);
    }

    #[test]
    fn test_single_range_answers_every_zoom() {
        let tables = RatioTables::new();
        tables.insert_reference_range(&capture(), SketchReferenceFovRange::new(2.0, 3.0, 7.0));
        assert_eq!(tables.reference_fov_ratio(&capture(), 0.1), 7.0);
        assert_eq!(tables.reference_fov_ratio(&capture(), 100.0), 7.0);
    }

    #[test]
    fn test_missing_key_is_invalid() {
        let tables = RatioTables::new();
        assert_eq!(tables.enable_ratio(&capture()), INVALID_RATIO);
        assert_eq!(tables.reference_fov_ratio(&capture(), 1.0), INVALID_RATIO);
    }

    #[test]
    fn test_lookup_ignores_irrelevant_features() {
        let tables = RatioTables::new();
        tables.insert_enable_ratio(&capture(), 3.0);
        let key = SceneFeaturesMode::new(SceneMode::Capture, [SceneFeature::LowLightBoost]);
        assert_eq!(tables.enable_ratio(&key), 3.0);
    }

    #[test]
    fn test_enable_ratio_published_under_aliases() {
        let tables = RatioTables::new();
        tables.insert_enable_ratio(&SceneMode::CaptureMacro.into(), 4.0);
        let capture_macro = SceneFeaturesMode::new(SceneMode::Capture, [SceneFeature::Macro]);
        assert_eq!(tables.enable_ratio(&capture_macro), 4.0);
        assert_eq!(tables.enable_ratio(&SceneMode::CaptureMacro.into()), 4.0);
    }

    #[test]
    fn test_reference_aliases_receive_full_list() {
        let tables = tables_with_capture_ranges();
        let tripod = SceneFeaturesMode::new(SceneMode::Capture, [SceneFeature::TripodDetection]);
        // Tripod is filtered out on lookup; check the raw alias entry
        let entries = tables.reference_entries();
        let alias = entries.iter().find(|(k, _)| *k == tripod).map(|(_, v)| v.len());
        assert_eq!(alias, Some(2));
    }

    #[test]
    fn test_parse_reference_fov_buckets() {
        let data = [
            1.0, 1.0, 5.0, // capture header
            1.0, 2.0, 10.0, //
            2.0, 5.0, 20.0, // closes bucket
            2.0, 1.0, 3.0, // video header
            1.0, 3.0, 30.0, // closes bucket
        ];
        let entries = parse_reference_fov_ratios(&data);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, capture());
        assert_eq!(entries[2].0, SceneMode::Video.into());
        assert_eq!(entries[2].1.reference_value, 30.0);
    }

    #[test]
    fn test_parse_drops_truncated_triple() {
        let data = [1.0, 1.0, 5.0, 1.0, 2.0, 10.0, 2.0, 5.0];
        let entries = parse_reference_fov_ratios(&data);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_parse_enable_ratios_ignores_odd_tail() {
        let entries = parse_enable_ratios(&[1.0, 2.5, 2.0, 3.5, 7.0]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], (SceneMode::Video.into(), 3.5));
    }

    #[test]
    fn test_parse_moon_capture_boost() {
        let data = [1, 100, 1000, 100, 500, 150, 500, 1000, 300];
        let moon = parse_moon_capture_boost(&data);
        let key = SceneFeaturesMode::new(SceneMode::Capture, [SceneFeature::MoonCaptureBoost]);
        assert_eq!(moon.ranges.len(), 2);
        assert_eq!(moon.ranges[1].1, SketchReferenceFovRange::new(5.0, 10.0, 3.0));
        assert_eq!(moon.enable_ratios, vec![(key, 1.0)]);
    }

    #[test]
    fn test_unclosed_moon_bucket_has_no_enable_ratio() {
        let moon = parse_moon_capture_boost(&[1, 100, 1000, 100, 500, 150]);
        assert_eq!(moon.ranges.len(), 1);
        assert!(moon.enable_ratios.is_empty());
    }

    #[test]
    fn test_rebuild_clears_stale_entries() {
        let tables = RatioTables::new();
        let first = CameraMetadata::new()
            .with(MetadataItem::f32(
                MetadataTag::AbilitySketchEnableRatio,
                [1.0, 2.0, 2.0, 3.0],
            ));
        tables.rebuild(&first);
        assert_eq!(tables.enable_ratio(&SceneMode::Video.into()), 3.0);

        let second = CameraMetadata::new()
            .with(MetadataItem::f32(MetadataTag::AbilitySketchEnableRatio, [1.0, 2.0]));
        tables.rebuild(&second);
        assert_eq!(tables.enable_ratio(&SceneMode::Video.into()), INVALID_RATIO);
        assert_eq!(tables.enable_ratio(&capture()), 2.0);
    }

    #[test]
    fn test_rebuild_includes_moon_capture_boost() {
        let tables = RatioTables::new();
        let metadata = CameraMetadata::new().with(MetadataItem::u32(
            MetadataTag::AbilityMoonCaptureBoost,
            [1, 1500, 10000, 1500, 10000, 800],
        ));
        tables.rebuild(&metadata);
        let key = SceneFeaturesMode::new(SceneMode::Capture, [SceneFeature::MoonCaptureBoost]);
        assert_eq!(tables.enable_ratio(&key), 15.0);
        assert_eq!(tables.reference_fov_ratio(&key, 20.0), 8.0);
    }
}
