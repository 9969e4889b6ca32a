// SPDX-License-Identifier: GPL-3.0-only

//! Tagged camera metadata container
//!
//! Capability blocks (ratio tables, zoom caps, supported sizes) and control
//! settings (zoom, macro, moon boost) travel as tagged arrays. The container is
//! also the unit submitted to the device when a control transaction closes.

use crate::errors::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataTag {
    /// `[mode, ratio]*` pairs, f32
    AbilitySketchEnableRatio,
    /// `[mode, min, max, (zoom_min, zoom_max, reference)*]*` buckets, f32
    AbilitySketchReferenceFovRatio,
    /// Moon-capture-boost buckets, u32 fixed point (/100)
    AbilityMoonCaptureBoost,
    /// `[mode, min, max]*` triples, i32 fixed point (/100)
    AbilitySceneZoomCap,
    /// `[format, width, height]*` triples, u32
    AbilityAvailablePreviewSizes,
    ControlZoomRatio,
    /// Sequence of zoom ratios, the first is the one currently applied
    ControlSmoothZoomRatios,
    ControlCameraMacro,
    ControlMoonCaptureBoost,
    ControlTripodDetection,
    ControlLowLightBoost,
    /// `[support_flag, reference_ratio, offset_x, offset_y]`, f32
    StatusSketchStreamInfo,
    /// Any tag this crate does not interpret
    Vendor(u32),
}

/// Raw value array of a metadata item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataValues {
    F32(Vec<f32>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    U8(Vec<u8>),
}

impl MetadataValues {
    pub fn len(&self) -> usize {
        match self {
            MetadataValues::F32(v) => v.len(),
            MetadataValues::I32(v) => v.len(),
            MetadataValues::U32(v) => v.len(),
            MetadataValues::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One tagged entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub tag: MetadataTag,
    pub values: MetadataValues,
}

impl MetadataItem {
    pub fn new(tag: MetadataTag, values: MetadataValues) -> Self {
        Self { tag, values }
    }

    pub fn f32(tag: MetadataTag, values: impl Into<Vec<f32>>) -> Self {
        Self::new(tag, MetadataValues::F32(values.into()))
    }

    pub fn u32(tag: MetadataTag, values: impl Into<Vec<u32>>) -> Self {
        Self::new(tag, MetadataValues::U32(values.into()))
    }

    pub fn i32(tag: MetadataTag, values: impl Into<Vec<i32>>) -> Self {
        Self::new(tag, MetadataValues::I32(values.into()))
    }

    pub fn u8(tag: MetadataTag, values: impl Into<Vec<u8>>) -> Self {
        Self::new(tag, MetadataValues::U8(values.into()))
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.values {
            MetadataValues::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.values {
            MetadataValues::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match &self.values {
            MetadataValues::U32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.values {
            MetadataValues::U8(v) => Some(v),
            _ => None,
        }
    }
}

/// Tag-indexed metadata set
///
/// Serialized as a plain list of items so capability dumps stay readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<MetadataItem>", into = "Vec<MetadataItem>")]
pub struct CameraMetadata {
    items: BTreeMap<MetadataTag, MetadataItem>,
}

impl CameraMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, item: MetadataItem) -> Self {
        self.insert(item);
        self
    }

    /// Add the item, replacing any existing item with the same tag
    pub fn insert(&mut self, item: MetadataItem) {
        self.items.insert(item.tag, item);
    }

    pub fn find(&self, tag: MetadataTag) -> Option<&MetadataItem> {
        self.items.get(&tag)
    }

    pub fn remove(&mut self, tag: MetadataTag) -> Option<MetadataItem> {
        self.items.remove(&tag)
    }

    /// Add or update every item of `other`
    pub fn merge(&mut self, other: &CameraMetadata) {
        for item in other.items.values() {
            self.insert(item.clone());
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &MetadataItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Parse a JSON capability dump
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON capability dump from disk
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl From<Vec<MetadataItem>> for CameraMetadata {
    fn from(items: Vec<MetadataItem>) -> Self {
        let mut metadata = CameraMetadata::new();
        for item in items {
            metadata.insert(item);
        }
        metadata
    }
}

impl From<CameraMetadata> for Vec<MetadataItem> {
    fn from(metadata: CameraMetadata) -> Self {
        metadata.items.into_values().collect()
    }
}
