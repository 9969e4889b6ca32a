// SPDX-License-Identifier: GPL-3.0-only

//! Capture outputs and sketch size selection

use crate::device::{CameraMetadata, HostStream, ListenerManager, MetadataTag, PixelFormat, Profile, Size};
use crate::sketch::SketchController;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Kind of stream an output delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Preview,
    Photo,
    Video,
    Metadata,
    Depth,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputKind::Preview => "preview",
            OutputKind::Photo => "photo",
            OutputKind::Video => "video",
            OutputKind::Metadata => "metadata",
            OutputKind::Depth => "depth",
        };
        write!(f, "{}", name)
    }
}

/// One output stream registered with a session
pub struct CaptureOutput {
    id: Uuid,
    kind: OutputKind,
    profile: Profile,
    stream: Arc<dyn HostStream>,
    listeners: Arc<ListenerManager>,
    sketch: Mutex<Option<Arc<SketchController>>>,
}

impl CaptureOutput {
    pub fn new(kind: OutputKind, profile: Profile, stream: Arc<dyn HostStream>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            profile,
            stream,
            listeners: Arc::new(ListenerManager::new()),
            sketch: Mutex::new(None),
        }
    }

    pub fn preview(profile: Profile, stream: Arc<dyn HostStream>) -> Self {
        Self::new(OutputKind::Preview, profile, stream)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn stream(&self) -> &Arc<dyn HostStream> {
        &self.stream
    }

    /// Sketch listeners of this output
    pub fn listeners(&self) -> &Arc<ListenerManager> {
        &self.listeners
    }

    pub fn sketch(&self) -> Option<Arc<SketchController>> {
        self.sketch.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn set_sketch(&self, controller: Arc<SketchController>) {
        *self.sketch.lock().unwrap_or_else(|e| e.into_inner()) = Some(controller);
    }

    pub(crate) fn take_sketch(&self) -> Option<Arc<SketchController>> {
        self.sketch.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl fmt::Debug for CaptureOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureOutput")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("profile", &self.profile)
            .field("sketch", &self.sketch().is_some())
            .finish()
    }
}

/// Supported preview sizes for `format` from the capability block
///
/// The block is a flat `[format, width, height]*` array; a trailing partial
/// triple is ignored.
pub fn supported_preview_sizes(metadata: &CameraMetadata, format: PixelFormat) -> Vec<Size> {
    metadata
        .find(MetadataTag::AbilityAvailablePreviewSizes)
        .and_then(|item| item.as_u32())
        .map(|data| {
            data.chunks_exact(3)
                .filter(|t| PixelFormat::from_code(t[0]) == Some(format))
                .map(|t| Size::new(t[1], t[2]))
                .collect()
        })
        .unwrap_or_default()
}

/// Pick the sketch size for a preview
///
/// The smallest candidate narrower than the preview, at least `min_width`
/// wide, whose aspect ratio is within `aspect_tolerance` (relative) of the
/// preview's.
pub fn find_sketch_size(
    preview: Size,
    candidates: &[Size],
    min_width: u32,
    aspect_tolerance: f32,
) -> Option<Size> {
    let preview_aspect = preview.aspect_ratio()?;
    candidates
        .iter()
        .copied()
        .filter(|s| s.width < preview.width && s.width >= min_width)
        .filter(|s| {
            s.aspect_ratio()
                .map(|a| ((a - preview_aspect) / preview_aspect).abs() <= aspect_tolerance)
                .unwrap_or(false)
        })
        .min_by_key(|s| (s.width, s.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SKETCH_ASPECT_TOLERANCE, SKETCH_MIN_WIDTH};
    use crate::device::MetadataItem;

    fn find(preview: Size, candidates: &[Size]) -> Option<Size> {
        find_sketch_size(preview, candidates, SKETCH_MIN_WIDTH, SKETCH_ASPECT_TOLERANCE)
    }

    #[test]
    fn test_picks_smallest_matching_size() {
        let candidates = [
            Size::new(1920, 1080),
            Size::new(1280, 720),
            Size::new(640, 360),
            Size::new(480, 270),
        ];
        assert_eq!(find(Size::new(1920, 1080), &candidates), Some(Size::new(640, 360)));
    }

    #[test]
    fn test_rejects_mismatched_aspect() {
        let candidates = [Size::new(640, 480), Size::new(800, 800)];
        assert_eq!(find(Size::new(1920, 1080), &candidates), None);
    }

    #[test]
    fn test_requires_narrower_than_preview() {
        let candidates = [Size::new(1280, 720)];
        assert_eq!(find(Size::new(1280, 720), &candidates), None);
    }

    #[test]
    fn test_supported_sizes_filter_by_format() {
        let metadata = CameraMetadata::new().with(MetadataItem::u32(
            MetadataTag::AbilityAvailablePreviewSizes,
            [1003, 1920, 1080, 2000, 4000, 3000, 1003, 640, 360, 1003],
        ));
        let sizes = supported_preview_sizes(&metadata, PixelFormat::Yuv420Sp);
        assert_eq!(sizes, vec![Size::new(1920, 1080), Size::new(640, 360)]);
        assert!(supported_preview_sizes(&metadata, PixelFormat::Rgba8888).is_empty());
    }
}
