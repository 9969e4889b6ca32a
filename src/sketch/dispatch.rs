// SPDX-License-Identifier: GPL-3.0-only

//! Routing of changed metadata to a sketch controller

use crate::device::{MetadataItem, MetadataTag};
use crate::errors::{SessionError, SessionResult};
use crate::sketch::controller::{SketchController, SketchNotifyMode};
use crate::sketch::scene::SceneFeaturesMode;
use tracing::debug;

/// Which handler a dispatched item reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    DynamicSketchInfo,
    ZoomRatio,
    Macro,
    MoonCaptureBoost,
    Ignored,
}

/// Route `item` to the matching handler of `controller`
///
/// Dynamic controllers only consume sketch stream info. Static controllers
/// consume zoom, smooth zoom, macro and moon-capture-boost changes. Anything
/// else is ignored.
pub fn dispatch_metadata(
    controller: &SketchController,
    features_mode: &SceneFeaturesMode,
    item: &MetadataItem,
) -> SessionResult<DispatchOutcome> {
    if item.count() == 0 {
        debug!(tag = ?item.tag, "Rejecting metadata item without values");
        return Err(SessionError::invalid_argument(format!(
            "metadata item {:?} has no values",
            item.tag
        )));
    }

    let outcome = match (controller.notify_mode(), item.tag) {
        (SketchNotifyMode::Dynamic, MetadataTag::StatusSketchStreamInfo) => {
            let values = expect_f32(item)?;
            controller.on_dynamic_sketch_info(values, features_mode);
            DispatchOutcome::DynamicSketchInfo
        }
        // Smooth zoom reports the ratio currently applied first
        (
            SketchNotifyMode::Static,
            MetadataTag::ControlZoomRatio | MetadataTag::ControlSmoothZoomRatios,
        ) => {
            let values = expect_f32(item)?;
            controller.on_zoom_changed(values[0], features_mode);
            DispatchOutcome::ZoomRatio
        }
        (SketchNotifyMode::Static, MetadataTag::ControlCameraMacro) => {
            controller.on_features_mode_changed(features_mode);
            DispatchOutcome::Macro
        }
        (SketchNotifyMode::Static, MetadataTag::ControlMoonCaptureBoost) => {
            controller.on_features_mode_changed(features_mode);
            DispatchOutcome::MoonCaptureBoost
        }
        (mode, tag) => {
            debug!(?mode, ?tag, "Unhandled sketch metadata tag");
            DispatchOutcome::Ignored
        }
    };
    Ok(outcome)
}

fn expect_f32(item: &MetadataItem) -> SessionResult<&[f32]> {
    item.as_f32().ok_or_else(|| {
        SessionError::invalid_argument(format!("metadata item {:?} is not f32", item.tag))
    })
}
