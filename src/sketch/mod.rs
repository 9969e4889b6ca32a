// SPDX-License-Identifier: GPL-3.0-only

//! Sketch (picture-in-picture zoom preview) support
//!
//! - [`scene`]: scene modes, features and the composite table key
//! - [`tables`]: enable-ratio and reference-fov tables built from capabilities
//! - [`controller`]: per-output sketch sub-stream controller
//! - [`dispatch`]: routing of changed metadata to a controller

pub mod controller;
pub mod dispatch;
pub mod scene;
pub mod tables;

pub use controller::{SketchController, SketchNotifyMode};
pub use dispatch::{DispatchOutcome, dispatch_metadata};
pub use scene::{SceneFeature, SceneFeaturesMode, SceneMode};
pub use tables::{RatioTables, SketchReferenceFovRange};
