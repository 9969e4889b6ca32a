// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{SKETCH_ASPECT_TOLERANCE, SKETCH_MIN_WIDTH};
use crate::errors::LoadError;
use crate::sketch::{SceneMode, SketchNotifyMode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How sketch start/stop decisions are made (static tables or device pushes)
    pub sketch_notify_mode: SketchNotifyMode,
    /// Smallest sketch stream width
    pub sketch_min_width: u32,
    /// Relative aspect ratio tolerance between sketch and preview
    pub sketch_aspect_tolerance: f32,
    /// Scene mode used when none is given on the command line
    pub default_scene_mode: SceneMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sketch_notify_mode: SketchNotifyMode::Static,
            sketch_min_width: SKETCH_MIN_WIDTH,
            sketch_aspect_tolerance: SKETCH_ASPECT_TOLERANCE,
            default_scene_mode: SceneMode::Capture,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SessionConfig::from_json(r#"{"sketch_notify_mode": "dynamic"}"#)
            .expect("valid config");
        assert_eq!(config.sketch_notify_mode, SketchNotifyMode::Dynamic);
        assert_eq!(config.sketch_min_width, SKETCH_MIN_WIDTH);
        assert_eq!(config.default_scene_mode, SceneMode::Capture);
    }

    #[test]
    fn test_unknown_scene_mode_is_rejected() {
        assert!(SessionConfig::from_json(r#"{"default_scene_mode": "astro"}"#).is_err());
    }
}
