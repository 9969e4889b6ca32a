// SPDX-License-Identifier: GPL-3.0-only

//! Scene modes, scene features and the composite lookup key
//!
//! Ratio tables are keyed by [`SceneFeaturesMode`]. Before a lookup the key is
//! canonicalized with [`SceneFeaturesMode::filtered`], and at build time one
//! physical value is published under several synthetic keys by [`publish`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Top-level capture mode
///
/// Discriminants are the ordinals carried in device capability metadata.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SceneMode {
    #[default]
    Normal = 0,
    Capture = 1,
    Video = 2,
    Portrait = 3,
    Night = 4,
    Professional = 5,
    SlowMotion = 6,
    Scan = 7,
    CaptureMacro = 8,
    VideoMacro = 9,
    ProfessionalPhoto = 11,
    ProfessionalVideo = 12,
    HighFrameRate = 13,
    HighResPhoto = 14,
    Secure = 15,
    QuickShotPhoto = 16,
    LightPainting = 17,
    PanoramaPhoto = 18,
    TimelapsePhoto = 19,
    ApertureVideo = 20,
    FluorescencePhoto = 21,
}

impl SceneMode {
    /// All known scene modes
    pub const ALL: [SceneMode; 21] = [
        SceneMode::Normal,
        SceneMode::Capture,
        SceneMode::Video,
        SceneMode::Portrait,
        SceneMode::Night,
        SceneMode::Professional,
        SceneMode::SlowMotion,
        SceneMode::Scan,
        SceneMode::CaptureMacro,
        SceneMode::VideoMacro,
        SceneMode::ProfessionalPhoto,
        SceneMode::ProfessionalVideo,
        SceneMode::HighFrameRate,
        SceneMode::HighResPhoto,
        SceneMode::Secure,
        SceneMode::QuickShotPhoto,
        SceneMode::LightPainting,
        SceneMode::PanoramaPhoto,
        SceneMode::TimelapsePhoto,
        SceneMode::ApertureVideo,
        SceneMode::FluorescencePhoto,
    ];

    /// Metadata ordinal of this mode
    pub fn ordinal(self) -> u32 {
        self as u32
    }

    /// Decode an integer ordinal
    pub fn from_ordinal(ordinal: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.ordinal() == ordinal)
    }

    /// Decode a float ordinal by rounding to the nearest integer
    pub fn from_metadata_float(value: f32) -> Option<Self> {
        let rounded = value.round();
        if !rounded.is_finite() || rounded < 0.0 {
            return None;
        }
        Self::from_ordinal(rounded as u32)
    }

    /// Parse a CLI/config name such as `capture` or `video_macro`
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        Self::ALL.iter().copied().find(|m| m.name() == normalized)
    }

    /// Snake-case name of this mode
    pub fn name(self) -> &'static str {
        match self {
            SceneMode::Normal => "normal",
            SceneMode::Capture => "capture",
            SceneMode::Video => "video",
            SceneMode::Portrait => "portrait",
            SceneMode::Night => "night",
            SceneMode::Professional => "professional",
            SceneMode::SlowMotion => "slow_motion",
            SceneMode::Scan => "scan",
            SceneMode::CaptureMacro => "capture_macro",
            SceneMode::VideoMacro => "video_macro",
            SceneMode::ProfessionalPhoto => "professional_photo",
            SceneMode::ProfessionalVideo => "professional_video",
            SceneMode::HighFrameRate => "high_frame_rate",
            SceneMode::HighResPhoto => "high_res_photo",
            SceneMode::Secure => "secure",
            SceneMode::QuickShotPhoto => "quick_shot_photo",
            SceneMode::LightPainting => "light_painting",
            SceneMode::PanoramaPhoto => "panorama_photo",
            SceneMode::TimelapsePhoto => "timelapse_photo",
            SceneMode::ApertureVideo => "aperture_video",
            SceneMode::FluorescencePhoto => "fluorescence_photo",
        }
    }
}

impl fmt::Display for SceneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Orthogonal toggle layered on a scene mode
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SceneFeature {
    MoonCaptureBoost = 0,
    TripodDetection = 1,
    LowLightBoost = 2,
    Macro = 3,
}

impl SceneFeature {
    pub const ALL: [SceneFeature; 4] = [
        SceneFeature::MoonCaptureBoost,
        SceneFeature::TripodDetection,
        SceneFeature::LowLightBoost,
        SceneFeature::Macro,
    ];

    /// Whether the feature survives canonicalization before a table lookup
    pub fn is_lookup_relevant(self) -> bool {
        matches!(self, SceneFeature::Macro | SceneFeature::MoonCaptureBoost)
    }

    pub fn name(self) -> &'static str {
        match self {
            SceneFeature::MoonCaptureBoost => "moon_capture_boost",
            SceneFeature::TripodDetection => "tripod_detection",
            SceneFeature::LowLightBoost => "low_light_boost",
            SceneFeature::Macro => "macro",
        }
    }
}

impl fmt::Display for SceneFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Composite lookup key: scene mode plus the set of active features
///
/// The feature set is ordered internally, so equality and hashing do not
/// depend on the order features were switched on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SceneFeaturesMode {
    mode: SceneMode,
    features: BTreeSet<SceneFeature>,
}

impl SceneFeaturesMode {
    pub fn new(mode: SceneMode, features: impl IntoIterator<Item = SceneFeature>) -> Self {
        Self {
            mode,
            features: features.into_iter().collect(),
        }
    }

    /// Key with no active features
    pub fn from_mode(mode: SceneMode) -> Self {
        Self {
            mode,
            features: BTreeSet::new(),
        }
    }

    pub fn scene_mode(&self) -> SceneMode {
        self.mode
    }

    pub fn set_scene_mode(&mut self, mode: SceneMode) {
        self.mode = mode;
    }

    pub fn features(&self) -> &BTreeSet<SceneFeature> {
        &self.features
    }

    pub fn has_feature(&self, feature: SceneFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn switch_feature(&mut self, feature: SceneFeature, enable: bool) {
        if enable {
            self.features.insert(feature);
        } else {
            self.features.remove(&feature);
        }
    }

    /// Canonical form used for table lookups
    ///
    /// Every feature outside the allow-list (macro, moon-capture-boost) is
    /// cleared, collapsing many concrete combinations onto few table entries.
    pub fn filtered(&self) -> Self {
        Self {
            mode: self.mode,
            features: self
                .features
                .iter()
                .copied()
                .filter(|f| f.is_lookup_relevant())
                .collect(),
        }
    }

    /// Keys reachable from this one by switching on a single lookup-relevant
    /// feature that is not already active
    pub fn feature_modes(&self) -> Vec<SceneFeaturesMode> {
        SceneFeature::ALL
            .iter()
            .copied()
            .filter(|f| f.is_lookup_relevant() && !self.has_feature(*f))
            .map(|f| {
                let mut key = self.filtered();
                key.switch_feature(f, true);
                key
            })
            .collect()
    }
}

impl From<SceneMode> for SceneFeaturesMode {
    fn from(mode: SceneMode) -> Self {
        Self::from_mode(mode)
    }
}

impl fmt::Display for SceneFeaturesMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.mode)?;
        for (i, feature) in self.features.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", feature)?;
        }
        write!(f, "]")
    }
}

/// Every key a value inserted under `key` is published under
///
/// - `(capture, [])` is also published as `(capture, [tripod_detection])`
/// - `(capture_macro, *)` is also published as `(capture, [macro])` and
///   `(capture_macro, [macro])`
/// - `(video_macro, *)` is also published as `(video, [macro])` and
///   `(video_macro, [macro])`
pub fn publish_keys(key: &SceneFeaturesMode) -> Vec<SceneFeaturesMode> {
    let mut keys = vec![key.clone()];
    let mut alias = |mode: SceneMode, feature: SceneFeature| {
        let alias = SceneFeaturesMode::new(mode, [feature]);
        if !keys.contains(&alias) {
            keys.push(alias);
        }
    };
    match key.mode {
        SceneMode::Capture if key.features.is_empty() => {
            alias(SceneMode::Capture, SceneFeature::TripodDetection);
        }
        SceneMode::CaptureMacro => {
            alias(SceneMode::Capture, SceneFeature::Macro);
            alias(SceneMode::CaptureMacro, SceneFeature::Macro);
        }
        SceneMode::VideoMacro => {
            alias(SceneMode::Video, SceneFeature::Macro);
            alias(SceneMode::VideoMacro, SceneFeature::Macro);
        }
        _ => {}
    }
    keys
}

/// Pair `value` with every key from [`publish_keys`]
pub fn publish<V: Clone>(key: &SceneFeaturesMode, value: V) -> Vec<(SceneFeaturesMode, V)> {
    publish_keys(key)
        .into_iter()
        .map(|k| (k, value.clone()))
        .collect()
}
