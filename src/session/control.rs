// SPDX-License-Identifier: GPL-3.0-only

//! Control transactions
//!
//! Mutations are only reachable through a [`ControlGuard`], returned by
//! [`CaptureSession::lock_for_control`]. Changes accumulate in
//! [`PendingSettings`] and reach the device exactly once, either through
//! [`ControlGuard::commit`] or when the guard goes out of scope.

use crate::device::{CameraMetadata, MetadataItem, MetadataTag};
use crate::errors::{SessionError, SessionResult};
use crate::session::CaptureSession;
use crate::sketch::SceneFeature;
use std::sync::MutexGuard;
use tracing::{debug, warn};

/// Buffered control changes of one transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingSettings {
    changes: CameraMetadata,
    features: Vec<(SceneFeature, bool)>,
}

impl PendingSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &CameraMetadata {
        &self.changes
    }

    /// Feature toggles in the order they were requested
    pub fn features(&self) -> &[(SceneFeature, bool)] {
        &self.features
    }

    fn set(&mut self, item: MetadataItem) {
        self.changes.insert(item);
    }

    fn toggle(&mut self, feature: SceneFeature, enable: bool) {
        self.features.retain(|(f, _)| *f != feature);
        self.features.push((feature, enable));
    }
}

/// Control tag carrying a feature toggle
pub fn feature_tag(feature: SceneFeature) -> MetadataTag {
    match feature {
        SceneFeature::Macro => MetadataTag::ControlCameraMacro,
        SceneFeature::MoonCaptureBoost => MetadataTag::ControlMoonCaptureBoost,
        SceneFeature::TripodDetection => MetadataTag::ControlTripodDetection,
        SceneFeature::LowLightBoost => MetadataTag::ControlLowLightBoost,
    }
}

/// Open control transaction on a session
pub struct ControlGuard<'a> {
    session: &'a CaptureSession,
    pending: Option<PendingSettings>,
    _serial: MutexGuard<'a, ()>,
}

impl<'a> ControlGuard<'a> {
    pub(crate) fn new(session: &'a CaptureSession, serial: MutexGuard<'a, ()>) -> Self {
        Self {
            session,
            pending: Some(PendingSettings::new()),
            _serial: serial,
        }
    }

    fn pending_mut(&mut self) -> SessionResult<&mut PendingSettings> {
        if !self.session.state().is_committed() {
            return Err(SessionError::not_configured(
                "control changes require a committed session",
            ));
        }
        self.pending
            .as_mut()
            .ok_or_else(|| SessionError::not_allowed("control transaction already submitted"))
    }

    /// Request a zoom ratio, clamped to the device range for the scene mode
    pub fn set_zoom_ratio(&mut self, zoom: f32) -> SessionResult<()> {
        if zoom <= 0.0 || !zoom.is_finite() {
            return Err(SessionError::invalid_argument(format!(
                "invalid zoom ratio {zoom}"
            )));
        }
        let range = self.session.zoom_ratio_range();
        let pending = self.pending_mut()?;
        let clamped = match range {
            Some((min, max)) => zoom.clamp(min, max),
            None => zoom,
        };
        if clamped != zoom {
            debug!(requested = zoom, clamped, "Zoom ratio clamped to device range");
        }
        pending.set(MetadataItem::f32(MetadataTag::ControlZoomRatio, [clamped]));
        Ok(())
    }

    /// Switch a scene feature on or off
    pub fn set_scene_feature(&mut self, feature: SceneFeature, enable: bool) -> SessionResult<()> {
        let pending = self.pending_mut()?;
        pending.set(MetadataItem::u8(feature_tag(feature), [u8::from(enable)]));
        pending.toggle(feature, enable);
        Ok(())
    }

    /// Buffered changes not yet submitted
    pub fn pending(&self) -> Option<&PendingSettings> {
        self.pending.as_ref()
    }

    /// Submit the buffered changes and close the transaction
    pub fn commit(mut self) -> SessionResult<()> {
        match self.pending.take() {
            Some(pending) => self.session.submit_settings(pending),
            None => Ok(()),
        }
    }
}

impl Drop for ControlGuard<'_> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            if let Err(err) = self.session.submit_settings(pending) {
                warn!(error = %err, "Control transaction submit failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_toggle_keeps_last_request() {
        let mut pending = PendingSettings::new();
        pending.toggle(SceneFeature::Macro, true);
        pending.toggle(SceneFeature::MoonCaptureBoost, true);
        pending.toggle(SceneFeature::Macro, false);
        assert_eq!(
            pending.features(),
            &[
                (SceneFeature::MoonCaptureBoost, true),
                (SceneFeature::Macro, false)
            ]
        );
    }

    #[test]
    fn test_feature_tags_are_distinct() {
        let tags: std::collections::HashSet<_> =
            SceneFeature::ALL.iter().map(|f| feature_tag(*f)).collect();
        assert_eq!(tags.len(), SceneFeature::ALL.len());
    }
}
