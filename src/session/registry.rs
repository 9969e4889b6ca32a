// SPDX-License-Identifier: GPL-3.0-only

//! Output registry with per-mode admission rules

use crate::errors::{SessionError, SessionResult};
use crate::session::output::{CaptureOutput, OutputKind};
use crate::sketch::SceneMode;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const ALL_KINDS: &[OutputKind] = &[
    OutputKind::Preview,
    OutputKind::Photo,
    OutputKind::Video,
    OutputKind::Metadata,
    OutputKind::Depth,
];

/// Output kinds a session in `mode` accepts
pub fn allowed_kinds(mode: SceneMode) -> &'static [OutputKind] {
    use OutputKind::*;
    match mode {
        SceneMode::Scan => &[Preview],
        SceneMode::Video
        | SceneMode::VideoMacro
        | SceneMode::SlowMotion
        | SceneMode::HighFrameRate => &[Preview, Video, Photo, Metadata],
        SceneMode::ApertureVideo | SceneMode::ProfessionalVideo => &[Preview, Video, Metadata],
        SceneMode::FluorescencePhoto => &[Preview, Photo, Metadata],
        SceneMode::Secure => &[Preview, Metadata],
        _ => ALL_KINDS,
    }
}

/// Output kinds that must all be present when committing in `mode`
pub fn required_kinds(mode: SceneMode) -> &'static [OutputKind] {
    use OutputKind::*;
    match mode {
        SceneMode::Scan | SceneMode::Secure => &[Preview],
        SceneMode::Video
        | SceneMode::VideoMacro
        | SceneMode::SlowMotion
        | SceneMode::HighFrameRate
        | SceneMode::ApertureVideo
        | SceneMode::ProfessionalVideo => &[Preview, Video],
        _ => &[],
    }
}

/// Outputs of one session
#[derive(Debug)]
pub struct StreamRegistry {
    mode: SceneMode,
    outputs: Vec<Arc<CaptureOutput>>,
    secure_output: Option<Uuid>,
}

impl StreamRegistry {
    pub fn new(mode: SceneMode) -> Self {
        Self {
            mode,
            outputs: Vec::new(),
            secure_output: None,
        }
    }

    pub fn mode(&self) -> SceneMode {
        self.mode
    }

    pub fn add(&mut self, output: Arc<CaptureOutput>) -> SessionResult<()> {
        if !allowed_kinds(self.mode).contains(&output.kind()) {
            warn!(mode = %self.mode, kind = %output.kind(), "Output kind not allowed");
            return Err(SessionError::not_allowed(format!(
                "{} output not allowed in {} mode",
                output.kind(),
                self.mode
            )));
        }
        if self.contains(output.id()) {
            return Err(SessionError::not_allowed(format!(
                "output {} already added",
                output.id()
            )));
        }
        debug!(id = %output.id(), kind = %output.kind(), "Output registered");
        self.outputs.push(output);
        Ok(())
    }

    pub fn remove(&mut self, id: Uuid) -> SessionResult<Arc<CaptureOutput>> {
        let index = self
            .outputs
            .iter()
            .position(|o| o.id() == id)
            .ok_or_else(|| SessionError::not_allowed(format!("output {} was never added", id)))?;
        if self.secure_output == Some(id) {
            self.secure_output = None;
        }
        Ok(self.outputs.remove(index))
    }

    /// Flag a registered preview output as the secure stream
    pub fn mark_secure(&mut self, id: Uuid) -> SessionResult<()> {
        if self.mode != SceneMode::Secure {
            return Err(SessionError::not_allowed(format!(
                "secure output not allowed in {} mode",
                self.mode
            )));
        }
        if self.secure_output.is_some() {
            return Err(SessionError::not_allowed("secure output already set"));
        }
        let output = self
            .get(id)
            .ok_or_else(|| SessionError::not_allowed(format!("output {} was never added", id)))?;
        if output.kind() != OutputKind::Preview {
            return Err(SessionError::invalid_argument(
                "only a preview output can be secure",
            ));
        }
        self.secure_output = Some(id);
        Ok(())
    }

    pub fn secure_output(&self) -> Option<Uuid> {
        self.secure_output
    }

    /// Check the mode requirements before a commit
    pub fn validate_for_commit(&self) -> SessionResult<()> {
        if self.outputs.is_empty() {
            return Err(SessionError::not_allowed("no outputs configured"));
        }
        for kind in required_kinds(self.mode) {
            if !self.outputs.iter().any(|o| o.kind() == *kind) {
                return Err(SessionError::not_allowed(format!(
                    "{} mode requires a {} output",
                    self.mode, kind
                )));
            }
        }
        if self.mode == SceneMode::Secure && self.secure_output.is_none() {
            return Err(SessionError::not_allowed(
                "secure mode requires a secure preview output",
            ));
        }
        Ok(())
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.outputs.iter().any(|o| o.id() == id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Arc<CaptureOutput>> {
        self.outputs.iter().find(|o| o.id() == id)
    }

    pub fn outputs(&self) -> &[Arc<CaptureOutput>] {
        &self.outputs
    }

    pub fn previews(&self) -> impl Iterator<Item = &Arc<CaptureOutput>> {
        self.outputs
            .iter()
            .filter(|o| o.kind() == OutputKind::Preview)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Remove every output and the secure flag
    pub fn clear(&mut self) -> Vec<Arc<CaptureOutput>> {
        self.secure_output = None;
        std::mem::take(&mut self.outputs)
    }
}
