// SPDX-License-Identifier: GPL-3.0-only

//! Capture session
//!
//! A session binds one device input to a set of outputs and walks them
//! through configuration, commit, streaming and release. Control changes go
//! through [`CaptureSession::lock_for_control`]; device-reported changes come
//! in through [`CaptureSession::on_metadata_changed`]. Both are routed to the
//! sketch controller of every preview output.
//!
//! Lock order is state, then inner. Getters only take the inner lock and
//! degrade to defaults once the session or its input is gone.

pub mod control;
pub mod output;
pub mod registry;
pub mod state;

pub use control::{ControlGuard, PendingSettings};
pub use output::{CaptureOutput, OutputKind, find_sketch_size, supported_preview_sizes};
pub use registry::StreamRegistry;
pub use state::{SessionState, StateMachine};

use crate::config::SessionConfig;
use crate::constants::{INVALID_RATIO, ZOOM_CAP_FIXED_POINT_DIV};
use crate::device::{
    CameraMetadata, DeviceInput, MetadataItem, MetadataTag, SketchListener, SketchStatus, Size,
    Surface,
};
use crate::errors::{SessionError, SessionResult};
use crate::sketch::{
    RatioTables, SceneFeature, SceneFeaturesMode, SceneMode, SketchController, dispatch_metadata,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct SessionInner {
    input: Option<Arc<dyn DeviceInput>>,
    registry: StreamRegistry,
    features_mode: SceneFeaturesMode,
    /// Last submitted control settings
    settings: CameraMetadata,
}

pub struct CaptureSession {
    id: Uuid,
    config: SessionConfig,
    tables: Arc<RatioTables>,
    state: StateMachine,
    inner: Mutex<SessionInner>,
    /// Serializes control transactions
    control: Mutex<()>,
}

impl CaptureSession {
    /// Session for `mode` with default configuration and its own ratio tables
    pub fn new(mode: SceneMode) -> Self {
        Self::with_config(mode, SessionConfig::default(), Arc::new(RatioTables::new()))
    }

    pub fn with_config(mode: SceneMode, config: SessionConfig, tables: Arc<RatioTables>) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, mode = %mode, "Capture session created");
        Self {
            id,
            config,
            tables,
            state: StateMachine::new(),
            inner: Mutex::new(SessionInner {
                input: None,
                registry: StreamRegistry::new(mode),
                features_mode: SceneFeaturesMode::from_mode(mode),
                settings: CameraMetadata::new(),
            }),
            control: Mutex::new(()),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn require_configuring(state: SessionState, op: &str) -> SessionResult<()> {
        match state {
            SessionState::Configuring => Ok(()),
            SessionState::Released => Err(SessionError::not_configured(format!(
                "{op}: session already released"
            ))),
            other => Err(SessionError::not_configured(format!(
                "{op}: session is {other}, not configuring"
            ))),
        }
    }

    // ===== Lifecycle =====

    pub fn begin_config(&self) -> SessionResult<()> {
        let mut guard = self.state.guard();
        match guard.state() {
            SessionState::Idle => {}
            SessionState::Committed => {
                let previews: Vec<_> = self.lock_inner().registry.previews().cloned().collect();
                for preview in previews {
                    if let Some(sketch) = preview.take_sketch() {
                        debug!(output = %preview.id(), "Tearing down sketch for reconfiguration");
                        if let Err(err) = sketch.destroy() {
                            warn!(error = %err, "Sketch teardown failed");
                        }
                    }
                }
            }
            SessionState::Released => {
                return Err(SessionError::not_allowed("session already released"));
            }
            other => {
                return Err(SessionError::not_allowed(format!(
                    "cannot begin config while {other}"
                )));
            }
        }
        guard.transfer(SessionState::Configuring)?;
        info!(session = %self.id, "Session configuration started");
        Ok(())
    }

    pub fn add_input(&self, input: Arc<dyn DeviceInput>) -> SessionResult<()> {
        let guard = self.state.guard();
        Self::require_configuring(guard.state(), "add input")?;
        let mut inner = self.lock_inner();
        if let Some(existing) = &inner.input {
            return Err(SessionError::not_allowed(format!(
                "session already has input {}",
                existing.id()
            )));
        }
        if !input.is_open() {
            input.open()?;
        }
        info!(session = %self.id, input = input.id(), "Input added");
        inner.input = Some(input);
        Ok(())
    }

    pub fn remove_input(&self, input: &Arc<dyn DeviceInput>) -> SessionResult<()> {
        let guard = self.state.guard();
        Self::require_configuring(guard.state(), "remove input")?;
        let mut inner = self.lock_inner();
        let is_current = inner
            .input
            .as_ref()
            .is_some_and(|current| current.id() == input.id());
        if !is_current {
            return Err(SessionError::not_allowed(format!(
                "input {} was never added",
                input.id()
            )));
        }
        inner.input = None;
        info!(session = %self.id, input = input.id(), "Input removed");
        Ok(())
    }

    pub fn add_output(&self, output: Arc<CaptureOutput>) -> SessionResult<()> {
        let guard = self.state.guard();
        Self::require_configuring(guard.state(), "add output")?;
        self.lock_inner().registry.add(output)
    }

    pub fn remove_output(&self, id: Uuid) -> SessionResult<()> {
        let guard = self.state.guard();
        Self::require_configuring(guard.state(), "remove output")?;
        let output = self.lock_inner().registry.remove(id)?;
        if let Some(sketch) = output.take_sketch() {
            if let Err(err) = sketch.destroy() {
                warn!(error = %err, "Sketch teardown on output removal failed");
            }
        }
        Ok(())
    }

    /// Mark a registered preview output as the secure stream (secure mode only)
    pub fn add_secure_output(&self, id: Uuid) -> SessionResult<()> {
        let guard = self.state.guard();
        Self::require_configuring(guard.state(), "add secure output")?;
        self.lock_inner().registry.mark_secure(id)
    }

    pub fn commit_config(&self) -> SessionResult<()> {
        let mut guard = self.state.guard();
        match guard.state() {
            SessionState::Configuring => {}
            SessionState::Committed | SessionState::Started => {
                return Err(SessionError::not_allowed("session already committed"));
            }
            SessionState::Released => {
                return Err(SessionError::not_allowed("session already released"));
            }
            SessionState::Idle => {
                return Err(SessionError::not_configured("commit before begin config"));
            }
        }
        {
            let inner = self.lock_inner();
            if inner.input.is_none() {
                return Err(SessionError::not_allowed("no input configured"));
            }
            inner.registry.validate_for_commit()?;
        }
        guard.transfer(SessionState::Committed)?;
        info!(session = %self.id, "Session committed");
        Ok(())
    }

    /// Start every preview stream
    pub fn start(&self) -> SessionResult<()> {
        let mut guard = self.state.guard();
        match guard.state() {
            SessionState::Committed => {}
            SessionState::Started => {
                debug!(session = %self.id, "Session already started");
                return Ok(());
            }
            other => {
                return Err(SessionError::not_configured(format!(
                    "cannot start while {other}"
                )));
            }
        }
        let previews: Vec<_> = self.lock_inner().registry.previews().cloned().collect();
        for preview in &previews {
            preview.stream().start().map_err(|err| {
                error!(output = %preview.id(), error = %err, "Preview start failed");
                err
            })?;
        }
        guard.transfer(SessionState::Started)?;
        info!(session = %self.id, previews = previews.len(), "Session started");
        Ok(())
    }

    /// Stop every stream and return to committed
    pub fn stop(&self) -> SessionResult<()> {
        let mut guard = self.state.guard();
        match guard.state() {
            SessionState::Started => {}
            SessionState::Committed => return Ok(()),
            other => {
                return Err(SessionError::not_configured(format!(
                    "cannot stop while {other}"
                )));
            }
        }
        let outputs = self.outputs();
        for output in &outputs {
            if let Err(err) = output.stream().stop() {
                warn!(output = %output.id(), error = %err, "Stream stop failed");
            }
        }
        guard.transfer(SessionState::Committed)?;
        info!(session = %self.id, "Session stopped");
        Ok(())
    }

    /// Tear everything down; the session cannot be reused
    pub fn release(&self) -> SessionResult<()> {
        let mut guard = self.state.guard();
        if guard.state() == SessionState::Released {
            return Err(SessionError::not_allowed("session already released"));
        }
        let (outputs, input) = {
            let mut inner = self.lock_inner();
            (inner.registry.clear(), inner.input.take())
        };
        for output in &outputs {
            if let Some(sketch) = output.take_sketch() {
                if let Err(err) = sketch.destroy() {
                    debug!(error = %err, "Sketch teardown on release failed");
                }
            }
            if let Err(err) = output.stream().stop() {
                debug!(error = %err, "Stream stop on release failed");
            }
            if let Err(err) = output.stream().release() {
                warn!(output = %output.id(), error = %err, "Stream release failed");
            }
        }
        if let Some(input) = input {
            if let Err(err) = input.close() {
                warn!(input = input.id(), error = %err, "Input close failed");
            }
        }
        guard.transfer(SessionState::Released)?;
        info!(session = %self.id, "Session released");
        Ok(())
    }

    // ===== Control =====

    /// Open a control transaction
    pub fn lock_for_control(&self) -> ControlGuard<'_> {
        ControlGuard::new(self, self.control.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub(crate) fn submit_settings(&self, pending: PendingSettings) -> SessionResult<()> {
        if pending.is_empty() {
            return Ok(());
        }
        if !self.state().is_committed() {
            return Err(SessionError::not_configured(
                "control changes require a committed session",
            ));
        }
        let input = self
            .lock_inner()
            .input
            .clone()
            .ok_or_else(|| SessionError::not_configured("session input is gone"))?;
        input.update_setting(pending.changes())?;

        let (previews, features_mode) = {
            let mut inner = self.lock_inner();
            inner.settings.merge(pending.changes());
            for (feature, enable) in pending.features() {
                inner.features_mode.switch_feature(*feature, *enable);
            }
            (
                inner.registry.previews().cloned().collect::<Vec<_>>(),
                inner.features_mode.clone(),
            )
        };
        debug!(
            session = %self.id,
            changes = pending.changes().len(),
            mode = %features_mode,
            "Control settings submitted"
        );
        for item in pending.changes().items() {
            Self::route_to_sketches(&previews, &features_mode, item);
        }
        Ok(())
    }

    fn route_to_sketches(
        previews: &[Arc<CaptureOutput>],
        features_mode: &SceneFeaturesMode,
        item: &MetadataItem,
    ) {
        for preview in previews {
            if let Some(sketch) = preview.sketch() {
                if let Err(err) = dispatch_metadata(&sketch, features_mode, item) {
                    warn!(output = %preview.id(), error = %err, "Sketch metadata dispatch failed");
                }
            }
        }
    }

    /// Device callback: a metadata item changed
    pub fn on_metadata_changed(&self, item: &MetadataItem) -> SessionResult<()> {
        if item.count() == 0 {
            return Err(SessionError::invalid_argument(format!(
                "metadata item {:?} has no values",
                item.tag
            )));
        }
        let (previews, features_mode) = {
            let mut inner = self.lock_inner();
            match item.tag {
                MetadataTag::ControlZoomRatio => inner.settings.insert(item.clone()),
                MetadataTag::ControlSmoothZoomRatios => {
                    if let Some(current) = item.as_f32().and_then(|v| v.first()) {
                        inner.settings.insert(MetadataItem::f32(
                            MetadataTag::ControlZoomRatio,
                            [*current],
                        ));
                    }
                }
                MetadataTag::ControlCameraMacro => {
                    if let Some(flag) = item.as_u8().and_then(|v| v.first()) {
                        inner.features_mode.switch_feature(SceneFeature::Macro, *flag != 0);
                    }
                }
                MetadataTag::ControlMoonCaptureBoost => {
                    if let Some(flag) = item.as_u8().and_then(|v| v.first()) {
                        inner
                            .features_mode
                            .switch_feature(SceneFeature::MoonCaptureBoost, *flag != 0);
                    }
                }
                _ => {}
            }
            (
                inner.registry.previews().cloned().collect::<Vec<_>>(),
                inner.features_mode.clone(),
            )
        };
        Self::route_to_sketches(&previews, &features_mode, item);
        Ok(())
    }

    /// Host callback: the sketch sub-stream of `output` changed status
    pub fn on_sketch_status_changed(&self, output: Uuid, status: SketchStatus) {
        let (sketch, features_mode) = {
            let inner = self.lock_inner();
            (
                inner.registry.get(output).and_then(|o| o.sketch()),
                inner.features_mode.clone(),
            )
        };
        match sketch {
            Some(sketch) => sketch.on_sketch_status_changed(status, &features_mode),
            None => debug!(output = %output, "Sketch status for output without sketch"),
        }
    }

    // ===== Sketch =====

    fn capability_metadata(&self) -> Option<Arc<CameraMetadata>> {
        self.lock_inner()
            .input
            .as_ref()
            .and_then(|input| input.capability_metadata())
    }

    /// Sketch size for `output`, `None` when the output cannot carry a sketch
    fn sketch_size_for(&self, output: &CaptureOutput, metadata: &CameraMetadata) -> Option<Size> {
        let profile = output.profile();
        if output.kind() != OutputKind::Preview || !profile.format.supports_sketch() {
            return None;
        }
        let candidates = supported_preview_sizes(metadata, profile.format);
        find_sketch_size(
            profile.size,
            &candidates,
            self.config.sketch_min_width,
            self.config.sketch_aspect_tolerance,
        )
    }

    fn has_enable_ratio(&self, features_mode: &SceneFeaturesMode) -> bool {
        self.tables.enable_ratio(features_mode) > 0.0
            || features_mode
                .feature_modes()
                .iter()
                .any(|mode| self.tables.enable_ratio(mode) > 0.0)
    }

    /// Whether a sketch can be enabled on `output`
    pub fn is_sketch_supported(&self, output: Uuid) -> bool {
        let Some(output) = self.output(output) else {
            return false;
        };
        let Some(metadata) = self.capability_metadata() else {
            return false;
        };
        if self.sketch_size_for(&output, &metadata).is_none() {
            debug!(output = %output.id(), "No sketch size for preview");
            return false;
        }
        self.tables.rebuild(&metadata);
        self.has_enable_ratio(&self.features_mode())
    }

    /// Create (`true`) or destroy (`false`) the sketch controller of `output`
    pub fn enable_sketch(&self, output: Uuid, enable: bool) -> SessionResult<()> {
        let state = self.state();
        if !matches!(state, SessionState::Configuring | SessionState::Committed) {
            return Err(SessionError::not_configured(format!(
                "cannot change sketch while {state}"
            )));
        }
        let target = self
            .output(output)
            .ok_or_else(|| SessionError::not_allowed(format!("output {output} was never added")))?;

        if !enable {
            let sketch = target
                .take_sketch()
                .ok_or_else(|| SessionError::not_allowed("sketch not enabled"))?;
            info!(output = %output, "Sketch disabled");
            return sketch.destroy();
        }

        if target.sketch().is_some() {
            return Err(SessionError::not_allowed("sketch already enabled"));
        }
        let metadata = self
            .capability_metadata()
            .ok_or_else(|| SessionError::not_allowed("sketch not supported: no device metadata"))?;
        let size = self
            .sketch_size_for(&target, &metadata)
            .ok_or_else(|| SessionError::not_allowed("sketch not supported: no sketch size"))?;
        self.tables.rebuild(&metadata);
        let features_mode = self.features_mode();
        if !self.has_enable_ratio(&features_mode) {
            return Err(SessionError::not_allowed(
                "sketch not supported: no enable ratio",
            ));
        }

        let controller = Arc::new(SketchController::new(
            target.stream(),
            self.tables.clone(),
            size,
            self.config.sketch_notify_mode,
        ));
        controller.set_listener_manager(Arc::downgrade(target.listeners()));
        controller.init(Some(&metadata), &features_mode)?;
        target.set_sketch(controller.clone());
        info!(output = %output, size = %size, mode = %features_mode, "Sketch enabled");
        self.sync_sketch_zoom(&controller);
        Ok(())
    }

    /// Bring a sketch of a committed session up to the applied zoom
    fn sync_sketch_zoom(&self, sketch: &SketchController) {
        let zoom = self.zoom_ratio();
        if zoom <= 0.0 {
            return;
        }
        let features_mode = self.features_mode();
        let ratio = self.tables.enable_ratio(&features_mode);
        debug!(zoom, ratio, mode = %features_mode, "Syncing sketch with applied zoom");
        if let Err(err) = sketch.update_sketch_ratio(ratio) {
            debug!(error = %err, "Sketch ratio sync failed");
        }
        sketch.update_zoom_ratio(zoom);
    }

    /// Add a sketch listener to `output`
    ///
    /// A committed sketch is synced with the applied zoom so the new listener
    /// sees a running stream without waiting for the next zoom change.
    pub fn register_sketch_listener(
        &self,
        output: Uuid,
        listener: Arc<dyn SketchListener>,
    ) -> SessionResult<()> {
        let target = self
            .output(output)
            .ok_or_else(|| SessionError::not_allowed(format!("output {output} was never added")))?;
        target.listeners().add_listener(listener);
        if let Some(sketch) = target.sketch() {
            self.sync_sketch_zoom(&sketch);
        }
        Ok(())
    }

    /// Remove a sketch listener from `output` and stop its sketch stream
    pub fn unregister_sketch_listener(
        &self,
        output: Uuid,
        listener: &Arc<dyn SketchListener>,
    ) -> SessionResult<()> {
        let target = self
            .output(output)
            .ok_or_else(|| SessionError::not_allowed(format!("output {output} was never added")))?;
        target.listeners().remove_listener(listener);
        if let Some(sketch) = target.sketch() {
            if let Err(err) = sketch.stop_sketch_stream() {
                debug!(output = %output, error = %err, "Sketch stop on unregister failed");
            }
        }
        Ok(())
    }

    fn committed_sketch(&self, output: Uuid, op: &str) -> SessionResult<Arc<SketchController>> {
        let state = self.state();
        if !state.is_committed() {
            error!(output = %output, %state, op, "Sketch control requires a committed session");
            return Err(SessionError::not_configured(format!(
                "{op}: session is {state}, not committed"
            )));
        }
        self.output(output)
            .and_then(|o| o.sketch())
            .ok_or_else(|| SessionError::not_allowed(format!("{op}: sketch not enabled")))
    }

    /// Start the sketch stream of `output` by hand
    pub fn start_sketch(&self, output: Uuid) -> SessionResult<()> {
        self.committed_sketch(output, "start sketch")?
            .start_sketch_stream()
    }

    /// Stop the sketch stream of `output` by hand
    pub fn stop_sketch(&self, output: Uuid) -> SessionResult<()> {
        self.committed_sketch(output, "stop sketch")?
            .stop_sketch_stream()
    }

    pub fn attach_sketch_surface(&self, output: Uuid, surface: &Surface) -> SessionResult<()> {
        if surface.name.is_empty() || !surface.size.is_valid() {
            return Err(SessionError::invalid_argument("sketch surface is empty"));
        }
        let sketch = self
            .output(output)
            .and_then(|o| o.sketch())
            .ok_or_else(|| SessionError::not_allowed("sketch not enabled"))?;
        sketch.attach_sketch_surface(surface)
    }

    /// Enable ratio for the current features mode, negative when unknown
    pub fn get_sketch_ratio(&self, output: Uuid) -> f32 {
        if self.state() == SessionState::Released || self.output(output).is_none() {
            return INVALID_RATIO;
        }
        let Some(metadata) = self.capability_metadata() else {
            return INVALID_RATIO;
        };
        self.tables.rebuild(&metadata);
        self.tables.enable_ratio(&self.features_mode())
    }

    /// Sketch status of `output`, stopped when it has no sketch
    pub fn sketch_status(&self, output: Uuid) -> SketchStatus {
        self.output(output)
            .and_then(|o| o.sketch())
            .map(|s| s.sketch_status())
            .unwrap_or_default()
    }

    // ===== Getters =====

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn tables(&self) -> &Arc<RatioTables> {
        &self.tables
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    pub fn scene_mode(&self) -> SceneMode {
        self.lock_inner().registry.mode()
    }

    pub fn features_mode(&self) -> SceneFeaturesMode {
        self.lock_inner().features_mode.clone()
    }

    pub fn has_input(&self) -> bool {
        self.lock_inner().input.is_some()
    }

    pub fn outputs(&self) -> Vec<Arc<CaptureOutput>> {
        self.lock_inner().registry.outputs().to_vec()
    }

    pub fn output(&self, id: Uuid) -> Option<Arc<CaptureOutput>> {
        self.lock_inner().registry.get(id).cloned()
    }

    /// Current zoom ratio, 0.0 when uncommitted or the input is gone
    pub fn zoom_ratio(&self) -> f32 {
        if !self.state().is_committed() {
            return 0.0;
        }
        let inner = self.lock_inner();
        if inner.input.is_none() {
            return 0.0;
        }
        inner
            .settings
            .find(MetadataTag::ControlZoomRatio)
            .and_then(|item| item.as_f32())
            .and_then(|v| v.first().copied())
            .unwrap_or(0.0)
    }

    /// Device zoom range `(min, max)` for the scene mode
    pub fn zoom_ratio_range(&self) -> Option<(f32, f32)> {
        if !self.state().is_committed() {
            return None;
        }
        let mode = self.scene_mode();
        let metadata = self.capability_metadata()?;
        let data = metadata
            .find(MetadataTag::AbilitySceneZoomCap)
            .and_then(|item| item.as_i32())?;
        data.chunks_exact(3)
            .find(|t| u32::try_from(t[0]).ok() == Some(mode.ordinal()))
            .map(|t| {
                (
                    t[1] as f32 / ZOOM_CAP_FIXED_POINT_DIV,
                    t[2] as f32 / ZOOM_CAP_FIXED_POINT_DIV,
                )
            })
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("features_mode", &self.features_mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::simulated::{SimulatedDevice, SimulatedHostStream};
    use crate::device::{PixelFormat, Profile};

    fn device() -> Arc<SimulatedDevice> {
        let metadata = CameraMetadata::new()
            .with(MetadataItem::f32(MetadataTag::AbilitySketchEnableRatio, [1.0, 2.0]))
            .with(MetadataItem::i32(
                MetadataTag::AbilitySceneZoomCap,
                [1, 100, 1000, 2, 100, 600],
            ))
            .with(MetadataItem::u32(
                MetadataTag::AbilityAvailablePreviewSizes,
                [1003, 1920, 1080, 1003, 640, 360],
            ));
        Arc::new(SimulatedDevice::new("cam0", metadata))
    }

    fn preview() -> Arc<CaptureOutput> {
        Arc::new(CaptureOutput::preview(
            Profile::new(PixelFormat::Yuv420Sp, Size::new(1920, 1080)),
            Arc::new(SimulatedHostStream::new()),
        ))
    }

    fn committed() -> (CaptureSession, Arc<SimulatedDevice>, Arc<CaptureOutput>) {
        let session = CaptureSession::new(SceneMode::Capture);
        let device = device();
        let output = preview();
        session.begin_config().expect("begin");
        session.add_input(device.clone()).expect("input");
        session.add_output(output.clone()).expect("output");
        session.commit_config().expect("commit");
        (session, device, output)
    }

    #[test]
    fn test_mutations_outside_configuring_fail() {
        let session = CaptureSession::new(SceneMode::Capture);
        let err = session.add_output(preview()).unwrap_err();
        assert!(matches!(err, SessionError::NotConfigured(_)));
    }

    #[test]
    fn test_second_input_rejected() {
        let session = CaptureSession::new(SceneMode::Capture);
        session.begin_config().expect("begin");
        session.add_input(device()).expect("first input");
        let second: Arc<dyn DeviceInput> = Arc::new(SimulatedDevice::new("cam1", CameraMetadata::new()));
        let err = session.add_input(second).unwrap_err();
        assert!(matches!(err, SessionError::OperationNotAllowed(_)));
    }

    #[test]
    fn test_begin_config_rejected_while_started() {
        let (session, _device, _output) = committed();
        session.start().expect("start");
        assert!(session.begin_config().is_err());
        session.stop().expect("stop");
        session.begin_config().expect("reconfigure after stop");
    }

    #[test]
    fn test_zoom_is_clamped_to_mode_range() {
        let (session, device, _output) = committed();
        {
            let mut control = session.lock_for_control();
            control.set_zoom_ratio(25.0).expect("zoom accepted");
        }
        assert_eq!(session.zoom_ratio(), 10.0);
        assert_eq!(device.submitted().len(), 1);
        assert_eq!(session.zoom_ratio_range(), Some((1.0, 10.0)));
    }

    #[test]
    fn test_zero_zoom_rejected() {
        let (session, _device, _output) = committed();
        let mut control = session.lock_for_control();
        let err = control.set_zoom_ratio(0.0).unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
    }

    #[test]
    fn test_control_requires_commit() {
        let session = CaptureSession::new(SceneMode::Capture);
        let mut control = session.lock_for_control();
        let err = control.set_zoom_ratio(2.0).unwrap_err();
        assert!(matches!(err, SessionError::NotConfigured(_)));
    }

    #[test]
    fn test_getters_default_after_release() {
        let (session, _device, output) = committed();
        session.release().expect("release");
        assert_eq!(session.zoom_ratio(), 0.0);
        assert_eq!(session.zoom_ratio_range(), None);
        assert_eq!(session.get_sketch_ratio(output.id()), INVALID_RATIO);
        assert!(!session.has_input());
        let err = session.release().unwrap_err();
        assert_eq!(
            err,
            SessionError::OperationNotAllowed("session already released".into())
        );
    }

    #[test]
    fn test_feature_toggle_updates_features_mode() {
        let (session, _device, _output) = committed();
        session
            .lock_for_control()
            .set_scene_feature(SceneFeature::Macro, true)
            .expect("feature accepted");
        assert!(session.features_mode().has_feature(SceneFeature::Macro));
    }
}
