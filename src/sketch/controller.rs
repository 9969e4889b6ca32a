// SPDX-License-Identifier: GPL-3.0-only

//! Sketch sub-stream controller
//!
//! One controller exists per preview output with sketch enabled. It owns the
//! forked sketch sub-stream, decides when it runs, and publishes
//! [`SketchStatusData`] to the output's listeners.
//!
//! In [`SketchNotifyMode::Static`] the controller drives the sub-stream from
//! the ratio tables: the stream runs while the zoom is at or above the enable
//! ratio. In [`SketchNotifyMode::Dynamic`] the device pushes start/stop
//! decisions, the reference ratio and the offset directly.

use crate::constants::{DYNAMIC_SKETCH_INFO_LEN, INVALID_RATIO, ratio_at_least};
use crate::device::{
    CameraMetadata, HostStream, ListenerManager, Offset, SketchStatus, SketchStatusData,
    SketchStream, Size, Surface,
};
use crate::errors::{SessionError, SessionResult};
use crate::sketch::scene::SceneFeaturesMode;
use crate::sketch::tables::RatioTables;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};

/// How sketch start/stop decisions are made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SketchNotifyMode {
    /// Derived locally from the ratio tables and the current zoom
    #[default]
    Static,
    /// Pushed by the device through sketch stream info metadata
    Dynamic,
}

/// Dynamic support flag values
const DYNAMIC_FLAG_START: f32 = 1.0;
const DYNAMIC_FLAG_STOP: f32 = 0.0;

/// State guarded by the status lock
#[derive(Debug)]
struct StatusState {
    current_zoom: f32,
    enable_ratio: f32,
    status: SketchStatus,
    dynamic_reference_ratio: f32,
    offset: Offset,
    last_published: SketchStatusData,
    forked: bool,
}

impl Default for StatusState {
    fn default() -> Self {
        Self {
            current_zoom: 0.0,
            enable_ratio: INVALID_RATIO,
            status: SketchStatus::Stopped,
            dynamic_reference_ratio: INVALID_RATIO,
            offset: Offset::default(),
            last_published: SketchStatusData::default(),
            forked: false,
        }
    }
}

pub struct SketchController {
    host: Weak<dyn HostStream>,
    listeners: Mutex<Weak<ListenerManager>>,
    tables: Arc<RatioTables>,
    sketch_size: Size,
    notify_mode: SketchNotifyMode,
    sketch_stream: Mutex<Option<Arc<dyn SketchStream>>>,
    state: Mutex<StatusState>,
    /// Serializes a run-state decision with the Start/Stop call it issues
    run_lock: Mutex<()>,
}

impl SketchController {
    pub fn new(
        host: &Arc<dyn HostStream>,
        tables: Arc<RatioTables>,
        sketch_size: Size,
        notify_mode: SketchNotifyMode,
    ) -> Self {
        Self {
            host: Arc::downgrade(host),
            listeners: Mutex::new(Weak::new()),
            tables,
            sketch_size,
            notify_mode,
            sketch_stream: Mutex::new(None),
            state: Mutex::new(StatusState::default()),
            run_lock: Mutex::new(()),
        }
    }

    pub fn set_listener_manager(&self, listeners: Weak<ListenerManager>) {
        *self.listeners.lock().unwrap_or_else(|e| e.into_inner()) = listeners;
    }

    fn host(&self) -> SessionResult<Arc<dyn HostStream>> {
        self.host
            .upgrade()
            .ok_or_else(|| SessionError::not_available("host stream is gone"))
    }

    fn stream(&self) -> Option<Arc<dyn SketchStream>> {
        self.sketch_stream
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, StatusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Build the tables (static mode) and fork the sketch sub-stream
    pub fn init(
        &self,
        metadata: Option<&CameraMetadata>,
        features_mode: &SceneFeaturesMode,
    ) -> SessionResult<()> {
        let host = self.host()?;
        let enable_ratio = if self.notify_mode == SketchNotifyMode::Static {
            match metadata {
                Some(metadata) => self.tables.rebuild(metadata),
                None => warn!("No capability metadata, sketch tables left untouched"),
            }
            self.tables.enable_ratio(features_mode)
        } else {
            INVALID_RATIO
        };
        self.lock_state().enable_ratio = enable_ratio;
        info!(
            mode = %features_mode,
            enable_ratio,
            size = %self.sketch_size,
            notify = ?self.notify_mode,
            "Forking sketch stream"
        );

        let stream = host.fork_sketch_stream(self.sketch_size, enable_ratio)?;
        *self.sketch_stream.lock().unwrap_or_else(|e| e.into_inner()) = Some(stream);
        self.lock_state().forked = true;
        Ok(())
    }

    pub fn attach_sketch_surface(&self, surface: &Surface) -> SessionResult<()> {
        let stream = self
            .stream()
            .ok_or_else(|| SessionError::not_available("sketch stream not forked"))?;
        if surface.name.is_empty() || !surface.size.is_valid() {
            return Err(SessionError::invalid_argument("sketch surface is empty"));
        }
        stream.add_deferred_surface(surface)
    }

    /// Push a new enable ratio to the host, then re-evaluate the run state
    ///
    /// Ignored in dynamic mode. The local ratio only changes when the host
    /// accepted it, but the run state is re-evaluated either way.
    pub fn update_sketch_ratio(&self, ratio: f32) -> SessionResult<()> {
        if self.notify_mode == SketchNotifyMode::Dynamic {
            return Ok(());
        }
        if self.stream().is_none() {
            return Err(SessionError::not_available("sketch stream not forked"));
        }
        let host = self.host()?;
        let result = host.update_sketch_ratio(ratio);
        if result.is_ok() {
            self.lock_state().enable_ratio = ratio;
        }
        self.auto_stream();
        result
    }

    /// Record a new zoom ratio and re-evaluate the run state
    pub fn update_zoom_ratio(&self, zoom: f32) {
        self.lock_state().current_zoom = zoom;
        self.auto_stream();
    }

    fn auto_stream(&self) {
        // Dynamic streams follow device pushes only
        if self.notify_mode == SketchNotifyMode::Dynamic {
            return;
        }
        let _run = self.run_lock.lock().unwrap_or_else(|e| e.into_inner());
        let desired = {
            let state = self.lock_state();
            let desired = state.current_zoom > 0.0
                && state.enable_ratio > 0.0
                && ratio_at_least(state.current_zoom, state.enable_ratio);
            // Deduplicate against the observed status, which host reports and
            // direct start/stop calls keep current
            if state.status.is_running() == desired {
                return;
            }
            desired
        };
        let result = if desired {
            self.start_sketch_stream()
        } else {
            self.stop_sketch_stream()
        };
        if let Err(err) = result {
            debug!(error = %err, desired, "Sketch auto stream call failed");
        }
    }

    pub fn start_sketch_stream(&self) -> SessionResult<()> {
        let stream = self
            .stream()
            .ok_or_else(|| SessionError::not_available("sketch stream not forked"))?;
        self.lock_state().status = SketchStatus::Starting;
        let result = stream.start();
        self.lock_state().status = if result.is_ok() {
            SketchStatus::Started
        } else {
            SketchStatus::Stopped
        };
        result
    }

    pub fn stop_sketch_stream(&self) -> SessionResult<()> {
        let stream = self
            .stream()
            .ok_or_else(|| SessionError::not_available("sketch stream not forked"))?;
        let previous = {
            let mut state = self.lock_state();
            let previous = state.status;
            state.status = SketchStatus::Stopping;
            previous
        };
        let result = stream.stop();
        self.lock_state().status = if result.is_ok() {
            SketchStatus::Stopped
        } else {
            previous
        };
        result
    }

    fn reference_ratio(&self, state: &StatusState, features_mode: &SceneFeaturesMode) -> f32 {
        match self.notify_mode {
            SketchNotifyMode::Dynamic => state.dynamic_reference_ratio,
            SketchNotifyMode::Static => self
                .tables
                .reference_fov_ratio(features_mode, state.current_zoom),
        }
    }

    /// Publish the current status if it differs from the last published one
    fn publish_status(&self, features_mode: &SceneFeaturesMode, force: bool) {
        let Some(listeners) = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .upgrade()
        else {
            return;
        };
        let data = {
            let mut state = self.lock_state();
            let data = SketchStatusData {
                status: state.status,
                sketch_ratio: self.reference_ratio(&state, features_mode),
                offset: state.offset,
            };
            if !force && data == state.last_published {
                return;
            }
            debug!(
                from = %state.last_published.status,
                to = %data.status,
                ratio = data.sketch_ratio,
                "Sketch status data changed"
            );
            state.last_published = data;
            data
        };
        // Listeners run outside the status lock
        listeners.trigger_listener(&data);
    }

    /// Host-reported status change
    pub fn on_sketch_status_changed(&self, status: SketchStatus, features_mode: &SceneFeaturesMode) {
        self.lock_state().status = status;
        self.publish_status(features_mode, false);
    }

    /// Zoom ratio changed on the device
    pub fn on_zoom_changed(&self, zoom: f32, features_mode: &SceneFeaturesMode) {
        debug!(zoom, mode = %features_mode, "Sketch zoom changed");
        self.update_zoom_ratio(zoom);
        self.publish_status(features_mode, false);
    }

    /// Scene feature (macro, moon capture boost) changed on the device
    pub fn on_features_mode_changed(&self, features_mode: &SceneFeaturesMode) {
        let ratio = self.tables.enable_ratio(features_mode);
        debug!(mode = %features_mode, ratio, "Sketch features mode changed");
        if let Err(err) = self.update_sketch_ratio(ratio) {
            warn!(error = %err, "Failed to update sketch enable ratio");
        }
        self.publish_status(features_mode, false);
    }

    /// Device push in dynamic mode:
    /// `[support_flag, reference_ratio, offset_x, offset_y]`
    pub fn on_dynamic_sketch_info(&self, values: &[f32], features_mode: &SceneFeaturesMode) {
        if values.len() != DYNAMIC_SKETCH_INFO_LEN {
            info!(len = values.len(), "Ignoring malformed sketch stream info");
            return;
        }
        let flag = values[0];
        {
            let mut state = self.lock_state();
            state.dynamic_reference_ratio = values[1];
            state.offset = Offset {
                x: values[2],
                y: values[3],
            };
        }
        let run = self.run_lock.lock().unwrap_or_else(|e| e.into_inner());
        let result = if flag == DYNAMIC_FLAG_START {
            self.start_sketch_stream()
        } else if flag == DYNAMIC_FLAG_STOP {
            self.stop_sketch_stream()
        } else {
            Ok(())
        };
        drop(run);
        if let Err(err) = result {
            debug!(error = %err, flag, "Dynamic sketch start/stop failed");
        }
        self.publish_status(features_mode, true);
    }

    /// Stop and release the sub-stream, then detach it from the host
    ///
    /// Safe to call repeatedly; later calls are no-ops.
    pub fn destroy(&self) -> SessionResult<()> {
        if let Some(stream) = self
            .sketch_stream
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            if let Err(err) = stream.stop() {
                debug!(error = %err, "Sketch stop during destroy failed");
            }
            if let Err(err) = stream.release() {
                debug!(error = %err, "Sketch release during destroy failed");
            }
        }
        {
            let mut state = self.lock_state();
            state.status = SketchStatus::Stopped;
            if !state.forked {
                return Ok(());
            }
            state.forked = false;
        }
        self.host()?.remove_sketch_stream()
    }

    // ===== Getters =====

    pub fn notify_mode(&self) -> SketchNotifyMode {
        self.notify_mode
    }

    pub fn sketch_size(&self) -> Size {
        self.sketch_size
    }

    pub fn sketch_status(&self) -> SketchStatus {
        self.lock_state().status
    }

    pub fn current_zoom(&self) -> f32 {
        self.lock_state().current_zoom
    }

    pub fn enable_ratio(&self) -> f32 {
        self.lock_state().enable_ratio
    }

    pub fn last_published(&self) -> SketchStatusData {
        self.lock_state().last_published
    }

    pub fn is_forked(&self) -> bool {
        self.stream().is_some()
    }
}

impl Drop for SketchController {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            debug!(error = %err, "Sketch controller destroy on drop failed");
        }
    }
}

impl std::fmt::Debug for SketchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SketchController")
            .field("sketch_size", &self.sketch_size)
            .field("notify_mode", &self.notify_mode)
            .field("status", &self.sketch_status())
            .finish()
    }
}
