// SPDX-License-Identifier: GPL-3.0-only

//! In-process device implementations
//!
//! Used by the `simulate` command and by tests. Every call is counted so
//! callers can assert exactly which device operations a session issued.

use super::{
    CameraMetadata, DeviceInput, HostStream, SketchListener, SketchStatusData, SketchStream,
    Size, Surface,
};
use crate::errors::{SessionError, SessionResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Sketch sub-stream that records its lifecycle
#[derive(Debug, Default)]
pub struct SimulatedSketchStream {
    size: Size,
    running: AtomicBool,
    released: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    surfaces: Mutex<Vec<Surface>>,
}

impl SimulatedSketchStream {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn surfaces(&self) -> Vec<Surface> {
        self.surfaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl SketchStream for SimulatedSketchStream {
    fn start(&self) -> SessionResult<()> {
        if self.is_released() {
            return Err(SessionError::ServiceFatal(
                "sketch stream already released".into(),
            ));
        }
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        debug!(size = %self.size, "Simulated sketch stream started");
        Ok(())
    }

    fn stop(&self) -> SessionResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        debug!(size = %self.size, "Simulated sketch stream stopped");
        Ok(())
    }

    fn release(&self) -> SessionResult<()> {
        self.running.store(false, Ordering::SeqCst);
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn add_deferred_surface(&self, surface: &Surface) -> SessionResult<()> {
        self.surfaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(surface.clone());
        Ok(())
    }
}

/// Preview stream that can fork one sketch sub-stream
#[derive(Debug, Default)]
pub struct SimulatedHostStream {
    running: AtomicBool,
    released: AtomicBool,
    fork_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    sketch: Mutex<Option<Arc<SimulatedSketchStream>>>,
    sketch_ratios: Mutex<Vec<f32>>,
}

impl SimulatedHostStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn fork_calls(&self) -> usize {
        self.fork_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    /// The currently forked sketch sub-stream, if any
    pub fn sketch(&self) -> Option<Arc<SimulatedSketchStream>> {
        self.sketch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Every enable ratio pushed through [`HostStream::update_sketch_ratio`]
    pub fn pushed_ratios(&self) -> Vec<f32> {
        self.sketch_ratios
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl HostStream for SimulatedHostStream {
    fn start(&self) -> SessionResult<()> {
        if self.is_released() {
            return Err(SessionError::ServiceFatal("stream already released".into()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> SessionResult<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> SessionResult<()> {
        self.running.store(false, Ordering::SeqCst);
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn fork_sketch_stream(
        &self,
        size: Size,
        enable_ratio: f32,
    ) -> SessionResult<Arc<dyn SketchStream>> {
        self.fork_calls.fetch_add(1, Ordering::SeqCst);
        let sketch = Arc::new(SimulatedSketchStream::new(size));
        *self.sketch.lock().unwrap_or_else(|e| e.into_inner()) = Some(sketch.clone());
        info!(size = %size, enable_ratio, "Forked simulated sketch stream");
        Ok(sketch)
    }

    fn remove_sketch_stream(&self) -> SessionResult<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.sketch.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }

    fn update_sketch_ratio(&self, ratio: f32) -> SessionResult<()> {
        self.sketch_ratios
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ratio);
        Ok(())
    }
}

/// Camera input backed by a fixed capability set
#[derive(Debug)]
pub struct SimulatedDevice {
    id: String,
    open: AtomicBool,
    capabilities: Mutex<Option<Arc<CameraMetadata>>>,
    submitted: Mutex<Vec<CameraMetadata>>,
}

impl SimulatedDevice {
    pub fn new(id: impl Into<String>, capabilities: CameraMetadata) -> Self {
        Self {
            id: id.into(),
            open: AtomicBool::new(false),
            capabilities: Mutex::new(Some(Arc::new(capabilities))),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Drop the capability metadata, as a concurrent device release would
    pub fn tear_down(&self) {
        self.capabilities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Every settings batch submitted so far
    pub fn submitted(&self) -> Vec<CameraMetadata> {
        self.submitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl DeviceInput for SimulatedDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&self) -> SessionResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> SessionResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn capability_metadata(&self) -> Option<Arc<CameraMetadata>> {
        self.capabilities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn update_setting(&self, changed: &CameraMetadata) -> SessionResult<()> {
        if !self.is_open() {
            return Err(SessionError::ServiceFatal(format!(
                "device {} is not open",
                self.id
            )));
        }
        self.submitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(changed.clone());
        Ok(())
    }
}

/// Listener that keeps every event it receives
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<SketchStatusData>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<SketchStatusData> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<SketchStatusData> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .copied()
    }
}

impl SketchListener for RecordingListener {
    fn on_sketch_status_changed(&self, data: &SketchStatusData) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(*data);
    }
}
