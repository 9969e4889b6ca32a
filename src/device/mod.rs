// SPDX-License-Identifier: MPL-2.0
// Device-side abstraction consumed by the session core

//! Device abstraction
//!
//! The session core never talks to camera hardware directly. Streams, the
//! device input and sketch listeners are reached through the traits below so
//! the core can be driven by a real service or by [`simulated`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← Lifecycle, control transactions
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  SketchController   │  ← One per preview output with sketch enabled
//! └──────────┬──────────┘
//!            │ Weak
//!            ▼
//! ┌─────────────────────┐
//! │  HostStream Trait   │  ← Forks and drives the sketch sub-stream
//! └─────────────────────┘
//! ```

pub mod metadata;
pub mod simulated;
pub mod types;

pub use metadata::{CameraMetadata, MetadataItem, MetadataTag, MetadataValues};
pub use types::*;

use crate::errors::SessionResult;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Secondary low-resolution stream forked from a preview stream
pub trait SketchStream: Send + Sync {
    /// Begin delivering sketch frames
    fn start(&self) -> SessionResult<()>;

    /// Stop delivering sketch frames
    fn stop(&self) -> SessionResult<()>;

    /// Release every resource held by the sub-stream
    fn release(&self) -> SessionResult<()>;

    /// Attach the consumer surface frames are rendered into
    fn add_deferred_surface(&self, surface: &Surface) -> SessionResult<()>;
}

/// Primary stream owning a preview output
///
/// Sketch controllers hold this weakly. The stream outlives its controller
/// only by contract, so every call site must tolerate a dead handle.
pub trait HostStream: Send + Sync {
    // ===== Stream lifecycle =====

    fn start(&self) -> SessionResult<()>;

    fn stop(&self) -> SessionResult<()>;

    fn release(&self) -> SessionResult<()>;

    // ===== Sketch sub-stream =====

    /// Fork a sketch sub-stream of `size` that auto-starts at `enable_ratio`
    fn fork_sketch_stream(
        &self,
        size: Size,
        enable_ratio: f32,
    ) -> SessionResult<Arc<dyn SketchStream>>;

    /// Detach the forked sketch sub-stream
    fn remove_sketch_stream(&self) -> SessionResult<()>;

    /// Push an updated enable ratio to the device
    fn update_sketch_ratio(&self, ratio: f32) -> SessionResult<()>;
}

/// Camera input device bound to a session
pub trait DeviceInput: Send + Sync {
    /// Stable identifier, used to detect duplicate inputs
    fn id(&self) -> &str;

    fn open(&self) -> SessionResult<()>;

    fn close(&self) -> SessionResult<()>;

    fn is_open(&self) -> bool;

    /// Capability metadata, `None` once the device has been torn down
    fn capability_metadata(&self) -> Option<Arc<CameraMetadata>>;

    /// Submit a changed-settings batch
    fn update_setting(&self, changed: &CameraMetadata) -> SessionResult<()>;
}

/// Receiver of sketch status events
pub trait SketchListener: Send + Sync {
    fn on_sketch_status_changed(&self, data: &SketchStatusData);
}

/// Broadcast set of sketch listeners owned by a preview output
#[derive(Default)]
pub struct ListenerManager {
    listeners: Mutex<Vec<Arc<dyn SketchListener>>>,
}

impl ListenerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn SketchListener>) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return;
        }
        listeners.push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SketchListener>) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `data` to every registered listener
    pub fn trigger_listener(&self, data: &SketchStatusData) {
        // Snapshot so listeners may register or unregister from the callback
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        debug!(
            listeners = listeners.len(),
            status = %data.status,
            ratio = data.sketch_ratio,
            "Triggering sketch listeners"
        );
        for listener in listeners {
            listener.on_sketch_status_changed(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simulated::RecordingListener;

    #[test]
    fn test_listener_manager_dedups_and_removes() {
        let manager = ListenerManager::new();
        let listener = Arc::new(RecordingListener::default());
        let as_dyn: Arc<dyn SketchListener> = listener.clone();

        manager.add_listener(as_dyn.clone());
        manager.add_listener(as_dyn.clone());
        assert_eq!(manager.len(), 1);

        manager.trigger_listener(&SketchStatusData::default());
        assert_eq!(listener.events().len(), 1);

        manager.remove_listener(&as_dyn);
        assert!(manager.is_empty());
        manager.trigger_listener(&SketchStatusData::default());
        assert_eq!(listener.events().len(), 1);
    }
}
