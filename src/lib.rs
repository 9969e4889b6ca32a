// SPDX-License-Identifier: MPL-2.0

//! Camera capture session core
//!
//! Session lifecycle, control transactions and sketch (picture-in-picture
//! zoom preview) stream control on top of an abstract camera device.
//!
//! # Architecture
//!
//! - [`session`]: session state machine, output registry, control guard
//! - [`sketch`]: scene keys, ratio tables, sketch controller, metadata dispatch
//! - [`device`]: traits for streams, inputs and listeners, plus a simulated device
//! - [`config`]: session configuration
//! - [`errors`]: error taxonomy with stable codes
//!
//! # Example
//!
//! ```ignore
//! let session = CaptureSession::new(SceneMode::Capture);
//! session.begin_config()?;
//! session.add_input(device)?;
//! session.add_output(preview.clone())?;
//! session.enable_sketch(preview.id(), true)?;
//! session.commit_config()?;
//! session.start()?;
//!
//! let mut control = session.lock_for_control();
//! control.set_zoom_ratio(3.0)?;
//! control.commit()?;
//! ```

pub mod config;
pub mod constants;
pub mod device;
pub mod errors;
pub mod session;
pub mod sketch;

// Re-export commonly used types
pub use config::SessionConfig;
pub use errors::{SessionError, SessionResult};
pub use session::{CaptureOutput, CaptureSession, OutputKind, SessionState};
pub use sketch::{SceneFeature, SceneFeaturesMode, SceneMode};
