// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the capture session lifecycle

use camera_session::device::simulated::{SimulatedDevice, SimulatedHostStream};
use camera_session::device::{CameraMetadata, DeviceInput, PixelFormat, Profile, Size};
use camera_session::{
    CaptureOutput, CaptureSession, OutputKind, SceneMode, SessionError, SessionState,
};
use std::sync::Arc;

fn sample_metadata() -> CameraMetadata {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/sample_capabilities.json");
    CameraMetadata::load(std::path::Path::new(path)).expect("sample capabilities load")
}

fn device() -> Arc<SimulatedDevice> {
    Arc::new(SimulatedDevice::new("cam0", sample_metadata()))
}

fn output(kind: OutputKind) -> (Arc<SimulatedHostStream>, Arc<CaptureOutput>) {
    let host = Arc::new(SimulatedHostStream::new());
    let output = Arc::new(CaptureOutput::new(
        kind,
        Profile::new(PixelFormat::Yuv420Sp, Size::new(1920, 1080)),
        host.clone(),
    ));
    (host, output)
}

#[test]
fn test_full_lifecycle() {
    let session = CaptureSession::new(SceneMode::Capture);
    let device = device();
    let (host, preview) = output(OutputKind::Preview);
    assert_eq!(session.state(), SessionState::Idle);

    session.begin_config().expect("begin config");
    session.add_input(device.clone()).expect("add input");
    assert!(device.is_open(), "Input should be opened when added");
    session.add_output(preview.clone()).expect("add output");
    session.commit_config().expect("commit");
    assert_eq!(session.state(), SessionState::Committed);

    session.start().expect("start");
    assert!(host.is_running());
    assert_eq!(session.state(), SessionState::Started);

    session.stop().expect("stop");
    assert!(!host.is_running());
    assert_eq!(session.state(), SessionState::Committed);

    session.release().expect("release");
    assert_eq!(session.state(), SessionState::Released);
    assert!(host.is_released());
    assert!(!device.is_open(), "Input should be closed on release");
    assert!(session.outputs().is_empty());
}

#[test]
fn test_commit_without_outputs_fails() {
    let session = CaptureSession::new(SceneMode::Capture);
    session.begin_config().expect("begin config");
    session.add_input(device()).expect("add input");
    let err = session.commit_config().unwrap_err();
    assert!(matches!(err, SessionError::OperationNotAllowed(_)));
    assert_eq!(session.state(), SessionState::Configuring);
}

#[test]
fn test_commit_without_input_fails() {
    let session = CaptureSession::new(SceneMode::Capture);
    let (_host, preview) = output(OutputKind::Preview);
    session.begin_config().expect("begin config");
    session.add_output(preview).expect("add output");
    assert!(session.commit_config().is_err());
}

#[test]
fn test_double_commit_fails() {
    let session = CaptureSession::new(SceneMode::Capture);
    let (_host, preview) = output(OutputKind::Preview);
    session.begin_config().expect("begin config");
    session.add_input(device()).expect("add input");
    session.add_output(preview).expect("add output");
    session.commit_config().expect("first commit");

    let err = session.commit_config().unwrap_err();
    assert_eq!(err.code(), 7_400_102);
}

#[test]
fn test_commit_before_begin_config_fails() {
    let session = CaptureSession::new(SceneMode::Capture);
    let err = session.commit_config().unwrap_err();
    assert!(matches!(err, SessionError::NotConfigured(_)));
}

#[test]
fn test_scan_mode_rejects_photo_output() {
    let session = CaptureSession::new(SceneMode::Scan);
    let (_host, photo) = output(OutputKind::Photo);
    session.begin_config().expect("begin config");
    let err = session.add_output(photo).unwrap_err();
    assert!(matches!(err, SessionError::OperationNotAllowed(_)));
}

#[test]
fn test_video_mode_requires_video_output() {
    let session = CaptureSession::new(SceneMode::Video);
    let (_host, preview) = output(OutputKind::Preview);
    let (_video_host, video) = output(OutputKind::Video);
    session.begin_config().expect("begin config");
    session.add_input(device()).expect("add input");
    session.add_output(preview).expect("add preview");
    assert!(session.commit_config().is_err());

    session.add_output(video).expect("add video");
    session.commit_config().expect("commit with preview and video");
}

#[test]
fn test_remove_output_never_added_fails() {
    let session = CaptureSession::new(SceneMode::Capture);
    let (_host, preview) = output(OutputKind::Preview);
    session.begin_config().expect("begin config");
    assert!(session.remove_output(preview.id()).is_err());

    session.add_output(preview.clone()).expect("add output");
    session.remove_output(preview.id()).expect("remove output");
    assert!(session.remove_output(preview.id()).is_err());
}

#[test]
fn test_remove_input_then_add_another() {
    let session = CaptureSession::new(SceneMode::Capture);
    let first: Arc<dyn DeviceInput> = device();
    let second: Arc<dyn DeviceInput> = Arc::new(SimulatedDevice::new("cam1", sample_metadata()));
    session.begin_config().expect("begin config");
    session.add_input(first.clone()).expect("first input");
    assert!(session.add_input(second.clone()).is_err());
    assert!(session.remove_input(&second).is_err());

    session.remove_input(&first).expect("remove first");
    session.add_input(second).expect("second input");
    assert!(session.has_input());
}

#[test]
fn test_release_twice_reports_already_released() {
    let session = CaptureSession::new(SceneMode::Capture);
    session.release().expect("release from idle");
    let err = session.release().unwrap_err();
    assert_eq!(err.to_string(), "Operation not allowed: session already released");
    assert!(session.begin_config().is_err());
}

#[test]
fn test_secure_mode_requires_secure_preview() {
    let session = CaptureSession::new(SceneMode::Secure);
    let (_host, preview) = output(OutputKind::Preview);
    session.begin_config().expect("begin config");
    session.add_input(device()).expect("add input");
    session.add_output(preview.clone()).expect("add output");
    assert!(session.commit_config().is_err());

    session.add_secure_output(preview.id()).expect("mark secure");
    assert!(session.add_secure_output(preview.id()).is_err());
    session.commit_config().expect("commit with secure preview");
}

#[test]
fn test_getters_degrade_when_input_torn_down() {
    let session = CaptureSession::new(SceneMode::Capture);
    let device = device();
    let (_host, preview) = output(OutputKind::Preview);
    session.begin_config().expect("begin config");
    session.add_input(device.clone()).expect("add input");
    session.add_output(preview.clone()).expect("add output");
    session.commit_config().expect("commit");
    assert_eq!(session.zoom_ratio_range(), Some((1.0, 20.0)));

    device.tear_down();
    assert_eq!(session.zoom_ratio_range(), None);
    assert!(session.get_sketch_ratio(preview.id()) < 0.0);
    assert!(!session.is_sketch_supported(preview.id()));
}

#[test]
fn test_settings_submitted_once_per_transaction() {
    let session = CaptureSession::new(SceneMode::Capture);
    let device = device();
    let (_host, preview) = output(OutputKind::Preview);
    session.begin_config().expect("begin config");
    session.add_input(device.clone()).expect("add input");
    session.add_output(preview).expect("add output");
    session.commit_config().expect("commit");

    {
        let mut control = session.lock_for_control();
        control.set_zoom_ratio(2.0).expect("zoom");
        control.set_zoom_ratio(4.0).expect("zoom");
    }
    // Nothing buffered, nothing submitted
    drop(session.lock_for_control());

    let submitted = device.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(session.zoom_ratio(), 4.0);
}
