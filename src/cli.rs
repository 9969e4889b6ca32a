// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - `simulate`: run a full session lifecycle against a simulated device
//! - `tables`: dump the sketch ratio tables a capability set produces

use camera_session::config::SessionConfig;
use camera_session::device::simulated::{SimulatedDevice, SimulatedHostStream};
use camera_session::device::{
    CameraMetadata, MetadataItem, MetadataTag, PixelFormat, Profile, Size, SketchListener,
    SketchStatusData,
};
use camera_session::session::{CaptureOutput, CaptureSession};
use camera_session::sketch::{
    RatioTables, SceneFeature, SceneMode, SketchNotifyMode, SketchReferenceFovRange,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub struct SimulateArgs {
    pub metadata: PathBuf,
    pub config: Option<PathBuf>,
    pub mode: Option<SceneMode>,
    pub preview: Size,
    pub features: Vec<SceneFeature>,
    pub zooms: Vec<f32>,
    pub sketch_infos: Vec<Vec<f32>>,
}

pub fn parse_scene_mode(value: &str) -> Result<SceneMode, String> {
    SceneMode::from_name(value).ok_or_else(|| format!("unknown scene mode '{value}'"))
}

pub fn parse_scene_feature(value: &str) -> Result<SceneFeature, String> {
    let normalized = value.trim().to_lowercase().replace('-', "_");
    SceneFeature::ALL
        .iter()
        .copied()
        .find(|f| f.name() == normalized)
        .ok_or_else(|| format!("unknown scene feature '{value}'"))
}

pub fn parse_size(value: &str) -> Result<Size, String> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width = w.trim().parse().map_err(|_| format!("bad width '{w}'"))?;
    let height = h.trim().parse().map_err(|_| format!("bad height '{h}'"))?;
    Ok(Size::new(width, height))
}

pub fn parse_sketch_info(value: &str) -> Result<Vec<f32>, String> {
    value
        .split(',')
        .map(|v| v.trim().parse::<f32>().map_err(|_| format!("bad value '{v}'")))
        .collect()
}

/// Prints every sketch event as one JSON line
struct PrintListener;

impl SketchListener for PrintListener {
    fn on_sketch_status_changed(&self, data: &SketchStatusData) {
        match serde_json::to_string(data) {
            Ok(json) => println!("  event {}", json),
            Err(err) => warn!(error = %err, "Failed to serialize sketch event"),
        }
    }
}

/// Run a session lifecycle against a simulated device
pub fn simulate(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let metadata = CameraMetadata::load(&args.metadata)?;
    let config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    let mode = args.mode.unwrap_or(config.default_scene_mode);
    let notify_mode = config.sketch_notify_mode;

    let session = CaptureSession::with_config(mode, config, Arc::new(RatioTables::new()));
    let device = Arc::new(SimulatedDevice::new("simulated0", metadata));
    let host = Arc::new(SimulatedHostStream::new());
    let preview = Arc::new(CaptureOutput::preview(
        Profile::new(PixelFormat::Yuv420Sp, args.preview),
        host.clone(),
    ));
    preview.listeners().add_listener(Arc::new(PrintListener));

    println!("Session {} ({})", session.id(), mode);

    session.begin_config()?;
    session.add_input(device.clone())?;
    session.add_output(preview.clone())?;
    let sketch_enabled = session.is_sketch_supported(preview.id());
    if sketch_enabled {
        session.enable_sketch(preview.id(), true)?;
        let size = preview.sketch().map(|s| s.sketch_size()).unwrap_or_default();
        println!(
            "Sketch enabled: {} enable ratio {}",
            size,
            session.get_sketch_ratio(preview.id())
        );
    } else {
        println!("Sketch not supported for {} preview in {} mode", args.preview, mode);
    }
    session.commit_config()?;
    session.start()?;

    if !args.features.is_empty() {
        let mut control = session.lock_for_control();
        for feature in &args.features {
            control.set_scene_feature(*feature, true)?;
        }
        control.commit()?;
        println!("Features: {}", session.features_mode());
    }

    for zoom in &args.zooms {
        let mut control = session.lock_for_control();
        control.set_zoom_ratio(*zoom)?;
        control.commit()?;
        println!(
            "zoom {:>6.2} -> {:>6.2}  sketch {}",
            zoom,
            session.zoom_ratio(),
            session.sketch_status(preview.id())
        );
    }

    if !args.sketch_infos.is_empty() && notify_mode != SketchNotifyMode::Dynamic {
        println!("Ignoring sketch info pushes: session uses static sketch notify");
    }
    for info in &args.sketch_infos {
        session.on_metadata_changed(&MetadataItem::f32(
            MetadataTag::StatusSketchStreamInfo,
            info.clone(),
        ))?;
        println!(
            "sketch info {:?}  sketch {}",
            info,
            session.sketch_status(preview.id())
        );
    }

    session.release()?;
    println!(
        "Released. Settings submitted: {}, sketch forks: {}",
        device.submitted().len(),
        host.fork_calls()
    );
    Ok(())
}

#[derive(Serialize)]
struct EnableRatioRow {
    mode: String,
    ratio: f32,
}

#[derive(Serialize)]
struct ReferenceRow {
    mode: String,
    ranges: Vec<SketchReferenceFovRange>,
}

#[derive(Serialize)]
struct TablesDump {
    enable_ratios: Vec<EnableRatioRow>,
    reference_fov_ratios: Vec<ReferenceRow>,
}

/// Print the ratio tables built from a capability dump as JSON
pub fn print_tables(metadata: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let metadata = CameraMetadata::load(metadata)?;
    let tables = RatioTables::new();
    tables.rebuild(&metadata);

    let dump = TablesDump {
        enable_ratios: tables
            .enable_ratio_entries()
            .into_iter()
            .map(|(mode, ratio)| EnableRatioRow {
                mode: mode.to_string(),
                ratio,
            })
            .collect(),
        reference_fov_ratios: tables
            .reference_entries()
            .into_iter()
            .map(|(mode, ranges)| ReferenceRow {
                mode: mode.to_string(),
                ranges,
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}
