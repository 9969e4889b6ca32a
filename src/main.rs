// SPDX-License-Identifier: GPL-3.0-only

use camera_session::sketch::SceneMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-session")]
#[command(about = "Capture session core with sketch stream control")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a session against a simulated device and print sketch events
    Simulate {
        /// Capability metadata dump (JSON list of tagged items)
        #[arg(short, long)]
        metadata: PathBuf,

        /// Session configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Scene mode, e.g. capture, video, capture_macro
        #[arg(long, value_parser = cli::parse_scene_mode)]
        mode: Option<SceneMode>,

        /// Preview size as WIDTHxHEIGHT
        #[arg(long, default_value = "1920x1080", value_parser = cli::parse_size)]
        preview: camera_session::device::Size,

        /// Scene features to switch on after commit
        #[arg(short, long, value_parser = cli::parse_scene_feature)]
        feature: Vec<camera_session::sketch::SceneFeature>,

        /// Zoom ratios to apply, in order
        #[arg(short, long, value_delimiter = ',')]
        zoom: Vec<f32>,

        /// Dynamic sketch info pushes as FLAG,RATIO,X,Y (repeatable)
        #[arg(long, value_parser = cli::parse_sketch_info)]
        sketch_info: Vec<Vec<f32>>,
    },

    /// Print the ratio tables built from a capability dump
    Tables {
        /// Capability metadata dump (JSON list of tagged items)
        #[arg(short, long)]
        metadata: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=camera_session=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            metadata,
            config,
            mode,
            preview,
            feature,
            zoom,
            sketch_info,
        } => cli::simulate(cli::SimulateArgs {
            metadata,
            config,
            mode,
            preview,
            features: feature,
            zooms: zoom,
            sketch_infos: sketch_info,
        }),
        Commands::Tables { metadata } => cli::print_tables(&metadata),
    }
}
