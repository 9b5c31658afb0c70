// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "qr-camera")]
#[command(about = "QR scanner camera session running against a virtual camera")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the virtual cameras and their output sizes
    List {
        /// Target width used to show the negotiated sizes
        #[arg(long, default_value = "640")]
        width: u32,

        /// Target height used to show the negotiated sizes
        #[arg(long, default_value = "480")]
        height: u32,
    },

    /// Run a scanning session against the virtual camera
    Simulate {
        /// JSON scanner configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Target frame width
        #[arg(long)]
        width: Option<u32>,

        /// Target frame height
        #[arg(long)]
        height: Option<u32>,

        /// Zoom factor (1, 2 or 4)
        #[arg(short, long)]
        zoom: Option<f32>,

        /// Lens facing: front or back
        #[arg(short, long)]
        facing: Option<String>,

        /// Heartbeat timeout in milliseconds (0 disables)
        #[arg(long)]
        heartbeat_ms: Option<u64>,

        /// Stop sending heartbeats, to watch the watchdog stop the camera
        #[arg(long)]
        no_heartbeat: bool,

        /// Session duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Display rotation in degrees (0, 90, 180, 270)
        #[arg(short, long, default_value = "0")]
        rotation: i32,

        /// Image to stream instead of the generated gradient
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Turn the torch on once previewing
        #[arg(long)]
        torch: bool,
    },

    /// Print the frame rotation table
    Resolve {
        /// Sensor orientation in degrees (default: all four)
        #[arg(short, long)]
        sensor: Option<i32>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qr_camera=debug, RUST_LOG=info
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
        Commands::List { width, height } => cli::list_cameras(width, height),
        Commands::Simulate {
            config,
            width,
            height,
            zoom,
            facing,
            heartbeat_ms,
            no_heartbeat,
            duration,
            rotation,
            image,
            torch,
        } => cli::simulate(cli::SimulateOptions {
            config,
            width,
            height,
            zoom,
            facing,
            heartbeat_ms,
            no_heartbeat,
            duration,
            rotation,
            image,
            torch,
        }),
        Commands::Resolve { sensor } => cli::print_rotation_table(sensor),
    }
}
