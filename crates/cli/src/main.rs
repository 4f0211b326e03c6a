//! vision-utils CLI - image-to-tensor preprocessing and detection post-processing
//!
//! Thin command-line front end over the workspace libraries. Images are decoded
//! with the `image` crate; every command prints JSON.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use vision_utils_core::PipelineConfig;

mod commands;

use commands::boxes::BoxesCommand;
use commands::bulk::BulkCommand;
use commands::quantize::QuantizeCommand;
use commands::stats::StatsCommand;
use commands::tensor::TensorCommand;

#[derive(Parser)]
#[command(
    name = "vision-utils",
    version,
    about = "Image-to-tensor preprocessing for vision models",
    after_help = "EXAMPLES:\n  \
                  # YOLO-style letterbox into a 640x640 NCHW tensor\n  \
                  vision-utils tensor --size 640 --strategy letterbox --layout nchw photo.jpg\n\n  \
                  # Batch preprocessing with a config file\n  \
                  vision-utils --config pipeline.yaml bulk *.jpg\n\n  \
                  # Calibrate int8 parameters from a JSON array of floats\n  \
                  vision-utils quantize --dtype int8 --symmetric activations.json\n\n  \
                  # Suppress overlapping detections\n  \
                  vision-utils boxes nms detections.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pipeline config file (.yaml, .yml or .json); flags override its fields
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one image into a tensor
    Tensor(TensorCommand),

    /// Convert many images in parallel
    Bulk(BulkCommand),

    /// Per-channel statistics, metadata and validation for an image
    Stats(StatsCommand),

    /// Calibrate, quantize and dequantize float data
    Quantize(QuantizeCommand),

    /// Bounding box conversion, NMS and reverse letterboxing
    #[command(subcommand)]
    Boxes(BoxesCommand),
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let mut config = PipelineConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // Logs go to stderr so stdout stays parseable JSON
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Tensor(cmd) => cmd.execute(&config),
        Commands::Bulk(cmd) => cmd.execute(&config),
        Commands::Stats(cmd) => cmd.execute(),
        Commands::Quantize(cmd) => cmd.execute(),
        Commands::Boxes(cmd) => cmd.execute(&config),
    }
}
