//! Bulk mode - many images through the batch executor

use super::{open_image, PixelArgs};
use anyhow::{bail, Context as _, Result};
use clap::{Args, ValueEnum};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};
use vision_utils_core::{BatchExecutor, BatchItem, PipelineConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Jsonl,
}

#[derive(Args)]
pub struct BulkCommand {
    /// Input image paths
    #[arg(value_name = "FILES", required = true)]
    inputs: Vec<PathBuf>,

    #[command(flatten)]
    pixel: PixelArgs,

    /// Worker threads (overrides config and VISION_UTILS_THREADS)
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Result cache capacity, 0 to disable
    #[arg(long)]
    cache_capacity: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl BulkCommand {
    pub fn execute(self, config: &PipelineConfig) -> Result<()> {
        let mut config = config.clone();
        config.pixel = self.pixel.apply(config.pixel)?;
        if let Some(max) = self.max_concurrency {
            config.batch.max_concurrency = max;
        }
        if let Some(capacity) = self.cache_capacity {
            config.batch.cache_capacity = capacity;
        }
        config.validate().context("Invalid settings")?;

        let mut items = Vec::with_capacity(self.inputs.len());
        let mut undecodable = 0usize;
        for path in &self.inputs {
            match open_image(path) {
                Ok(image) => items.push(BatchItem::new(path.to_string_lossy(), image)),
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    undecodable += 1;
                }
            }
        }
        if items.is_empty() {
            bail!("No decodable input images");
        }

        let executor = BatchExecutor::from_config(&config);
        let batch = executor.run(&items).context("Batch execution failed")?;

        for item in &batch.results {
            match (self.format, &item.result) {
                (OutputFormat::Jsonl, Ok(data)) => println!(
                    "{}",
                    json!({
                        "id": item.id,
                        "shape": data.shape,
                        "cached": item.cached,
                        "elapsedMs": item.elapsed_ms,
                        "letterbox": data.letterbox,
                    })
                ),
                (OutputFormat::Jsonl, Err(e)) => println!(
                    "{}",
                    json!({ "id": item.id, "error": e })
                ),
                (OutputFormat::Text, Ok(data)) => println!(
                    "✓ {} shape {:?} ({:.2}ms{})",
                    item.id,
                    data.shape,
                    item.elapsed_ms,
                    if item.cached { ", cached" } else { "" }
                ),
                (OutputFormat::Text, Err(e)) => {
                    println!("✗ {} {}: {}", item.id, e.kind, e.message)
                }
            }
        }

        info!(
            "Processed {} images: {} succeeded, {} failed, {} undecodable in {:.2}ms",
            self.inputs.len(),
            batch.succeeded,
            batch.failed,
            undecodable,
            batch.total_time_ms
        );

        if batch.failed + undecodable > 0 {
            bail!("{} of {} inputs failed", batch.failed + undecodable, self.inputs.len());
        }
        Ok(())
    }
}
