//! Image statistics, metadata and validation

use super::{open_image, write_json};
use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use vision_utils_preprocess::{
    image_metadata, image_statistics, validate_image, ImageConstraints, ImageMetadata,
    ImageStatistics, ValidationReport,
};

#[derive(Args)]
pub struct StatsCommand {
    /// Input image
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Include the 256-bin histograms
    #[arg(long)]
    histogram: bool,

    #[arg(long)]
    min_width: Option<u32>,

    #[arg(long)]
    max_width: Option<u32>,

    #[arg(long)]
    min_height: Option<u32>,

    #[arg(long)]
    max_height: Option<u32>,

    #[arg(long)]
    min_aspect_ratio: Option<f64>,

    #[arg(long)]
    max_aspect_ratio: Option<f64>,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct StatsReport {
    metadata: ImageMetadata,
    statistics: ImageStatistics,
    validation: ValidationReport,
}

impl StatsCommand {
    fn constraints(&self) -> ImageConstraints {
        ImageConstraints {
            min_width: self.min_width,
            max_width: self.max_width,
            min_height: self.min_height,
            max_height: self.max_height,
            min_aspect_ratio: self.min_aspect_ratio,
            max_aspect_ratio: self.max_aspect_ratio,
        }
    }

    pub fn execute(self) -> Result<()> {
        let image = open_image(&self.input)?;
        let context = || format!("Failed to analyze {}", self.input.display());

        let metadata = image_metadata(&image).with_context(context)?;
        let mut statistics = image_statistics(&image).with_context(context)?;
        if !self.histogram {
            for channel in [&mut statistics.red, &mut statistics.green, &mut statistics.blue] {
                channel.histogram.clear();
            }
        }
        let validation = validate_image(&image, &self.constraints()).with_context(context)?;

        write_json(
            &StatsReport {
                metadata,
                statistics,
                validation,
            },
            self.output.as_ref(),
        )
    }
}
