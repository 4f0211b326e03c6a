//! Single image to tensor

use super::{open_image, write_json, PixelArgs};
use anyhow::{bail, Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use vision_utils_common::{ColorFormat, DataLayout, Rect};
use vision_utils_core::PipelineConfig;
use vision_utils_preprocess::{get_pixel_data, LetterboxRecord, PixelDataResult};

#[derive(Args)]
pub struct TensorCommand {
    /// Input image
    #[arg(value_name = "FILE")]
    input: PathBuf,

    #[command(flatten)]
    pixel: PixelArgs,

    /// Crop this region first, as x,y,width,height
    #[arg(long, value_delimiter = ',')]
    roi: Option<Vec<u32>>,

    /// Write the full tensor as JSON here; otherwise print a summary
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Everything but the data, for terminal output
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TensorSummary<'a> {
    input: &'a str,
    width: u32,
    height: u32,
    channels: usize,
    color_format: ColorFormat,
    data_layout: DataLayout,
    shape: &'a [usize],
    min: f32,
    max: f32,
    processing_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    letterbox: Option<&'a LetterboxRecord>,
}

impl<'a> TensorSummary<'a> {
    fn new(input: &'a str, result: &'a PixelDataResult) -> Self {
        let (min, max) = result
            .data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Self {
            input,
            width: result.width,
            height: result.height,
            channels: result.channels,
            color_format: result.color_format,
            data_layout: result.data_layout,
            shape: &result.shape,
            min,
            max,
            processing_time_ms: result.processing_time_ms,
            letterbox: result.letterbox.as_ref(),
        }
    }
}

impl TensorCommand {
    pub fn execute(self, config: &PipelineConfig) -> Result<()> {
        let mut options = self.pixel.apply(config.pixel.clone())?;
        if let Some(roi) = &self.roi {
            let [x, y, width, height] = roi[..] else {
                bail!("--roi takes exactly four values: x,y,width,height");
            };
            options.roi = Some(Rect::new(x, y, width, height));
        }

        let image = open_image(&self.input)?;
        let result = get_pixel_data(&image, &options)
            .with_context(|| format!("Failed to process {}", self.input.display()))?;

        info!(
            "{}: shape {:?} in {:.2}ms",
            self.input.display(),
            result.shape,
            result.processing_time_ms
        );

        match &self.output {
            Some(path) => {
                write_json(&result, Some(path))?;
                info!("Tensor written to {}", path.display());
                Ok(())
            }
            None => {
                let input = self.input.to_string_lossy();
                write_json(&TensorSummary::new(&input, &result), None)
            }
        }
    }
}
