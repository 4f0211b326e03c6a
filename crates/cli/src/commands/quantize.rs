//! Quantize a JSON array of floats

use super::{read_json, write_json};
use anyhow::{bail, Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};
use vision_utils_common::DataLayout;
use vision_utils_quantization::{
    calculate_params, dequantize, quantize, CalibrationOptions, QuantDtype, QuantizationParams,
    QuantizedData,
};

#[derive(Args)]
pub struct QuantizeCommand {
    /// JSON file holding a flat array of floats
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Target type: int8, uint8 or int16
    #[arg(long, default_value = "uint8")]
    dtype: QuantDtype,

    /// Use existing parameters (JSON) instead of calibrating from the data
    #[arg(long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Symmetric calibration (zero point fixed at 0)
    #[arg(long)]
    symmetric: bool,

    /// Calibrate one scale per channel
    #[arg(long, value_name = "CHANNELS")]
    per_channel: Option<usize>,

    /// Layout of the data for per-channel calibration
    #[arg(long, default_value = "hwc")]
    layout: DataLayout,

    /// Omit the quantized values from the output
    #[arg(long)]
    summary: bool,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuantizeReport {
    params: QuantizationParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    observed_min: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    observed_max: Option<Vec<f32>>,
    degenerate: bool,
    count: usize,
    /// Largest `|x - dequantize(quantize(x))|`
    max_error: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantized: Option<QuantizedData>,
}

impl QuantizeCommand {
    pub fn execute(self) -> Result<()> {
        let data: Vec<f32> = read_json(&self.input)?;
        if data.is_empty() {
            bail!("{} holds no values", self.input.display());
        }

        let (params, observed_min, observed_max, degenerate) = match &self.params {
            Some(path) => {
                let params: QuantizationParams = read_json(path)?;
                (params, None, None, false)
            }
            None => {
                let mut options = CalibrationOptions::new(self.dtype);
                if self.symmetric {
                    options = options.symmetric();
                }
                if let Some(channels) = self.per_channel {
                    options = options.per_channel(channels, self.layout);
                }
                let estimate =
                    calculate_params(&data, &options).context("Calibration failed")?;
                if estimate.degenerate {
                    warn!("Constant input range; fell back to scale 1, zero point 0");
                }
                (
                    estimate.params,
                    Some(estimate.min),
                    Some(estimate.max),
                    estimate.degenerate,
                )
            }
        };

        let quantized = quantize(&data, &params).context("Quantization failed")?;
        let restored = dequantize(&quantized, &params).context("Dequantization failed")?;
        let max_error = data
            .iter()
            .zip(&restored)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f32, f32::max);

        info!(
            "Quantized {} values to {} (max error {:.6})",
            data.len(),
            params.dtype().as_str(),
            max_error
        );

        let report = QuantizeReport {
            params,
            observed_min,
            observed_max,
            degenerate,
            count: data.len(),
            max_error,
            quantized: (!self.summary).then_some(quantized),
        };
        write_json(&report, self.output.as_ref())
    }
}
