//! Per-channel affine normalization of 8-bit pixel values
//!
//! Forward: `y = (x * scale - mean[c]) / std[c]`
//! Inverse: `x = (y * std[c] + mean[c]) / scale`, rounded and clamped to a byte

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vision_utils_common::{Result, VisionError};

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationPreset {
    /// Values copied unchanged
    Raw,
    /// `[0, 255] -> [0, 1]`
    #[default]
    Scale,
    /// `[0, 1]` then ImageNet mean/std
    Imagenet,
    /// `[0, 255] -> [-1, 1]`
    Tensorflow,
    /// Caller-supplied mean/std/scale
    Custom,
}

impl NormalizationPreset {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NormalizationPreset::Raw => "raw",
            NormalizationPreset::Scale => "scale",
            NormalizationPreset::Imagenet => "imagenet",
            NormalizationPreset::Tensorflow => "tensorflow",
            NormalizationPreset::Custom => "custom",
        }
    }
}

impl fmt::Display for NormalizationPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizationPreset {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raw" | "none" => Ok(NormalizationPreset::Raw),
            "scale" => Ok(NormalizationPreset::Scale),
            "imagenet" => Ok(NormalizationPreset::Imagenet),
            "tensorflow" | "tf" => Ok(NormalizationPreset::Tensorflow),
            "custom" => Ok(NormalizationPreset::Custom),
            other => Err(VisionError::unsupported(format!("normalization preset '{other}'"))),
        }
    }
}

/// Normalization request as it appears in options and config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NormalizationSpec {
    #[serde(default)]
    pub preset: NormalizationPreset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<Vec<f32>>,
    /// Multiplier applied before the mean shift; preset default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
}

impl NormalizationSpec {
    #[must_use]
    pub fn preset(preset: NormalizationPreset) -> Self {
        Self {
            preset,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn custom(mean: Vec<f32>, std: Vec<f32>) -> Self {
        Self {
            preset: NormalizationPreset::Custom,
            mean: Some(mean),
            std: Some(std),
            scale: None,
        }
    }

    #[must_use]
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Resolved affine transform
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    scale: f32,
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalizer {
    pub fn new(spec: &NormalizationSpec) -> Result<Self> {
        let (default_scale, mean, std) = match spec.preset {
            NormalizationPreset::Raw => (1.0, vec![0.0], vec![1.0]),
            NormalizationPreset::Scale => (1.0 / 255.0, vec![0.0], vec![1.0]),
            NormalizationPreset::Tensorflow => (2.0 / 255.0, vec![1.0], vec![1.0]),
            NormalizationPreset::Imagenet => {
                (1.0 / 255.0, IMAGENET_MEAN.to_vec(), IMAGENET_STD.to_vec())
            }
            NormalizationPreset::Custom => {
                let mean = spec
                    .mean
                    .clone()
                    .ok_or_else(|| VisionError::invalid("custom normalization requires mean"))?;
                let std = spec
                    .std
                    .clone()
                    .ok_or_else(|| VisionError::invalid("custom normalization requires std"))?;
                (1.0 / 255.0, mean, std)
            }
        };
        let scale = spec.scale.unwrap_or(default_scale);

        if !scale.is_finite() || scale == 0.0 {
            return Err(VisionError::invalid(format!(
                "normalization scale must be finite and non-zero, got {scale}"
            )));
        }
        if mean.is_empty() || std.is_empty() {
            return Err(VisionError::invalid("mean and std must not be empty"));
        }
        if mean.iter().any(|m| !m.is_finite()) {
            return Err(VisionError::invalid("mean values must be finite"));
        }
        if let Some(bad) = std.iter().find(|s| !s.is_finite() || **s == 0.0) {
            return Err(VisionError::invalid(format!(
                "std values must be finite and non-zero, got {bad}"
            )));
        }

        Ok(Self { scale, mean, std })
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Mean for channel `c`; channels past the end of the array use index 0
    #[inline]
    fn mean_for(&self, c: usize) -> f32 {
        self.mean.get(c).copied().unwrap_or(self.mean[0])
    }

    #[inline]
    fn std_for(&self, c: usize) -> f32 {
        self.std.get(c).copied().unwrap_or(self.std[0])
    }

    /// Per-channel coefficients, resolved once per call
    fn coefficients(&self, channels: usize) -> Vec<(f32, f32)> {
        (0..channels)
            .map(|c| (self.mean_for(c), self.std_for(c)))
            .collect()
    }

    /// Normalize interleaved bytes
    pub fn normalize(&self, data: &[u8], channels: usize) -> Result<Vec<f32>> {
        check_channels(data.len(), channels)?;
        let coeffs = self.coefficients(channels);
        Ok(data
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let (mean, std) = coeffs[i % channels];
                (f32::from(x) * self.scale - mean) / std
            })
            .collect())
    }

    /// Reverse `normalize` back to bytes; `data` is interleaved
    pub fn denormalize(&self, data: &[f32], channels: usize) -> Result<Vec<u8>> {
        check_channels(data.len(), channels)?;
        let coeffs = self.coefficients(channels);
        Ok(data
            .iter()
            .enumerate()
            .map(|(i, &y)| {
                let (mean, std) = coeffs[i % channels];
                to_byte((y * std + mean) / self.scale)
            })
            .collect())
    }

    /// Reverse `normalize` for planar data (`channel` planes of `plane_len`)
    pub fn denormalize_planar(&self, data: &[f32], channels: usize) -> Result<Vec<u8>> {
        check_channels(data.len(), channels)?;
        let plane_len = data.len() / channels;
        let coeffs = self.coefficients(channels);
        Ok(data
            .iter()
            .enumerate()
            .map(|(i, &y)| {
                let (mean, std) = coeffs[i / plane_len];
                to_byte((y * std + mean) / self.scale)
            })
            .collect())
    }
}

#[inline]
fn to_byte(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn check_channels(len: usize, channels: usize) -> Result<()> {
    if channels == 0 {
        return Err(VisionError::invalid("channel count must be positive"));
    }
    if len % channels != 0 {
        return Err(VisionError::invalid(format!(
            "buffer length {len} is not a multiple of {channels} channels"
        )));
    }
    Ok(())
}
