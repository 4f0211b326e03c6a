//! Image statistics, metadata and dimension validation

use serde::{Deserialize, Serialize};
use vision_utils_common::{PixelSource, Result};

/// Summary of one color channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatistics {
    pub mean: f64,
    pub std: f64,
    pub min: u8,
    pub max: u8,
    pub histogram: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStatistics {
    pub red: ChannelStatistics,
    pub green: ChannelStatistics,
    pub blue: ChannelStatistics,
    pub pixel_count: usize,
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    sum_sq: f64,
    min: u8,
    max: u8,
    histogram: Vec<u64>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            min: u8::MAX,
            histogram: vec![0; 256],
            ..Self::default()
        }
    }

    #[inline]
    fn push(&mut self, value: u8) {
        let v = f64::from(value);
        self.sum += v;
        self.sum_sq += v * v;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.histogram[usize::from(value)] += 1;
    }

    fn finish(self, count: usize) -> ChannelStatistics {
        let n = count as f64;
        let mean = self.sum / n;
        // Population variance; clamp guards tiny negative rounding error
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        ChannelStatistics {
            mean,
            std: variance.sqrt(),
            min: self.min,
            max: self.max,
            histogram: self.histogram,
        }
    }
}

/// Per-channel (R, G, B) mean, standard deviation, range and histogram
pub fn image_statistics<S: PixelSource + ?Sized>(source: &S) -> Result<ImageStatistics> {
    let size = source.size()?;
    let mut channels = [Accumulator::new(), Accumulator::new(), Accumulator::new()];
    for y in 0..size.height {
        for x in 0..size.width {
            let px = source.rgba(x, y);
            for (acc, value) in channels.iter_mut().zip(px) {
                acc.push(value);
            }
        }
    }
    let count = size.area();
    let [red, green, blue] = channels.map(|acc| acc.finish(count));
    Ok(ImageStatistics {
        red,
        green,
        blue,
        pixel_count: count,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub aspect_ratio: f64,
    /// True when any pixel is not fully opaque
    pub has_alpha: bool,
}

pub fn image_metadata<S: PixelSource + ?Sized>(source: &S) -> Result<ImageMetadata> {
    let size = source.size()?;
    let has_alpha = (0..size.height).any(|y| (0..size.width).any(|x| source.rgba(x, y)[3] != 255));
    Ok(ImageMetadata {
        width: size.width,
        height: size.height,
        channels: if has_alpha { 4 } else { 3 },
        aspect_ratio: size.aspect_ratio(),
        has_alpha,
    })
}

/// Acceptance bounds for `validate_image`; unset fields are unconstrained
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageConstraints {
    pub min_width: Option<u32>,
    pub max_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_height: Option<u32>,
    pub min_aspect_ratio: Option<f64>,
    pub max_aspect_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub width: u32,
    pub height: u32,
}

/// Check a source against `constraints`, collecting every violated bound
pub fn validate_image<S: PixelSource + ?Sized>(
    source: &S,
    constraints: &ImageConstraints,
) -> Result<ValidationReport> {
    let size = source.size()?;
    let aspect = size.aspect_ratio();
    let mut issues = Vec::new();

    if let Some(min) = constraints.min_width.filter(|min| size.width < *min) {
        issues.push(format!("width {} is below minimum {min}", size.width));
    }
    if let Some(max) = constraints.max_width.filter(|max| size.width > *max) {
        issues.push(format!("width {} exceeds maximum {max}", size.width));
    }
    if let Some(min) = constraints.min_height.filter(|min| size.height < *min) {
        issues.push(format!("height {} is below minimum {min}", size.height));
    }
    if let Some(max) = constraints.max_height.filter(|max| size.height > *max) {
        issues.push(format!("height {} exceeds maximum {max}", size.height));
    }
    if let Some(min) = constraints.min_aspect_ratio.filter(|min| aspect < *min) {
        issues.push(format!("aspect ratio {aspect:.3} is below minimum {min}"));
    }
    if let Some(max) = constraints.max_aspect_ratio.filter(|max| aspect > *max) {
        issues.push(format!("aspect ratio {aspect:.3} exceeds maximum {max}"));
    }

    Ok(ValidationReport {
        is_valid: issues.is_empty(),
        issues,
        width: size.width,
        height: size.height,
    })
}
