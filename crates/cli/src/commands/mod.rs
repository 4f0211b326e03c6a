//! Subcommand implementations and the helpers they share

pub mod boxes;
pub mod bulk;
pub mod quantize;
pub mod stats;
pub mod tensor;

use anyhow::{bail, Context as _, Result};
use clap::Args;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use vision_utils_common::{ColorFormat, DataLayout};
use vision_utils_preprocess::{
    NormalizationPreset, NormalizationSpec, PixelDataOptions, ResizeOptions, ResizeStrategy,
};

/// Pipeline flags shared by `tensor` and `bulk`. Each flag overrides the
/// matching field of the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct PixelArgs {
    /// Square target size (sets both width and height)
    #[arg(long)]
    size: Option<u32>,

    /// Target width
    #[arg(long)]
    width: Option<u32>,

    /// Target height
    #[arg(long)]
    height: Option<u32>,

    /// Resize strategy: cover, contain, stretch or letterbox
    #[arg(long)]
    strategy: Option<ResizeStrategy>,

    /// Align the scaled image to a multiple of this stride (letterbox)
    #[arg(long)]
    stride: Option<u32>,

    /// Never upscale (contain / letterbox)
    #[arg(long)]
    no_scale_up: bool,

    /// Output color format (rgb, bgr, grayscale, hsv, lab, ...)
    #[arg(long)]
    color_format: Option<ColorFormat>,

    /// Normalization preset: raw, scale, imagenet, tensorflow or custom
    #[arg(long)]
    normalization: Option<NormalizationPreset>,

    /// Per-channel mean for custom normalization (comma separated)
    #[arg(long, value_delimiter = ',')]
    mean: Option<Vec<f32>>,

    /// Per-channel std for custom normalization (comma separated)
    #[arg(long, value_delimiter = ',')]
    std: Option<Vec<f32>>,

    /// Output layout: hwc, chw, nhwc or nchw
    #[arg(long)]
    layout: Option<DataLayout>,
}

impl PixelArgs {
    pub fn apply(&self, mut options: PixelDataOptions) -> Result<PixelDataOptions> {
        let width = self.width.or(self.size);
        let height = self.height.or(self.size);

        if width.is_some() || height.is_some() {
            let mut resize = options.resize.take().unwrap_or_else(|| {
                ResizeOptions::new(0, 0, self.strategy.unwrap_or_default())
            });
            resize.width = width.unwrap_or(resize.width);
            resize.height = height.unwrap_or(resize.height);
            if resize.width == 0 || resize.height == 0 {
                bail!("Both --width and --height (or --size) are required");
            }
            options.resize = Some(resize);
        }

        match options.resize.as_mut() {
            Some(resize) => {
                if let Some(strategy) = self.strategy {
                    resize.strategy = strategy;
                }
                if let Some(stride) = self.stride {
                    resize.stride = Some(stride);
                }
                if self.no_scale_up {
                    resize.scale_up = false;
                }
            }
            None if self.strategy.is_some() || self.stride.is_some() => {
                bail!("--strategy and --stride need a target size (--size or --width/--height)");
            }
            None => {}
        }

        if let Some(color_format) = self.color_format {
            options.color_format = color_format;
        }
        if let Some(preset) = self.normalization {
            options.normalization = NormalizationSpec::preset(preset);
        }
        if self.mean.is_some() || self.std.is_some() {
            options.normalization.preset = NormalizationPreset::Custom;
            if let Some(mean) = &self.mean {
                options.normalization.mean = Some(mean.clone());
            }
            if let Some(std) = &self.std {
                options.normalization.std = Some(std.clone());
            }
        }
        if let Some(layout) = self.layout {
            options.data_layout = layout;
        }
        Ok(options)
    }
}

pub fn open_image(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).with_context(|| format!("Failed to decode image {}", path.display()))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Pretty-print `value` to `output`, or to stdout when no file is given
pub fn write_json<T: Serialize>(value: &T, output: Option<&PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}
