//! Image-to-tensor pipeline
//!
//! `source -> [roi] -> [resize] -> color conversion -> normalization -> layout`

use crate::color;
use crate::geometry::{plan, ResizeOptions, ResizeStrategy};
use crate::layout::convert_layout;
use crate::letterbox::LetterboxRecord;
use crate::normalize::{NormalizationSpec, Normalizer};
use crate::resample::apply_plan;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;
use vision_utils_common::{ColorFormat, DataLayout, PixelBuffer, PixelSource, Rect, Result};

fn default_color_format() -> ColorFormat {
    ColorFormat::Rgb
}

/// Options for [`get_pixel_data`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelDataOptions {
    /// Region cropped out of the source before anything else
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize: Option<ResizeOptions>,
    #[serde(default = "default_color_format")]
    pub color_format: ColorFormat,
    #[serde(default)]
    pub normalization: NormalizationSpec,
    #[serde(default)]
    pub data_layout: DataLayout,
}

impl Default for PixelDataOptions {
    fn default() -> Self {
        Self {
            roi: None,
            resize: None,
            color_format: default_color_format(),
            normalization: NormalizationSpec::default(),
            data_layout: DataLayout::default(),
        }
    }
}

impl PixelDataOptions {
    #[must_use]
    pub fn with_resize(mut self, resize: ResizeOptions) -> Self {
        self.resize = Some(resize);
        self
    }

    #[must_use]
    pub fn with_roi(mut self, roi: Rect) -> Self {
        self.roi = Some(roi);
        self
    }

    #[must_use]
    pub fn with_color_format(mut self, color_format: ColorFormat) -> Self {
        self.color_format = color_format;
        self
    }

    #[must_use]
    pub fn with_normalization(mut self, normalization: NormalizationSpec) -> Self {
        self.normalization = normalization;
        self
    }

    #[must_use]
    pub fn with_layout(mut self, data_layout: DataLayout) -> Self {
        self.data_layout = data_layout;
        self
    }
}

/// Tensor produced by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelDataResult {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub color_format: ColorFormat,
    pub data_layout: DataLayout,
    pub shape: Vec<usize>,
    pub processing_time_ms: f64,
    /// Present when the resize strategy was `letterbox`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letterbox: Option<LetterboxRecord>,
}

/// Run the forward pipeline over a decoded source
pub fn get_pixel_data<S: PixelSource + ?Sized>(
    source: &S,
    options: &PixelDataOptions,
) -> Result<PixelDataResult> {
    let start = Instant::now();
    // Validate normalization before touching pixels
    let normalizer = Normalizer::new(&options.normalization)?;

    let mut buffer = match options.roi {
        Some(roi) => PixelBuffer::from_source_region(source, roi)?,
        None => PixelBuffer::from_source(source)?,
    };

    let mut letterbox = None;
    if let Some(resize) = &options.resize {
        let plan = plan(buffer.width(), buffer.height(), resize)?;
        if plan.strategy == ResizeStrategy::Letterbox {
            letterbox = Some(LetterboxRecord::from_plan(&plan)?);
        }
        buffer = apply_plan(&buffer, &plan)?;
    }

    let converted = color::convert(&buffer, options.color_format)?;
    let (width, height, channels) = (converted.width(), converted.height(), converted.channels());

    let normalized = normalizer.normalize(converted.data(), channels)?;
    let data = convert_layout(
        &normalized,
        width as usize,
        height as usize,
        channels,
        DataLayout::Hwc,
        options.data_layout,
    )?;

    let shape = options
        .data_layout
        .shape(width as usize, height as usize, channels);
    let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    debug!(
        "Pixel data {}x{}x{} {} {} in {:.2}ms",
        width, height, channels, options.color_format, options.data_layout, processing_time_ms
    );

    Ok(PixelDataResult {
        data,
        width,
        height,
        channels,
        color_format: options.color_format,
        data_layout: options.data_layout,
        shape,
        processing_time_ms,
        letterbox,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::NormalizationPreset;
    use image::{Rgba, RgbaImage};
    use vision_utils_common::VisionError;

    #[test]
    fn test_defaults_rgb_scale_hwc() {
        let img = RgbaImage::from_pixel(4, 2, Rgba([255, 0, 51, 255]));
        let result = get_pixel_data(&img, &PixelDataOptions::default()).unwrap();

        assert_eq!(result.shape, vec![2, 4, 3]);
        assert_eq!(result.data.len(), 24);
        assert!((result.data[0] - 1.0).abs() < 1e-6);
        assert_eq!(result.data[1], 0.0);
        assert!((result.data[2] - 0.2).abs() < 1e-6);
        assert!(result.letterbox.is_none());
    }

    #[test]
    fn test_letterbox_nchw_records_mapping() {
        let img = RgbaImage::from_pixel(64, 32, Rgba([10, 20, 30, 255]));
        let options = PixelDataOptions::default()
            .with_resize(ResizeOptions::letterbox(32))
            .with_normalization(NormalizationSpec::preset(NormalizationPreset::Raw))
            .with_layout(DataLayout::Nchw);
        let result = get_pixel_data(&img, &options).unwrap();

        assert_eq!(result.shape, vec![1, 3, 32, 32]);
        let record = result.letterbox.unwrap();
        assert_eq!(record.offset, (0.0, 8.0));
        assert_eq!(record.scale, 0.5);
        // First row is padding in every plane
        assert_eq!(result.data[0], 114.0);
        assert_eq!(result.data[32 * 32], 114.0);
        // Row 16 is image content; red plane then blue plane
        assert_eq!(result.data[16 * 32], 10.0);
        assert_eq!(result.data[2 * 32 * 32 + 16 * 32], 30.0);
    }

    #[test]
    fn test_roi_applies_before_resize() {
        let img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let options = PixelDataOptions::default()
            .with_roi(Rect::new(5, 0, 5, 5))
            .with_color_format(ColorFormat::Grayscale);
        let result = get_pixel_data(&img, &options).unwrap();
        assert_eq!(result.shape, vec![5, 5, 1]);
        assert!(result.data.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_roi_outside_source() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let options = PixelDataOptions::default().with_roi(Rect::new(2, 2, 4, 4));
        assert!(matches!(
            get_pixel_data(&img, &options),
            Err(VisionError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_options_deserialize() {
        let options: PixelDataOptions = serde_json::from_str(
            r#"{"resize": {"width": 224, "height": 224, "strategy": "cover"},
                "normalization": {"preset": "imagenet"},
                "data_layout": "nchw"}"#,
        )
        .unwrap();
        assert_eq!(options.color_format, ColorFormat::Rgb);
        assert_eq!(options.data_layout, DataLayout::Nchw);
        assert_eq!(options.resize.unwrap().strategy, ResizeStrategy::Cover);
    }
}
