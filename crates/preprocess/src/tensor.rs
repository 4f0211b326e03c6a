//! Operations on flat float tensors produced by the pipeline

use crate::layout::chw_to_hwc;
use crate::normalize::{NormalizationSpec, Normalizer};
use crate::pipeline::PixelDataResult;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use vision_utils_common::{ColorFormat, DataLayout, PixelBuffer, Rect, Result, Size, VisionError};

/// Geometry of a single-image tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDims {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    #[serde(default)]
    pub layout: DataLayout,
}

impl TensorDims {
    #[must_use]
    pub fn new(width: usize, height: usize, channels: usize, layout: DataLayout) -> Self {
        Self {
            width,
            height,
            channels,
            layout,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.width * self.height * self.channels
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.layout.shape(self.width, self.height, self.channels)
    }

    fn check(&self, len: usize) -> Result<()> {
        if self.is_empty() {
            return Err(VisionError::invalid(format!(
                "tensor dimensions must be positive, got {}x{}x{}",
                self.width, self.height, self.channels
            )));
        }
        if len != self.len() {
            return Err(VisionError::invalid(format!(
                "tensor length {len} does not match {}x{}x{} ({})",
                self.width,
                self.height,
                self.channels,
                self.len()
            )));
        }
        Ok(())
    }

    /// Flat index of `(x, y, c)`
    #[inline]
    fn index(&self, x: usize, y: usize, c: usize) -> usize {
        if self.layout.is_planar() {
            c * self.width * self.height + y * self.width + x
        } else {
            (y * self.width + x) * self.channels + c
        }
    }
}

/// One channel plane (`height * width` values, row-major)
pub fn extract_channel(data: &[f32], dims: TensorDims, channel: usize) -> Result<Vec<f32>> {
    dims.check(data.len())?;
    if channel >= dims.channels {
        return Err(VisionError::out_of_bounds(format!(
            "channel {channel} of a {}-channel tensor",
            dims.channels
        )));
    }
    if dims.layout.is_planar() {
        let plane = dims.width * dims.height;
        return Ok(data[channel * plane..(channel + 1) * plane].to_vec());
    }
    Ok(data.iter().skip(channel).step_by(dims.channels).copied().collect())
}

/// Copy out a sub-rectangle, keeping the layout
pub fn extract_patch(data: &[f32], dims: TensorDims, rect: Rect) -> Result<Vec<f32>> {
    dims.check(data.len())?;
    let bounds = Size::new(
        u32::try_from(dims.width).map_err(|_| VisionError::invalid("tensor width overflows u32"))?,
        u32::try_from(dims.height).map_err(|_| VisionError::invalid("tensor height overflows u32"))?,
    )?;
    rect.check_within(bounds)?;

    let (px, py) = (rect.x as usize, rect.y as usize);
    let (pw, ph) = (rect.width as usize, rect.height as usize);
    let mut out = Vec::with_capacity(pw * ph * dims.channels);
    if dims.layout.is_planar() {
        for c in 0..dims.channels {
            for y in py..py + ph {
                let start = dims.index(px, y, c);
                out.extend_from_slice(&data[start..start + pw]);
            }
        }
    } else {
        for y in py..py + ph {
            let start = dims.index(px, y, 0);
            out.extend_from_slice(&data[start..start + pw * dims.channels]);
        }
    }
    Ok(out)
}

/// Stacked batch tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
    pub data_layout: DataLayout,
    pub batch_size: usize,
}

/// Stack same-shaped pipeline outputs along a new leading axis.
///
/// Each sample occupies one contiguous block. Output layout is the batched
/// form (`NHWC` / `NCHW`) of the inputs' layout.
pub fn concatenate_to_batch(results: &[PixelDataResult]) -> Result<BatchTensor> {
    let first = results
        .first()
        .ok_or_else(|| VisionError::invalid("cannot batch an empty list"))?;
    let planar = first.data_layout.is_planar();

    for (i, r) in results.iter().enumerate().skip(1) {
        if r.width != first.width || r.height != first.height || r.channels != first.channels {
            return Err(VisionError::mismatch(format!(
                "item {i} is {}x{}x{}, expected {}x{}x{}",
                r.width, r.height, r.channels, first.width, first.height, first.channels
            )));
        }
        if r.data_layout.is_planar() != planar {
            return Err(VisionError::invalid(format!(
                "item {i} has layout {}, expected one compatible with {}",
                r.data_layout, first.data_layout
            )));
        }
    }

    let per_item = first.data.len();
    let mut data = Vec::with_capacity(per_item * results.len());
    for r in results {
        data.extend_from_slice(&r.data);
    }

    let layout = first.data_layout.batched();
    let mut shape = layout.shape(first.width as usize, first.height as usize, first.channels);
    shape[0] = results.len();

    Ok(BatchTensor {
        data,
        shape,
        data_layout: layout,
        batch_size: results.len(),
    })
}

/// How a float tensor is turned back into bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorToImageOptions {
    #[serde(default = "default_channels")]
    pub channels: usize,
    #[serde(default)]
    pub data_layout: DataLayout,
    #[serde(default)]
    pub normalization: NormalizationSpec,
    /// Color model of the bytes; must be rgb, rgba, bgr, bgra or grayscale
    #[serde(default = "default_color")]
    pub color_format: ColorFormat,
}

fn default_channels() -> usize {
    3
}

fn default_color() -> ColorFormat {
    ColorFormat::Rgb
}

impl Default for TensorToImageOptions {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            data_layout: DataLayout::default(),
            normalization: NormalizationSpec::default(),
            color_format: default_color(),
        }
    }
}

/// Denormalize a tensor and reassemble an interleaved byte buffer
pub fn tensor_to_image(
    data: &[f32],
    width: u32,
    height: u32,
    options: &TensorToImageOptions,
) -> Result<PixelBuffer> {
    let format = options.color_format;
    if !matches!(
        format,
        ColorFormat::Rgb | ColorFormat::Rgba | ColorFormat::Bgr | ColorFormat::Bgra | ColorFormat::Grayscale
    ) {
        return Err(VisionError::unsupported(format!(
            "tensor_to_image cannot produce {format}"
        )));
    }
    if options.channels != format.channels() {
        return Err(VisionError::mismatch(format!(
            "{} channels cannot be read as {format}",
            options.channels
        )));
    }
    let dims = TensorDims::new(width as usize, height as usize, options.channels, options.data_layout);
    dims.check(data.len())?;

    let normalizer = Normalizer::new(&options.normalization)?;
    let bytes = if options.data_layout.is_planar() {
        let planar = normalizer.denormalize_planar(data, options.channels)?;
        chw_to_hwc(&planar, dims.width, dims.height, dims.channels)?
    } else {
        normalizer.denormalize(data, options.channels)?
    };
    PixelBuffer::new(width, height, format, bytes)
}

/// View a flat tensor as an `ndarray` of the given shape
pub fn to_ndarray(data: Vec<f32>, shape: &[usize]) -> Result<ArrayD<f32>> {
    ArrayD::from_shape_vec(IxDyn(shape), data)
        .map_err(|e| VisionError::mismatch(format!("cannot view tensor as {shape:?}: {e}")))
}
