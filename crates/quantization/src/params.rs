//! Quantization parameters and their interchange form

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vision_utils_common::{DataLayout, Result, VisionError};

/// Fixed-point target type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantDtype {
    Int8,
    Uint8,
    Int16,
}

impl QuantDtype {
    #[must_use]
    pub fn q_min(self) -> i32 {
        match self {
            QuantDtype::Int8 => i32::from(i8::MIN),
            QuantDtype::Uint8 => 0,
            QuantDtype::Int16 => i32::from(i16::MIN),
        }
    }

    #[must_use]
    pub fn q_max(self) -> i32 {
        match self {
            QuantDtype::Int8 => i32::from(i8::MAX),
            QuantDtype::Uint8 => i32::from(u8::MAX),
            QuantDtype::Int16 => i32::from(i16::MAX),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuantDtype::Int8 => "int8",
            QuantDtype::Uint8 => "uint8",
            QuantDtype::Int16 => "int16",
        }
    }
}

impl fmt::Display for QuantDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuantDtype {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "int8" => Ok(QuantDtype::Int8),
            "uint8" => Ok(QuantDtype::Uint8),
            "int16" => Ok(QuantDtype::Int16),
            other => Err(VisionError::unsupported(format!("quantization dtype '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum QuantizationMode {
    #[default]
    PerTensor,
    PerChannel,
}

impl FromStr for QuantizationMode {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "per-tensor" | "tensor" => Ok(QuantizationMode::PerTensor),
            "per-channel" | "channel" => Ok(QuantizationMode::PerChannel),
            other => Err(VisionError::unsupported(format!("quantization mode '{other}'"))),
        }
    }
}

/// Maps a flat element index to its channel.
///
/// Interleaved data cycles through channels every element; planar data keeps
/// each channel in one contiguous block of `plane_len` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStride {
    Interleaved { channels: usize },
    Planar { plane_len: usize },
}

impl ChannelStride {
    /// Stride for `len` elements of `channels` channels laid out as `layout`
    pub fn new(len: usize, channels: usize, layout: DataLayout) -> Result<Self> {
        if channels == 0 {
            return Err(VisionError::invalid("channel count must be positive"));
        }
        if len % channels != 0 {
            return Err(VisionError::mismatch(format!(
                "{len} values cannot be split into {channels} channels"
            )));
        }
        Ok(if layout.is_planar() {
            ChannelStride::Planar {
                plane_len: (len / channels).max(1),
            }
        } else {
            ChannelStride::Interleaved { channels }
        })
    }

    #[inline]
    #[must_use]
    pub fn channel_of(&self, index: usize) -> usize {
        match *self {
            ChannelStride::Interleaved { channels } => index % channels,
            ChannelStride::Planar { plane_len } => index / plane_len,
        }
    }
}

/// Scale/zero-point granularity
#[derive(Debug, Clone, PartialEq)]
pub enum QuantScheme {
    PerTensor {
        scale: f32,
        zero_point: i32,
    },
    PerChannel {
        scales: Vec<f32>,
        zero_points: Vec<i32>,
        data_layout: DataLayout,
    },
}

/// Validated quantization parameters.
///
/// Invariant: every scale is finite and positive, every zero-point lies in
/// `[q_min, q_max]` of `dtype`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuantizationSpec", into = "QuantizationSpec")]
pub struct QuantizationParams {
    dtype: QuantDtype,
    scheme: QuantScheme,
}

impl QuantizationParams {
    pub fn per_tensor(dtype: QuantDtype, scale: f32, zero_point: i32) -> Result<Self> {
        check_scale(scale)?;
        check_zero_point(dtype, zero_point)?;
        Ok(Self {
            dtype,
            scheme: QuantScheme::PerTensor { scale, zero_point },
        })
    }

    pub fn per_channel(
        dtype: QuantDtype,
        scales: Vec<f32>,
        zero_points: Vec<i32>,
        data_layout: DataLayout,
    ) -> Result<Self> {
        if scales.is_empty() {
            return Err(VisionError::invalid("per-channel scales must not be empty"));
        }
        if scales.len() != zero_points.len() {
            return Err(VisionError::invalid(format!(
                "{} scales but {} zero-points",
                scales.len(),
                zero_points.len()
            )));
        }
        for &scale in &scales {
            check_scale(scale)?;
        }
        for &zp in &zero_points {
            check_zero_point(dtype, zp)?;
        }
        Ok(Self {
            dtype,
            scheme: QuantScheme::PerChannel {
                scales,
                zero_points,
                data_layout,
            },
        })
    }

    #[must_use]
    pub fn dtype(&self) -> QuantDtype {
        self.dtype
    }

    #[must_use]
    pub fn scheme(&self) -> &QuantScheme {
        &self.scheme
    }

    #[must_use]
    pub fn mode(&self) -> QuantizationMode {
        match self.scheme {
            QuantScheme::PerTensor { .. } => QuantizationMode::PerTensor,
            QuantScheme::PerChannel { .. } => QuantizationMode::PerChannel,
        }
    }

    /// Number of channels the parameters address (1 for per-tensor)
    #[must_use]
    pub fn channels(&self) -> usize {
        match &self.scheme {
            QuantScheme::PerTensor { .. } => 1,
            QuantScheme::PerChannel { scales, .. } => scales.len(),
        }
    }

    /// Resolve `(scale, zero_point)` lookup for a tensor of `len` elements
    pub(crate) fn resolver(&self, len: usize) -> Result<ParamResolver<'_>> {
        match &self.scheme {
            QuantScheme::PerTensor { scale, zero_point } => Ok(ParamResolver::Uniform {
                scale: *scale,
                zero_point: *zero_point,
            }),
            QuantScheme::PerChannel {
                scales,
                zero_points,
                data_layout,
            } => Ok(ParamResolver::Strided {
                stride: ChannelStride::new(len, scales.len(), *data_layout)?,
                scales,
                zero_points,
            }),
        }
    }
}

pub(crate) enum ParamResolver<'a> {
    Uniform {
        scale: f32,
        zero_point: i32,
    },
    Strided {
        stride: ChannelStride,
        scales: &'a [f32],
        zero_points: &'a [i32],
    },
}

impl ParamResolver<'_> {
    #[inline]
    pub(crate) fn at(&self, index: usize) -> (f32, i32) {
        match self {
            ParamResolver::Uniform { scale, zero_point } => (*scale, *zero_point),
            ParamResolver::Strided {
                stride,
                scales,
                zero_points,
            } => {
                let c = stride.channel_of(index);
                (scales[c], zero_points[c])
            }
        }
    }
}

fn check_scale(scale: f32) -> Result<()> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(VisionError::invalid(format!(
            "quantization scale must be finite and positive, got {scale}"
        )));
    }
    Ok(())
}

fn check_zero_point(dtype: QuantDtype, zero_point: i32) -> Result<()> {
    if zero_point < dtype.q_min() || zero_point > dtype.q_max() {
        return Err(VisionError::invalid(format!(
            "zero-point {zero_point} outside {dtype} range [{}, {}]",
            dtype.q_min(),
            dtype.q_max()
        )));
    }
    Ok(())
}

/// Scalar or per-channel array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Wire form: `{mode, dtype, scale, zeroPoint, channels?, dataLayout?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantizationSpec {
    #[serde(default)]
    pub mode: QuantizationMode,
    pub dtype: QuantDtype,
    pub scale: OneOrMany<f32>,
    pub zero_point: OneOrMany<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_layout: Option<DataLayout>,
}

impl TryFrom<QuantizationSpec> for QuantizationParams {
    type Error = VisionError;

    fn try_from(spec: QuantizationSpec) -> Result<Self> {
        match spec.mode {
            QuantizationMode::PerTensor => match (spec.scale, spec.zero_point) {
                (OneOrMany::One(scale), OneOrMany::One(zero_point)) => {
                    QuantizationParams::per_tensor(spec.dtype, scale, zero_point)
                }
                _ => Err(VisionError::invalid(
                    "per-tensor quantization takes a scalar scale and zero-point",
                )),
            },
            QuantizationMode::PerChannel => {
                let scales = spec.scale.into_vec();
                let zero_points = spec.zero_point.into_vec();
                if let Some(channels) = spec.channels {
                    if scales.len() != channels || zero_points.len() != channels {
                        return Err(VisionError::invalid(format!(
                            "per-channel arrays must have {channels} entries, got {} scales and {} zero-points",
                            scales.len(),
                            zero_points.len()
                        )));
                    }
                }
                QuantizationParams::per_channel(
                    spec.dtype,
                    scales,
                    zero_points,
                    spec.data_layout.unwrap_or_default(),
                )
            }
        }
    }
}

impl From<QuantizationParams> for QuantizationSpec {
    fn from(params: QuantizationParams) -> Self {
        match params.scheme {
            QuantScheme::PerTensor { scale, zero_point } => QuantizationSpec {
                mode: QuantizationMode::PerTensor,
                dtype: params.dtype,
                scale: OneOrMany::One(scale),
                zero_point: OneOrMany::One(zero_point),
                channels: None,
                data_layout: None,
            },
            QuantScheme::PerChannel {
                scales,
                zero_points,
                data_layout,
            } => QuantizationSpec {
                mode: QuantizationMode::PerChannel,
                dtype: params.dtype,
                channels: Some(scales.len()),
                scale: OneOrMany::Many(scales),
                zero_point: OneOrMany::Many(zero_points),
                data_layout: Some(data_layout),
            },
        }
    }
}
