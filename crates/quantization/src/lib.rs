//! Fixed-point quantization of float tensors
//!
//! Forward: `q = clamp(round(x / scale + zero_point), q_min, q_max)`
//! Reverse: `x = (q - zero_point) * scale`
//!
//! Parameters are per-tensor or per-channel. Per-channel lookups go through a
//! single [`ChannelStride`] so interleaved and planar tensors share one code
//! path for quantize, dequantize and calibration.

pub mod calibrate;
pub mod params;
pub mod quantize;

pub use calibrate::{calculate_params, CalibrationOptions, ParamEstimate};
pub use params::{
    ChannelStride, OneOrMany, QuantDtype, QuantScheme, QuantizationMode, QuantizationParams,
    QuantizationSpec,
};
pub use quantize::{dequantize, quantize, QuantizedData};
