//! Parameter estimation from observed float ranges

use crate::params::{ChannelStride, QuantDtype, QuantizationMode, QuantizationParams};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vision_utils_common::{DataLayout, Result, VisionError};

/// How parameters are estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationOptions {
    pub dtype: QuantDtype,
    #[serde(default)]
    pub mode: QuantizationMode,
    /// Zero-point fixed at 0, range symmetric around it
    #[serde(default)]
    pub symmetric: bool,
    /// Channel count for per-channel estimation
    #[serde(default)]
    pub channels: Option<usize>,
    #[serde(default)]
    pub data_layout: DataLayout,
}

impl CalibrationOptions {
    #[must_use]
    pub fn new(dtype: QuantDtype) -> Self {
        Self {
            dtype,
            mode: QuantizationMode::PerTensor,
            symmetric: false,
            channels: None,
            data_layout: DataLayout::default(),
        }
    }

    #[must_use]
    pub fn symmetric(mut self) -> Self {
        self.symmetric = true;
        self
    }

    #[must_use]
    pub fn per_channel(mut self, channels: usize, data_layout: DataLayout) -> Self {
        self.mode = QuantizationMode::PerChannel;
        self.channels = Some(channels);
        self.data_layout = data_layout;
        self
    }
}

/// Estimated parameters plus the observed ranges they came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamEstimate {
    pub params: QuantizationParams,
    pub min: Vec<f32>,
    pub max: Vec<f32>,
    /// At least one channel fell back to `scale = 1, zero_point = 0`
    pub degenerate: bool,
}

/// `(scale, zero_point)` for one observed range, or `None` when degenerate
fn estimate(min: f32, max: f32, dtype: QuantDtype, symmetric: bool) -> Option<(f32, i32)> {
    if min == max {
        return None;
    }
    let (q_min, q_max) = (f64::from(dtype.q_min()), f64::from(dtype.q_max()));
    let (min, max) = (f64::from(min), f64::from(max));

    let (scale, zero_point) = if symmetric {
        (min.abs().max(max.abs()) / q_min.abs().max(q_max.abs()), 0.0)
    } else {
        // Zero must be representable, otherwise the zero point leaves the
        // integer range and the far end of the data saturates
        let (min, max) = (min.min(0.0), max.max(0.0));
        let scale = (max - min) / (q_max - q_min);
        (scale, (q_min - min / scale).round().clamp(q_min, q_max))
    };

    let scale = scale as f32;
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }
    Some((scale, zero_point as i32))
}

/// Estimate quantization parameters for `data`.
///
/// Asymmetric calibration widens the observed range to include zero, so the
/// zero point always lies inside the integer range.
///
/// A degenerate range (`min == max`, or a scale that is not finite and
/// positive) falls back to `scale = 1, zero_point = 0` with a warning
/// instead of failing.
pub fn calculate_params(data: &[f32], options: &CalibrationOptions) -> Result<ParamEstimate> {
    if data.is_empty() {
        return Err(VisionError::invalid("cannot calibrate on an empty tensor"));
    }
    if data.iter().any(|x| !x.is_finite()) {
        return Err(VisionError::invalid("calibration data contains non-finite values"));
    }

    let channels = match options.mode {
        QuantizationMode::PerTensor => 1,
        QuantizationMode::PerChannel => options
            .channels
            .ok_or_else(|| VisionError::invalid("per-channel calibration requires a channel count"))?,
    };
    let stride = ChannelStride::new(data.len(), channels, options.data_layout)?;

    let mut min = vec![f32::INFINITY; channels];
    let mut max = vec![f32::NEG_INFINITY; channels];
    for (i, &x) in data.iter().enumerate() {
        let c = stride.channel_of(i);
        min[c] = min[c].min(x);
        max[c] = max[c].max(x);
    }

    let mut degenerate = false;
    let mut scales = Vec::with_capacity(channels);
    let mut zero_points = Vec::with_capacity(channels);
    for c in 0..channels {
        let (scale, zero_point) = match estimate(min[c], max[c], options.dtype, options.symmetric) {
            Some(found) => found,
            None => {
                warn!(
                    "Degenerate quantization range [{}, {}] on channel {c}, using scale=1 zero_point=0",
                    min[c], max[c]
                );
                degenerate = true;
                (1.0, 0)
            }
        };
        scales.push(scale);
        zero_points.push(zero_point);
    }

    let params = match options.mode {
        QuantizationMode::PerTensor => {
            QuantizationParams::per_tensor(options.dtype, scales[0], zero_points[0])?
        }
        QuantizationMode::PerChannel => {
            QuantizationParams::per_channel(options.dtype, scales, zero_points, options.data_layout)?
        }
    };

    debug!(
        dtype = %options.dtype,
        channels,
        degenerate,
        "Calibrated quantization parameters over {} values",
        data.len()
    );

    Ok(ParamEstimate {
        params,
        min,
        max,
        degenerate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::QuantScheme;
    use crate::quantize::{dequantize, quantize};

    fn per_tensor(estimate: &ParamEstimate) -> (f32, i32) {
        match estimate.params.scheme() {
            QuantScheme::PerTensor { scale, zero_point } => (*scale, *zero_point),
            QuantScheme::PerChannel { .. } => panic!("expected per-tensor parameters"),
        }
    }

    #[test]
    fn test_symmetric_int8() {
        let est = calculate_params(&[-2.0, 0.5, 1.27], &CalibrationOptions::new(QuantDtype::Int8).symmetric())
            .unwrap();
        let (scale, zp) = per_tensor(&est);
        // max(|min|, |max|) = 2.0 over max(|-128|, |127|) = 128
        assert!((scale - 2.0 / 128.0).abs() < 1e-7);
        assert_eq!(zp, 0);
        assert!(!est.degenerate);
    }

    #[test]
    fn test_asymmetric_uint8_covers_range() {
        let data = [-1.0, 0.0, 3.0];
        let est = calculate_params(&data, &CalibrationOptions::new(QuantDtype::Uint8)).unwrap();
        let (scale, zp) = per_tensor(&est);
        assert!((scale - 4.0 / 255.0).abs() < 1e-7);
        // 0 - (-1) / (4/255) = 63.75 -> 64
        assert_eq!(zp, 64);

        let q = quantize(&data, &est.params).unwrap().to_i32();
        assert_eq!(q[0], 0);
        assert_eq!(q[2], 255);
        let restored = dequantize(&quantize(&data, &est.params).unwrap(), &est.params).unwrap();
        for (x, y) in data.iter().zip(&restored) {
            assert!((x - y).abs() <= scale);
        }
    }

    #[test]
    fn test_positive_range_round_trips_within_scale() {
        // Scale-normalized pixels never reach 0
        let data: Vec<f32> = (0..=80).map(|i| 0.2 + i as f32 * 0.01).collect();
        for dtype in [QuantDtype::Int8, QuantDtype::Uint8, QuantDtype::Int16] {
            let est = calculate_params(&data, &CalibrationOptions::new(dtype)).unwrap();
            let (scale, zp) = per_tensor(&est);
            assert!(zp >= dtype.q_min() && zp <= dtype.q_max());
            assert_eq!(est.min, vec![0.2]);

            let restored = dequantize(&quantize(&data, &est.params).unwrap(), &est.params).unwrap();
            for (x, y) in data.iter().zip(&restored) {
                assert!((x - y).abs() <= scale, "{dtype}: {x} -> {y} (scale {scale})");
            }
        }
    }

    #[test]
    fn test_negative_range_round_trips_within_scale() {
        let data = [-9.0, -7.5, -3.0];
        let est = calculate_params(&data, &CalibrationOptions::new(QuantDtype::Uint8)).unwrap();
        let (scale, zp) = per_tensor(&est);
        // Range widened to [-9, 0]
        assert!((scale - 9.0 / 255.0).abs() < 1e-7);
        assert_eq!(zp, 255);
        let restored = dequantize(&quantize(&data, &est.params).unwrap(), &est.params).unwrap();
        for (x, y) in data.iter().zip(&restored) {
            assert!((x - y).abs() <= scale);
        }
    }

    #[test]
    fn test_degenerate_range_falls_back() {
        let est = calculate_params(&[0.7; 8], &CalibrationOptions::new(QuantDtype::Uint8)).unwrap();
        assert_eq!(per_tensor(&est), (1.0, 0));
        assert!(est.degenerate);

        let zeros = calculate_params(&[0.0; 4], &CalibrationOptions::new(QuantDtype::Int8).symmetric())
            .unwrap();
        assert!(zeros.degenerate);
    }

    #[test]
    fn test_per_channel_planar() {
        // Channel 0 spans [0, 1], channel 1 is constant
        let data = [0.0, 1.0, 5.0, 5.0];
        let options = CalibrationOptions::new(QuantDtype::Uint8).per_channel(2, DataLayout::Chw);
        let est = calculate_params(&data, &options).unwrap();
        assert_eq!(est.min, vec![0.0, 5.0]);
        assert_eq!(est.max, vec![1.0, 5.0]);
        assert!(est.degenerate);
        match est.params.scheme() {
            QuantScheme::PerChannel { scales, zero_points, .. } => {
                assert!((scales[0] - 1.0 / 255.0).abs() < 1e-7);
                assert_eq!(scales[1], 1.0);
                assert_eq!(zero_points, &vec![0, 0]);
            }
            QuantScheme::PerTensor { .. } => panic!("expected per-channel parameters"),
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let options = CalibrationOptions::new(QuantDtype::Int8);
        assert!(calculate_params(&[], &options).is_err());
        assert!(calculate_params(&[f32::NAN], &options).is_err());

        let mut missing_channels = options;
        missing_channels.mode = QuantizationMode::PerChannel;
        assert!(matches!(
            calculate_params(&[1.0, 2.0], &missing_channels),
            Err(VisionError::InvalidInput(_))
        ));
    }
}
