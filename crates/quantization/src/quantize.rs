//! Float <-> fixed-point conversion

use crate::params::{QuantDtype, QuantizationParams};
use serde::{Deserialize, Serialize};
use vision_utils_common::{Result, VisionError};

/// Integer tensor tagged with its element type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "data", rename_all = "lowercase")]
pub enum QuantizedData {
    Int8(Vec<i8>),
    Uint8(Vec<u8>),
    Int16(Vec<i16>),
}

impl QuantizedData {
    #[must_use]
    pub fn dtype(&self) -> QuantDtype {
        match self {
            QuantizedData::Int8(_) => QuantDtype::Int8,
            QuantizedData::Uint8(_) => QuantDtype::Uint8,
            QuantizedData::Int16(_) => QuantDtype::Int16,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            QuantizedData::Int8(v) => v.len(),
            QuantizedData::Uint8(v) => v.len(),
            QuantizedData::Int16(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to `i32`
    #[must_use]
    pub fn to_i32(&self) -> Vec<i32> {
        match self {
            QuantizedData::Int8(v) => v.iter().map(|&q| i32::from(q)).collect(),
            QuantizedData::Uint8(v) => v.iter().map(|&q| i32::from(q)).collect(),
            QuantizedData::Int16(v) => v.iter().map(|&q| i32::from(q)).collect(),
        }
    }
}

/// `round(x / scale + zero_point)`, clamped to the dtype range
#[inline]
fn quantize_value(x: f32, scale: f32, zero_point: i32, dtype: QuantDtype) -> i32 {
    let q = (f64::from(x) / f64::from(scale) + f64::from(zero_point)).round();
    q.clamp(f64::from(dtype.q_min()), f64::from(dtype.q_max())) as i32
}

/// Quantize a float tensor.
///
/// Per-channel parameters are applied through the layout-aware channel
/// stride; `data.len()` must divide evenly into the channel count.
pub fn quantize(data: &[f32], params: &QuantizationParams) -> Result<QuantizedData> {
    if let Some(i) = data.iter().position(|x| !x.is_finite()) {
        return Err(VisionError::invalid(format!(
            "cannot quantize non-finite value {} at index {i}",
            data[i]
        )));
    }
    let dtype = params.dtype();
    let resolver = params.resolver(data.len())?;
    let values = data.iter().enumerate().map(|(i, &x)| {
        let (scale, zero_point) = resolver.at(i);
        quantize_value(x, scale, zero_point, dtype)
    });

    // Values are already clamped into range, so the narrowing casts are exact
    Ok(match dtype {
        QuantDtype::Int8 => QuantizedData::Int8(values.map(|q| q as i8).collect()),
        QuantDtype::Uint8 => QuantizedData::Uint8(values.map(|q| q as u8).collect()),
        QuantDtype::Int16 => QuantizedData::Int16(values.map(|q| q as i16).collect()),
    })
}

/// `(q - zero_point) * scale`
pub fn dequantize(data: &QuantizedData, params: &QuantizationParams) -> Result<Vec<f32>> {
    if data.dtype() != params.dtype() {
        return Err(VisionError::invalid(format!(
            "data is {} but parameters are for {}",
            data.dtype(),
            params.dtype()
        )));
    }
    let resolver = params.resolver(data.len())?;
    Ok(data
        .to_i32()
        .into_iter()
        .enumerate()
        .map(|(i, q)| {
            let (scale, zero_point) = resolver.at(i);
            ((q - zero_point) as f32) * scale
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_utils_common::DataLayout;

    #[test]
    fn test_uint8_saturates() {
        // 1.0 / 0.0078125 + 128 = 256, clamped to 255
        let params = QuantizationParams::per_tensor(QuantDtype::Uint8, 0.007_812_5, 128).unwrap();
        let q = quantize(&[1.0, 0.0, -1.0], &params).unwrap();
        assert_eq!(q, QuantizedData::Uint8(vec![255, 128, 0]));
    }

    #[test]
    fn test_int8_round_half_away_from_zero() {
        let params = QuantizationParams::per_tensor(QuantDtype::Int8, 1.0, 0).unwrap();
        let q = quantize(&[0.5, -0.5, 1.49, -200.0], &params).unwrap();
        assert_eq!(q, QuantizedData::Int8(vec![1, -1, 1, -128]));
    }

    #[test]
    fn test_round_trip_error_bounded_by_scale() {
        let data: Vec<f32> = (0..200).map(|i| -1.0 + i as f32 * 0.01).collect();
        for (dtype, scale, zp) in [
            (QuantDtype::Int8, 1.0 / 127.0, 0),
            (QuantDtype::Uint8, 2.0 / 255.0, 128),
            (QuantDtype::Int16, 1.0 / 32767.0, 0),
        ] {
            let params = QuantizationParams::per_tensor(dtype, scale, zp).unwrap();
            let restored = dequantize(&quantize(&data, &params).unwrap(), &params).unwrap();
            for (x, y) in data.iter().zip(&restored) {
                assert!((x - y).abs() <= scale, "{dtype}: {x} -> {y}");
            }
        }
    }

    #[test]
    fn test_per_channel_interleaved_and_planar_agree() {
        let params_hwc = QuantizationParams::per_channel(
            QuantDtype::Int8,
            vec![0.1, 0.01],
            vec![0, 10],
            DataLayout::Hwc,
        )
        .unwrap();
        let params_chw = QuantizationParams::per_channel(
            QuantDtype::Int8,
            vec![0.1, 0.01],
            vec![0, 10],
            DataLayout::Chw,
        )
        .unwrap();

        // Two pixels, two channels
        let hwc = [1.0, 0.5, 2.0, 0.25];
        let chw = [1.0, 2.0, 0.5, 0.25];
        let q_hwc = quantize(&hwc, &params_hwc).unwrap().to_i32();
        let q_chw = quantize(&chw, &params_chw).unwrap().to_i32();

        assert_eq!(q_hwc, vec![10, 60, 20, 35]);
        assert_eq!(q_chw, vec![10, 20, 60, 35]);
    }

    #[test]
    fn test_per_channel_length_must_divide() {
        let params = QuantizationParams::per_channel(
            QuantDtype::Uint8,
            vec![1.0; 3],
            vec![0; 3],
            DataLayout::Hwc,
        )
        .unwrap();
        assert!(matches!(
            quantize(&[0.0; 4], &params),
            Err(VisionError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_dequantize_dtype_mismatch() {
        let params = QuantizationParams::per_tensor(QuantDtype::Int16, 1.0, 0).unwrap();
        assert!(matches!(
            dequantize(&QuantizedData::Int8(vec![1]), &params),
            Err(VisionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_non_finite() {
        let params = QuantizationParams::per_tensor(QuantDtype::Int8, 1.0, 0).unwrap();
        assert!(matches!(
            quantize(&[0.0, f32::INFINITY], &params),
            Err(VisionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_serde_tagged() {
        let json = serde_json::to_value(QuantizedData::Uint8(vec![1, 2])).unwrap();
        assert_eq!(json["dtype"], "uint8");
        assert_eq!(json["data"][1], 2);
    }
}
