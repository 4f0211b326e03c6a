//! Forward letterbox and the record that makes it reversible

use crate::geometry::{plan, ResizeOptions, ResizePlan, ResizeStrategy};
use crate::resample::apply_plan;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vision_utils_common::{PixelBuffer, Result, Size, VisionError};

/// What a detector's output needs to be mapped back to source pixels.
///
/// Produced once per forward letterbox; the caller persists it and hands it to
/// the reverse projection unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawLetterboxRecord")]
pub struct LetterboxRecord {
    pub scale: f64,
    /// `(pad_left, pad_top)` in letterboxed pixels
    pub offset: (f64, f64),
    pub original_size: Size,
    pub letterboxed_size: Size,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLetterboxRecord {
    scale: f64,
    offset: (f64, f64),
    original_size: Size,
    letterboxed_size: Size,
}

impl TryFrom<RawLetterboxRecord> for LetterboxRecord {
    type Error = VisionError;

    fn try_from(raw: RawLetterboxRecord) -> Result<Self> {
        let record = Self {
            scale: raw.scale,
            offset: raw.offset,
            original_size: raw.original_size,
            letterboxed_size: raw.letterboxed_size,
        };
        record.validate()?;
        Ok(record)
    }
}

impl LetterboxRecord {
    /// Build a record from persisted values, rejecting anything that cannot
    /// be inverted
    pub fn new(scale: f64, offset: (f64, f64), original_size: Size, letterboxed_size: Size) -> Result<Self> {
        let record = Self {
            scale,
            offset,
            original_size,
            letterboxed_size,
        };
        record.validate()?;
        Ok(record)
    }

    /// Scale must be finite and positive, offsets finite, sizes non-empty
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(VisionError::invalid(format!(
                "letterbox scale must be finite and positive, got {}",
                self.scale
            )));
        }
        if !self.offset.0.is_finite() || !self.offset.1.is_finite() {
            return Err(VisionError::invalid(format!(
                "letterbox offset must be finite, got {:?}",
                self.offset
            )));
        }
        for size in [self.original_size, self.letterboxed_size] {
            Size::new(size.width, size.height)?;
        }
        Ok(())
    }

    pub fn from_plan(plan: &ResizePlan) -> Result<Self> {
        if plan.strategy != ResizeStrategy::Letterbox {
            return Err(VisionError::invalid(format!(
                "letterbox record requires a letterbox plan, got {}",
                plan.strategy
            )));
        }
        Ok(Self {
            scale: plan.scale.x,
            offset: (f64::from(plan.padding.left), f64::from(plan.padding.top)),
            original_size: plan.source,
            letterboxed_size: plan.target,
        })
    }

    /// Map a point from letterboxed space into source space
    #[must_use]
    pub fn to_source(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.offset.0) / self.scale, (y - self.offset.1) / self.scale)
    }

    /// Map a point from source space into letterboxed space
    #[must_use]
    pub fn to_letterboxed(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.offset.0, y * self.scale + self.offset.1)
    }
}

/// Letterbox an RGBA buffer, returning the canvas and its record.
///
/// `options.strategy` is forced to `letterbox`.
pub fn letterbox(source: &PixelBuffer, options: &ResizeOptions) -> Result<(PixelBuffer, LetterboxRecord)> {
    let options = ResizeOptions {
        strategy: ResizeStrategy::Letterbox,
        ..options.clone()
    };
    let plan = plan(source.width(), source.height(), &options)?;
    let record = LetterboxRecord::from_plan(&plan)?;
    let canvas = apply_plan(source, &plan)?;
    debug!(
        "Letterboxed {} -> {} (scale {:.4}, offset {:?})",
        record.original_size, record.letterboxed_size, record.scale, record.offset
    );
    Ok((canvas, record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_utils_common::ColorFormat;

    #[test]
    fn test_record_from_1080p_plan() {
        let plan = plan(1920, 1080, &ResizeOptions::letterbox(640)).unwrap();
        let record = LetterboxRecord::from_plan(&plan).unwrap();
        assert!((record.scale - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(record.offset, (0.0, 140.0));
        assert_eq!(record.original_size, Size::new(1920, 1080).unwrap());
        assert_eq!(record.letterboxed_size, Size::new(640, 640).unwrap());
    }

    #[test]
    fn test_rejects_non_letterbox_plan() {
        let plan = plan(100, 50, &ResizeOptions::new(64, 64, ResizeStrategy::Contain)).unwrap();
        assert!(matches!(
            LetterboxRecord::from_plan(&plan),
            Err(VisionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_point_mapping_inverts() {
        let plan = plan(1920, 1080, &ResizeOptions::letterbox(640)).unwrap();
        let record = LetterboxRecord::from_plan(&plan).unwrap();
        let (x, y) = record.to_letterboxed(960.0, 540.0);
        assert!((x - 320.0).abs() < 1e-9 && (y - 320.0).abs() < 1e-9);
        let (sx, sy) = record.to_source(x, y);
        assert!((sx - 960.0).abs() < 1e-9 && (sy - 540.0).abs() < 1e-9);
    }

    #[test]
    fn test_letterbox_forces_strategy() {
        let source = PixelBuffer::filled(
            Size::new(32, 16).unwrap(),
            ColorFormat::Rgba,
            &[0, 0, 255, 255],
        )
        .unwrap();
        let options = ResizeOptions::new(16, 16, ResizeStrategy::Stretch);
        let (canvas, record) = letterbox(&source, &options).unwrap();
        assert_eq!(canvas.size(), Size::new(16, 16).unwrap());
        assert_eq!(record.offset, (0.0, 4.0));
        assert_eq!(canvas.pixel(0, 0), &[114, 114, 114, 255]);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let plan = plan(20, 10, &ResizeOptions::letterbox(10)).unwrap();
        let json = serde_json::to_value(LetterboxRecord::from_plan(&plan).unwrap()).unwrap();
        assert!(json.get("originalSize").is_some());
        assert!(json.get("letterboxedSize").is_some());
    }

    #[test]
    fn test_deserialize_rejects_uninvertible_records() {
        let valid = r#"{"scale":0.5,"offset":[0.0,25.0],"originalSize":{"width":200,"height":100},"letterboxedSize":{"width":100,"height":100}}"#;
        let record: LetterboxRecord = serde_json::from_str(valid).unwrap();
        assert_eq!(record.offset, (0.0, 25.0));

        for bad in [
            valid.replace("\"scale\":0.5", "\"scale\":0.0"),
            valid.replace("\"scale\":0.5", "\"scale\":-2.0"),
            valid.replace("\"width\":200", "\"width\":0"),
        ] {
            assert!(serde_json::from_str::<LetterboxRecord>(&bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_new_validates() {
        let size = Size::new(10, 10).unwrap();
        assert!(LetterboxRecord::new(1.0, (0.0, 0.0), size, size).is_ok());
        for (scale, offset) in [(f64::NAN, (0.0, 0.0)), (f64::INFINITY, (0.0, 0.0)), (1.0, (f64::NAN, 0.0))] {
            assert!(matches!(
                LetterboxRecord::new(scale, offset, size, size),
                Err(VisionError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_stride_alignment_reverse_drift_is_bounded() {
        // 1080p into 640 at stride 32: 640x360 is stretched to 640x384
        let plan = plan(1920, 1080, &ResizeOptions::letterbox(640).with_stride(32)).unwrap();
        assert_eq!(plan.resized, Size::new(640, 384).unwrap());
        let record = LetterboxRecord::from_plan(&plan).unwrap();
        assert!((record.scale - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(record.offset, (0.0, 128.0));

        // The source's bottom edge is drawn at offset + aligned height, but the
        // record maps it back with the unaligned uniform scale
        let drawn_bottom = record.offset.1 + f64::from(plan.resized.height);
        let (_, mapped) = record.to_source(0.0, drawn_bottom);
        let drift = mapped - 1080.0;
        let bound = f64::from(384 - 360) / record.scale;
        assert!(drift > 0.0);
        assert!(drift <= bound + 1e-6, "drift {drift} exceeds {bound}");
        assert!((drift - 72.0).abs() < 1e-6);

        // The axis that needed no alignment maps back exactly
        let (right, _) = record.to_source(640.0, 0.0);
        assert!((right - 1920.0).abs() < 1e-6);
    }
}
