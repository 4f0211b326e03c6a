//! Projecting boxes between letterboxed and source coordinates
//!
//! Both directions use only the [`LetterboxRecord`] captured at preprocessing
//! time; nothing is recomputed from image sizes.

use crate::boxes::{clip_to, BoundingBox, BoxFormat};
use vision_utils_common::Result;
use vision_utils_preprocess::LetterboxRecord;

/// Map boxes detected on a letterboxed canvas back into source pixels.
///
/// Each box goes to `xyxy`, then `(coord - offset) / scale`, is optionally
/// clipped to the original size, and is returned in `output_format`. A record
/// that cannot be inverted is rejected with `InvalidInput`.
pub fn reverse_letterbox(
    boxes: &[BoundingBox],
    record: &LetterboxRecord,
    output_format: BoxFormat,
    clip: bool,
) -> Result<Vec<BoundingBox>> {
    record.validate()?;
    let (ox, oy) = (record.offset.0 as f32, record.offset.1 as f32);
    let scale = record.scale as f32;

    let mapped: Vec<BoundingBox> = boxes
        .iter()
        .map(|b| {
            let [x1, y1, x2, y2] = b.to_xyxy();
            BoundingBox {
                coords: [
                    (x1 - ox) / scale,
                    (y1 - oy) / scale,
                    (x2 - ox) / scale,
                    (y2 - oy) / scale,
                ],
                format: BoxFormat::Xyxy,
                ..*b
            }
        })
        .collect();

    let mapped = if clip {
        clip_to(
            &mapped,
            record.original_size.width as f32,
            record.original_size.height as f32,
        )
    } else {
        mapped
    };
    Ok(mapped.iter().map(|b| b.to_format(output_format)).collect())
}

/// Map source-space boxes onto the letterboxed canvas (e.g. ground truth)
pub fn project_to_letterbox(
    boxes: &[BoundingBox],
    record: &LetterboxRecord,
    output_format: BoxFormat,
) -> Result<Vec<BoundingBox>> {
    record.validate()?;
    let (ox, oy) = (record.offset.0 as f32, record.offset.1 as f32);
    let scale = record.scale as f32;
    Ok(boxes
        .iter()
        .map(|b| {
            let [x1, y1, x2, y2] = b.to_xyxy();
            BoundingBox {
                coords: [x1 * scale + ox, y1 * scale + oy, x2 * scale + ox, y2 * scale + oy],
                format: BoxFormat::Xyxy,
                ..*b
            }
            .to_format(output_format)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_utils_common::{Size, VisionError};
    use vision_utils_preprocess::{plan, ResizeOptions};

    fn record_1080p() -> LetterboxRecord {
        let plan = plan(1920, 1080, &ResizeOptions::letterbox(640)).unwrap();
        LetterboxRecord::from_plan(&plan).unwrap()
    }

    fn assert_close(a: [f32; 4], b: [f32; 4]) {
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-2, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_reverse_matches_direct_arithmetic() {
        let record = record_1080p();
        let boxes = [BoundingBox::xyxy(100.0, 200.0, 300.0, 400.0).with_score(0.8)];
        let out = reverse_letterbox(&boxes, &record, BoxFormat::Xyxy, false).unwrap();

        let s = (1.0 / 3.0) as f32;
        assert_close(
            out[0].coords,
            [100.0 / s, (200.0 - 140.0) / s, 300.0 / s, (400.0 - 140.0) / s],
        );
        assert_eq!(out[0].score, Some(0.8));
    }

    #[test]
    fn test_reverse_clips_to_original() {
        let record = record_1080p();
        // Box extends into the bottom padding band
        let boxes = [BoundingBox::xyxy(600.0, 400.0, 650.0, 520.0)];
        let out = reverse_letterbox(&boxes, &record, BoxFormat::Xyxy, true).unwrap();
        assert!(out[0].coords[2] <= 1920.0);
        assert_eq!(out[0].coords[3], 1080.0);
    }

    #[test]
    fn test_reverse_converts_format() {
        let record = record_1080p();
        let boxes = [BoundingBox::new([320.0, 320.0, 64.0, 36.0], BoxFormat::Cxcywh)];
        let out = reverse_letterbox(&boxes, &record, BoxFormat::Xywh, false).unwrap();
        assert_eq!(out[0].format, BoxFormat::Xywh);
        // Canvas center maps to source center
        assert_close(out[0].coords, [864.0, 486.0, 192.0, 108.0]);
    }

    #[test]
    fn test_projection_inverts_reverse() {
        let record = record_1080p();
        let source = [BoundingBox::xyxy(10.0, 20.0, 1900.0, 1000.0)];
        let projected = project_to_letterbox(&source, &record, BoxFormat::Xyxy).unwrap();
        let back = reverse_letterbox(&projected, &record, BoxFormat::Xyxy, false).unwrap();
        assert_close(back[0].coords, source[0].coords);
        assert_eq!(record.original_size, Size::new(1920, 1080).unwrap());
    }

    #[test]
    fn test_uninvertible_record_is_rejected() {
        let mut record = record_1080p();
        record.scale = 0.0;
        let boxes = [BoundingBox::xyxy(10.0, 10.0, 20.0, 20.0)];
        assert!(matches!(
            reverse_letterbox(&boxes, &record, BoxFormat::Xyxy, true),
            Err(VisionError::InvalidInput(_))
        ));
        record.scale = 0.5;
        record.offset.1 = f64::NAN;
        assert!(matches!(
            project_to_letterbox(&boxes, &record, BoxFormat::Xyxy),
            Err(VisionError::InvalidInput(_))
        ));
    }
}
