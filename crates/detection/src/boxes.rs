//! Bounding box geometry: format conversion, scaling, clipping and IoU
//!
//! `xyxy` is the canonical form; every conversion and geometric operation
//! routes through it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vision_utils_common::{Result, Size, VisionError};

/// Coordinate convention of the four numbers in a box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoxFormat {
    /// `[x1, y1, x2, y2]`
    #[default]
    Xyxy,
    /// `[x, y, width, height]` with `(x, y)` the top-left corner
    Xywh,
    /// `[center_x, center_y, width, height]`
    Cxcywh,
}

impl BoxFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BoxFormat::Xyxy => "xyxy",
            BoxFormat::Xywh => "xywh",
            BoxFormat::Cxcywh => "cxcywh",
        }
    }
}

impl fmt::Display for BoxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoxFormat {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xyxy" => Ok(BoxFormat::Xyxy),
            "xywh" => Ok(BoxFormat::Xywh),
            "cxcywh" => Ok(BoxFormat::Cxcywh),
            other => Err(VisionError::unsupported(format!("box format '{other}'"))),
        }
    }
}

#[inline]
fn to_xyxy(coords: [f32; 4], from: BoxFormat) -> [f32; 4] {
    let [a, b, c, d] = coords;
    match from {
        BoxFormat::Xyxy => coords,
        BoxFormat::Xywh => [a, b, a + c, b + d],
        BoxFormat::Cxcywh => [a - c / 2.0, b - d / 2.0, a + c / 2.0, b + d / 2.0],
    }
}

#[inline]
fn from_xyxy(xyxy: [f32; 4], to: BoxFormat) -> [f32; 4] {
    let [x1, y1, x2, y2] = xyxy;
    match to {
        BoxFormat::Xyxy => xyxy,
        BoxFormat::Xywh => [x1, y1, x2 - x1, y2 - y1],
        BoxFormat::Cxcywh => [(x1 + x2) / 2.0, (y1 + y2) / 2.0, x2 - x1, y2 - y1],
    }
}

/// Convert raw coordinates between formats
#[must_use]
pub fn convert_format(coords: [f32; 4], from: BoxFormat, to: BoxFormat) -> [f32; 4] {
    if from == to {
        return coords;
    }
    from_xyxy(to_xyxy(coords, from), to)
}

/// Detection box: four coordinates tagged with their format
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub coords: [f32; 4],
    #[serde(default)]
    pub format: BoxFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,
}

impl BoundingBox {
    #[must_use]
    pub fn new(coords: [f32; 4], format: BoxFormat) -> Self {
        Self {
            coords,
            format,
            score: None,
            class_id: None,
        }
    }

    #[must_use]
    pub fn xyxy(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new([x1, y1, x2, y2], BoxFormat::Xyxy)
    }

    #[must_use]
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn with_class(mut self, class_id: u32) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Same box expressed in `format`; score and class are carried over
    #[must_use]
    pub fn to_format(&self, format: BoxFormat) -> Self {
        Self {
            coords: convert_format(self.coords, self.format, format),
            format,
            ..*self
        }
    }

    #[must_use]
    pub fn to_xyxy(&self) -> [f32; 4] {
        to_xyxy(self.coords, self.format)
    }

    #[must_use]
    #[inline]
    pub fn area(&self) -> f32 {
        let [x1, y1, x2, y2] = self.to_xyxy();
        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }

    #[must_use]
    #[inline]
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        iou(self.to_xyxy(), other.to_xyxy())
    }

    /// Apply `f` in `xyxy` space and convert back to this box's format
    #[must_use]
    fn map_xyxy(&self, f: impl FnOnce([f32; 4]) -> [f32; 4]) -> Self {
        Self {
            coords: from_xyxy(f(self.to_xyxy()), self.format),
            ..*self
        }
    }
}

/// Intersection over Union of two `xyxy` boxes; 0 when the union is empty
#[must_use]
#[inline]
pub fn iou(a: [f32; 4], b: [f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Split a flat `[a, b, c, d, a, b, c, d, ...]` sequence into boxes
pub fn boxes_from_flat(flat: &[f32], format: BoxFormat) -> Result<Vec<BoundingBox>> {
    if flat.len() % 4 != 0 {
        return Err(VisionError::invalid(format!(
            "flat box data must be a multiple of 4 values, got {}",
            flat.len()
        )));
    }
    Ok(flat
        .chunks_exact(4)
        .map(|c| BoundingBox::new([c[0], c[1], c[2], c[3]], format))
        .collect())
}

/// Convert every box to `format`
#[must_use]
pub fn convert_boxes(boxes: &[BoundingBox], format: BoxFormat) -> Vec<BoundingBox> {
    boxes.iter().map(|b| b.to_format(format)).collect()
}

/// Clamp coordinates into `[0, width] x [0, height]`, keeping each box's format.
///
/// Both extents must be finite and positive.
pub fn clip_boxes(boxes: &[BoundingBox], width: f32, height: f32) -> Result<Vec<BoundingBox>> {
    for (name, extent) in [("width", width), ("height", height)] {
        if !extent.is_finite() || extent <= 0.0 {
            return Err(VisionError::invalid(format!(
                "clip {name} must be finite and positive, got {extent}"
            )));
        }
    }
    Ok(clip_to(boxes, width, height))
}

/// Clamp into an extent the caller has already validated
pub(crate) fn clip_to(boxes: &[BoundingBox], width: f32, height: f32) -> Vec<BoundingBox> {
    boxes
        .iter()
        .map(|b| {
            b.map_xyxy(|[x1, y1, x2, y2]| {
                [
                    x1.clamp(0.0, width),
                    y1.clamp(0.0, height),
                    x2.clamp(0.0, width),
                    y2.clamp(0.0, height),
                ]
            })
        })
        .collect()
}

/// Map boxes from a `from` sized space into a `to` sized space.
///
/// Scale factors are `to / from` per axis; with `clip` the result is clamped
/// to the target space.
#[must_use]
pub fn scale_boxes(boxes: &[BoundingBox], from: Size, to: Size, clip: bool) -> Vec<BoundingBox> {
    let sx = to.width as f32 / from.width as f32;
    let sy = to.height as f32 / from.height as f32;
    let scaled: Vec<BoundingBox> = boxes
        .iter()
        .map(|b| b.map_xyxy(|[x1, y1, x2, y2]| [x1 * sx, y1 * sy, x2 * sx, y2 * sy]))
        .collect();
    if clip {
        clip_to(&scaled, to.width as f32, to.height as f32)
    } else {
        scaled
    }
}
