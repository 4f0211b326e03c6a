//! Greedy non-maximum suppression

use crate::boxes::{convert_format, iou, BoundingBox, BoxFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vision_utils_common::{Result, VisionError};

/// One NMS input: box, confidence and optional class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NmsCandidate {
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    #[serde(default)]
    pub format: BoxFormat,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_index: Option<u32>,
}

impl NmsCandidate {
    #[must_use]
    pub fn new(bbox: [f32; 4], score: f32) -> Self {
        Self {
            bbox,
            format: BoxFormat::Xyxy,
            score,
            class_index: None,
        }
    }

    #[must_use]
    pub fn with_class(mut self, class_index: u32) -> Self {
        self.class_index = Some(class_index);
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: BoxFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn to_box(&self) -> BoundingBox {
        BoundingBox {
            coords: self.bbox,
            format: self.format,
            score: Some(self.score),
            class_id: self.class_index,
        }
    }
}

impl From<BoundingBox> for NmsCandidate {
    fn from(b: BoundingBox) -> Self {
        Self {
            bbox: b.coords,
            format: b.format,
            score: b.score.unwrap_or(0.0),
            class_index: b.class_id,
        }
    }
}

/// NMS thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NmsConfig {
    /// Suppress when IoU with a kept box is strictly greater than this
    pub iou_threshold: f32,
    /// Candidates scoring below this are dropped up front
    pub score_threshold: f32,
    pub max_detections: usize,
    /// Only suppress between candidates of the same class
    pub per_class: bool,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.45,
            score_threshold: 0.25,
            max_detections: 300,
            per_class: false,
        }
    }
}

impl NmsConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("iou_threshold", self.iou_threshold),
            ("score_threshold", self.score_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(VisionError::invalid(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        if self.max_detections == 0 {
            return Err(VisionError::invalid("max_detections must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NmsResult {
    /// Indices into the input, in descending score order
    pub indices: Vec<usize>,
    pub detections: Vec<NmsCandidate>,
    pub total_before: usize,
    pub total_after: usize,
}

/// Greedy NMS.
///
/// Candidates below `score_threshold` are dropped, the rest are stably sorted
/// by descending score (ties keep input order). The best remaining candidate is
/// kept and every later one whose IoU with it exceeds `iou_threshold` is
/// suppressed, until `max_detections` are kept or candidates run out.
pub fn nms(candidates: &[NmsCandidate], config: &NmsConfig) -> Result<NmsResult> {
    config.validate()?;

    let xyxy: Vec<[f32; 4]> = candidates
        .iter()
        .map(|c| convert_format(c.bbox, c.format, BoxFormat::Xyxy))
        .collect();

    let mut order: Vec<usize> = (0..candidates.len())
        .filter(|&i| candidates[i].score >= config.score_threshold)
        .collect();
    // Stable: equal scores keep their input order
    order.sort_by(|&a, &b| {
        candidates[b]
            .score
            .partial_cmp(&candidates[a].score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut suppressed = vec![false; order.len()];
    let mut indices = Vec::with_capacity(order.len().min(config.max_detections));

    for (rank, &i) in order.iter().enumerate() {
        if suppressed[rank] {
            continue;
        }
        indices.push(i);
        if indices.len() == config.max_detections {
            break;
        }
        for (later, &j) in order.iter().enumerate().skip(rank + 1) {
            if suppressed[later] {
                continue;
            }
            if config.per_class && candidates[i].class_index != candidates[j].class_index {
                continue;
            }
            if iou(xyxy[i], xyxy[j]) > config.iou_threshold {
                suppressed[later] = true;
            }
        }
    }

    debug!(
        "NMS kept {} of {} candidates ({} above score threshold)",
        indices.len(),
        candidates.len(),
        order.len()
    );

    let detections = indices.iter().map(|&i| candidates[i]).collect();
    Ok(NmsResult {
        total_before: candidates.len(),
        total_after: indices.len(),
        indices,
        detections,
    })
}
