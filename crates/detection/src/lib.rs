//! Detection post-processing
//!
//! Box format conversion, scaling, clipping and IoU, greedy NMS, and the
//! reverse letterbox projection from model space back to source pixels.

pub mod boxes;
pub mod letterbox;
pub mod nms;

pub use boxes::{
    boxes_from_flat, clip_boxes, convert_boxes, convert_format, iou, scale_boxes, BoundingBox,
    BoxFormat,
};
pub use letterbox::{project_to_letterbox, reverse_letterbox};
pub use nms::{nms, NmsCandidate, NmsConfig, NmsResult};
