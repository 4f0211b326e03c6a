//! Pixel resampling: executes a [`ResizePlan`] on an RGBA buffer

use crate::geometry::ResizePlan;
use image::{imageops, Rgba, RgbaImage};
use tracing::debug;
use vision_utils_common::{PixelBuffer, Result, VisionError};

/// Resample `source` (RGBA) onto the plan's target canvas.
///
/// The source is resized to `plan.resized` with the plan's filter, then copied
/// onto a canvas filled with `plan.fill` at `plan.offset`. Anything falling
/// outside the canvas (the `cover` overflow) is clipped.
pub fn apply_plan(source: &PixelBuffer, plan: &ResizePlan) -> Result<PixelBuffer> {
    if source.size() != plan.source {
        return Err(VisionError::mismatch(format!(
            "plan was computed for {} but source is {}",
            plan.source,
            source.size()
        )));
    }

    if plan.is_identity() {
        return Ok(source.clone());
    }

    let image = source.to_rgba_image()?;
    let resized = if plan.resized == plan.source {
        image
    } else {
        imageops::resize(
            &image,
            plan.resized.width,
            plan.resized.height,
            plan.filter.filter_type(),
        )
    };

    if plan.resized == plan.target && plan.offset == (0, 0) {
        return PixelBuffer::from_rgba_image(resized);
    }

    let [r, g, b] = plan.fill;
    let mut canvas = RgbaImage::from_pixel(plan.target.width, plan.target.height, Rgba([r, g, b, 255]));
    imageops::replace(&mut canvas, &resized, plan.offset.0, plan.offset.1);

    debug!(
        "Resampled {} -> {} onto {} canvas at ({}, {})",
        plan.source, plan.resized, plan.target, plan.offset.0, plan.offset.1
    );

    PixelBuffer::from_rgba_image(canvas)
}
