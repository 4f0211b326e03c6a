//! Resize planning: how a source rectangle maps onto a target canvas
//!
//! A [`ResizePlan`] is pure arithmetic; nothing here touches pixels. The
//! resampler consumes the plan, and the letterbox record is derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use vision_utils_common::{Rect, Result, Size, VisionError};

/// Default letterbox padding color (gray).
pub const LETTERBOX_FILL: [u8; 3] = [114, 114, 114];

/// Default padding color for every other strategy.
pub const BLACK_FILL: [u8; 3] = [0, 0, 0];

/// How the source is fitted onto the target canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResizeStrategy {
    /// Fill the canvas, cropping overflow
    Cover,
    /// Fit inside the canvas, padding the remainder with black
    Contain,
    /// Fill the canvas exactly, ignoring aspect ratio
    #[default]
    Stretch,
    /// Fit inside the canvas, padding with gray; reversible via `LetterboxRecord`
    Letterbox,
}

impl ResizeStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResizeStrategy::Cover => "cover",
            ResizeStrategy::Contain => "contain",
            ResizeStrategy::Stretch => "stretch",
            ResizeStrategy::Letterbox => "letterbox",
        }
    }

    /// Padding color used when the caller does not supply one
    #[must_use]
    pub fn default_fill(self) -> [u8; 3] {
        match self {
            ResizeStrategy::Letterbox => LETTERBOX_FILL,
            _ => BLACK_FILL,
        }
    }
}

impl fmt::Display for ResizeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResizeStrategy {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cover" => Ok(ResizeStrategy::Cover),
            "contain" => Ok(ResizeStrategy::Contain),
            "stretch" => Ok(ResizeStrategy::Stretch),
            "letterbox" => Ok(ResizeStrategy::Letterbox),
            other => Err(VisionError::unsupported(format!("resize strategy '{other}'"))),
        }
    }
}

/// Resampling kernel used when pixels are actually resized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl ResizeFilter {
    #[must_use]
    pub fn filter_type(self) -> image::imageops::FilterType {
        match self {
            ResizeFilter::Nearest => image::imageops::FilterType::Nearest,
            ResizeFilter::Bilinear => image::imageops::FilterType::Triangle,
            ResizeFilter::Bicubic => image::imageops::FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Resize request: target canvas plus fitting policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeOptions {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub strategy: ResizeStrategy,
    /// Allow scaling above 1.0 (`contain` / `letterbox` only)
    #[serde(default = "default_true")]
    pub scale_up: bool,
    /// Align the inner (scaled) dimensions to a multiple of this value
    #[serde(default)]
    pub stride: Option<u32>,
    /// Split padding evenly; otherwise all padding is trailing
    #[serde(default = "default_true")]
    pub center: bool,
    #[serde(default)]
    pub fill: Option<[u8; 3]>,
    #[serde(default)]
    pub filter: ResizeFilter,
}

impl ResizeOptions {
    #[must_use]
    pub fn new(width: u32, height: u32, strategy: ResizeStrategy) -> Self {
        Self {
            width,
            height,
            strategy,
            scale_up: true,
            stride: None,
            center: true,
            fill: None,
            filter: ResizeFilter::default(),
        }
    }

    /// YOLO-style letterbox into a square canvas
    #[must_use]
    pub fn letterbox(size: u32) -> Self {
        Self::new(size, size, ResizeStrategy::Letterbox)
    }

    #[must_use]
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = Some(stride);
        self
    }

    #[must_use]
    pub fn with_scale_up(mut self, scale_up: bool) -> Self {
        self.scale_up = scale_up;
        self
    }

    #[must_use]
    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    #[must_use]
    pub fn with_fill(mut self, fill: [u8; 3]) -> Self {
        self.fill = Some(fill);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn target(&self) -> Result<Size> {
        Size::new(self.width, self.height)
    }
}

/// Scale factors applied to the source (equal unless `stretch`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    #[must_use]
    pub fn uniform(value: f64) -> Self {
        Self { x: value, y: value }
    }

    #[must_use]
    pub fn is_uniform(&self) -> bool {
        self.x == self.y
    }
}

/// Canvas padding around the drawn image, in target pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Padding {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.left == 0 && self.top == 0 && self.right == 0 && self.bottom == 0
    }
}

/// Full description of a resize: scale, placement, padding and fill.
///
/// Invariant: `draw` lies inside the target canvas. With stride alignment the
/// inner size (`resized`) is a multiple of the stride whenever one fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizePlan {
    pub strategy: ResizeStrategy,
    pub source: Size,
    pub target: Size,
    pub scale: Scale,
    /// Size the source is resampled to before placement
    pub resized: Size,
    /// Top-left of the resampled image on the canvas; negative under `cover`
    pub offset: (i64, i64),
    /// Visible part of the resampled image on the canvas
    pub draw: Rect,
    pub padding: Padding,
    pub fill: [u8; 3],
    pub filter: ResizeFilter,
}

impl ResizePlan {
    /// True when the plan is an identity copy of the source
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.source == self.target && self.resized == self.source && self.offset == (0, 0)
    }
}

fn scaled_dim(dim: u32, scale: f64) -> u32 {
    ((f64::from(dim) * scale).round() as u32).max(1)
}

/// Round `value` up to a stride multiple, falling back to the largest
/// multiple that still fits in `limit`, or to `limit` itself.
fn align_to_stride(value: u32, stride: u32, limit: u32) -> u32 {
    let aligned = value.div_ceil(stride) * stride;
    if aligned <= limit {
        return aligned;
    }
    let fitting = (limit / stride) * stride;
    if fitting > 0 {
        fitting
    } else {
        value.min(limit)
    }
}

fn split(total: u32, center: bool) -> (u32, u32) {
    if center {
        let front = total / 2;
        (front, total - front)
    } else {
        (0, total)
    }
}

/// Plan how a `source_width x source_height` image lands on the canvas
/// described by `options`.
///
/// Zero dimensions (source or target) and a zero stride are rejected before
/// any arithmetic.
pub fn plan(source_width: u32, source_height: u32, options: &ResizeOptions) -> Result<ResizePlan> {
    let source = Size::new(source_width, source_height)?;
    let target = options.target()?;
    if options.stride == Some(0) {
        return Err(VisionError::invalid("stride must be positive"));
    }

    let scale_x = f64::from(target.width) / f64::from(source.width);
    let scale_y = f64::from(target.height) / f64::from(source.height);
    let fill = options.fill.unwrap_or_else(|| options.strategy.default_fill());

    let plan = match options.strategy {
        ResizeStrategy::Stretch => ResizePlan {
            strategy: options.strategy,
            source,
            target,
            scale: Scale {
                x: scale_x,
                y: scale_y,
            },
            resized: target,
            offset: (0, 0),
            draw: Rect::new(0, 0, target.width, target.height),
            padding: Padding::default(),
            fill,
            filter: options.filter,
        },
        ResizeStrategy::Cover => {
            let scale = scale_x.max(scale_y);
            let resized = Size {
                width: scaled_dim(source.width, scale).max(target.width),
                height: scaled_dim(source.height, scale).max(target.height),
            };
            let (crop_left, _) = split(resized.width - target.width, options.center);
            let (crop_top, _) = split(resized.height - target.height, options.center);
            ResizePlan {
                strategy: options.strategy,
                source,
                target,
                scale: Scale::uniform(scale),
                resized,
                offset: (-i64::from(crop_left), -i64::from(crop_top)),
                draw: Rect::new(0, 0, target.width, target.height),
                padding: Padding::default(),
                fill,
                filter: options.filter,
            }
        }
        ResizeStrategy::Contain | ResizeStrategy::Letterbox => {
            let mut scale = scale_x.min(scale_y);
            if !options.scale_up {
                scale = scale.min(1.0);
            }
            let mut inner_w = scaled_dim(source.width, scale).min(target.width);
            let mut inner_h = scaled_dim(source.height, scale).min(target.height);
            if let Some(stride) = options.stride {
                inner_w = align_to_stride(inner_w, stride, target.width);
                inner_h = align_to_stride(inner_h, stride, target.height);
            }
            let (left, right) = split(target.width - inner_w, options.center);
            let (top, bottom) = split(target.height - inner_h, options.center);
            ResizePlan {
                strategy: options.strategy,
                source,
                target,
                scale: Scale::uniform(scale),
                resized: Size {
                    width: inner_w,
                    height: inner_h,
                },
                offset: (i64::from(left), i64::from(top)),
                draw: Rect::new(left, top, inner_w, inner_h),
                padding: Padding {
                    left,
                    top,
                    right,
                    bottom,
                },
                fill,
                filter: options.filter,
            }
        }
    };

    debug!(
        strategy = %plan.strategy,
        source = %plan.source,
        target = %plan.target,
        resized = %plan.resized,
        "Resize plan: scale=({:.4}, {:.4}) padding=l{} t{} r{} b{}",
        plan.scale.x,
        plan.scale.y,
        plan.padding.left,
        plan.padding.top,
        plan.padding.right,
        plan.padding.bottom
    );

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_1080p_into_square() {
        let options = ResizeOptions::letterbox(640);
        let plan = plan(1920, 1080, &options).unwrap();

        assert!((plan.scale.x - 1.0 / 3.0).abs() < 1e-4);
        assert!(plan.scale.is_uniform());
        assert_eq!(plan.resized, Size::new(640, 360).unwrap());
        assert_eq!(
            plan.padding,
            Padding {
                left: 0,
                top: 140,
                right: 0,
                bottom: 140
            }
        );
        assert_eq!(plan.draw, Rect::new(0, 140, 640, 360));
        assert_eq!(plan.fill, LETTERBOX_FILL);
    }

    #[test]
    fn test_contain_defaults_to_black_and_trailing_padding() {
        let options =
            ResizeOptions::new(100, 100, ResizeStrategy::Contain).with_center(false);
        let plan = plan(200, 100, &options).unwrap();

        assert_eq!(plan.fill, BLACK_FILL);
        assert_eq!(plan.resized, Size::new(100, 50).unwrap());
        assert_eq!(plan.padding.top, 0);
        assert_eq!(plan.padding.bottom, 50);
        assert_eq!(plan.draw, Rect::new(0, 0, 100, 50));
    }

    #[test]
    fn test_odd_padding_puts_remainder_at_back() {
        let options = ResizeOptions::new(100, 101, ResizeStrategy::Letterbox);
        let plan = plan(100, 50, &options).unwrap();
        assert_eq!(plan.padding.top, 25);
        assert_eq!(plan.padding.bottom, 26);
    }

    #[test]
    fn test_scale_up_disabled_caps_scale() {
        let options = ResizeOptions::letterbox(640).with_scale_up(false);
        let plan = plan(320, 240, &options).unwrap();

        assert_eq!(plan.scale.x, 1.0);
        assert_eq!(plan.resized, Size::new(320, 240).unwrap());
        assert_eq!(plan.padding.left, 160);
        assert_eq!(plan.padding.top, 200);
    }

    #[test]
    fn test_stride_rounds_inner_size_up() {
        let options = ResizeOptions::letterbox(640).with_stride(32);
        let plan = plan(1920, 1080, &options).unwrap();

        // 360 rounds up to 384
        assert_eq!(plan.resized, Size::new(640, 384).unwrap());
        assert_eq!(plan.resized.height % 32, 0);
        assert_eq!(plan.padding.top, 128);
        assert_eq!(plan.padding.bottom, 128);
    }

    #[test]
    fn test_stride_never_exceeds_canvas() {
        let options = ResizeOptions::new(100, 100, ResizeStrategy::Contain).with_stride(32);
        let plan = plan(100, 100, &options).unwrap();
        assert_eq!(plan.resized, Size::new(96, 96).unwrap());
        assert!(plan.draw.right() <= 100 && plan.draw.bottom() <= 100);
    }

    #[test]
    fn test_stretch_uses_independent_scales() {
        let options = ResizeOptions::new(320, 320, ResizeStrategy::Stretch);
        let plan = plan(640, 480, &options).unwrap();

        assert_eq!(plan.scale.x, 0.5);
        assert!((plan.scale.y - 320.0 / 480.0).abs() < 1e-12);
        assert!(!plan.scale.is_uniform());
        assert_eq!(plan.draw, Rect::new(0, 0, 320, 320));
        assert!(plan.padding.is_zero());
    }

    #[test]
    fn test_cover_crops_overflow_evenly() {
        let options = ResizeOptions::new(100, 100, ResizeStrategy::Cover);
        let plan = plan(200, 100, &options).unwrap();

        assert_eq!(plan.scale.x, 1.0);
        assert_eq!(plan.resized, Size::new(200, 100).unwrap());
        assert_eq!(plan.offset, (-50, 0));
        assert_eq!(plan.draw, Rect::new(0, 0, 100, 100));
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let options = ResizeOptions::letterbox(640);
        assert!(matches!(plan(0, 10, &options), Err(VisionError::InvalidInput(_))));

        let zero_target = ResizeOptions::new(0, 640, ResizeStrategy::Contain);
        assert!(matches!(plan(10, 10, &zero_target), Err(VisionError::InvalidInput(_))));

        let zero_stride = ResizeOptions::letterbox(640).with_stride(0);
        assert!(matches!(plan(10, 10, &zero_stride), Err(VisionError::InvalidInput(_))));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("Letterbox".parse::<ResizeStrategy>().unwrap(), ResizeStrategy::Letterbox);
        assert!(matches!(
            "fill".parse::<ResizeStrategy>(),
            Err(VisionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let options: ResizeOptions =
            serde_json::from_str(r#"{"width": 320, "height": 240, "strategy": "contain"}"#)
                .unwrap();
        assert!(options.scale_up);
        assert!(options.center);
        assert_eq!(options.stride, None);
        assert_eq!(options.filter, ResizeFilter::Bilinear);
    }
}
