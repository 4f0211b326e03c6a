/// Common types and utilities for image-to-tensor processing
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod pixel;

pub use pixel::{PixelBuffer, PixelSource};

/// Processing errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VisionError {
    /// Malformed or mismatched-length arrays, non-positive dimensions
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Crop, patch or ROI exceeding the source extent
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// Batch or tensor shape disagreement
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Unknown color, layout, box format or dtype tag
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Image processing error: {0}")]
    Image(String),
}

impl VisionError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        VisionError::InvalidInput(msg.into())
    }

    pub fn out_of_bounds(msg: impl Into<String>) -> Self {
        VisionError::OutOfBounds(msg.into())
    }

    pub fn mismatch(msg: impl Into<String>) -> Self {
        VisionError::DimensionMismatch(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        VisionError::UnsupportedFormat(msg.into())
    }
}

impl From<image::ImageError> for VisionError {
    fn from(err: image::ImageError) -> Self {
        VisionError::Image(err.to_string())
    }
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, VisionError>;

/// Output channel layout / color model of a pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFormat {
    Rgb,
    Rgba,
    Bgr,
    Bgra,
    Grayscale,
    Hsv,
    Hsl,
    Lab,
    Yuv,
    Ycbcr,
}

impl ColorFormat {
    pub const ALL: [ColorFormat; 10] = [
        ColorFormat::Rgb,
        ColorFormat::Rgba,
        ColorFormat::Bgr,
        ColorFormat::Bgra,
        ColorFormat::Grayscale,
        ColorFormat::Hsv,
        ColorFormat::Hsl,
        ColorFormat::Lab,
        ColorFormat::Yuv,
        ColorFormat::Ycbcr,
    ];

    /// Number of interleaved channels per pixel
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            ColorFormat::Grayscale => 1,
            ColorFormat::Rgba | ColorFormat::Bgra => 4,
            _ => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ColorFormat::Rgb => "rgb",
            ColorFormat::Rgba => "rgba",
            ColorFormat::Bgr => "bgr",
            ColorFormat::Bgra => "bgra",
            ColorFormat::Grayscale => "grayscale",
            ColorFormat::Hsv => "hsv",
            ColorFormat::Hsl => "hsl",
            ColorFormat::Lab => "lab",
            ColorFormat::Yuv => "yuv",
            ColorFormat::Ycbcr => "ycbcr",
        }
    }
}

impl fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorFormat {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self> {
        ColorFormat::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .or_else(|| s.eq_ignore_ascii_case("gray").then_some(ColorFormat::Grayscale))
            .ok_or_else(|| VisionError::unsupported(format!("color format '{s}'")))
    }
}

/// Memory ordering of a flat tensor buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataLayout {
    /// Interleaved: `h*W*C + w*C + c`
    #[default]
    Hwc,
    /// Planar: `c*H*W + h*W + w`
    Chw,
    Nhwc,
    Nchw,
}

impl DataLayout {
    /// Channel-planar ordering (`CHW`, `NCHW`)
    #[must_use]
    pub fn is_planar(self) -> bool {
        matches!(self, DataLayout::Chw | DataLayout::Nchw)
    }

    #[must_use]
    pub fn is_batched(self) -> bool {
        matches!(self, DataLayout::Nhwc | DataLayout::Nchw)
    }

    /// Layout with the leading batch axis stripped
    #[must_use]
    pub fn unbatched(self) -> DataLayout {
        if self.is_planar() {
            DataLayout::Chw
        } else {
            DataLayout::Hwc
        }
    }

    /// Layout with a leading batch axis
    #[must_use]
    pub fn batched(self) -> DataLayout {
        if self.is_planar() {
            DataLayout::Nchw
        } else {
            DataLayout::Nhwc
        }
    }

    /// Tensor shape for a single image in this layout
    #[must_use]
    pub fn shape(self, width: usize, height: usize, channels: usize) -> Vec<usize> {
        match self {
            DataLayout::Hwc => vec![height, width, channels],
            DataLayout::Chw => vec![channels, height, width],
            DataLayout::Nhwc => vec![1, height, width, channels],
            DataLayout::Nchw => vec![1, channels, height, width],
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DataLayout::Hwc => "hwc",
            DataLayout::Chw => "chw",
            DataLayout::Nhwc => "nhwc",
            DataLayout::Nchw => "nchw",
        }
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataLayout {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hwc" => Ok(DataLayout::Hwc),
            "chw" => Ok(DataLayout::Chw),
            "nhwc" => Ok(DataLayout::Nhwc),
            "nchw" => Ok(DataLayout::Nchw),
            other => Err(VisionError::unsupported(format!("data layout '{other}'"))),
        }
    }
}

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Create a size, rejecting zero dimensions
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(VisionError::invalid(format!(
                "dimensions must be positive, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    #[must_use]
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned pixel rectangle (ROI, crop, patch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.width)
    }

    #[must_use]
    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.height)
    }

    /// Validate that the rect is non-empty and lies inside `bounds`
    pub fn check_within(&self, bounds: Size) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VisionError::invalid(format!(
                "region must have positive size, got {}x{}",
                self.width, self.height
            )));
        }
        if self.right() > u64::from(bounds.width) || self.bottom() > u64::from(bounds.height) {
            return Err(VisionError::out_of_bounds(format!(
                "region ({}, {}, {}x{}) exceeds {bounds}",
                self.x, self.y, self.width, self.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_format_channels() {
        assert_eq!(ColorFormat::Grayscale.channels(), 1);
        assert_eq!(ColorFormat::Rgb.channels(), 3);
        assert_eq!(ColorFormat::Bgra.channels(), 4);
        assert_eq!(ColorFormat::Lab.channels(), 3);
    }

    #[test]
    fn test_color_format_parse() {
        assert_eq!("RGB".parse::<ColorFormat>().unwrap(), ColorFormat::Rgb);
        assert_eq!("gray".parse::<ColorFormat>().unwrap(), ColorFormat::Grayscale);
        assert_eq!("ycbcr".parse::<ColorFormat>().unwrap(), ColorFormat::Ycbcr);
        assert!(matches!(
            "cmyk".parse::<ColorFormat>(),
            Err(VisionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_layout_shape() {
        assert_eq!(DataLayout::Hwc.shape(4, 2, 3), vec![2, 4, 3]);
        assert_eq!(DataLayout::Nchw.shape(4, 2, 3), vec![1, 3, 2, 4]);
        assert_eq!(DataLayout::Nhwc.unbatched(), DataLayout::Hwc);
        assert_eq!(DataLayout::Chw.batched(), DataLayout::Nchw);
        assert!(matches!(
            "whc".parse::<DataLayout>(),
            Err(VisionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_layout_serde() {
        let json = serde_json::to_string(&DataLayout::Nchw).unwrap();
        assert_eq!(json, "\"nchw\"");
    }

    #[test]
    fn test_size_rejects_zero() {
        assert!(matches!(Size::new(0, 10), Err(VisionError::InvalidInput(_))));
        assert_eq!(Size::new(640, 480).unwrap().area(), 307_200);
    }

    #[test]
    fn test_rect_bounds() {
        let bounds = Size::new(100, 50).unwrap();
        assert!(Rect::new(0, 0, 100, 50).check_within(bounds).is_ok());
        assert!(matches!(
            Rect::new(90, 0, 20, 10).check_within(bounds),
            Err(VisionError::OutOfBounds(_))
        ));
        assert!(matches!(
            Rect::new(0, 0, 0, 10).check_within(bounds),
            Err(VisionError::InvalidInput(_))
        ));
    }
}
