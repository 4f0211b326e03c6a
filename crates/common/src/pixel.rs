//! Pixel sources and owned pixel buffers

use crate::{ColorFormat, Rect, Result, Size, VisionError};
use image::{DynamicImage, GenericImageView, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// A decoded image addressable by pixel coordinates.
///
/// Decoders hand the pipeline anything implementing this trait; the pipeline
/// only ever reads RGBA values through `rgba`.
pub trait PixelSource {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// RGBA value at `(x, y)`; callers guarantee the coordinates are in range
    fn rgba(&self, x: u32, y: u32) -> [u8; 4];

    fn size(&self) -> Result<Size> {
        Size::new(self.width(), self.height())
    }
}

impl PixelSource for RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        self.get_pixel(x, y).0
    }
}

impl PixelSource for RgbImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        let [r, g, b] = self.get_pixel(x, y).0;
        [r, g, b, 255]
    }
}

impl PixelSource for DynamicImage {
    fn width(&self) -> u32 {
        GenericImageView::width(self)
    }

    fn height(&self) -> u32 {
        GenericImageView::height(self)
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        self.get_pixel(x, y).0
    }
}

/// Interleaved 8-bit pixel data tagged with its color model.
///
/// Invariant: `data.len() == width * height * channels`. Every stage that
/// transforms a buffer returns a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPixelBuffer")]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: usize,
    color_format: ColorFormat,
    data: Vec<u8>,
}

#[derive(Deserialize)]
struct RawPixelBuffer {
    width: u32,
    height: u32,
    color_format: ColorFormat,
    data: Vec<u8>,
}

impl TryFrom<RawPixelBuffer> for PixelBuffer {
    type Error = VisionError;

    fn try_from(raw: RawPixelBuffer) -> Result<Self> {
        PixelBuffer::new(raw.width, raw.height, raw.color_format, raw.data)
    }
}

impl PixelBuffer {
    /// Wrap `data`, validating dimensions and length against the format
    pub fn new(width: u32, height: u32, color_format: ColorFormat, data: Vec<u8>) -> Result<Self> {
        let size = Size::new(width, height)?;
        let channels = color_format.channels();
        let expected = size.area() * channels;
        if data.len() != expected {
            return Err(VisionError::invalid(format!(
                "buffer length {} does not match {size}x{channels} ({expected})",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            color_format,
            data,
        })
    }

    /// Buffer of `size` filled with a single pixel value
    pub fn filled(size: Size, color_format: ColorFormat, pixel: &[u8]) -> Result<Self> {
        if pixel.len() != color_format.channels() {
            return Err(VisionError::invalid(format!(
                "fill value has {} channels, {color_format} needs {}",
                pixel.len(),
                color_format.channels()
            )));
        }
        let data = pixel.repeat(size.area());
        Self::new(size.width, size.height, color_format, data)
    }

    /// Copy an entire source into an RGBA buffer
    pub fn from_source<S: PixelSource + ?Sized>(source: &S) -> Result<Self> {
        let size = source.size()?;
        let mut data = Vec::with_capacity(size.area() * 4);
        for y in 0..size.height {
            for x in 0..size.width {
                data.extend_from_slice(&source.rgba(x, y));
            }
        }
        Self::new(size.width, size.height, ColorFormat::Rgba, data)
    }

    /// Copy the `roi` region of a source into an RGBA buffer
    pub fn from_source_region<S: PixelSource + ?Sized>(source: &S, roi: Rect) -> Result<Self> {
        roi.check_within(source.size()?)?;
        let mut data = Vec::with_capacity(roi.width as usize * roi.height as usize * 4);
        for y in roi.y..roi.y + roi.height {
            for x in roi.x..roi.x + roi.width {
                data.extend_from_slice(&source.rgba(x, y));
            }
        }
        Self::new(roi.width, roi.height, ColorFormat::Rgba, data)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[must_use]
    pub fn color_format(&self) -> ColorFormat {
        self.color_format
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Channel values of the pixel at `(x, y)`
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        &self.data[start..start + self.channels]
    }

    /// Copy out a sub-rectangle, keeping the color model
    pub fn crop(&self, rect: Rect) -> Result<Self> {
        rect.check_within(self.size())?;
        let row_len = rect.width as usize * self.channels;
        let mut data = Vec::with_capacity(row_len * rect.height as usize);
        for y in rect.y..rect.y + rect.height {
            let start = (y as usize * self.width as usize + rect.x as usize) * self.channels;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Self::new(rect.width, rect.height, self.color_format, data)
    }

    /// Mirror the buffer around its vertical axis
    #[must_use]
    pub fn mirrored(&self) -> Self {
        let row_len = self.width as usize * self.channels;
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_len) {
            for pixel in row.chunks_exact(self.channels).rev() {
                data.extend_from_slice(pixel);
            }
        }
        Self {
            data,
            ..self.clone()
        }
    }

    /// View an RGBA buffer as an `image` crate buffer for resampling
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        if self.color_format != ColorFormat::Rgba {
            return Err(VisionError::unsupported(format!(
                "expected rgba buffer, got {}",
                self.color_format
            )));
        }
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| VisionError::invalid("rgba buffer length mismatch"))
    }

    /// Wrap an `image` crate RGBA buffer
    pub fn from_rgba_image(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, ColorFormat::Rgba, image.into_raw())
    }
}

impl PixelSource for PixelBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        let p = self.pixel(x, y);
        match self.color_format {
            ColorFormat::Rgba => [p[0], p[1], p[2], p[3]],
            ColorFormat::Bgra => [p[2], p[1], p[0], p[3]],
            ColorFormat::Bgr => [p[2], p[1], p[0], 255],
            ColorFormat::Grayscale => [p[0], p[0], p[0], 255],
            // Non-RGB models are read back channel-for-channel
            _ => [p[0], p[1], p[2], 255],
        }
    }
}
