//! Color space conversion from interleaved RGBA
//!
//! Every output channel is an 8-bit value: computed in `f64`, rounded half
//! away from zero and clamped to `[0, 255]`.
//!
//! Byte encodings of the non-RGB models:
//! - HSV / HSL: hue `h / 360 * 255`, saturation/value/lightness `x * 255`
//! - LAB (D65): `L * 255 / 100`, `a + 128`, `b + 128`
//! - YUV: BT.601 luma, `U = 0.492 (B - Y) + 128`, `V = 0.877 (R - Y) + 128`
//! - YCbCr: full-range BT.601 (JPEG)

use vision_utils_common::{ColorFormat, PixelBuffer, Result, VisionError};

/// BT.601 luma weights
const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

/// D65 reference white
const WHITE_X: f64 = 0.950_47;
const WHITE_Y: f64 = 1.0;
const WHITE_Z: f64 = 1.088_83;

#[inline]
fn to_byte(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[inline]
fn luma(r: f64, g: f64, b: f64) -> f64 {
    LUMA_R * r + LUMA_G * g + LUMA_B * b
}

/// Hue in degrees `[0, 360)` plus max/min/delta of normalized RGB
fn hue(r: f64, g: f64, b: f64) -> (f64, f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    (h, max, min, delta)
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (h, max, _, delta) = hue(
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
    );
    let s = if max == 0.0 { 0.0 } else { delta / max };
    [to_byte(h / 360.0 * 255.0), to_byte(s * 255.0), to_byte(max * 255.0)]
}

fn rgb_to_hsl(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (h, max, min, delta) = hue(
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
    );
    let l = (max + min) / 2.0;
    let s = if delta == 0.0 {
        0.0
    } else {
        delta / (1.0 - (2.0 * l - 1.0).abs())
    };
    [to_byte(h / 360.0 * 255.0), to_byte(s * 255.0), to_byte(l * 255.0)]
}

/// sRGB companding inverse
fn linearize(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    if t > 0.008_856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn rgb_to_lab(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rl, gl, bl) = (linearize(r), linearize(g), linearize(b));
    let x = 0.412_456_4 * rl + 0.357_576_1 * gl + 0.180_437_5 * bl;
    let y = 0.212_672_9 * rl + 0.715_152_2 * gl + 0.072_175_0 * bl;
    let z = 0.019_333_9 * rl + 0.119_192_0 * gl + 0.950_304_1 * bl;

    let fx = lab_f(x / WHITE_X);
    let fy = lab_f(y / WHITE_Y);
    let fz = lab_f(z / WHITE_Z);

    let l = 116.0 * fy - 16.0;
    let a = 500.0 * (fx - fy);
    let b = 200.0 * (fy - fz);
    [to_byte(l * 255.0 / 100.0), to_byte(a + 128.0), to_byte(b + 128.0)]
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    let y = luma(r, g, b);
    [
        to_byte(y),
        to_byte(0.492 * (b - y) + 128.0),
        to_byte(0.877 * (r - y) + 128.0),
    ]
}

fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    [
        to_byte(luma(r, g, b)),
        to_byte(128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b),
        to_byte(128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b),
    ]
}

/// Append one RGBA pixel, converted to `target`, onto `out`
#[inline]
fn push_pixel(rgba: &[u8], target: ColorFormat, out: &mut Vec<u8>) {
    let (r, g, b, a) = (rgba[0], rgba[1], rgba[2], rgba[3]);
    match target {
        ColorFormat::Rgb => out.extend_from_slice(&[r, g, b]),
        ColorFormat::Rgba => out.extend_from_slice(&[r, g, b, a]),
        ColorFormat::Bgr => out.extend_from_slice(&[b, g, r]),
        ColorFormat::Bgra => out.extend_from_slice(&[b, g, r, a]),
        ColorFormat::Grayscale => {
            out.push(to_byte(luma(f64::from(r), f64::from(g), f64::from(b))));
        }
        ColorFormat::Hsv => out.extend_from_slice(&rgb_to_hsv(r, g, b)),
        ColorFormat::Hsl => out.extend_from_slice(&rgb_to_hsl(r, g, b)),
        ColorFormat::Lab => out.extend_from_slice(&rgb_to_lab(r, g, b)),
        ColorFormat::Yuv => out.extend_from_slice(&rgb_to_yuv(r, g, b)),
        ColorFormat::Ycbcr => out.extend_from_slice(&rgb_to_ycbcr(r, g, b)),
    }
}

/// Convert a buffer into `target`.
///
/// RGBA input is mapped directly. Other RGB-family buffers (rgb, bgr, bgra,
/// grayscale) are expanded to RGBA first; non-RGB models cannot be used as a
/// source and yield `UnsupportedFormat`.
pub fn convert(buffer: &PixelBuffer, target: ColorFormat) -> Result<PixelBuffer> {
    let rgba = match buffer.color_format() {
        ColorFormat::Rgba => None,
        ColorFormat::Rgb | ColorFormat::Bgr | ColorFormat::Bgra | ColorFormat::Grayscale => {
            Some(PixelBuffer::from_source(buffer)?)
        }
        other => {
            return Err(VisionError::unsupported(format!(
                "cannot convert from {other}; source must be an RGB-family buffer"
            )))
        }
    };
    let source = rgba.as_ref().unwrap_or(buffer);
    if target == ColorFormat::Rgba {
        return Ok(source.clone());
    }

    let mut out = Vec::with_capacity(source.size().area() * target.channels());
    for pixel in source.data().chunks_exact(4) {
        push_pixel(pixel, target, &mut out);
    }
    PixelBuffer::new(source.width(), source.height(), target, out)
}

/// Convert a single RGBA value, mostly useful for fill colors and tests
#[must_use]
pub fn convert_pixel(rgba: [u8; 4], target: ColorFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(target.channels());
    push_pixel(&rgba, target, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_utils_common::Size;

    #[test]
    fn test_channel_reordering() {
        let px = [10, 20, 30, 40];
        assert_eq!(convert_pixel(px, ColorFormat::Rgb), vec![10, 20, 30]);
        assert_eq!(convert_pixel(px, ColorFormat::Bgr), vec![30, 20, 10]);
        assert_eq!(convert_pixel(px, ColorFormat::Bgra), vec![30, 20, 10, 40]);
        assert_eq!(convert_pixel(px, ColorFormat::Rgba), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_grayscale_bt601() {
        // 0.299*255 = 76.245 -> 76
        assert_eq!(convert_pixel([255, 0, 0, 255], ColorFormat::Grayscale), vec![76]);
        // 0.587*255 = 149.685 -> 150
        assert_eq!(convert_pixel([0, 255, 0, 255], ColorFormat::Grayscale), vec![150]);
        assert_eq!(convert_pixel([255, 255, 255, 255], ColorFormat::Grayscale), vec![255]);
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(convert_pixel([255, 0, 0, 255], ColorFormat::Hsv), vec![0, 255, 255]);
        // hue 120 -> 85
        assert_eq!(convert_pixel([0, 255, 0, 255], ColorFormat::Hsv), vec![85, 255, 255]);
        // hue 240 -> 170
        assert_eq!(convert_pixel([0, 0, 255, 255], ColorFormat::Hsv), vec![170, 255, 255]);
        assert_eq!(convert_pixel([0, 0, 0, 255], ColorFormat::Hsv), vec![0, 0, 0]);
    }

    #[test]
    fn test_hsl_gray_has_no_saturation() {
        assert_eq!(convert_pixel([128, 128, 128, 255], ColorFormat::Hsl), vec![0, 0, 128]);
        assert_eq!(convert_pixel([255, 0, 0, 255], ColorFormat::Hsl), vec![0, 255, 128]);
    }

    #[test]
    fn test_lab_extremes() {
        assert_eq!(convert_pixel([255, 255, 255, 255], ColorFormat::Lab), vec![255, 128, 128]);
        assert_eq!(convert_pixel([0, 0, 0, 255], ColorFormat::Lab), vec![0, 128, 128]);
        // Red has strongly positive a*
        let red = convert_pixel([255, 0, 0, 255], ColorFormat::Lab);
        assert!(red[1] > 200);
    }

    #[test]
    fn test_yuv_and_ycbcr_neutral_chroma() {
        assert_eq!(convert_pixel([200, 200, 200, 255], ColorFormat::Yuv), vec![200, 128, 128]);
        assert_eq!(convert_pixel([200, 200, 200, 255], ColorFormat::Ycbcr), vec![200, 128, 128]);
        // Pure blue saturates Cb
        let blue = convert_pixel([0, 0, 255, 255], ColorFormat::Ycbcr);
        assert_eq!(blue, vec![29, 255, 107]);
    }

    #[test]
    fn test_convert_buffer_lengths() {
        let size = Size::new(3, 2).unwrap();
        let buffer = PixelBuffer::filled(size, ColorFormat::Rgba, &[1, 2, 3, 255]).unwrap();
        for format in ColorFormat::ALL {
            let out = convert(&buffer, format).unwrap();
            assert_eq!(out.data().len(), 6 * format.channels());
            assert_eq!(out.color_format(), format);
        }
    }

    #[test]
    fn test_convert_from_bgr_source() {
        let buffer = PixelBuffer::new(1, 1, ColorFormat::Bgr, vec![3, 2, 1]).unwrap();
        let out = convert(&buffer, ColorFormat::Rgb).unwrap();
        assert_eq!(out.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_rejects_non_rgb_source() {
        let buffer = PixelBuffer::new(1, 1, ColorFormat::Hsv, vec![0, 0, 0]).unwrap();
        assert!(matches!(
            convert(&buffer, ColorFormat::Rgb),
            Err(VisionError::UnsupportedFormat(_))
        ));
    }
}
