//! Fixed-size crops for test-time augmentation

use rand::Rng;
use vision_utils_common::{PixelBuffer, Rect, Result, Size, VisionError};

fn check_fits(source: Size, crop: Size) -> Result<()> {
    if crop.width > source.width || crop.height > source.height {
        return Err(VisionError::out_of_bounds(format!(
            "crop {crop} is larger than source {source}"
        )));
    }
    Ok(())
}

fn center_rect(source: Size, crop: Size) -> Rect {
    Rect::new(
        (source.width - crop.width) / 2,
        (source.height - crop.height) / 2,
        crop.width,
        crop.height,
    )
}

pub fn center_crop(buffer: &PixelBuffer, size: Size) -> Result<PixelBuffer> {
    check_fits(buffer.size(), size)?;
    buffer.crop(center_rect(buffer.size(), size))
}

/// Four corners then the center: `[top-left, top-right, bottom-left, bottom-right, center]`
pub fn five_crop(buffer: &PixelBuffer, size: Size) -> Result<Vec<PixelBuffer>> {
    let source = buffer.size();
    check_fits(source, size)?;
    let right = source.width - size.width;
    let bottom = source.height - size.height;
    [
        Rect::new(0, 0, size.width, size.height),
        Rect::new(right, 0, size.width, size.height),
        Rect::new(0, bottom, size.width, size.height),
        Rect::new(right, bottom, size.width, size.height),
        center_rect(source, size),
    ]
    .into_iter()
    .map(|rect| buffer.crop(rect))
    .collect()
}

/// Five-crop of the buffer followed by five-crop of its mirror image
pub fn ten_crop(buffer: &PixelBuffer, size: Size) -> Result<Vec<PixelBuffer>> {
    let mut crops = five_crop(buffer, size)?;
    crops.extend(five_crop(&buffer.mirrored(), size)?);
    Ok(crops)
}

/// Uniformly placed crop; the generator is supplied by the caller so runs can be seeded
pub fn random_crop<R: Rng + ?Sized>(buffer: &PixelBuffer, size: Size, rng: &mut R) -> Result<PixelBuffer> {
    let source = buffer.size();
    check_fits(source, size)?;
    let x = rng.random_range(0..=source.width - size.width);
    let y = rng.random_range(0..=source.height - size.height);
    buffer.crop(Rect::new(x, y, size.width, size.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use vision_utils_common::ColorFormat;

    /// 4x4 grayscale where each pixel holds its own index
    fn indexed() -> PixelBuffer {
        PixelBuffer::new(4, 4, ColorFormat::Grayscale, (0..16).collect()).unwrap()
    }

    fn size(w: u32, h: u32) -> Size {
        Size::new(w, h).unwrap()
    }

    #[test]
    fn test_center_crop() {
        let crop = center_crop(&indexed(), size(2, 2)).unwrap();
        assert_eq!(crop.data(), &[5, 6, 9, 10]);
    }

    #[test]
    fn test_five_crop_order() {
        let crops = five_crop(&indexed(), size(2, 2)).unwrap();
        let firsts: Vec<u8> = crops.iter().map(|c| c.data()[0]).collect();
        assert_eq!(firsts, vec![0, 2, 8, 10, 5]);
    }

    #[test]
    fn test_ten_crop_mirrors_second_half() {
        let crops = ten_crop(&indexed(), size(2, 2)).unwrap();
        assert_eq!(crops.len(), 10);
        // Mirrored top-left equals the original top-right, flipped
        assert_eq!(crops[5].data(), &[3, 2, 7, 6]);
        assert_eq!(crops[1].data(), &[2, 3, 6, 7]);
    }

    #[test]
    fn test_oversized_crop_rejected() {
        assert!(matches!(
            center_crop(&indexed(), size(5, 2)),
            Err(VisionError::OutOfBounds(_))
        ));
        assert!(matches!(
            five_crop(&indexed(), size(2, 5)),
            Err(VisionError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_random_crop_is_seeded() {
        let buffer = indexed();
        let a = random_crop(&buffer, size(2, 2), &mut StdRng::seed_from_u64(7)).unwrap();
        let b = random_crop(&buffer, size(2, 2), &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.size(), size(2, 2));

        let full = random_crop(&buffer, size(4, 4), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(full, buffer);
    }
}
