//! Tensor layout transforms: pure reindexing, values are never touched

use vision_utils_common::{DataLayout, Result, VisionError};

fn check_len(len: usize, width: usize, height: usize, channels: usize) -> Result<()> {
    let expected = width * height * channels;
    if width == 0 || height == 0 || channels == 0 {
        return Err(VisionError::invalid(format!(
            "tensor dimensions must be positive, got {width}x{height}x{channels}"
        )));
    }
    if len != expected {
        return Err(VisionError::invalid(format!(
            "tensor length {len} does not match {width}x{height}x{channels} ({expected})"
        )));
    }
    Ok(())
}

/// Interleaved `HWC` to planar `CHW`
pub fn hwc_to_chw<T: Copy>(data: &[T], width: usize, height: usize, channels: usize) -> Result<Vec<T>> {
    check_len(data.len(), width, height, channels)?;
    let plane = width * height;
    let mut out = Vec::with_capacity(data.len());
    for c in 0..channels {
        out.extend((0..plane).map(|p| data[p * channels + c]));
    }
    Ok(out)
}

/// Planar `CHW` back to interleaved `HWC`
pub fn chw_to_hwc<T: Copy>(data: &[T], width: usize, height: usize, channels: usize) -> Result<Vec<T>> {
    check_len(data.len(), width, height, channels)?;
    let plane = width * height;
    let mut out = Vec::with_capacity(data.len());
    for p in 0..plane {
        out.extend((0..channels).map(|c| data[c * plane + p]));
    }
    Ok(out)
}

/// Reorder a single-image tensor between any two layouts.
///
/// Batched layouts describe a batch of one here, so `NHWC <-> HWC` is a no-op
/// on the data and only the shape changes.
pub fn convert_layout<T: Copy>(
    data: &[T],
    width: usize,
    height: usize,
    channels: usize,
    from: DataLayout,
    to: DataLayout,
) -> Result<Vec<T>> {
    match (from.is_planar(), to.is_planar()) {
        (false, true) => hwc_to_chw(data, width, height, channels),
        (true, false) => chw_to_hwc(data, width, height, channels),
        _ => {
            check_len(data.len(), width, height, channels)?;
            Ok(data.to_vec())
        }
    }
}

/// Arbitrary-rank axis permutation of a row-major tensor.
///
/// Output axis `i` is input axis `order[i]`, so the output shape is
/// `order.map(|a| shape[a])`.
pub fn permute<T: Copy>(data: &[T], shape: &[usize], order: &[usize]) -> Result<(Vec<T>, Vec<usize>)> {
    let rank = shape.len();
    if order.len() != rank {
        return Err(VisionError::invalid(format!(
            "permutation of rank {} applied to rank {rank} tensor",
            order.len()
        )));
    }
    let mut seen = vec![false; rank];
    for &axis in order {
        if axis >= rank || std::mem::replace(&mut seen[axis], true) {
            return Err(VisionError::invalid(format!(
                "{order:?} is not a permutation of 0..{rank}"
            )));
        }
    }
    let total: usize = shape.iter().product();
    if total != data.len() {
        return Err(VisionError::invalid(format!(
            "shape {shape:?} holds {total} elements, data has {}",
            data.len()
        )));
    }

    let out_shape: Vec<usize> = order.iter().map(|&a| shape[a]).collect();

    let mut in_strides = vec![1usize; rank];
    for axis in (0..rank.saturating_sub(1)).rev() {
        in_strides[axis] = in_strides[axis + 1] * shape[axis + 1];
    }
    // Input stride for each output axis
    let strides: Vec<usize> = order.iter().map(|&a| in_strides[a]).collect();

    let mut out = Vec::with_capacity(total);
    let mut index = vec![0usize; rank];
    for _ in 0..total {
        let offset: usize = index.iter().zip(&strides).map(|(i, s)| i * s).sum();
        out.push(data[offset]);
        // Odometer increment over the output shape
        for axis in (0..rank).rev() {
            index[axis] += 1;
            if index[axis] < out_shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    Ok((out, out_shape))
}
