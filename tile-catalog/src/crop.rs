//! Centered cropping of 2-D grids to a uniform size.

use crate::image_size::ImageSize;
use ndarray::{s, Array2, ArrayView2};
use thiserror::Error;

/// Requested crop does not fit inside the source grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot crop {actual} grid to {requested}")]
pub struct CropError {
    pub actual: ImageSize,
    pub requested: ImageSize,
}

/// Leading-edge offsets `(column, row)` of a centered crop.
///
/// Odd excess is split with the smaller half on the leading edge:
/// `offset = floor((actual - target) / 2)`.
pub fn crop_offsets(actual: ImageSize, target: ImageSize) -> Result<(usize, usize), CropError> {
    if !actual.covers(target) {
        return Err(CropError {
            actual,
            requested: target,
        });
    }
    Ok((
        (actual.width - target.width) / 2,
        (actual.height - target.height) / 2,
    ))
}

/// Extract the centered `target` sub-grid of `data`.
///
/// Pure: the input is not modified and the result is a new owned array.
/// Cropping to the grid's own size returns an identical copy.
pub fn crop_centered<T: Clone>(
    data: ArrayView2<'_, T>,
    target: ImageSize,
) -> Result<Array2<T>, CropError> {
    let (height, width) = data.dim();
    let (col, row) = crop_offsets(ImageSize::from_width_height(width, height), target)?;
    Ok(data
        .slice(s![row..row + target.height, col..col + target.width])
        .to_owned())
}
