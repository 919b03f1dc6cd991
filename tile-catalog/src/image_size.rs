//! Image dimensions and size utilities

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Image dimensions structure
///
/// Represents the width and height of a tile or a crop target.
/// Serialized as a `[width, height]` pair so configuration files can write
/// `"crop_to": [50, 50]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct ImageSize {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
}

impl ImageSize {
    /// Create a new ImageSize
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Size of a row-major array (rows are height, columns are width)
    pub fn of_array<T>(array: &Array2<T>) -> Self {
        let (height, width) = array.dim();
        Self { width, height }
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// True when `self` is at least `required` in both axes
    pub fn covers(&self, required: ImageSize) -> bool {
        self.width >= required.width && self.height >= required.height
    }

    /// Convert to tuple (width, height)
    pub fn to_tuple(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Create from tuple (width, height)
    pub fn from_tuple(dimensions: (usize, usize)) -> Self {
        Self {
            width: dimensions.0,
            height: dimensions.1,
        }
    }
}

impl From<(usize, usize)> for ImageSize {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_tuple(dimensions)
    }
}

impl From<ImageSize> for (usize, usize) {
    fn from(size: ImageSize) -> Self {
        size.to_tuple()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parse "width,height" or "widthxheight" (e.g. "50,50", "64x48")
impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([',', 'x']).collect();
        if parts.len() != 2 {
            return Err("Size must be in format 'width,height'".to_string());
        }

        let width = parts[0]
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("Invalid width value: {}", parts[0]))?;
        let height = parts[1]
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("Invalid height value: {}", parts[1]))?;

        if width == 0 || height == 0 {
            return Err("Width and height must be non-zero".to_string());
        }

        Ok(Self { width, height })
    }
}
