//! Single-band image tiles and the reader seam used to load them.

use crate::crop::crop_centered;
use crate::error::{Result, TileCatalogError};
use crate::fits_io;
use crate::image_size::ImageSize;
use crate::tile_name::TileName;
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Source of tile pixels and dimensions.
///
/// The FITS implementation is the default; tests and alternative storage
/// layouts can supply their own.
pub trait TileReader {
    /// Pixel dimensions of the tile at `path` without loading its samples
    fn dimensions(&self, path: &Path) -> Result<ImageSize>;

    /// Load the tile samples
    fn read(&self, path: &Path) -> Result<Array2<f32>>;
}

/// Reads tiles stored as FITS images.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitsTileReader;

impl TileReader for FitsTileReader {
    fn dimensions(&self, path: &Path) -> Result<ImageSize> {
        Ok(fits_io::read_image_dimensions(path)?)
    }

    fn read(&self, path: &Path) -> Result<Array2<f32>> {
        Ok(fits_io::read_image(path)?)
    }
}

/// Confirm a tile is at least `required` in both axes.
pub fn validate_size(path: &Path, actual: ImageSize, required: ImageSize) -> Result<()> {
    if actual.covers(required) {
        Ok(())
    } else {
        Err(TileCatalogError::UndersizedTile {
            path: path.to_path_buf(),
            actual,
            required,
        })
    }
}

/// One loaded single-band tile.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTile {
    pub name: TileName,
    pub path: PathBuf,
    pub data: Array2<f32>,
}

impl ImageTile {
    /// Load a tile through `reader`
    pub fn load(reader: &dyn TileReader, name: TileName, path: PathBuf) -> Result<Self> {
        let data = reader.read(&path)?;
        Ok(Self { name, path, data })
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::of_array(&self.data)
    }

    /// Check this tile against a minimum size
    pub fn validate_size(&self, required: ImageSize) -> Result<()> {
        validate_size(&self.path, self.size(), required)
    }

    /// Centered crop to `target`; the tile itself is left untouched.
    pub fn crop(&self, target: ImageSize) -> Result<ImageTile> {
        let data = crop_centered(self.data.view(), target).map_err(|e| {
            TileCatalogError::UndersizedTile {
                path: self.path.clone(),
                actual: e.actual,
                required: e.requested,
            }
        })?;
        Ok(ImageTile {
            name: self.name.clone(),
            path: self.path.clone(),
            data,
        })
    }
}
