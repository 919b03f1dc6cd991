//! Error types for tile catalog operations.

use crate::fits_io::FitsError;
use crate::image_size::ImageSize;
use crate::tile_name::{Band, TileKey};
use itertools::Itertools;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving, validating or cropping image tiles.
#[derive(Debug, Error)]
pub enum TileCatalogError {
    /// A catalog record has no image files at all in the tile directory.
    #[error("Catalog object {key} has no matching tile files")]
    CatalogMismatch { key: TileKey },

    /// Some, but not all, required bands exist for an object.
    #[error(
        "Object {key} is missing band(s) {}; present: {}",
        .missing.iter().join(","),
        .present.iter().join(",")
    )]
    MissingBand {
        key: TileKey,
        missing: Vec<Band>,
        present: Vec<Band>,
    },

    /// A tile is smaller than the requested size in at least one axis.
    #[error("Tile {} is {actual}, smaller than required {required}", .path.display())]
    UndersizedTile {
        path: PathBuf,
        actual: ImageSize,
        required: ImageSize,
    },

    /// Several files claim the same key and band under the `reject` policy.
    #[error(
        "Object {key} band {band} has alternate tiles: {}",
        .candidates.iter().map(|p| p.display()).join(", ")
    )]
    AmbiguousTile {
        key: TileKey,
        band: Band,
        candidates: Vec<PathBuf>,
    },

    #[error("Invalid tile name '{name}': {reason}")]
    InvalidTileName { name: String, reason: String },

    #[error("Invalid parent URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Catalog {}:{line}: {message}", .path.display())]
    Catalog {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fits(#[from] FitsError),
}

/// Standard Result type for tile catalog operations.
pub type Result<T> = std::result::Result<T, TileCatalogError>;
