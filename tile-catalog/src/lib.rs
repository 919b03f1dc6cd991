//! Tile catalog convention for per-band FITS image tiles.
//!
//! A tile directory holds one FITS file per object and band, named
//! `<parent>_<object>_<band>_<version>_<instrument>.fits`, next to a catalog
//! listing the objects. This crate resolves the pair into multi-band
//! [`ObjectGroup`]s, validates tile sizes, crops them to a uniform size, and
//! produces such directories from multi-band parent files.
//!
//! ```no_run
//! use tile_catalog::{ObjectGroups, RuntimeConfig, FitsTileReader};
//! use std::path::Path;
//!
//! let config = RuntimeConfig::load(Path::new("runtime_config.json"))?;
//! for group in ObjectGroups::from_config(&config)? {
//!     let stack = group?.load(&FitsTileReader, config.data_set.crop_to)?;
//!     println!("{} has {} bands", stack.key, stack.tiles.len());
//! }
//! # Ok::<(), tile_catalog::TileCatalogError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod crop;
pub mod error;
pub mod export;
pub mod fits_io;
pub mod image_size;
pub mod object_group;
pub mod split;
pub mod test_util;
pub mod tile;
pub mod tile_name;
pub mod url_list;

pub use catalog::{Catalog, CatalogEntry, CatalogRecord};
pub use config::{AlternatePolicy, DataSetName, FailurePolicy, RuntimeConfig};
pub use error::{Result, TileCatalogError};
pub use image_size::ImageSize;
pub use object_group::{ObjectGroup, ObjectGroups, ObjectStack, SkippedObject, TileIndex};
pub use tile::{FitsTileReader, ImageTile, TileReader};
pub use tile_name::{Band, ParentName, TileKey, TileName, VersionTag};
