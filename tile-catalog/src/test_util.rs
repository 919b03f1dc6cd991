//! Synthetic tile directories and catalogs for tests.
//!
//! These helpers panic on I/O failure; they are meant for test code only.

use crate::catalog::{Catalog, CatalogRecord};
use crate::fits_io::{write_image, write_named_images};
use crate::tile_name::{ParentName, TileKey, TileName};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Deterministic test pattern: `row * 1000 + column`
pub fn ramp(height: usize, width: usize) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(r, c)| (r * 1000 + c) as f32)
}

/// Write a `height` x `width` ramp tile named `file_name` into `dir`.
pub fn write_tile(dir: &Path, file_name: &str, height: usize, width: usize) -> PathBuf {
    let name = TileName::parse(file_name).expect("test tile name must follow the grammar");
    let path = dir.join(name.file_name());
    write_image(
        &path,
        &format!("SUBARU_HSC.{}", name.band),
        &ramp(height, width),
        &[("FILTER", name.band.as_str())],
    )
    .expect("Failed to write test tile");
    path
}

/// Write an object-per-row catalog listing `keys` to `dir/catalog.csv`.
pub fn write_catalog_for(dir: &Path, keys: &[TileKey]) -> PathBuf {
    let path = dir.join("catalog.csv");
    Catalog::from_records(keys.iter().map(|k| CatalogRecord::new(*k)))
        .write(&path)
        .expect("Failed to write test catalog");
    path
}

/// Write a multi-band parent file with one `SUBARU_HSC.<band>` HDU per band.
pub fn write_parent(
    dir: &Path,
    parent: &ParentName,
    bands: &[&str],
    height: usize,
    width: usize,
) -> PathBuf {
    let path = dir.join(parent.file_name());
    let images: Vec<(String, Array2<f32>)> = bands
        .iter()
        .enumerate()
        .map(|(i, band)| {
            (
                format!("SUBARU_HSC.{band}"),
                ramp(height, width) + i as f32,
            )
        })
        .collect();
    write_named_images(&path, &images).expect("Failed to write test parent file");
    path
}
