//! Writing cropped object groups to a new tile directory.

use crate::config::RuntimeConfig;
use crate::error::{Result, TileCatalogError};
use crate::fits_io::write_image;
use crate::object_group::ObjectGroups;
use crate::split::band_extension;
use crate::tile::TileReader;
use log::info;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub objects_written: usize,
    pub tiles_written: usize,
    /// Catalog records dropped under a skip policy
    pub objects_skipped: usize,
}

/// Crop every object group to `data_set.crop_to` and write it to `output_dir`.
///
/// Tiles keep their file names. The first error yielded by the enumeration
/// (under an `error` policy) or by loading a group aborts the export.
pub fn export_cropped(
    config: &RuntimeConfig,
    output_dir: &Path,
    reader: &dyn TileReader,
) -> Result<ExportSummary> {
    let crop_to = config.data_set.crop_to.ok_or_else(|| {
        TileCatalogError::Config("data_set.crop_to is required for export".to_string())
    })?;
    if same_directory(&config.general.data_dir, output_dir) {
        return Err(TileCatalogError::Config(format!(
            "output directory {} is the tile directory; source tiles are never overwritten",
            output_dir.display()
        )));
    }
    std::fs::create_dir_all(output_dir)?;

    let mut groups = ObjectGroups::from_config(config)?;
    let mut summary = ExportSummary::default();

    for group in groups.by_ref() {
        let group = group?;
        let stack = group.load(reader, Some(crop_to))?;
        for tile in &stack.tiles {
            let out_path = output_dir.join(tile.name.file_name());
            write_image(
                &out_path,
                &band_extension(&tile.name.band),
                &tile.data,
                &[("FILTER", tile.name.band.as_str())],
            )?;
            summary.tiles_written += 1;
        }
        summary.objects_written += 1;
    }
    summary.objects_skipped = groups.skipped();

    info!(
        "Exported {} objects ({} tiles) cropped to {crop_to} into {}",
        summary.objects_written,
        summary.tiles_written,
        output_dir.display()
    );
    Ok(summary)
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
