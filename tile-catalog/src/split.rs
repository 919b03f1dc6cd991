//! Splitting multi-band parent files into single-band tiles.
//!
//! A parent file holds one image HDU per band, named `SUBARU_HSC.<band>`.
//! Each band is copied out as its own tile under the tile-name grammar,
//! keeping its header cards and pixel type, and an optional band-per-row
//! catalog records every tile written.

use crate::catalog::{write_entries, CatalogEntry};
use crate::error::{Result, TileCatalogError};
use crate::fits_io::{read_image_hdus, write_image_hdus, ImageHdu};
use crate::tile_name::{Band, ParentName, TileName, DEFAULT_INSTRUMENT_TAG};
use crate::url_list::ParentSource;
use fitsio::value::Value;
use indicatif::ProgressBar;
use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// EXTNAME prefix of band images inside a parent file
pub const BAND_EXTENSION_PREFIX: &str = "SUBARU_HSC.";

/// EXTNAME carrying `band` in a parent file
pub fn band_extension(band: &Band) -> String {
    format!("{BAND_EXTENSION_PREFIX}{band}")
}

#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Where the fetcher stored the parent files
    pub parent_dir: PathBuf,
    /// Where tiles are written
    pub output_dir: PathBuf,
    pub bands: Vec<Band>,
    pub instrument: String,
    /// Delete each parent after it has been split
    pub remove_parent: bool,
    /// Write a band-per-row catalog here when set
    pub catalog_path: Option<PathBuf>,
}

impl SplitOptions {
    pub fn new(parent_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            parent_dir,
            output_dir,
            bands: Band::hsc_bands(),
            instrument: DEFAULT_INSTRUMENT_TAG.to_string(),
            remove_parent: false,
            catalog_path: None,
        }
    }
}

/// Counts reported after a batch has been split
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSummary {
    pub parents_split: usize,
    pub parents_missing: usize,
    /// Parents present but unreadable; they are never removed
    pub parents_failed: usize,
    pub tiles_written: usize,
    pub bands_missing: usize,
    pub catalog_entries: usize,
}

/// Tiles written from one parent plus the bands it lacked
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentSplit {
    pub tiles: Vec<TileName>,
    pub missing_bands: Vec<Band>,
}

/// Split a single parent file into per-band tiles in `options.output_dir`.
pub fn split_parent(
    parent_path: &Path,
    parent: &ParentName,
    options: &SplitOptions,
) -> Result<ParentSplit> {
    let images = read_image_hdus(parent_path)?;
    split_images(&images, parent_path, parent, options)
}

fn split_images(
    images: &HashMap<String, ImageHdu>,
    parent_path: &Path,
    parent: &ParentName,
    options: &SplitOptions,
) -> Result<ParentSplit> {
    let mut result = ParentSplit::default();

    for band in &options.bands {
        let extname = band_extension(band);
        let Some(image) = images.get(&extname) else {
            warn!("No extension {extname} in {}", parent_path.display());
            result.missing_bands.push(band.clone());
            continue;
        };

        let mut tile = image.clone();
        if tile.card("FILTER").is_none() {
            tile.set_card("FILTER", Value::String(band.to_string()));
        }
        let name = parent.tile_name(band, &options.instrument);
        write_image_hdus(options.output_dir.join(name.file_name()), &[tile])?;
        info!("Wrote {}", name);
        result.tiles.push(name);
    }

    Ok(result)
}

/// Split every parent of a batch that is present in `options.parent_dir`.
///
/// Missing or unreadable parents and missing band extensions are logged and
/// counted, not treated as errors; failing to write a tile is an error. A
/// parent is only removed once at least one tile was written from it. The
/// catalog, when requested, is written once at the end.
pub fn split_batch(
    sources: &[ParentSource],
    options: &SplitOptions,
    progress: &ProgressBar,
) -> Result<SplitSummary> {
    if options.bands.is_empty() {
        return Err(TileCatalogError::Config(
            "at least one band is required to split".to_string(),
        ));
    }
    std::fs::create_dir_all(&options.output_dir)?;

    let mut summary = SplitSummary::default();
    let mut entries = Vec::new();

    for source in sources {
        progress.inc(1);
        let parent_path = options.parent_dir.join(source.parent_file_name());
        if !parent_path.exists() {
            warn!(
                "Parent file {} not found; fetch {} first",
                parent_path.display(),
                source.url
            );
            summary.parents_missing += 1;
            continue;
        }

        progress.set_message(source.parent_file_name());
        let images = match read_image_hdus(&parent_path) {
            Ok(images) => images,
            Err(e) => {
                warn!("Could not read parent {}: {e}", parent_path.display());
                summary.parents_failed += 1;
                continue;
            }
        };
        let split = split_images(&images, &parent_path, &source.name, options)?;
        summary.parents_split += 1;
        summary.tiles_written += split.tiles.len();
        summary.bands_missing += split.missing_bands.len();
        if options.catalog_path.is_some() {
            entries.extend(split.tiles.iter().map(CatalogEntry::for_tile));
        }

        if options.remove_parent {
            if split.tiles.is_empty() {
                warn!(
                    "Keeping {}: none of the requested bands were found",
                    parent_path.display()
                );
            } else {
                match std::fs::remove_file(&parent_path) {
                    Ok(()) => info!("Removed parent file {}", parent_path.display()),
                    Err(e) => warn!("Could not remove {}: {e}", parent_path.display()),
                }
            }
        }
    }

    if let Some(catalog_path) = &options.catalog_path {
        write_entries(catalog_path, &entries)?;
        summary.catalog_entries = entries.len();
        info!(
            "Wrote catalog with {} entries to {}",
            entries.len(),
            catalog_path.display()
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::fits_io::{read_image, Pixels};
    use crate::image_size::ImageSize;
    use crate::test_util::write_parent;
    use crate::tile_name::{TileKey, VersionTag};
    use tempfile::TempDir;

    fn source(snapshot: u32, subhalo: u32) -> ParentSource {
        ParentSource::from_url(&format!(
            "https://www.tng-project.org/api/TNG50-1/snapshots/{snapshot}/subhalos/{subhalo}/skirt/skirt_images_hsc_realistic_v2.fits"
        ))
        .unwrap()
    }

    #[test]
    fn test_split_parent_skips_missing_extension() {
        let dir = TempDir::new().unwrap();
        let parent = ParentName::new(TileKey::new(72, 0), VersionTag(2));
        let parent_path = write_parent(dir.path(), &parent, &["G", "R"], 6, 6);

        let options = SplitOptions::new(dir.path().to_path_buf(), dir.path().to_path_buf());
        let split = split_parent(&parent_path, &parent, &options).unwrap();

        let written: Vec<String> = split.tiles.iter().map(|t| t.file_name()).collect();
        assert_eq!(
            written,
            vec!["72_0_G_v2_hsc_realistic.fits", "72_0_R_v2_hsc_realistic.fits"]
        );
        assert_eq!(split.missing_bands.len(), 3);

        let r = read_image(dir.path().join("72_0_R_v2_hsc_realistic.fits")).unwrap();
        assert_eq!(r.dim(), (6, 6));
        assert_eq!(r[[0, 0]], 1.0);
    }

    #[test]
    fn test_split_batch_writes_catalog_and_removes_parents() {
        let parents = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let present = source(72, 3);
        let absent = source(72, 4);
        write_parent(parents.path(), &present.name, &["G", "R", "I", "Z", "Y"], 8, 8);

        let mut options =
            SplitOptions::new(parents.path().to_path_buf(), output.path().to_path_buf());
        options.remove_parent = true;
        options.catalog_path = Some(output.path().join("catalog.csv"));

        let summary =
            split_batch(&[present.clone(), absent], &options, &ProgressBar::hidden()).unwrap();

        assert_eq!(
            summary,
            SplitSummary {
                parents_split: 1,
                parents_missing: 1,
                parents_failed: 0,
                tiles_written: 5,
                bands_missing: 0,
                catalog_entries: 5,
            }
        );
        assert!(!parents.path().join(present.parent_file_name()).exists());

        let catalog = Catalog::read(&output.path().join("catalog.csv")).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.records()[0].bands, Band::hsc_bands());
    }

    #[test]
    fn test_split_requires_bands() {
        let dir = TempDir::new().unwrap();
        let mut options = SplitOptions::new(dir.path().to_path_buf(), dir.path().to_path_buf());
        options.bands.clear();
        assert!(split_batch(&[], &options, &ProgressBar::hidden()).is_err());
    }

    #[test]
    fn test_unreadable_parent_is_counted_and_kept() {
        let parents = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let corrupt = source(72, 4);
        let good = source(72, 3);
        let corrupt_path = parents.path().join(corrupt.parent_file_name());
        std::fs::write(&corrupt_path, b"not a fits file").unwrap();
        write_parent(parents.path(), &good.name, &["G", "R"], 6, 6);

        let mut options =
            SplitOptions::new(parents.path().to_path_buf(), output.path().to_path_buf());
        options.bands = vec![Band::new("G").unwrap(), Band::new("R").unwrap()];
        options.remove_parent = true;

        let summary = split_batch(&[corrupt, good.clone()], &options, &ProgressBar::hidden()).unwrap();
        assert_eq!(summary.parents_failed, 1);
        assert_eq!(summary.parents_split, 1);
        assert_eq!(summary.tiles_written, 2);
        assert!(corrupt_path.exists());
        assert!(!parents.path().join(good.parent_file_name()).exists());
    }

    #[test]
    fn test_parent_without_requested_bands_is_kept() {
        let parents = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let only_g = source(72, 3);
        let parent_path = write_parent(parents.path(), &only_g.name, &["G"], 6, 6);

        let mut options =
            SplitOptions::new(parents.path().to_path_buf(), output.path().to_path_buf());
        options.bands = vec![Band::new("Z").unwrap()];
        options.remove_parent = true;

        let summary = split_batch(&[only_g], &options, &ProgressBar::hidden()).unwrap();
        assert_eq!(summary.tiles_written, 0);
        assert_eq!(summary.bands_missing, 1);
        assert!(parent_path.exists());
    }

    #[test]
    fn test_split_keeps_band_header_and_pixel_type() {
        let dir = TempDir::new().unwrap();
        let parent = ParentName::new(TileKey::new(72, 3), VersionTag(2));
        let parent_path = dir.path().join(parent.file_name());
        let g = ImageHdu {
            extname: "SUBARU_HSC.G".to_string(),
            size: ImageSize::from_width_height(2, 2),
            pixels: Pixels::I32(vec![10, 20, 30, 40]),
            cards: Vec::new(),
        }
        .with_card("BUNIT", Value::String("nJy".to_string()))
        .with_card("FILTER", Value::String("HSC-G".to_string()));
        write_image_hdus(&parent_path, &[g.clone()]).unwrap();

        let mut options = SplitOptions::new(dir.path().to_path_buf(), dir.path().to_path_buf());
        options.bands = vec![Band::new("G").unwrap()];
        split_parent(&parent_path, &parent, &options).unwrap();

        let tile = read_image_hdus(dir.path().join("72_3_G_v2_hsc_realistic.fits"))
            .unwrap()
            .remove("SUBARU_HSC.G")
            .unwrap();
        assert_eq!(tile.pixels, g.pixels);
        assert_eq!(tile.card("BUNIT"), Some(&Value::String("nJy".to_string())));
        assert_eq!(tile.card("FILTER"), Some(&Value::String("HSC-G".to_string())));
    }

    #[test]
    fn test_large_subhalo_ids_stay_in_catalog() {
        let parents = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let large = source(72, 1_234_567);
        write_parent(parents.path(), &large.name, &["G", "R", "I", "Z", "Y"], 4, 4);

        let mut options =
            SplitOptions::new(parents.path().to_path_buf(), output.path().to_path_buf());
        options.catalog_path = Some(output.path().join("catalog.csv"));

        let summary = split_batch(&[large], &options, &ProgressBar::hidden()).unwrap();
        assert_eq!(summary.tiles_written, 5);
        assert_eq!(summary.catalog_entries, 5);

        let catalog = Catalog::read(&output.path().join("catalog.csv")).unwrap();
        let record = catalog.get(&TileKey::new(72, 1_234_567)).unwrap();
        assert_eq!(record.bands, Band::hsc_bands());
    }
}
