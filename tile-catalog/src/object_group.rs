//! Resolution of catalog records into multi-band object groups.
//!
//! A tile directory is indexed once by file name (no pixel reads). The
//! catalog is then walked record by record; each record becomes an
//! [`ObjectGroup`] holding the path of every band tile for that object.
//! Pixels are only read when a group is loaded.
//!
//! `HSCDataSet` finds tiles by object key, so every file for the key is a
//! candidate. `FitsImageDataSet` only uses the files each record lists.

use crate::catalog::{Catalog, CatalogRecord};
use crate::config::{AlternatePolicy, DataSetConfig, DataSetName, FailurePolicy, RuntimeConfig};
use crate::error::{Result, TileCatalogError};
use crate::image_size::ImageSize;
use crate::tile::{validate_size, ImageTile, TileReader};
use crate::tile_name::{Band, ParentName, TileKey, TileName};
use itertools::Itertools;
use log::{debug, info, warn};
use ndarray::{Array3, Axis};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// File-name index of a tile directory.
#[derive(Debug, Clone, Default)]
pub struct TileIndex {
    dir: PathBuf,
    by_key: BTreeMap<TileKey, Vec<TileName>>,
}

impl TileIndex {
    /// Index every tile directly inside `dir`.
    ///
    /// Parent files and names outside the grammar are ignored.
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut by_key: BTreeMap<TileKey, Vec<TileName>> = BTreeMap::new();
        let mut ignored = 0usize;

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            // follows symlinks; dangling links are skipped
            if !entry.path().is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                debug!("Ignoring non UTF-8 file name {:?}", entry.path());
                ignored += 1;
                continue;
            };

            match TileName::parse(file_name) {
                Ok(name) => by_key.entry(name.key).or_default().push(name),
                Err(e) => {
                    if ParentName::parse(file_name).is_ok() {
                        debug!("Skipping parent file {file_name}");
                    } else {
                        debug!("Ignoring {e}");
                    }
                    ignored += 1;
                }
            }
        }

        for names in by_key.values_mut() {
            names.sort_by_key(|n| n.file_name());
        }

        info!(
            "Indexed {} objects in {} ({} files ignored)",
            by_key.len(),
            dir.display(),
            ignored
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            by_key,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All tiles for `key`, sorted by file name
    pub fn tiles(&self, key: &TileKey) -> &[TileName] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &TileKey> {
        self.by_key.keys()
    }

    pub fn path_for(&self, name: &TileName) -> PathBuf {
        self.dir.join(name.file_name())
    }

    /// Number of distinct object keys
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// All band tiles of one catalog object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGroup {
    pub record: CatalogRecord,
    /// Tiles in band order: required bands first, then any extra bands
    pub tiles: Vec<(TileName, PathBuf)>,
}

impl ObjectGroup {
    pub fn key(&self) -> TileKey {
        self.record.key
    }

    pub fn bands(&self) -> Vec<Band> {
        self.tiles.iter().map(|(name, _)| name.band.clone()).collect()
    }

    pub fn path(&self, band: &Band) -> Option<&Path> {
        self.tiles
            .iter()
            .find(|(name, _)| &name.band == band)
            .map(|(_, path)| path.as_path())
    }

    /// Check every band against `required` without reading pixels.
    pub fn validate_sizes(&self, reader: &dyn TileReader, required: ImageSize) -> Result<()> {
        for (_, path) in &self.tiles {
            let actual = reader.dimensions(path)?;
            validate_size(path, actual, required)?;
        }
        Ok(())
    }

    /// Read every band, validating and cropping to `crop_to` when given.
    pub fn load(&self, reader: &dyn TileReader, crop_to: Option<ImageSize>) -> Result<ObjectStack> {
        let mut tiles = Vec::with_capacity(self.tiles.len());
        for (name, path) in &self.tiles {
            let tile = ImageTile::load(reader, name.clone(), path.clone())?;
            let tile = match crop_to {
                Some(target) => tile.crop(target)?,
                None => tile,
            };
            tiles.push(tile);
        }
        Ok(ObjectStack {
            key: self.key(),
            tiles,
        })
    }
}

/// Loaded pixels of an object group.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStack {
    pub key: TileKey,
    pub tiles: Vec<ImageTile>,
}

impl ObjectStack {
    /// Stack bands into a `(band, row, column)` cube.
    ///
    /// Returns None when the bands differ in size (crop first).
    pub fn to_cube(&self) -> Option<Array3<f32>> {
        let views: Vec<_> = self.tiles.iter().map(|t| t.data.view()).collect();
        if views.is_empty() || !views.iter().map(|v| v.dim()).all_equal() {
            return None;
        }
        ndarray::stack(Axis(0), &views).ok()
    }
}

/// A catalog object dropped under a skip policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedObject {
    pub key: TileKey,
    pub reason: String,
}

/// Lazy sequence of object groups, one per catalog record.
///
/// Records rejected under a `skip` policy are logged and counted; under an
/// `error` policy the error is yielded and iteration continues with the
/// next record.
pub struct ObjectGroups {
    catalog: Catalog,
    index: TileIndex,
    config: DataSetConfig,
    position: usize,
    skipped: Vec<SkippedObject>,
    reported_orphans: bool,
}

impl ObjectGroups {
    /// Enumerate `data_dir` against the catalog at `catalog_path`.
    pub fn new(data_dir: &Path, catalog_path: &Path, config: &RuntimeConfig) -> Result<Self> {
        let catalog = Catalog::read(catalog_path)?;
        let index = TileIndex::scan(data_dir)?;
        Ok(Self::from_parts(catalog, index, config))
    }

    /// Enumerate the directory and catalog named by the configuration
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        Self::new(&config.general.data_dir, config.catalog_path()?, config)
    }

    pub fn from_parts(catalog: Catalog, index: TileIndex, config: &RuntimeConfig) -> Self {
        Self {
            catalog,
            index,
            config: config.data_set.clone(),
            position: 0,
            skipped: Vec::new(),
            reported_orphans: false,
        }
    }

    /// Number of records dropped so far under a skip policy
    pub fn skipped(&self) -> usize {
        self.skipped.len()
    }

    /// Records dropped so far, with the reason each was dropped
    pub fn skipped_objects(&self) -> &[SkippedObject] {
        &self.skipped
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn report_orphans(&mut self) {
        if self.reported_orphans {
            return;
        }
        self.reported_orphans = true;

        let orphans: Vec<&TileKey> = self
            .index
            .keys()
            .filter(|key| !self.catalog.contains(key))
            .collect();
        if !orphans.is_empty() {
            warn!(
                "{} object(s) in {} have tiles but no catalog record: {}",
                orphans.len(),
                self.index.dir().display(),
                orphans.iter().take(10).join(", ")
            );
        }
    }
}

impl Iterator for ObjectGroups {
    type Item = Result<ObjectGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(record) = self.catalog.records().get(self.position) {
            self.position += 1;
            match resolve_group(record, &self.index, &self.config) {
                Ok(group) => return Some(Ok(group)),
                Err(e) => {
                    if policy_for(&e, &self.config) == FailurePolicy::Skip {
                        warn!("Skipping object {}: {e}", record.key);
                        self.skipped.push(SkippedObject {
                            key: record.key,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                    return Some(Err(e));
                }
            }
        }

        self.report_orphans();
        None
    }
}

fn policy_for(error: &TileCatalogError, config: &DataSetConfig) -> FailurePolicy {
    match error {
        TileCatalogError::CatalogMismatch { .. } => config.on_catalog_mismatch,
        TileCatalogError::MissingBand { .. } => config.on_missing_band,
        _ => FailurePolicy::Error,
    }
}

/// Match one catalog record against the tile index.
pub fn resolve_group(
    record: &CatalogRecord,
    index: &TileIndex,
    config: &DataSetConfig,
) -> Result<ObjectGroup> {
    let candidates: Vec<&TileName> = match config.name {
        DataSetName::Hsc => index.tiles(&record.key).iter().collect(),
        DataSetName::FitsImage => listed_tiles(record, index)?,
    };
    if candidates.is_empty() {
        return Err(TileCatalogError::CatalogMismatch { key: record.key });
    }
    group_from_candidates(record, &candidates, index, config)
}

/// Tiles named by the record's file list that exist in the index.
///
/// Listed files that are absent make the record fail with `MissingBand`
/// unless another listed file covers the same band.
fn listed_tiles<'i>(record: &CatalogRecord, index: &'i TileIndex) -> Result<Vec<&'i TileName>> {
    let key = record.key;
    let on_disk = index.tiles(&key);
    let mut listed: Vec<&TileName> = Vec::with_capacity(record.filenames.len());
    let mut absent: Vec<Band> = Vec::new();

    for file_name in &record.filenames {
        let parsed = match TileName::parse(file_name) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Object {key}: catalog lists {e}");
                continue;
            }
        };
        match on_disk.iter().find(|name| **name == parsed) {
            Some(name) => listed.push(name),
            None => {
                debug!("Object {key}: listed file {file_name} not in {}", index.dir().display());
                absent.push(parsed.band);
            }
        }
    }

    if listed.is_empty() {
        return Err(TileCatalogError::CatalogMismatch { key });
    }

    let present: Vec<Band> = listed.iter().map(|n| n.band.clone()).unique().collect();
    let missing: Vec<Band> = absent
        .into_iter()
        .filter(|band| !present.contains(band))
        .unique()
        .collect();
    if !missing.is_empty() {
        return Err(TileCatalogError::MissingBand {
            key,
            missing,
            present,
        });
    }
    Ok(listed)
}

fn group_from_candidates(
    record: &CatalogRecord,
    candidates: &[&TileName],
    index: &TileIndex,
    config: &DataSetConfig,
) -> Result<ObjectGroup> {
    let key = record.key;
    let mut by_band: BTreeMap<&Band, Vec<&TileName>> = BTreeMap::new();
    for name in candidates.iter().copied() {
        by_band.entry(&name.band).or_default().push(name);
    }

    let required: &[Band] = if record.bands.is_empty() {
        &config.required_bands
    } else {
        &record.bands
    };

    let missing: Vec<Band> = required
        .iter()
        .filter(|band| !by_band.contains_key(band))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(TileCatalogError::MissingBand {
            key,
            missing,
            present: by_band.keys().map(|b| (*b).clone()).collect(),
        });
    }

    let required_set: HashSet<&Band> = required.iter().collect();
    let band_order = required
        .iter()
        .chain(by_band.keys().copied().filter(|b| !required_set.contains(b)));

    let mut tiles = Vec::with_capacity(by_band.len());
    for band in band_order {
        let chosen = choose_alternate(key, band, &by_band[band], index, config.alternates)?;
        tiles.push((chosen.clone(), index.path_for(chosen)));
    }

    Ok(ObjectGroup {
        record: record.clone(),
        tiles,
    })
}

fn choose_alternate<'n>(
    key: TileKey,
    band: &Band,
    names: &[&'n TileName],
    index: &TileIndex,
    policy: AlternatePolicy,
) -> Result<&'n TileName> {
    if let [only] = names {
        return Ok(*only);
    }

    match policy {
        AlternatePolicy::Reject => Err(TileCatalogError::AmbiguousTile {
            key,
            band: band.clone(),
            candidates: names.iter().map(|n| index.path_for(n)).collect(),
        }),
        AlternatePolicy::PreferLatest => {
            let chosen = names
                .iter()
                .copied()
                .max_by(|a, b| {
                    a.version
                        .cmp(&b.version)
                        .then_with(|| b.instrument.cmp(&a.instrument))
                })
                .ok_or(TileCatalogError::CatalogMismatch { key })?;
            info!(
                "Object {key} band {band}: using {} over {}",
                chosen,
                names.iter().filter(|n| **n != chosen).join(", ")
            );
            Ok(chosen)
        }
    }
}
