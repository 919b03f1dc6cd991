//! Catalog records: one entry per object, read from and written to CSV.
//!
//! Two row layouts are accepted and may be mixed:
//!
//! * object-per-row: `parent_tile_index,object_index,ra,dec`
//! * band-per-row, as written by the splitter:
//!   `object_id,parent_tile_index,object_index,filename,filter`
//!
//! Rows sharing a key are merged into a single [`CatalogRecord`], kept in
//! order of first appearance. Unknown columns are ignored.

use crate::error::{Result, TileCatalogError};
use crate::tile_name::{Band, TileKey, TileName};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const COORDINATE_TOLERANCE_DEG: f64 = 1e-9;

// Header rows for empty catalogs; serde only emits one with the first row
const CATALOG_HEADER: [&str; 7] = [
    "object_id",
    "parent_tile_index",
    "object_index",
    "ra",
    "dec",
    "filename",
    "filter",
];
const ENTRY_HEADER: [&str; 5] = [
    "object_id",
    "parent_tile_index",
    "object_index",
    "filename",
    "filter",
];

/// One object listed by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    pub key: TileKey,
    /// Right ascension in degrees
    pub ra: Option<f64>,
    /// Declination in degrees
    pub dec: Option<f64>,
    /// Bands the catalog declares present, in first-listed order
    pub bands: Vec<Band>,
    /// Tile file names listed for this object
    pub filenames: Vec<String>,
}

impl CatalogRecord {
    pub fn new(key: TileKey) -> Self {
        Self {
            key,
            ra: None,
            dec: None,
            bands: Vec::new(),
            filenames: Vec::new(),
        }
    }

    pub fn with_coordinates(mut self, ra: f64, dec: f64) -> Self {
        self.ra = Some(ra);
        self.dec = Some(dec);
        self
    }

    pub fn with_band(mut self, band: Band) -> Self {
        if !self.bands.contains(&band) {
            self.bands.push(band);
        }
        self
    }

    pub fn with_filename(mut self, filename: &str) -> Self {
        if !self.filenames.iter().any(|f| f == filename) {
            self.filenames.push(filename.to_string());
        }
        self
    }
}

/// Band-per-row catalog entry as written after splitting.
///
/// `object_id` is left empty when the object index does not fit the
/// combined id; the index columns always identify the object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub object_id: Option<u64>,
    pub parent_tile_index: u32,
    pub object_index: u32,
    pub filename: String,
    pub filter: String,
}

impl CatalogEntry {
    pub fn for_tile(name: &TileName) -> Self {
        Self {
            object_id: name.key.object_id(),
            parent_tile_index: name.key.parent_tile_index,
            object_index: name.key.object_index,
            filename: name.file_name(),
            filter: name.band.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CatalogRow<'r> {
    object_id: Option<u64>,
    parent_tile_index: u32,
    object_index: u32,
    ra: Option<f64>,
    dec: Option<f64>,
    filename: Option<&'r str>,
    filter: Option<&'r str>,
}

impl<'r> CatalogRow<'r> {
    fn new(record: &CatalogRecord, filename: Option<&'r str>, filter: Option<&'r str>) -> Self {
        Self {
            object_id: record.key.object_id(),
            parent_tile_index: record.key.parent_tile_index,
            object_index: record.key.object_index,
            ra: record.ra,
            dec: record.dec,
            filename,
            filter,
        }
    }
}

/// Column positions found in the header row
#[derive(Debug, Default)]
struct Columns {
    object_id: Option<usize>,
    parent_tile_index: Option<usize>,
    object_index: Option<usize>,
    ra: Option<usize>,
    dec: Option<usize>,
    filename: Option<usize>,
    filter: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        Self {
            object_id: find("object_id"),
            parent_tile_index: find("parent_tile_index"),
            object_index: find("object_index"),
            ra: find("ra"),
            dec: find("dec"),
            filename: find("filename"),
            filter: find("filter"),
        }
    }

    fn has_key(&self) -> bool {
        self.object_id.is_some() || (self.parent_tile_index.is_some() && self.object_index.is_some())
    }
}

/// The full set of catalog records.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
    index: HashMap<TileKey, usize>,
}

impl Catalog {
    /// Build from records; later records with a repeated key are dropped.
    pub fn from_records(records: impl IntoIterator<Item = CatalogRecord>) -> Self {
        let mut catalog = Catalog::default();
        for record in records {
            if !catalog.index.contains_key(&record.key) {
                catalog.index.insert(record.key, catalog.records.len());
                catalog.records.push(record);
            }
        }
        catalog
    }

    /// Read a CSV catalog with a header row.
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let columns = Columns::from_headers(reader.headers()?);
        if !columns.has_key() {
            return Err(catalog_error(
                path,
                1,
                "header needs 'object_id' or both 'parent_tile_index' and 'object_index'",
            ));
        }

        let mut catalog = Catalog::default();
        for result in reader.records() {
            let row = result?;
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            let parsed = parse_row(&row, &columns).map_err(|m| catalog_error(path, line, &m))?;
            catalog
                .merge(parsed)
                .map_err(|m| catalog_error(path, line, &m))?;
        }

        debug!(
            "Read catalog {} with {} objects",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    fn merge(&mut self, row: CatalogRecord) -> std::result::Result<(), String> {
        let existing_idx = self.index.get(&row.key).copied();
        let Some(idx) = existing_idx else {
            self.index.insert(row.key, self.records.len());
            self.records.push(row);
            return Ok(());
        };

        let existing = &mut self.records[idx];
        existing.ra = merge_coordinate("ra", existing.ra, row.ra)?;
        existing.dec = merge_coordinate("dec", existing.dec, row.dec)?;
        for band in row.bands {
            if !existing.bands.contains(&band) {
                existing.bands.push(band);
            }
        }
        for filename in row.filenames {
            if !existing.filenames.contains(&filename) {
                existing.filenames.push(filename);
            }
        }
        Ok(())
    }

    /// Write the catalog so that reading it back yields the same records.
    ///
    /// Objects with declared bands get one row per band (one per listed
    /// file when files are named); objects without bands get a single row.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        if self.records.is_empty() {
            writer.write_record(CATALOG_HEADER)?;
        }
        for record in &self.records {
            let named = record
                .filenames
                .iter()
                .map(|f| Ok((f.as_str(), TileName::parse(f)?.band)))
                .collect::<Result<Vec<(&str, Band)>>>()?;

            if record.bands.is_empty() && named.is_empty() {
                writer.serialize(CatalogRow::new(record, None, None))?;
                continue;
            }
            for band in &record.bands {
                let mut listed = named.iter().filter(|(_, b)| b == band).peekable();
                if listed.peek().is_none() {
                    writer.serialize(CatalogRow::new(record, None, Some(band.as_str())))?;
                }
                for (filename, _) in listed {
                    writer.serialize(CatalogRow::new(record, Some(*filename), Some(band.as_str())))?;
                }
            }
            for (filename, band) in named.iter().filter(|(_, b)| !record.bands.contains(b)) {
                writer.serialize(CatalogRow::new(record, Some(*filename), Some(band.as_str())))?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn get(&self, key: &TileKey) -> Option<&CatalogRecord> {
        self.index.get(key).map(|&idx| &self.records[idx])
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.index.contains_key(key)
    }

    /// Records in first-appearance order
    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.records.iter().map(|r| r.key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Write band-per-row entries
/// (`object_id,parent_tile_index,object_index,filename,filter`).
pub fn write_entries(path: &Path, entries: &[CatalogEntry]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if entries.is_empty() {
        writer.write_record(ENTRY_HEADER)?;
    }
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

fn catalog_error(path: &Path, line: u64, message: &str) -> TileCatalogError {
    TileCatalogError::Catalog {
        path: PathBuf::from(path),
        line,
        message: message.to_string(),
    }
}

fn field<'r>(row: &'r csv::StringRecord, column: Option<usize>) -> Option<&'r str> {
    column
        .and_then(|idx| row.get(idx))
        .filter(|value| !value.is_empty())
}

fn parse_row(row: &csv::StringRecord, columns: &Columns) -> std::result::Result<CatalogRecord, String> {
    let id_key = field(row, columns.object_id)
        .map(|s| {
            let id = s
                .parse::<u64>()
                .map_err(|_| format!("invalid object_id '{s}'"))?;
            TileKey::from_object_id(id).ok_or_else(|| format!("object_id {id} is out of range"))
        })
        .transpose()?;

    let index_key = match (
        field(row, columns.parent_tile_index),
        field(row, columns.object_index),
    ) {
        (Some(parent), Some(object)) => {
            let parent = parent
                .parse::<u32>()
                .map_err(|_| format!("invalid parent_tile_index '{parent}'"))?;
            let object = object
                .parse::<u32>()
                .map_err(|_| format!("invalid object_index '{object}'"))?;
            Some(TileKey::new(parent, object))
        }
        (None, None) => None,
        _ => return Err("parent_tile_index and object_index must both be set".to_string()),
    };

    let key = match (id_key, index_key) {
        (Some(a), Some(b)) if a != b => {
            return Err(format!("object_id key {a} disagrees with index key {b}"))
        }
        (Some(key), _) | (None, Some(key)) => key,
        (None, None) => return Err("row has no object key".to_string()),
    };

    let mut record = CatalogRecord::new(key);
    record.ra = parse_coordinate(row, columns.ra, "ra")?;
    record.dec = parse_coordinate(row, columns.dec, "dec")?;

    let filter = field(row, columns.filter)
        .map(Band::new)
        .transpose()?;

    if let Some(filename) = field(row, columns.filename) {
        let name = TileName::parse(filename).map_err(|e| e.to_string())?;
        if name.key != key {
            return Err(format!(
                "filename {filename} belongs to object {}, row is for {key}",
                name.key
            ));
        }
        if let Some(filter) = &filter {
            if filter != &name.band {
                return Err(format!(
                    "filename {filename} is band {}, row says {filter}",
                    name.band
                ));
            }
        }
        record.filenames.push(filename.to_string());
        record = record.with_band(name.band);
    } else if let Some(filter) = filter {
        record = record.with_band(filter);
    }

    Ok(record)
}

fn parse_coordinate(
    row: &csv::StringRecord,
    column: Option<usize>,
    name: &str,
) -> std::result::Result<Option<f64>, String> {
    field(row, column)
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| format!("invalid {name} value '{s}'"))
        })
        .transpose()
}

fn merge_coordinate(
    name: &str,
    existing: Option<f64>,
    incoming: Option<f64>,
) -> std::result::Result<Option<f64>, String> {
    match (existing, incoming) {
        (Some(a), Some(b)) if (a - b).abs() > COORDINATE_TOLERANCE_DEG => Err(format!(
            "conflicting {name} values {a} and {b} for the same object"
        )),
        (Some(a), _) => Ok(Some(a)),
        (None, b) => Ok(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn write(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("catalog.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_band_per_row_merges_into_objects() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "object_id,filename,filter\n\
             72000003,72_3_G_v2_hsc_realistic.fits,G\n\
             72000003,72_3_R_v2_hsc_realistic.fits,R\n\
             72000000,72_0_G_v2_hsc_realistic.fits,G\n",
        );

        let catalog = Catalog::read(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        let keys: Vec<TileKey> = catalog.keys().collect();
        assert_eq!(keys, vec![TileKey::new(72, 3), TileKey::new(72, 0)]);

        let record = catalog.get(&TileKey::new(72, 3)).unwrap();
        assert_eq!(record.bands, vec![Band::new("G").unwrap(), Band::new("R").unwrap()]);
        assert_eq!(record.filenames.len(), 2);
    }

    #[test]
    fn test_object_per_row_with_coordinates() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "parent_tile_index,object_index,ra,dec,notes\n\
             72,3,150.25,-2.5,bright\n\
             91,12,,,\n",
        );

        let catalog = Catalog::read(&path).unwrap();
        let record = catalog.get(&TileKey::new(72, 3)).unwrap();
        assert_relative_eq!(record.ra.unwrap(), 150.25);
        assert_relative_eq!(record.dec.unwrap(), -2.5);
        assert!(record.bands.is_empty());

        let bare = catalog.get(&TileKey::new(91, 12)).unwrap();
        assert!(bare.ra.is_none());
    }

    #[test]
    fn test_filename_key_must_match_row() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "object_id,filename,filter\n72000003,72_4_G_v2_hsc_realistic.fits,G\n",
        );
        let err = Catalog::read(&path).unwrap_err();
        assert!(matches!(err, TileCatalogError::Catalog { line: 2, .. }));
    }

    #[test]
    fn test_conflicting_key_forms_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "object_id,parent_tile_index,object_index\n72000003,72,4\n",
        );
        assert!(Catalog::read(&path).is_err());
    }

    #[test]
    fn test_header_without_key_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "ra,dec\n1.0,2.0\n");
        assert!(matches!(
            Catalog::read(&path),
            Err(TileCatalogError::Catalog { line: 1, .. })
        ));
    }

    #[test]
    fn test_write_entries_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.csv");
        let names = [
            "72_3_G_v2_hsc_realistic.fits",
            "72_3_Z_v2_hsc_realistic.fits",
        ];
        let entries: Vec<CatalogEntry> = names
            .iter()
            .map(|n| CatalogEntry::for_tile(&TileName::parse(n).unwrap()))
            .collect();
        assert_eq!(entries[0].object_id, Some(72_000_003));

        write_entries(&path, &entries).unwrap();
        let catalog = Catalog::read(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.records()[0].bands.len(), 2);
    }

    #[test]
    fn test_write_object_rows_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("objects.csv");
        let catalog = Catalog::from_records([
            CatalogRecord::new(TileKey::new(72, 3)).with_coordinates(10.0, 20.0),
            CatalogRecord::new(TileKey::new(72, 5)),
        ]);

        catalog.write(&path).unwrap();
        let read = Catalog::read(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read.get(&TileKey::new(72, 3)).unwrap().ra, Some(10.0));
        assert!(read.contains(&TileKey::new(72, 5)));
    }

    #[test]
    fn test_entries_beyond_object_id_range_keep_index_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.csv");
        let name = TileName::parse("72_1234567_G_v2_hsc_realistic.fits").unwrap();
        let entry = CatalogEntry::for_tile(&name);
        assert_eq!(entry.object_id, None);

        write_entries(&path, &[entry]).unwrap();
        let catalog = Catalog::read(&path).unwrap();
        assert!(catalog.contains(&TileKey::new(72, 1_234_567)));
        assert_eq!(catalog.records()[0].filenames, vec![name.file_name()]);
    }

    #[test]
    fn test_write_keeps_bands_and_filenames() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.csv");
        let mut with_files = CatalogRecord::new(TileKey::new(72, 3))
            .with_coordinates(150.25, -2.5)
            .with_band(Band::new("G").unwrap())
            .with_band(Band::new("R").unwrap());
        with_files
            .filenames
            .push("72_3_G_v2_hsc_realistic.fits".to_string());
        let catalog = Catalog::from_records([
            with_files,
            CatalogRecord::new(TileKey::new(91, 0)).with_band(Band::new("Z").unwrap()),
            CatalogRecord::new(TileKey::new(91, 1)),
        ]);

        catalog.write(&path).unwrap();
        let read = Catalog::read(&path).unwrap();
        assert_eq!(read.records(), catalog.records());
    }

    #[test]
    fn test_write_empty_catalog_reads_back_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.csv");
        Catalog::default().write(&path).unwrap();
        assert!(Catalog::read(&path).unwrap().is_empty());
    }
}
