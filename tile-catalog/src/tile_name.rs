//! Fixed-field file-name grammar for single-band image tiles.
//!
//! A tile file name encodes its full key:
//!
//! ```text
//! <parent_tile_index>_<object_index>_<band>_<version_tag>_<instrument_tag>.fits
//! 72_3_Z_v2_hsc_realistic.fits
//! ```
//!
//! The first four fields are single tokens. Everything after the fourth
//! underscore is the instrument tag, so `hsc_realistic` is one tag. Indices
//! are canonical decimal (no leading zeros) so every key has exactly one
//! spelling. Names that do not follow the grammar are rejected instead of
//! being split on a best-effort basis.
//!
//! Parent files produced by the fetch step (`72_3_v2_parent.fits`) follow a
//! separate grammar handled by [`ParentName`].

use crate::error::{Result, TileCatalogError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// File extension shared by tiles and parent files
pub const FITS_EXTENSION: &str = "fits";

/// Instrument tag written by the splitter
pub const DEFAULT_INSTRUMENT_TAG: &str = "hsc_realistic";

/// HSC broad-band filters in the order they are stacked
pub const HSC_BANDS: [&str; 5] = ["G", "R", "I", "Z", "Y"];

/// Object ids pack the object index into the low six decimal digits
pub const OBJECT_ID_MULTIPLIER: u64 = 1_000_000;

const PARENT_SUFFIX: &str = "parent";

/// Catalog key shared by all bands of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileKey {
    /// Index of the parent field-of-view image (the snapshot)
    pub parent_tile_index: u32,
    /// Index of the object within that parent (the subhalo)
    pub object_index: u32,
}

impl TileKey {
    pub fn new(parent_tile_index: u32, object_index: u32) -> Self {
        Self {
            parent_tile_index,
            object_index,
        }
    }

    /// Integer catalog id: `parent_tile_index * 1_000_000 + object_index`.
    ///
    /// Returns None when the object index does not fit in six digits.
    pub fn object_id(&self) -> Option<u64> {
        let object_index = u64::from(self.object_index);
        if object_index >= OBJECT_ID_MULTIPLIER {
            return None;
        }
        Some(u64::from(self.parent_tile_index) * OBJECT_ID_MULTIPLIER + object_index)
    }

    /// Inverse of [`TileKey::object_id`].
    pub fn from_object_id(object_id: u64) -> Option<Self> {
        let parent = u32::try_from(object_id / OBJECT_ID_MULTIPLIER).ok()?;
        let object_index = (object_id % OBJECT_ID_MULTIPLIER) as u32;
        Some(Self::new(parent, object_index))
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.parent_tile_index, self.object_index)
    }
}

/// Photometric band label (e.g. `G`, `Z`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Band(String);

impl Band {
    /// Validate a band label: one or more ASCII alphanumerics.
    pub fn new(label: &str) -> std::result::Result<Self, String> {
        if label.is_empty() {
            return Err("band label is empty".to_string());
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("band label '{label}' must be ASCII alphanumeric"));
        }
        Ok(Self(label.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The five HSC bands in stacking order
    pub fn hsc_bands() -> Vec<Band> {
        HSC_BANDS.iter().map(|b| Band(b.to_string())).collect()
    }
}

impl TryFrom<String> for Band {
    type Error = String;

    fn try_from(label: String) -> std::result::Result<Self, Self::Error> {
        Band::new(&label)
    }
}

impl From<Band> for String {
    fn from(band: Band) -> Self {
        band.0
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Band::new(s.trim())
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Data release version, written as `v<digits>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTag(pub u32);

impl FromStr for VersionTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('v')
            .ok_or_else(|| format!("version tag '{s}' must start with 'v'"))?;
        parse_index(digits)
            .map(VersionTag)
            .map_err(|reason| format!("version tag '{s}': {reason}"))
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Parsed key of one single-band tile file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileName {
    pub key: TileKey,
    pub band: Band,
    pub version: VersionTag,
    pub instrument: String,
}

impl TileName {
    pub fn new(key: TileKey, band: Band, version: VersionTag, instrument: &str) -> Self {
        Self {
            key,
            band,
            version,
            instrument: instrument.to_string(),
        }
    }

    /// Parse a bare file name (no directory components).
    pub fn parse(file_name: &str) -> Result<Self> {
        let invalid = |reason: String| TileCatalogError::InvalidTileName {
            name: file_name.to_string(),
            reason,
        };

        let stem = strip_fits_extension(file_name).map_err(invalid)?;
        let fields: Vec<&str> = stem.splitn(5, '_').collect();
        if fields.len() != 5 {
            return Err(invalid(format!(
                "expected 5 underscore-separated fields, found {}",
                fields.len()
            )));
        }

        let parent_tile_index =
            parse_index(fields[0]).map_err(|r| invalid(format!("parent tile index: {r}")))?;
        let object_index =
            parse_index(fields[1]).map_err(|r| invalid(format!("object index: {r}")))?;
        let band = Band::new(fields[2]).map_err(invalid)?;
        let version = fields[3].parse::<VersionTag>().map_err(invalid)?;
        validate_instrument(fields[4]).map_err(invalid)?;

        Ok(Self {
            key: TileKey::new(parent_tile_index, object_index),
            band,
            version,
            instrument: fields[4].to_string(),
        })
    }

    /// Canonical file name for this key
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.{FITS_EXTENSION}",
            self.key, self.band, self.version, self.instrument
        )
    }
}

impl FromStr for TileName {
    type Err = TileCatalogError;

    fn from_str(s: &str) -> Result<Self> {
        TileName::parse(s)
    }
}

impl fmt::Display for TileName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Name of a downloaded multi-band parent file: `<snap>_<sub>_<version>_parent.fits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParentName {
    pub key: TileKey,
    pub version: VersionTag,
}

impl ParentName {
    pub fn new(key: TileKey, version: VersionTag) -> Self {
        Self { key, version }
    }

    pub fn parse(file_name: &str) -> Result<Self> {
        let invalid = |reason: String| TileCatalogError::InvalidTileName {
            name: file_name.to_string(),
            reason,
        };

        let stem = strip_fits_extension(file_name).map_err(invalid)?;
        let fields: Vec<&str> = stem.split('_').collect();
        if fields.len() != 4 || fields[3] != PARENT_SUFFIX {
            return Err(invalid(
                "parent files are named <parent>_<object>_<version>_parent.fits".to_string(),
            ));
        }

        let parent_tile_index =
            parse_index(fields[0]).map_err(|r| invalid(format!("parent tile index: {r}")))?;
        let object_index =
            parse_index(fields[1]).map_err(|r| invalid(format!("object index: {r}")))?;
        let version = fields[2].parse::<VersionTag>().map_err(invalid)?;

        Ok(Self::new(TileKey::new(parent_tile_index, object_index), version))
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{PARENT_SUFFIX}.{FITS_EXTENSION}",
            self.key, self.version
        )
    }

    /// Name of the tile this parent produces for `band`
    pub fn tile_name(&self, band: &Band, instrument: &str) -> TileName {
        TileName::new(self.key, band.clone(), self.version, instrument)
    }
}

fn strip_fits_extension(file_name: &str) -> std::result::Result<&str, String> {
    if !file_name.is_ascii() {
        return Err("name must be ASCII".to_string());
    }
    let (stem, extension) = file_name
        .rsplit_once('.')
        .ok_or_else(|| format!("missing .{FITS_EXTENSION} extension"))?;
    if extension != FITS_EXTENSION {
        return Err(format!(
            "extension must be .{FITS_EXTENSION}, found .{extension}"
        ));
    }
    if stem.contains('.') {
        return Err("name must contain a single '.'".to_string());
    }
    Ok(stem)
}

/// Canonical unsigned decimal: "0" or a non-zero digit followed by digits.
fn parse_index(field: &str) -> std::result::Result<u32, String> {
    if field.is_empty() {
        return Err("field is empty".to_string());
    }
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{field}' is not a decimal number"));
    }
    if field.len() > 1 && field.starts_with('0') {
        return Err(format!("'{field}' has a leading zero"));
    }
    field
        .parse::<u32>()
        .map_err(|_| format!("'{field}' is out of range"))
}

fn validate_instrument(tag: &str) -> std::result::Result<(), String> {
    if tag.is_empty() {
        return Err("instrument tag is empty".to_string());
    }
    for token in tag.split('_') {
        if token.is_empty() {
            return Err(format!("instrument tag '{tag}' has an empty token"));
        }
        if !token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(format!(
                "instrument tag '{tag}' may only contain alphanumerics, '-' and '_'"
            ));
        }
    }
    Ok(())
}
