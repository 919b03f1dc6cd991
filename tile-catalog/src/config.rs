//! Runtime configuration for tile enumeration and cropping.
//!
//! The configuration is an immutable value: it is loaded (or built from CLI
//! flags) once and passed by reference into every operation.
//!
//! ```json
//! {
//!   "general":  { "data_dir": "split_images" },
//!   "data_set": {
//!     "name": "HSCDataSet",
//!     "filter_catalog": "split_images/catalog.csv",
//!     "crop_to": [50, 50]
//!   }
//! }
//! ```

use crate::error::{Result, TileCatalogError};
use crate::image_size::ImageSize;
use crate::tile_name::Band;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Dataset implementation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataSetName {
    /// Per-band HSC tiles joined against a catalog
    #[default]
    #[serde(rename = "HSCDataSet")]
    Hsc,
    /// Generic per-band FITS tiles listed by a catalog
    #[serde(rename = "FitsImageDataSet")]
    FitsImage,
}

/// What to do when an object fails a per-object check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log a warning and continue with the next object
    Skip,
    /// Yield the error to the caller
    Error,
}

/// How to resolve several files sharing one key and band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlternatePolicy {
    /// Keep the highest version; ties go to the smallest instrument tag
    #[default]
    PreferLatest,
    /// Fail with `AmbiguousTile`
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root directory of image tiles
    pub data_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("split_images"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetConfig {
    pub name: DataSetName,
    /// Catalog record file
    pub filter_catalog: Option<PathBuf>,
    /// Target (width, height) for cropping; also the minimum tile size
    pub crop_to: Option<ImageSize>,
    /// Bands an object must have when the catalog does not list them
    pub required_bands: Vec<Band>,
    pub on_missing_band: FailurePolicy,
    pub on_catalog_mismatch: FailurePolicy,
    pub alternates: AlternatePolicy,
}

impl Default for DataSetConfig {
    fn default() -> Self {
        Self {
            name: DataSetName::default(),
            filter_catalog: None,
            crop_to: None,
            required_bands: Band::hsc_bands(),
            on_missing_band: FailurePolicy::Skip,
            on_catalog_mismatch: FailurePolicy::Error,
            alternates: AlternatePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub general: GeneralConfig,
    pub data_set: DataSetConfig,
}

impl RuntimeConfig {
    /// Load and validate a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RuntimeConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Cross-field checks that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.general.data_dir.as_os_str().is_empty() {
            return Err(TileCatalogError::Config(
                "general.data_dir must not be empty".to_string(),
            ));
        }
        if self.data_set.required_bands.is_empty() {
            return Err(TileCatalogError::Config(
                "data_set.required_bands must list at least one band".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for band in &self.data_set.required_bands {
            if !seen.insert(band) {
                return Err(TileCatalogError::Config(format!(
                    "data_set.required_bands lists {band} twice"
                )));
            }
        }
        if let Some(size) = self.data_set.crop_to {
            if size.width == 0 || size.height == 0 {
                return Err(TileCatalogError::Config(format!(
                    "data_set.crop_to must be non-zero, got {size}"
                )));
            }
        }
        Ok(())
    }

    /// Catalog path, or a configuration error when none is set
    pub fn catalog_path(&self) -> Result<&Path> {
        self.data_set.filter_catalog.as_deref().ok_or_else(|| {
            TileCatalogError::Config("data_set.filter_catalog is not set".to_string())
        })
    }

    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.general.data_dir = data_dir;
        self
    }

    pub fn with_catalog(mut self, catalog: PathBuf) -> Self {
        self.data_set.filter_catalog = Some(catalog);
        self
    }

    pub fn with_crop_to(mut self, crop_to: ImageSize) -> Self {
        self.data_set.crop_to = Some(crop_to);
        self
    }

    pub fn with_required_bands(mut self, bands: Vec<Band>) -> Self {
        self.data_set.required_bands = bands;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_recognized_keys() {
        let json = r#"{
            "general": { "data_dir": "/data/split_images" },
            "data_set": {
                "name": "FitsImageDataSet",
                "filter_catalog": "/data/split_images/catalog.csv",
                "crop_to": [50, 50]
            }
        }"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.general.data_dir, PathBuf::from("/data/split_images"));
        assert_eq!(config.data_set.name, DataSetName::FitsImage);
        assert_eq!(
            config.catalog_path().unwrap(),
            Path::new("/data/split_images/catalog.csv")
        );
        assert_eq!(
            config.data_set.crop_to,
            Some(ImageSize::from_width_height(50, 50))
        );
        // unspecified keys fall back to defaults
        assert_eq!(config.data_set.required_bands, Band::hsc_bands());
        assert_eq!(config.data_set.on_missing_band, FailurePolicy::Skip);
        assert_eq!(config.data_set.alternates, AlternatePolicy::PreferLatest);
    }

    #[test]
    fn test_unknown_dataset_name_rejected() {
        let json = r#"{ "data_set": { "name": "SomethingElse" } }"#;
        assert!(serde_json::from_str::<RuntimeConfig>(json).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_bands() {
        let config = RuntimeConfig::default().with_required_bands(vec![
            Band::new("G").unwrap(),
            Band::new("G").unwrap(),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_catalog_is_config_error() {
        let config = RuntimeConfig::default();
        assert!(matches!(
            config.catalog_path(),
            Err(TileCatalogError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runtime_config.json");

        let config = RuntimeConfig::default()
            .with_data_dir(dir.path().to_path_buf())
            .with_catalog(dir.path().join("catalog.csv"))
            .with_crop_to(ImageSize::from_width_height(64, 64));
        config.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
