//! Command line arguments for hsc-pipeline

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tile_catalog::tile_name::DEFAULT_INSTRUMENT_TAG;
use tile_catalog::{Band, ImageSize, RuntimeConfig};

/// Default list of parent-file URLs, one per line
pub const DEFAULT_URL_LIST: &str = "all_file_urls.txt";

/// Default band list, in stacking order
pub const DEFAULT_BANDS: &str = "G,R,I,Z,Y";

#[derive(Parser, Debug)]
#[command(name = "hsc-pipeline")]
#[command(about = "Plan, split, inspect and crop HSC tile directories")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the parent files covered by one batch of the URL list
    Batch(BatchArgs),

    /// Split fetched parent files into single-band tiles
    Split(SplitArgs),

    /// Enumerate object groups and validate tile sizes
    Inspect(TileDirArgs),

    /// Write every object group cropped to a uniform size
    Crop {
        #[command(flatten)]
        tiles: TileDirArgs,

        /// Directory the cropped tiles are written to
        #[arg(long)]
        output_dir: PathBuf,
    },
}

/// Window of the URL list processed by one job
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// File with one parent-file URL per line
    #[arg(long, default_value = DEFAULT_URL_LIST)]
    pub url_list: PathBuf,

    /// Index of the first URL of this batch
    #[arg(long, default_value_t = 0)]
    pub batch_start: usize,

    /// Number of URLs in this batch (all remaining when omitted)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Directory holding the fetched parent files
    #[arg(long, default_value = ".")]
    pub parent_dir: PathBuf,

    /// Directory the single-band tiles are written to
    #[arg(long, default_value = "split_images")]
    pub split_output_dir: PathBuf,

    /// Delete each parent file once it has been split
    #[arg(long)]
    pub remove_parent: bool,

    /// Write a band-per-row catalog of the tiles to this path
    #[arg(long)]
    pub catalog_path: Option<PathBuf>,

    /// Bands to extract (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_BANDS)]
    pub bands: Vec<Band>,

    /// Instrument tag written into tile names
    #[arg(long, default_value = DEFAULT_INSTRUMENT_TAG)]
    pub instrument: String,
}

/// Where to find a tile directory and its catalog.
///
/// Flags given next to `--config` override the values from the file.
#[derive(Args, Debug, Clone)]
pub struct TileDirArgs {
    /// Runtime configuration JSON
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory of single-band tiles
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Catalog CSV paired with the tile directory
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Target size, as "width,height" or "widthxheight"
    #[arg(long)]
    pub crop_to: Option<ImageSize>,

    /// Bands every object must have (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub bands: Option<Vec<Band>>,
}

impl TileDirArgs {
    /// Merge the optional config file with the command line overrides
    pub fn runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => RuntimeConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => RuntimeConfig::default(),
        };
        if let Some(data_dir) = &self.data_dir {
            config = config.with_data_dir(data_dir.clone());
        }
        if let Some(catalog) = &self.catalog {
            config = config.with_catalog(catalog.clone());
        }
        if let Some(crop_to) = self.crop_to {
            config = config.with_crop_to(crop_to);
        }
        if let Some(bands) = &self.bands {
            config = config.with_required_bands(bands.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_defaults() {
        let cli = Cli::try_parse_from(["hsc-pipeline", "split"]).unwrap();
        let Command::Split(args) = cli.command else {
            panic!("expected split");
        };
        assert_eq!(args.batch.url_list, PathBuf::from(DEFAULT_URL_LIST));
        assert_eq!(args.batch.batch_start, 0);
        assert_eq!(args.batch.batch_size, None);
        assert_eq!(args.bands, Band::hsc_bands());
        assert_eq!(args.instrument, "hsc_realistic");
        assert!(!args.remove_parent);
    }

    #[test]
    fn test_split_batch_window() {
        let cli = Cli::try_parse_from([
            "hsc-pipeline",
            "split",
            "--batch-start",
            "200",
            "--batch-size",
            "100",
            "--bands",
            "G,R",
            "--remove-parent",
        ])
        .unwrap();
        let Command::Split(args) = cli.command else {
            panic!("expected split");
        };
        assert_eq!(args.batch.batch_start, 200);
        assert_eq!(args.batch.batch_size, Some(100));
        assert_eq!(args.bands.len(), 2);
        assert!(args.remove_parent);
    }

    #[test]
    fn test_rejects_bad_band_and_size() {
        assert!(Cli::try_parse_from(["hsc-pipeline", "split", "--bands", "G,R_1"]).is_err());
        assert!(Cli::try_parse_from(["hsc-pipeline", "inspect", "--crop-to", "0,50"]).is_err());
        assert!(Cli::try_parse_from(["hsc-pipeline", "crop"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runtime_config.json");
        RuntimeConfig::default()
            .with_data_dir(PathBuf::from("from_file"))
            .with_crop_to(ImageSize::from_width_height(64, 64))
            .save(&path)
            .unwrap();

        let cli = Cli::try_parse_from([
            "hsc-pipeline",
            "inspect",
            "--config",
            path.to_str().unwrap(),
            "--crop-to",
            "50x50",
        ])
        .unwrap();
        let Command::Inspect(tiles) = cli.command else {
            panic!("expected inspect");
        };
        let config = tiles.runtime_config().unwrap();
        assert_eq!(config.general.data_dir, PathBuf::from("from_file"));
        assert_eq!(
            config.data_set.crop_to,
            Some(ImageSize::from_width_height(50, 50))
        );
    }
}
