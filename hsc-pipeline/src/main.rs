//! Command line front end for HSC tile directories.
//!
//! Subcommands:
//! - `batch`: print the parent files covered by a window of the URL list
//! - `split`: split fetched parent files into single-band tiles and a catalog
//! - `inspect`: enumerate object groups against the catalog and check sizes
//! - `crop`: write every object group cropped to `crop_to`
//!
//! Fetching parent files and training are done by external tools.

mod args;

use anyhow::{bail, Context, Result};
use args::{BatchArgs, Cli, Command, SplitArgs, TileDirArgs};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::Path;
use tile_catalog::export::export_cropped;
use tile_catalog::split::{split_batch, SplitOptions};
use tile_catalog::url_list::{load_url_list, parse_batch, select_batch, ParentSource};
use tile_catalog::{FitsTileReader, ObjectGroups};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Batch(batch) => run_batch(&batch),
        Command::Split(split) => run_split(&split),
        Command::Inspect(tiles) => run_inspect(&tiles),
        Command::Crop { tiles, output_dir } => run_crop(&tiles, &output_dir),
    }
}

/// Load the URL list and parse the window selected by `batch`
fn load_batch(batch: &BatchArgs) -> Result<Vec<ParentSource>> {
    let urls = load_url_list(&batch.url_list)
        .with_context(|| format!("Failed to read URL list {}", batch.url_list.display()))?;
    let window = select_batch(&urls, batch.batch_start, batch.batch_size);
    if window.is_empty() {
        warn!(
            "Batch starting at {} is empty ({} URLs in {})",
            batch.batch_start,
            urls.len(),
            batch.url_list.display()
        );
    } else {
        info!(
            "Batch {}..{} of {} URLs",
            batch.batch_start,
            batch.batch_start + window.len(),
            urls.len()
        );
    }
    Ok(parse_batch(window)?)
}

fn run_batch(batch: &BatchArgs) -> Result<()> {
    for source in load_batch(batch)? {
        println!("{source}");
    }
    Ok(())
}

fn run_split(args: &SplitArgs) -> Result<()> {
    let sources = load_batch(&args.batch)?;

    let mut options = SplitOptions::new(args.parent_dir.clone(), args.split_output_dir.clone());
    options.bands = args.bands.clone();
    options.instrument = args.instrument.clone();
    options.remove_parent = args.remove_parent;
    options.catalog_path = args.catalog_path.clone();

    let progress = ProgressBar::new(sources.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let summary = split_batch(&sources, &options, &progress).with_context(|| {
        format!(
            "Failed to split batch into {}",
            options.output_dir.display()
        )
    })?;
    progress.finish_and_clear();

    info!(
        "Split {} parents into {} tiles ({} parents missing, {} band extensions missing)",
        summary.parents_split, summary.tiles_written, summary.parents_missing, summary.bands_missing
    );
    if summary.parents_failed > 0 {
        warn!(
            "{} parent files could not be read and were left in place",
            summary.parents_failed
        );
    }
    if let Some(catalog_path) = &options.catalog_path {
        info!(
            "Catalog {} lists {} tiles",
            catalog_path.display(),
            summary.catalog_entries
        );
    }
    Ok(())
}

fn run_inspect(tiles: &TileDirArgs) -> Result<()> {
    let config = tiles.runtime_config()?;
    let reader = FitsTileReader;
    let mut groups = ObjectGroups::from_config(&config).with_context(|| {
        format!(
            "Failed to index {} against its catalog",
            config.general.data_dir.display()
        )
    })?;

    let mut valid = 0usize;
    let mut failures = 0usize;
    for group in groups.by_ref() {
        let checked = group.and_then(|group| match config.data_set.crop_to {
            Some(required) => group.validate_sizes(&reader, required).map(|_| group),
            None => Ok(group),
        });
        match checked {
            Ok(group) => {
                valid += 1;
                let bands: Vec<String> = group.bands().iter().map(|b| b.to_string()).collect();
                println!("{}\t{}", group.key(), bands.join(","));
            }
            Err(e) => {
                failures += 1;
                error!("{e}");
            }
        }
    }

    for skipped in groups.skipped_objects() {
        println!("skipped\t{}\t{}", skipped.key, skipped.reason);
    }
    println!(
        "{} of {} catalog objects usable, {} skipped by policy, {} failed",
        valid,
        groups.catalog().len(),
        groups.skipped(),
        failures
    );
    if groups.skipped() > 0 {
        let required: Vec<String> = config
            .data_set
            .required_bands
            .iter()
            .map(|b| b.to_string())
            .collect();
        warn!(
            "{} objects skipped with required bands {}; pass --bands to match the bands on disk",
            groups.skipped(),
            required.join(",")
        );
    }
    if failures > 0 {
        bail!("{failures} catalog objects failed inspection");
    }
    Ok(())
}

fn run_crop(tiles: &TileDirArgs, output_dir: &Path) -> Result<()> {
    let config = tiles.runtime_config()?;
    let summary = export_cropped(&config, output_dir, &FitsTileReader)
        .with_context(|| format!("Failed to export cropped tiles to {}", output_dir.display()))?;
    println!(
        "Wrote {} objects ({} tiles), skipped {}",
        summary.objects_written, summary.tiles_written, summary.objects_skipped
    );
    Ok(())
}
