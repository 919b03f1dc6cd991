//! Parent-file URL lists and batch selection.
//!
//! Cluster jobs each take a window `[start, start + size)` of a shared URL
//! list. Every URL names a parent FITS file of the form
//!
//! ```text
//! https://host/api/<sim>/snapshots/<snapshot>/subhalos/<subhalo>/.../<file>_v2.fits
//! ```
//!
//! from which the parent tile index (snapshot), object index (subhalo) and
//! version tag are derived. Fetching the files is left to an external tool;
//! this module only plans which files a batch covers and what they are
//! called on disk.

use crate::error::{Result, TileCatalogError};
use crate::tile_name::{ParentName, TileKey, VersionTag};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;

/// Path segment holding the snapshot number (after splitting on '/')
const SNAPSHOT_SEGMENT: usize = 6;
/// Path segment holding the subhalo number
const SUBHALO_SEGMENT: usize = 8;

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"v\d+").expect("version pattern is valid"));

/// One parent file named by a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentSource {
    pub url: String,
    pub name: ParentName,
}

impl ParentSource {
    pub fn from_url(url: &str) -> Result<Self> {
        let invalid = |reason: String| TileCatalogError::InvalidUrl {
            url: url.to_string(),
            reason,
        };

        let parts: Vec<&str> = url.split('/').collect();
        if parts.len() <= SUBHALO_SEGMENT + 1 {
            return Err(invalid(format!(
                "expected at least {} path segments, found {}",
                SUBHALO_SEGMENT + 2,
                parts.len()
            )));
        }

        let snapshot = parts[SNAPSHOT_SEGMENT]
            .parse::<u32>()
            .map_err(|_| invalid(format!("snapshot '{}' is not a number", parts[SNAPSHOT_SEGMENT])))?;
        let subhalo = parts[SUBHALO_SEGMENT]
            .parse::<u32>()
            .map_err(|_| invalid(format!("subhalo '{}' is not a number", parts[SUBHALO_SEGMENT])))?;

        let file_name = parts[parts.len() - 1];
        let version = VERSION_PATTERN
            .find(file_name)
            .ok_or_else(|| invalid(format!("no version tag in '{file_name}'")))?
            .as_str()
            .parse::<VersionTag>()
            .map_err(invalid)?;

        Ok(Self {
            url: url.to_string(),
            name: ParentName::new(TileKey::new(snapshot, subhalo), version),
        })
    }

    /// File name the fetcher stores this parent under
    pub fn parent_file_name(&self) -> String {
        self.name.file_name()
    }
}

impl fmt::Display for ParentSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} <- {}", self.name.file_name(), self.url)
    }
}

/// Read a URL list: one URL per line, blank lines dropped.
pub fn load_url_list(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Window `[start, start + size)` of `urls`, clamped to the list.
///
/// `size = None` takes everything from `start` on. An empty window is not
/// an error.
pub fn select_batch(urls: &[String], start: usize, size: Option<usize>) -> &[String] {
    let begin = start.min(urls.len());
    let end = match size {
        Some(size) => begin.saturating_add(size).min(urls.len()),
        None => urls.len(),
    };
    &urls[begin..end]
}

/// Parse every URL of a batch
pub fn parse_batch(urls: &[String]) -> Result<Vec<ParentSource>> {
    urls.iter().map(|u| ParentSource::from_url(u)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str = "https://www.tng-project.org/api/TNG50-1/snapshots/72/subhalos/3/skirt/skirt_images_hsc_realistic_v2.fits";

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("u{i}")).collect()
    }

    #[test]
    fn test_parse_url_segments() {
        let source = ParentSource::from_url(URL).unwrap();
        assert_eq!(source.name.key, TileKey::new(72, 3));
        assert_eq!(source.name.version, VersionTag(2));
        assert_eq!(source.parent_file_name(), "72_3_v2_parent.fits");
    }

    #[test]
    fn test_parse_url_errors() {
        assert!(ParentSource::from_url("https://example.org/short").is_err());
        let no_version = URL.replace("_v2", "");
        assert!(ParentSource::from_url(&no_version).is_err());
        let bad_snapshot = URL.replace("/72/", "/xx/");
        assert!(ParentSource::from_url(&bad_snapshot).is_err());
    }

    #[test]
    fn test_select_batch_windows() {
        let list = urls(10);
        assert_eq!(select_batch(&list, 0, Some(3)), &list[0..3]);
        assert_eq!(select_batch(&list, 8, Some(5)), &list[8..10]);
        assert_eq!(select_batch(&list, 4, None), &list[4..]);
        assert!(select_batch(&list, 12, Some(2)).is_empty());
        assert!(select_batch(&list, 3, Some(0)).is_empty());
        assert_eq!(select_batch(&list, 9, Some(usize::MAX)).len(), 1);
    }

    #[test]
    fn test_load_url_list_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_file_urls.txt");
        std::fs::write(&path, format!("{URL}\n\n   \n  {URL}  \n")).unwrap();

        let list = load_url_list(&path).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1], URL);
        assert_eq!(parse_batch(&list).unwrap().len(), 2);
    }
}
