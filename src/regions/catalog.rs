//! Discovery and loading of every region dataset under a root directory.

use hashbrown::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::dataset::{DatasetLoadError, RegionDataset};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("dataset directory not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("failed to walk dataset directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Dataset(#[from] DatasetLoadError),

    #[error("no usable region datasets were loaded")]
    NoDatasets,
}

/// What to do when one dataset fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetErrorPolicy {
    /// Log the failure and continue with the remaining datasets
    #[default]
    Skip,
    /// Stop on the first failure
    Abort,
}

impl FromStr for DatasetErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(DatasetErrorPolicy::Skip),
            "abort" => Ok(DatasetErrorPolicy::Abort),
            other => Err(format!("unknown dataset error policy `{}` (expected skip or abort)", other)),
        }
    }
}

/// File name suffixes recognised as region datasets
pub const DATASET_SUFFIXES: &[&str] = &[".geojson", ".json", ".geojson.gz"];

/// Recursively find dataset files under `root`, sorted by path.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    if !root.is_dir() {
        return Err(CatalogError::RootNotFound(root.to_path_buf()));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_dataset = {
            let name = entry.file_name().to_string_lossy();
            DATASET_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        };
        if is_dataset {
            paths.push(entry.into_path());
        }
    }
    // Plain string order, so `a-b.geojson` sorts before `a/x.geojson`
    paths.sort_by_cached_key(|p| p.to_string_lossy().into_owned());

    if paths.is_empty() {
        warn!("No region datasets found in {}", root.display());
    } else {
        info!("Found {} region datasets in {}", paths.len(), root.display());
    }

    Ok(paths)
}

/// The ordered set of loaded datasets, with unique prefixes.
#[derive(Debug, Clone, Default)]
pub struct DatasetCatalog {
    datasets: Vec<RegionDataset>,
}

impl DatasetCatalog {
    /// Wrap already-loaded datasets. Fails if two share a prefix.
    pub fn new(datasets: Vec<RegionDataset>) -> Result<Self, CatalogError> {
        let mut seen = Namespaces::default();
        for dataset in &datasets {
            seen.claim(dataset)?;
        }
        Ok(Self { datasets })
    }

    /// Load each path in order, applying `policy` to failures.
    ///
    /// Fails with [`CatalogError::NoDatasets`] when nothing could be loaded.
    pub fn load(
        paths: &[PathBuf],
        root_marker: &str,
        policy: DatasetErrorPolicy,
    ) -> Result<Self, CatalogError> {
        let mut datasets = Vec::with_capacity(paths.len());
        let mut seen = Namespaces::default();
        let mut failed = 0;

        for path in paths {
            let result = RegionDataset::load(path, root_marker)
                .and_then(|dataset| seen.claim(&dataset).map(|_| dataset));

            match result {
                Ok(dataset) => datasets.push(dataset),
                Err(e) if policy == DatasetErrorPolicy::Abort => return Err(e.into()),
                Err(e) => {
                    error!("Skipping dataset: {}", e);
                    failed += 1;
                }
            }
        }

        if datasets.is_empty() {
            return Err(CatalogError::NoDatasets);
        }
        if failed > 0 {
            warn!(
                "Continuing with {} of {} datasets ({} failed to load)",
                datasets.len(),
                paths.len(),
                failed
            );
        }

        Ok(Self { datasets })
    }

    /// Discover datasets under `root` and load them.
    pub fn discover(
        root: &Path,
        root_marker: &str,
        policy: DatasetErrorPolicy,
    ) -> Result<Self, CatalogError> {
        let paths = discover(root)?;
        Self::load(&paths, root_marker, policy)
    }

    pub fn datasets(&self) -> &[RegionDataset] {
        &self.datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Namespaced output columns: datasets in order, attributes in order.
    pub fn region_columns(&self) -> Vec<String> {
        self.datasets
            .iter()
            .flat_map(|d| d.attribute_columns().iter().map(move |a| d.namespaced(a)))
            .collect()
    }

    pub fn total_regions(&self) -> usize {
        self.datasets.iter().map(RegionDataset::len).sum()
    }
}

/// Prefixes and output columns already taken by earlier datasets.
#[derive(Default)]
struct Namespaces {
    prefixes: HashMap<String, PathBuf>,
    columns: HashMap<String, PathBuf>,
}

impl Namespaces {
    /// Reserve a dataset's prefix and columns, or report what it collides with.
    fn claim(&mut self, dataset: &RegionDataset) -> Result<(), DatasetLoadError> {
        if let Some(existing) = self.prefixes.get(dataset.prefix()) {
            return Err(DatasetLoadError::PrefixCollision {
                path: dataset.path().to_path_buf(),
                prefix: dataset.prefix().to_string(),
                existing: existing.clone(),
            });
        }

        let columns: Vec<String> = dataset
            .attribute_columns()
            .iter()
            .map(|a| dataset.namespaced(a))
            .collect();
        if let Some((column, existing)) = columns
            .iter()
            .find_map(|c| self.columns.get(c).map(|existing| (c, existing)))
        {
            return Err(DatasetLoadError::ColumnCollision {
                path: dataset.path().to_path_buf(),
                column: column.clone(),
                existing: existing.clone(),
            });
        }

        let path = dataset.path().to_path_buf();
        self.prefixes.insert(dataset.prefix().to_string(), path.clone());
        for column in columns {
            self.columns.insert(column, path.clone());
        }
        Ok(())
    }
}
