//! Reprojected copies of dataset geometry, built once before matching.

use hashbrown::HashMap;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::geometry::{Crs, CrsError};
use crate::regions::{DatasetCatalog, Region, RegionDataset};

/// Cache of datasets reprojected into the CRSs points will arrive in.
///
/// Keyed by dataset position in the catalog and target CRS. Datasets already
/// in a target CRS are not copied. Read-only once built.
#[derive(Debug, Default)]
pub struct ProjectedLayers {
    layers: HashMap<(usize, Crs), Vec<Region>>,
    targets: Vec<Crs>,
}

impl ProjectedLayers {
    /// Reproject every dataset into every target CRS, in parallel.
    ///
    /// A target that any dataset cannot be reprojected into is dropped with a
    /// warning. Target order is kept; the first prepared target is canonical.
    pub fn build(catalog: &DatasetCatalog, targets: &[Crs]) -> Self {
        let datasets = catalog.datasets();

        let mut unique: Vec<Crs> = Vec::with_capacity(targets.len());
        for target in targets {
            if !unique.contains(target) {
                unique.push(*target);
            }
        }

        let jobs: Vec<(usize, Crs)> = unique
            .iter()
            .flat_map(|&target| {
                datasets
                    .iter()
                    .enumerate()
                    .filter(move |(_, d)| d.crs() != target)
                    .map(move |(idx, _)| (idx, target))
            })
            .collect();

        info!(
            "Preparing {} reprojected layers for {} datasets",
            jobs.len(),
            datasets.len()
        );

        let results: Vec<((usize, Crs), Result<Vec<Region>, CrsError>)> = jobs
            .par_iter()
            .map(|&(idx, target)| ((idx, target), project_dataset(&datasets[idx], target)))
            .collect();

        let mut layers = HashMap::with_capacity(results.len());
        let mut failed: Vec<Crs> = Vec::new();
        for ((idx, target), result) in results {
            match result {
                Ok(regions) => {
                    layers.insert((idx, target), regions);
                }
                Err(e) => {
                    warn!("Cannot prepare {} for {}: {}", datasets[idx].path().display(), target, e);
                    if !failed.contains(&target) {
                        failed.push(target);
                    }
                }
            }
        }

        layers.retain(|(_, target), _| !failed.contains(target));
        unique.retain(|target| !failed.contains(target));

        Self {
            layers,
            targets: unique,
        }
    }

    /// Regions of dataset `idx` expressed in `crs`, if that CRS was prepared.
    pub fn regions<'a>(
        &'a self,
        idx: usize,
        dataset: &'a RegionDataset,
        crs: Crs,
    ) -> Option<&'a [Region]> {
        if !self.targets.contains(&crs) {
            return None;
        }
        if dataset.crs() == crs {
            return Some(dataset.regions());
        }
        self.layers.get(&(idx, crs)).map(Vec::as_slice)
    }

    /// CRSs that lookups can be served in, canonical first.
    pub fn targets(&self) -> &[Crs] {
        &self.targets
    }

    pub fn is_prepared(&self, crs: Crs) -> bool {
        self.targets.contains(&crs)
    }

    /// Number of reprojected copies held.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

fn project_dataset(dataset: &RegionDataset, target: Crs) -> Result<Vec<Region>, CrsError> {
    dataset
        .regions()
        .iter()
        .map(|region| region.reprojected(dataset.crs(), target))
        .collect()
}
