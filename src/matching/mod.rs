//! Region matching: which regions, across all datasets, contain a point.
//!
//! Datasets are reprojected once when the matcher is built; lookups only read
//! shared state, so one matcher can serve many concurrent lookups.

mod layers;

pub use layers::ProjectedLayers;

use tracing::{debug, warn};

use crate::geometry::{Crs, GeoPoint};
use crate::models::RegionAttributes;
use crate::regions::DatasetCatalog;

/// Point-in-polygon matcher over an ordered list of datasets
#[derive(Debug)]
pub struct RegionMatcher {
    catalog: DatasetCatalog,
    layers: ProjectedLayers,
}

impl RegionMatcher {
    /// Build a matcher for WGS84 points.
    pub fn new(catalog: DatasetCatalog) -> Self {
        Self::with_targets(catalog, &[Crs::Wgs84])
    }

    /// Build a matcher whose datasets are pre-reprojected into each of
    /// `targets`. The first target is canonical: points in any other CRS are
    /// reprojected into it before matching.
    pub fn with_targets(catalog: DatasetCatalog, targets: &[Crs]) -> Self {
        let layers = ProjectedLayers::build(&catalog, targets);
        Self { catalog, layers }
    }

    /// Merge the attributes of every region containing `point`.
    ///
    /// Keys are `"{prefix}_{attribute}"`. All datasets are searched. Within a
    /// dataset, when several regions contain the point, the last one wins:
    /// every column of that dataset takes the last region's value, or null
    /// where it has none. An empty map means no region contains the point.
    pub fn match_point(&self, point: &GeoPoint) -> RegionAttributes {
        let mut result = RegionAttributes::new();

        let point = match self.in_prepared_crs(point) {
            Some(p) => p,
            None => return result,
        };
        let crs = point.crs();

        for (idx, dataset) in self.catalog.datasets().iter().enumerate() {
            let regions = match self.layers.regions(idx, dataset, crs) {
                Some(r) => r,
                None => continue,
            };

            for region in regions {
                if !region.contains(point.point()) {
                    continue;
                }
                if region.is_degenerate() {
                    debug!(
                        "Low-confidence match in {}: region has invalid geometry",
                        dataset.prefix()
                    );
                }
                // The region's record replaces the dataset's whole slice of
                // the row; attributes it lacks come out null
                for column in dataset.attribute_columns() {
                    let value = region.attributes.get(column).cloned().unwrap_or_default();
                    result.insert(dataset.namespaced(column), value);
                }
            }
        }

        debug!(
            "Match at ({}, {}) {}: {} attributes",
            point.x(),
            point.y(),
            crs,
            result.len()
        );

        result
    }

    fn in_prepared_crs(&self, point: &GeoPoint) -> Option<GeoPoint> {
        if self.layers.is_prepared(point.crs()) {
            return Some(*point);
        }

        let canonical = match self.layers.targets().first() {
            Some(c) => *c,
            None => {
                warn!("No prepared CRS layers; cannot match point");
                return None;
            }
        };

        match point.to_crs(canonical) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Cannot match point in {}: {}", point.crs(), e);
                None
            }
        }
    }

    pub fn catalog(&self) -> &DatasetCatalog {
        &self.catalog
    }

    /// Output region columns, fixed for the lifetime of the matcher.
    pub fn region_columns(&self) -> Vec<String> {
        self.catalog.region_columns()
    }

    pub fn dataset_count(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn layers(&self) -> &ProjectedLayers {
        &self.layers
    }
}
