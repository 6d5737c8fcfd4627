//! Region datasets: polygons plus attribute records, loaded from GeoJSON.
//!
//! Each dataset carries a namespace prefix derived from its path so that
//! attributes from different datasets never share an output column.

mod catalog;
mod dataset;
mod geojson;

pub use catalog::{discover, CatalogError, DatasetCatalog, DatasetErrorPolicy, DATASET_SUFFIXES};
pub use dataset::{derive_prefix, DatasetLoadError, Region, RegionDataset, DEFAULT_ROOT_MARKER};
