//! regionmatch - attach region attributes to geocoded addresses
//!
//! Loads polygon datasets, geocodes each address, and records the attributes
//! of every region containing the resulting point. Used by the `enrich` binary.

pub mod batch;
pub mod config;
pub mod geocode;
pub mod geometry;
pub mod matching;
pub mod models;
pub mod regions;
pub mod table;

pub use batch::{run_batch, BatchError, BatchOptions, BatchProgress, BatchRunner};
pub use geocode::{GeocodeError, Geocoder, MemoryGeocoder, NominatimGeocoder};
pub use geometry::{Crs, GeoPoint};
pub use matching::RegionMatcher;
pub use models::{AddressRecord, AttributeValue, MatchReport, RegionAttributes};
pub use regions::{DatasetCatalog, DatasetErrorPolicy, RegionDataset};
