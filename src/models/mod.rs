//! Core data models for the enrichment pipeline.

pub mod attribute;
pub mod record;
pub mod report;

pub use attribute::{AttributeRecord, AttributeValue, RegionAttributes};
pub use record::AddressRecord;
pub use report::MatchReport;
