//! One row of the address table and its enrichment.

use crate::geometry::GeoPoint;

use super::{AttributeValue, RegionAttributes};

/// An input row plus whatever the batch learned about it.
///
/// `matched` is not stored: it is derived from the attribute map, so a
/// record is matched exactly when it carries at least one region attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressRecord {
    /// The text sent to the geocoder
    pub address: String,
    /// Original cells, in the input table's column order
    pub columns: Vec<String>,
    point: Option<GeoPoint>,
    attributes: RegionAttributes,
}

impl AddressRecord {
    pub fn new(address: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            address: address.into(),
            columns,
            point: None,
            attributes: RegionAttributes::new(),
        }
    }

    /// Record with only an address column, mostly for tests and library use.
    pub fn from_address(address: impl Into<String>) -> Self {
        let address = address.into();
        Self::new(address.clone(), vec![address])
    }

    pub fn point(&self) -> Option<&GeoPoint> {
        self.point.as_ref()
    }

    pub fn attributes(&self) -> &RegionAttributes {
        &self.attributes
    }

    pub fn matched(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// Value of a namespaced region column, `Null` when absent.
    pub fn region_value(&self, column: &str) -> &AttributeValue {
        static NULL: AttributeValue = AttributeValue::Null;
        self.attributes.get(column).unwrap_or(&NULL)
    }

    pub(crate) fn resolve(&mut self, point: GeoPoint, attributes: RegionAttributes) {
        self.point = Some(point);
        self.attributes = attributes;
    }
}
