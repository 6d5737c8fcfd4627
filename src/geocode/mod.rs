//! Address resolution.
//!
//! The batch driver only sees the [`Geocoder`] trait. A failed lookup and an
//! address with no result are both "no point" for the record.

mod nominatim;

pub use nominatim::{NominatimGeocoder, DEFAULT_ENDPOINT, DEFAULT_USER_AGENT};

use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

use crate::geometry::GeoPoint;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoder returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid geocoder endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("geocoder returned an invalid coordinate `{0}`")]
    InvalidCoordinate(String),

    #[error("geocoder unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a free-text address to a point.
pub trait Geocoder {
    /// `Ok(None)` when the address has no result.
    fn resolve(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<GeoPoint>, GeocodeError>> + Send;
}

/// Geocoder backed by a fixed address table.
///
/// Addresses listed in `failing` return [`GeocodeError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct MemoryGeocoder {
    points: HashMap<String, GeoPoint>,
    failing: Vec<String>,
}

impl MemoryGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_point(mut self, address: impl Into<String>, point: GeoPoint) -> Self {
        self.points.insert(address.into(), point);
        self
    }

    pub fn with_failure(mut self, address: impl Into<String>) -> Self {
        self.failing.push(address.into());
        self
    }
}

impl Geocoder for MemoryGeocoder {
    async fn resolve(&self, address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        if self.failing.iter().any(|a| a == address) {
            return Err(GeocodeError::Unavailable(format!("lookup failed for {}", address)));
        }
        Ok(self.points.get(address).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_geocoder() {
        let geocoder = MemoryGeocoder::new()
            .with_point("A", GeoPoint::new(1.0, 2.0))
            .with_failure("C");

        assert_eq!(geocoder.resolve("A").await.unwrap(), Some(GeoPoint::new(1.0, 2.0)));
        assert_eq!(geocoder.resolve("B").await.unwrap(), None);
        assert!(matches!(
            geocoder.resolve("C").await,
            Err(GeocodeError::Unavailable(_))
        ));
    }
}
