//! Nominatim (OpenStreetMap) search client.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{GeocodeError, Geocoder};
use crate::geometry::GeoPoint;

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org";

/// Nominatim usage policy requires an identifying user agent.
pub const DEFAULT_USER_AGENT: &str = concat!("regionmatch/", env!("CARGO_PKG_VERSION"));

/// One search hit. Nominatim encodes coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// Geocoder using the Nominatim `/search` endpoint
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    search_url: Url,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Result<Self, GeocodeError> {
        let mut base = Url::parse(endpoint)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let search_url = base.join("search")?;

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, search_url })
    }

    pub fn search_url(&self) -> &Url {
        &self.search_url
    }

    fn request_url(&self, address: &str) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("q", address)
            .append_pair("format", "jsonv2")
            .append_pair("limit", "1");
        url
    }
}

impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let response = self.client.get(self.request_url(address)).send().await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status()));
        }

        let body = response.text().await?;
        let point = parse_search_response(&body)?;
        debug!("Geocoded {:?} -> {:?}", address, point);
        Ok(point)
    }
}

/// First hit of a `format=jsonv2` search response, if any.
fn parse_search_response(body: &str) -> Result<Option<GeoPoint>, GeocodeError> {
    let places: Vec<NominatimPlace> = serde_json::from_str(body)
        .map_err(|e| GeocodeError::Unavailable(format!("unexpected response: {}", e)))?;

    let place = match places.into_iter().next() {
        Some(p) => p,
        None => return Ok(None),
    };

    let lon = parse_coordinate(&place.lon)?;
    let lat = parse_coordinate(&place.lat)?;
    Ok(Some(GeoPoint::new(lon, lat)))
}

fn parse_coordinate(value: &str) -> Result<f64, GeocodeError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GeocodeError::InvalidCoordinate(value.to_string()))
}
