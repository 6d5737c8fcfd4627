//! Coordinate reference system tags and reprojection.
//!
//! Only geographic WGS84 and spherical Web Mercator can be converted between.
//! Any other EPSG code is carried as a tag so it can be reported, but
//! reprojecting it fails with [`CrsError::Unsupported`].

use std::f64::consts::PI;
use std::fmt;

use geo::{Coord, MapCoords};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Equatorial radius used by EPSG:3857, in metres.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of the Web Mercator square.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// A coordinate reference system identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Crs {
    /// Geographic longitude/latitude on WGS84 (EPSG:4326)
    #[default]
    Wgs84,
    /// Spherical Web Mercator in metres (EPSG:3857)
    WebMercator,
    /// Any other EPSG code
    Epsg(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CrsError {
    #[error("cannot reproject from {from} to {to}")]
    Unsupported { from: Crs, to: Crs },
}

impl Crs {
    pub fn from_epsg(code: u32) -> Self {
        match code {
            4326 => Crs::Wgs84,
            // 900913 and 3785 are retired aliases still found in older files
            3857 | 900913 | 3785 => Crs::WebMercator,
            other => Crs::Epsg(other),
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::WebMercator => 3857,
            Crs::Epsg(code) => *code,
        }
    }

    /// Parse the CRS names found in GeoJSON and configuration files:
    /// `EPSG:3857`, `urn:ogc:def:crs:EPSG::3857`, `urn:ogc:def:crs:OGC:1.3:CRS84`,
    /// or a bare code.
    pub fn parse(value: &str) -> Option<Self> {
        let upper = value.trim().to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Some(Crs::Wgs84);
        }
        if let Ok(code) = upper.parse::<u32>() {
            return Some(Self::from_epsg(code));
        }
        if !upper.contains("EPSG") {
            return None;
        }

        upper
            .rsplit(':')
            .find(|part| !part.is_empty())
            .and_then(|code| code.parse::<u32>().ok())
            .map(Self::from_epsg)
    }

    /// Whether geometries in this CRS can be brought into WGS84.
    pub fn is_supported(&self) -> bool {
        transform_for(*self, Crs::Wgs84).is_ok()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Coordinate-level transform between two CRSs.
pub type CoordTransform = fn(Coord<f64>) -> Coord<f64>;

/// Look up the coordinate transform from `from` to `to`.
pub fn transform_for(from: Crs, to: Crs) -> Result<CoordTransform, CrsError> {
    match (from, to) {
        (a, b) if a == b => Ok(identity as CoordTransform),
        (Crs::Wgs84, Crs::WebMercator) => Ok(wgs84_to_web_mercator as CoordTransform),
        (Crs::WebMercator, Crs::Wgs84) => Ok(web_mercator_to_wgs84 as CoordTransform),
        _ => Err(CrsError::Unsupported { from, to }),
    }
}

/// Reproject any geometry into a new geometry in the target CRS.
///
/// The input is left untouched.
pub fn reproject<G>(geometry: &G, from: Crs, to: Crs) -> Result<G::Output, CrsError>
where
    G: MapCoords<f64, f64>,
{
    let transform = transform_for(from, to)?;
    Ok(geometry.map_coords(transform))
}

fn identity(coord: Coord<f64>) -> Coord<f64> {
    coord
}

fn wgs84_to_web_mercator(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let lat_rad = lat * PI / 180.0;

    Coord {
        x: EARTH_RADIUS * coord.x * PI / 180.0,
        y: EARTH_RADIUS * lat_rad.tan().asinh(),
    }
}

fn web_mercator_to_wgs84(coord: Coord<f64>) -> Coord<f64> {
    let lon = coord.x / EARTH_RADIUS * 180.0 / PI;
    let lat_rad = (coord.y / EARTH_RADIUS).sinh().atan();

    Coord {
        x: lon,
        y: lat_rad * 180.0 / PI,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};

    #[test]
    fn test_parse_crs_names() {
        assert_eq!(Crs::parse("EPSG:4326"), Some(Crs::Wgs84));
        assert_eq!(Crs::parse("epsg:3857"), Some(Crs::WebMercator));
        assert_eq!(
            Crs::parse("urn:ogc:def:crs:EPSG::3857"),
            Some(Crs::WebMercator)
        );
        assert_eq!(
            Crs::parse("urn:ogc:def:crs:OGC:1.3:CRS84"),
            Some(Crs::Wgs84)
        );
        assert_eq!(Crs::parse("2154"), Some(Crs::Epsg(2154)));
        assert_eq!(Crs::parse("+proj=longlat"), None);
    }

    #[test]
    fn test_supported_crs() {
        assert!(Crs::Wgs84.is_supported());
        assert!(Crs::WebMercator.is_supported());
        assert!(!Crs::Epsg(2154).is_supported());
    }

    #[test]
    fn test_known_mercator_values() {
        // 180°E maps onto the edge of the Mercator square
        let edge = wgs84_to_web_mercator(Coord { x: 180.0, y: 0.0 });
        assert!((edge.x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!(edge.y.abs() < 1e-9);
    }

    #[test]
    fn test_roundtrip_london() {
        let london = Coord {
            x: -0.1278,
            y: 51.5074,
        };
        let back = web_mercator_to_wgs84(wgs84_to_web_mercator(london));
        assert!((back.x - london.x).abs() < 1e-9);
        assert!((back.y - london.y).abs() < 1e-9);
    }

    #[test]
    fn test_reproject_leaves_source_untouched() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            vec![],
        );
        let projected = reproject(&poly, Crs::Wgs84, Crs::WebMercator).unwrap();
        assert_ne!(projected, poly);
        assert_eq!(poly.exterior().0[1], Coord { x: 1.0, y: 0.0 });
    }

    #[test]
    fn test_unsupported_reprojection() {
        let err = transform_for(Crs::Epsg(2154), Crs::Wgs84).unwrap_err();
        assert_eq!(
            err,
            CrsError::Unsupported {
                from: Crs::Epsg(2154),
                to: Crs::Wgs84
            }
        );
    }
}
