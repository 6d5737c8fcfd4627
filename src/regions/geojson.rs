//! GeoJSON FeatureCollection parsing into regions.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;

use super::dataset::{DatasetLoadError, Region};
use crate::geometry::Crs;
use crate::models::{AttributeRecord, AttributeValue};

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    crs: Option<RawCrs>,
    #[serde(default)]
    features: Vec<RawFeature>,
}

/// Legacy (pre RFC 7946) named CRS member
#[derive(Debug, Deserialize)]
struct RawCrs {
    properties: RawCrsProperties,
}

#[derive(Debug, Deserialize)]
struct RawCrsProperties {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

type RawRing = Vec<Vec<f64>>;

/// Regions read from one collection.
pub(crate) struct ParsedCollection {
    pub crs: Crs,
    pub regions: Vec<Region>,
    /// Features without polygonal geometry
    pub skipped: usize,
}

pub(crate) fn read_feature_collection<R: Read>(
    reader: R,
    path: &Path,
) -> Result<ParsedCollection, DatasetLoadError> {
    let raw: RawCollection =
        serde_json::from_reader(reader).map_err(|source| DatasetLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    parse_collection(raw, path)
}

pub(crate) fn parse_feature_collection(
    text: &str,
    path: &Path,
) -> Result<ParsedCollection, DatasetLoadError> {
    let raw: RawCollection =
        serde_json::from_str(text).map_err(|source| DatasetLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    parse_collection(raw, path)
}

fn parse_collection(raw: RawCollection, path: &Path) -> Result<ParsedCollection, DatasetLoadError> {
    let malformed = |reason: String| DatasetLoadError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    if raw.kind != "FeatureCollection" {
        return Err(malformed(format!(
            "expected a FeatureCollection, found `{}`",
            raw.kind
        )));
    }

    let crs = match raw.crs {
        Some(named) => Crs::parse(&named.properties.name)
            .ok_or_else(|| malformed(format!("unknown CRS `{}`", named.properties.name)))?,
        None => Crs::Wgs84,
    };

    let mut regions = Vec::with_capacity(raw.features.len());
    let mut skipped = 0;

    for (idx, feature) in raw.features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(g) => g,
            None => {
                skipped += 1;
                continue;
            }
        };

        let multi = match geometry.kind.as_str() {
            "Polygon" => {
                let rings: Vec<RawRing> = serde_json::from_value(geometry.coordinates)
                    .map_err(|e| malformed(format!("feature {}: {}", idx, e)))?;
                MultiPolygon::new(vec![build_polygon(rings)
                    .map_err(|reason| malformed(format!("feature {}: {}", idx, reason)))?])
            }
            "MultiPolygon" => {
                let polys: Vec<Vec<RawRing>> = serde_json::from_value(geometry.coordinates)
                    .map_err(|e| malformed(format!("feature {}: {}", idx, e)))?;
                let polygons = polys
                    .into_iter()
                    .map(build_polygon)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|reason| malformed(format!("feature {}: {}", idx, reason)))?;
                MultiPolygon::new(polygons)
            }
            _ => {
                skipped += 1;
                continue;
            }
        };

        let attributes: AttributeRecord = feature
            .properties
            .unwrap_or_default()
            .iter()
            .filter(|(name, _)| name.as_str() != "geometry")
            .map(|(name, value)| (name.as_str(), AttributeValue::from_json(value)))
            .collect();

        regions.push(Region::new(multi, attributes));
    }

    Ok(ParsedCollection {
        crs,
        regions,
        skipped,
    })
}

/// Build a polygon from GeoJSON rings (exterior first, then holes).
/// Rings are closed if the file left them open.
fn build_polygon(rings: Vec<RawRing>) -> Result<Polygon<f64>, String> {
    let mut rings = rings.into_iter().map(build_ring);

    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => return Err("polygon without rings".to_string()),
    };
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn build_ring(positions: RawRing) -> Result<LineString<f64>, String> {
    let coords = positions
        .into_iter()
        .map(|pos| match pos.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            [_, _, ..] => Err("non-finite coordinate".to_string()),
            _ => Err(format!("position with {} values", pos.len())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if coords.len() < 3 {
        return Err(format!("ring with {} positions", coords.len()));
    }

    Ok(LineString::new(coords))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    const ZONES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"zone_id": "7", "area": 1.5, "note": null},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"zone_id": "8"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[20, 20], [21, 20], [21, 21], [20, 21]]],
                        [[[30, 30], [31, 30], [31, 31], [30, 31], [30, 30]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {"kind": "marker"},
                "geometry": {"type": "Point", "coordinates": [5, 5]}
            }
        ]
    }"#;

    #[test]
    fn test_parse_polygons_and_skip_points() {
        let parsed = parse_feature_collection(ZONES, Path::new("zones.geojson")).unwrap();

        assert_eq!(parsed.crs, Crs::Wgs84);
        assert_eq!(parsed.regions.len(), 2);
        assert_eq!(parsed.skipped, 1);

        let first = &parsed.regions[0];
        assert_eq!(
            first.attributes.names().collect::<Vec<_>>(),
            vec!["zone_id", "area", "note"]
        );
        assert_eq!(first.attributes.get("note"), Some(&AttributeValue::Null));
        assert!(first.contains(&Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_open_rings_are_closed() {
        let parsed = parse_feature_collection(ZONES, Path::new("zones.geojson")).unwrap();
        let second = &parsed.regions[1];

        assert_eq!(second.geometry.0.len(), 2);
        assert!(second.geometry.0[0].exterior().is_closed());
        assert!(second.contains(&Point::new(20.5, 20.5)));
        assert!(second.contains(&Point::new(30.5, 30.5)));
        assert!(!second.contains(&Point::new(25.0, 25.0)));
    }

    #[test]
    fn test_named_crs() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
            "features": []
        }"#;
        let parsed = parse_feature_collection(text, Path::new("m.geojson")).unwrap();
        assert_eq!(parsed.crs, Crs::WebMercator);
    }

    #[test]
    fn test_rejects_non_collections_and_bad_rings() {
        let err = parse_feature_collection(r#"{"type": "Feature"}"#, Path::new("f.geojson"))
            .err()
            .unwrap();
        assert!(matches!(err, DatasetLoadError::Malformed { .. }));

        let bad = r#"{
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "properties": {},
                "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 1]]]}}]
        }"#;
        let err = parse_feature_collection(bad, Path::new("bad.geojson"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("ring with 2 positions"));
    }

    #[test]
    fn test_rejects_invalid_json() {
        let err = parse_feature_collection("{not json", Path::new("x.geojson"))
            .err()
            .unwrap();
        assert!(matches!(err, DatasetLoadError::Parse { .. }));
    }
}
