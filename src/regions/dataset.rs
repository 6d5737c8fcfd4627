//! Region datasets and their namespace prefixes.

use geo::{MultiPolygon, Point, Rect};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::geojson;
use crate::geometry::{envelope, envelope_contains, is_degenerate, point_within, reproject, Crs, CrsError};
use crate::models::AttributeRecord;

/// Directory name that anchors prefix derivation by default.
pub const DEFAULT_ROOT_MARKER: &str = "shape_files";

#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse GeoJSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed dataset {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("{} contains no polygon features", path.display())]
    Empty { path: PathBuf },

    #[error("{} uses {crs}, which cannot be reprojected to WGS84", path.display())]
    UnsupportedCrs { path: PathBuf, crs: Crs },

    #[error("{} is not under a `{marker}` directory", path.display())]
    MissingRootMarker { path: PathBuf, marker: String },

    #[error(
        "{} derives prefix `{prefix}`, already used by {}",
        path.display(),
        existing.display()
    )]
    PrefixCollision {
        path: PathBuf,
        prefix: String,
        existing: PathBuf,
    },

    #[error(
        "{} produces column `{column}`, already produced by {}",
        path.display(),
        existing.display()
    )]
    ColumnCollision {
        path: PathBuf,
        column: String,
        existing: PathBuf,
    },
}

/// A single region polygon with its attributes
#[derive(Debug, Clone)]
pub struct Region {
    pub geometry: MultiPolygon<f64>,
    pub attributes: AttributeRecord,
    envelope: Option<Rect<f64>>,
    degenerate: bool,
}

impl Region {
    pub fn new(geometry: MultiPolygon<f64>, attributes: AttributeRecord) -> Self {
        Self {
            envelope: envelope(&geometry),
            degenerate: is_degenerate(&geometry),
            geometry,
            attributes,
        }
    }

    /// Containment test; points on the boundary are inside.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        match &self.envelope {
            Some(rect) if !envelope_contains(rect, point) => false,
            _ => point_within(point, &self.geometry),
        }
    }

    /// True when the geometry failed validation at load time. Matches against
    /// such regions are best effort.
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    pub fn envelope(&self) -> Option<Rect<f64>> {
        self.envelope
    }

    /// A copy of this region with its geometry expressed in `to`.
    pub fn reprojected(&self, from: Crs, to: Crs) -> Result<Self, CrsError> {
        let geometry = reproject(&self.geometry, from, to)?;
        Ok(Self {
            envelope: envelope(&geometry),
            degenerate: self.degenerate,
            geometry,
            attributes: self.attributes.clone(),
        })
    }
}

/// An ordered collection of regions loaded from one file.
#[derive(Debug, Clone)]
pub struct RegionDataset {
    path: PathBuf,
    prefix: String,
    crs: Crs,
    regions: Vec<Region>,
    columns: Vec<String>,
}

impl RegionDataset {
    /// Assemble a dataset from already-built regions.
    pub fn new(
        path: impl Into<PathBuf>,
        prefix: impl Into<String>,
        crs: Crs,
        regions: Vec<Region>,
    ) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for region in &regions {
            for name in region.attributes.names() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }

        Self {
            path: path.into(),
            prefix: prefix.into(),
            crs,
            regions,
            columns,
        }
    }

    /// Load a GeoJSON dataset (optionally gzip-compressed).
    ///
    /// The prefix is derived from `path` relative to `root_marker`.
    pub fn load(path: &Path, root_marker: &str) -> Result<Self, DatasetLoadError> {
        let prefix =
            derive_prefix(path, root_marker).ok_or_else(|| DatasetLoadError::MissingRootMarker {
                path: path.to_path_buf(),
                marker: root_marker.to_string(),
            })?;

        let file = File::open(path).map_err(|source| DatasetLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader: Box<dyn Read> = if is_gzipped(path) {
            Box::new(flate2::read::GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let parsed = geojson::read_feature_collection(BufReader::new(reader), path)?;
        Self::from_parsed(path, prefix, parsed)
    }

    /// Build a dataset from GeoJSON text already in memory.
    pub fn from_geojson_str(
        path: &Path,
        prefix: impl Into<String>,
        text: &str,
    ) -> Result<Self, DatasetLoadError> {
        let parsed = geojson::parse_feature_collection(text, path)?;
        Self::from_parsed(path, prefix.into(), parsed)
    }

    fn from_parsed(
        path: &Path,
        prefix: String,
        parsed: geojson::ParsedCollection,
    ) -> Result<Self, DatasetLoadError> {
        if !parsed.crs.is_supported() {
            return Err(DatasetLoadError::UnsupportedCrs {
                path: path.to_path_buf(),
                crs: parsed.crs,
            });
        }
        if parsed.regions.is_empty() {
            return Err(DatasetLoadError::Empty {
                path: path.to_path_buf(),
            });
        }
        if parsed.skipped > 0 {
            warn!(
                "{}: skipped {} non-polygon features",
                path.display(),
                parsed.skipped
            );
        }

        let dataset = Self::new(path, prefix, parsed.crs, parsed.regions);

        let degenerate = dataset.regions.iter().filter(|r| r.is_degenerate()).count();
        if degenerate > 0 {
            warn!(
                "{}: {} of {} regions have invalid geometry, matches against them are low confidence",
                path.display(),
                degenerate,
                dataset.len()
            );
        }

        info!(
            "Loaded {} ({} regions, {}, prefix `{}`)",
            path.display(),
            dataset.len(),
            dataset.crs,
            dataset.prefix
        );
        debug!("  attributes: {:?}", dataset.columns);

        Ok(dataset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// All attribute names (geometry excluded), in first-appearance order.
    pub fn attribute_columns(&self) -> &[String] {
        &self.columns
    }

    /// Output column name for one of this dataset's attributes.
    pub fn namespaced(&self, attribute: &str) -> String {
        format!("{}_{}", self.prefix, attribute)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Derive a dataset's namespace prefix from its path.
///
/// The segments after the first `root_marker` segment are joined with `_`
/// and the file extension is dropped: `shape_files/zoning/districts.geojson`
/// becomes `zoning_districts`. Returns `None` when the marker is missing or
/// nothing follows it.
pub fn derive_prefix(path: &Path, root_marker: &str) -> Option<String> {
    let segments: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let start = segments.iter().position(|s| s == root_marker)? + 1;
    let mut tail: Vec<&str> = segments.iter().skip(start).map(String::as_str).collect();
    let file_name = tail.pop()?;

    let stem = strip_extension(file_name);
    tail.push(stem);
    Some(tail.join("_"))
}

fn strip_extension(file_name: &str) -> &str {
    let name = file_name.strip_suffix(".gz").unwrap_or(file_name);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

fn is_gzipped(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == "gz")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttributeValue;
    use geo::polygon;

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]])
    }

    #[test]
    fn test_prefix_from_nested_path() {
        let path = Path::new("/data/shape_files/zoning/districts.geojson");
        assert_eq!(
            derive_prefix(path, DEFAULT_ROOT_MARKER).as_deref(),
            Some("zoning_districts")
        );
    }

    #[test]
    fn test_prefix_directly_under_root() {
        let path = Path::new("shape_files/zones.geojson");
        assert_eq!(derive_prefix(path, "shape_files").as_deref(), Some("zones"));
    }

    #[test]
    fn test_prefix_strips_gzip_and_keeps_inner_dots() {
        assert_eq!(
            derive_prefix(Path::new("shape_files/a/b.geojson.gz"), "shape_files").as_deref(),
            Some("a_b")
        );
        assert_eq!(
            derive_prefix(Path::new("shape_files/house.2021.json"), "shape_files").as_deref(),
            Some("house.2021")
        );
    }

    #[test]
    fn test_prefix_uses_first_marker() {
        let path = Path::new("shape_files/x/shape_files/y.geojson");
        assert_eq!(
            derive_prefix(path, "shape_files").as_deref(),
            Some("x_shape_files_y")
        );
    }

    #[test]
    fn test_prefix_requires_marker_and_file() {
        assert_eq!(derive_prefix(Path::new("data/zones.geojson"), "shape_files"), None);
        assert_eq!(derive_prefix(Path::new("data/shape_files"), "shape_files"), None);
    }

    #[test]
    fn test_attribute_columns_first_appearance() {
        let r1: AttributeRecord = vec![
            ("name", AttributeValue::from("a")),
            ("code", AttributeValue::from(1i64)),
        ]
        .into_iter()
        .collect();
        let r2: AttributeRecord = vec![
            ("area", AttributeValue::from(2.5)),
            ("name", AttributeValue::from("b")),
        ]
        .into_iter()
        .collect();
        let dataset = RegionDataset::new(
            "shape_files/zones.geojson",
            "zones",
            Crs::Wgs84,
            vec![Region::new(square(0.0, 0.0, 1.0), r1), Region::new(square(2.0, 2.0, 1.0), r2)],
        );

        assert_eq!(dataset.attribute_columns(), &["name", "code", "area"]);
        assert_eq!(dataset.namespaced("name"), "zones_name");
    }

    #[test]
    fn test_region_contains_uses_closed_envelope() {
        let region = Region::new(square(0.0, 0.0, 1.0), AttributeRecord::new());
        assert!(region.contains(&Point::new(1.0, 1.0)));
        assert!(region.contains(&Point::new(0.5, 0.5)));
        assert!(!region.contains(&Point::new(-0.1, 0.5)));
    }

    #[test]
    fn test_from_geojson_rejects_empty_and_unsupported() {
        let empty = r#"{"type": "FeatureCollection", "features": []}"#;
        let err = RegionDataset::from_geojson_str(Path::new("e.geojson"), "e", empty).unwrap_err();
        assert!(matches!(err, DatasetLoadError::Empty { .. }));

        let lambert = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:2154"}},
            "features": [{"type": "Feature", "properties": {},
                "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}}]
        }"#;
        let err = RegionDataset::from_geojson_str(Path::new("l.geojson"), "l", lambert).unwrap_err();
        assert!(matches!(
            err,
            DatasetLoadError::UnsupportedCrs {
                crs: Crs::Epsg(2154),
                ..
            }
        ));
    }

    #[test]
    fn test_load_gzipped_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("shape_files").join("zoning");
        std::fs::create_dir_all(&root).unwrap();
        let path = root.join("districts.geojson.gz");

        let text = r#"{"type": "FeatureCollection", "features": [{"type": "Feature",
            "properties": {"district": "D1"},
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]]}}]}"#;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let dataset = RegionDataset::load(&path, DEFAULT_ROOT_MARKER).unwrap();
        assert_eq!(dataset.prefix(), "zoning_districts");
        assert_eq!(dataset.attribute_columns(), &["district"]);
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = RegionDataset::load(Path::new("shape_files/missing.geojson"), DEFAULT_ROOT_MARKER)
            .unwrap_err();
        assert!(matches!(err, DatasetLoadError::Io { .. }));
    }

    #[test]
    fn test_reprojected_region_is_a_copy() {
        let region = Region::new(square(0.0, 0.0, 1.0), AttributeRecord::new());
        let projected = region.reprojected(Crs::Wgs84, Crs::WebMercator).unwrap();

        assert_eq!(region.geometry, square(0.0, 0.0, 1.0));
        assert!(projected.contains(&Point::new(55_000.0, 55_000.0)));
        assert!(!region.contains(&Point::new(55_000.0, 55_000.0)));
    }
}
