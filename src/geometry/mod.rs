//! Geometry primitives: CRS-tagged points, containment and reprojection.

mod crs;

pub use crs::{reproject, transform_for, CoordTransform, Crs, CrsError, EARTH_RADIUS, MAX_MERCATOR_LAT};

use geo::{BoundingRect, Intersects, MultiPolygon, Point, Rect, Validation};

/// A resolved location tagged with the CRS its coordinates are expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    point: Point<f64>,
    crs: Crs,
}

impl GeoPoint {
    /// Create a WGS84 point from longitude and latitude in degrees.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self::with_crs(lon, lat, Crs::Wgs84)
    }

    pub fn with_crs(x: f64, y: f64, crs: Crs) -> Self {
        Self {
            point: Point::new(x, y),
            crs,
        }
    }

    pub fn x(&self) -> f64 {
        self.point.x()
    }

    pub fn y(&self) -> f64 {
        self.point.y()
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn point(&self) -> &Point<f64> {
        &self.point
    }

    /// Return a copy of this point expressed in `target`.
    pub fn to_crs(&self, target: Crs) -> Result<Self, CrsError> {
        let point = reproject(&self.point, self.crs, target)?;
        Ok(Self { point, crs: target })
    }
}

/// Point-in-polygon test. Points on a ring count as contained.
///
/// Invalid rings (self-intersecting, unclosed, spikes) are evaluated with the
/// same crossing rule as valid ones and never cause a panic.
pub fn point_within<G>(point: &Point<f64>, geometry: &G) -> bool
where
    G: Intersects<Point<f64>>,
{
    geometry.intersects(point)
}

/// Whether the geometry fails OGC validity (self-intersection, too few
/// points, non-finite coordinates) or is empty.
pub fn is_degenerate(geometry: &MultiPolygon<f64>) -> bool {
    geometry.0.is_empty() || !geometry.is_valid()
}

/// Closed-interval envelope test, used to skip the full ring test.
pub fn envelope_contains(envelope: &Rect<f64>, point: &Point<f64>) -> bool {
    let (min, max) = (envelope.min(), envelope.max());
    point.x() >= min.x && point.x() <= max.x && point.y() >= min.y && point.y() <= max.y
}

/// Bounding rectangle of a multipolygon, `None` when it has no coordinates.
pub fn envelope(geometry: &MultiPolygon<f64>) -> Option<Rect<f64>> {
    geometry.bounding_rect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, LineString, Polygon};

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    #[test]
    fn test_point_inside_and_outside() {
        let square = unit_square();
        assert!(point_within(&Point::new(0.5, 0.5), &square));
        assert!(!point_within(&Point::new(1.5, 0.5), &square));
    }

    #[test]
    fn test_boundary_counts_as_contained() {
        let square = unit_square();
        assert!(point_within(&Point::new(1.0, 0.5), &square));
        assert!(point_within(&Point::new(0.0, 0.0), &square));
    }

    #[test]
    fn test_hole_excludes_point() {
        let outer = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0), (1.0, 1.0)]);
        let donut = MultiPolygon::new(vec![Polygon::new(outer, vec![hole])]);

        assert!(!point_within(&Point::new(2.0, 2.0), &donut));
        assert!(point_within(&Point::new(0.5, 2.0), &donut));
    }

    #[test]
    fn test_bowtie_is_degenerate_but_testable() {
        // Self-intersecting figure-eight
        let bowtie = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ]]);

        assert!(is_degenerate(&bowtie));
        assert!(!is_degenerate(&unit_square()));
        assert!(point_within(&Point::new(1.5, 1.0), &bowtie));
        assert!(!point_within(&Point::new(5.0, 5.0), &bowtie));
    }

    #[test]
    fn test_envelope_is_closed() {
        let rect = envelope(&unit_square()).unwrap();
        assert!(envelope_contains(&rect, &Point::new(1.0, 1.0)));
        assert!(!envelope_contains(&rect, &Point::new(1.0, 1.000_001)));
    }

    #[test]
    fn test_point_to_crs() {
        let p = GeoPoint::new(0.0, 0.0).to_crs(Crs::WebMercator).unwrap();
        assert_eq!(p.crs(), Crs::WebMercator);
        assert!(p.x().abs() < 1e-9 && p.y().abs() < 1e-9);

        assert!(GeoPoint::new(0.0, 0.0).to_crs(Crs::Epsg(2154)).is_err());
    }
}
