//! # Geo Module
//!
//! County and city boundaries, and point-in-boundary tests.
//!
//! ## Coverage Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  covers(polygon, point)                                                 │
//! │                                                                         │
//! │   ┌──────────────────────┐                                              │
//! │   │ inside ✓             │   point on the outer ring  ✓                │
//! │   │       ┌──────┐       │   point inside a hole      ✗                │
//! │   │       │ hole │       │   point on a hole's ring   ✓                │
//! │   │       │  ✗   │       │   point outside            ✗                │
//! │   │       └──────┘       │                                              │
//! │   └──────────────────────┘                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Coordinates follow GeoJSON order: `[longitude, latitude]`.
//!
//! When boundaries of the same kind overlap, the first one in load order
//! wins. This keeps resolution deterministic.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::BoundaryError;
use crate::types::Jurisdiction;

/// Tolerance for "point lies on an edge".
const EDGE_EPSILON: f64 = 1e-12;

// =============================================================================
// Point
// =============================================================================

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }
}

// =============================================================================
// Boundary Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    County,
    City,
}

impl BoundaryKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BoundaryKind::County => "county",
            BoundaryKind::City => "city",
        }
    }
}

impl std::fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Bounding Box
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_longitude: f64,
    pub min_latitude: f64,
    pub max_longitude: f64,
    pub max_latitude: f64,
}

impl BoundingBox {
    /// Edge-inclusive containment.
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.longitude >= self.min_longitude
            && point.longitude <= self.max_longitude
            && point.latitude >= self.min_latitude
            && point.latitude <= self.max_latitude
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// One polygon: an outer ring and zero or more holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<[f64; 2]>,
    pub holes: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RingPosition {
    Inside,
    OnEdge,
    Outside,
}

impl Polygon {
    /// True when the point is inside or on the boundary and not strictly
    /// inside a hole.
    pub fn covers(&self, point: GeoPoint) -> bool {
        match locate(&self.exterior, point) {
            RingPosition::Outside => false,
            RingPosition::OnEdge => true,
            RingPosition::Inside => self
                .holes
                .iter()
                .all(|hole| locate(hole, point) != RingPosition::Inside),
        }
    }
}

/// A Polygon or MultiPolygon, normalized to a list of polygons.
///
/// The bounding box is computed once here; `Boundary::covers` checks it
/// before the ring test.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    polygons: Vec<Polygon>,
    bbox: BoundingBox,
}

impl Geometry {
    pub fn new(polygons: Vec<Polygon>) -> Result<Self, String> {
        if polygons.is_empty() {
            return Err("geometry has no polygons".to_string());
        }
        let bbox = outer_bbox(&polygons);
        Ok(Geometry { polygons, bbox })
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn covers(&self, point: GeoPoint) -> bool {
        self.polygons.iter().any(|polygon| polygon.covers(point))
    }

    /// Bounding box of all outer rings.
    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Parses a GeoJSON `Polygon` or `MultiPolygon` geometry object.
    pub fn from_geojson(value: &Value) -> Result<Self, String> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| "geometry has no type".to_string())?;
        let coordinates = value
            .get("coordinates")
            .ok_or_else(|| "geometry has no coordinates".to_string())?;

        let polygons = match kind {
            "Polygon" => vec![parse_polygon(coordinates)?],
            "MultiPolygon" => coordinates
                .as_array()
                .ok_or_else(|| "MultiPolygon coordinates must be an array".to_string())?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>, _>>()?,
            other => return Err(format!("unsupported geometry type {other}")),
        };

        Geometry::new(polygons)
    }

    /// Serializes back to a GeoJSON `MultiPolygon` object.
    pub fn to_geojson(&self) -> Value {
        let coordinates: Vec<Vec<Vec<[f64; 2]>>> = self
            .polygons
            .iter()
            .map(|polygon| {
                std::iter::once(polygon.exterior.clone())
                    .chain(polygon.holes.iter().cloned())
                    .collect()
            })
            .collect();

        json!({ "type": "MultiPolygon", "coordinates": coordinates })
    }
}

fn outer_bbox(polygons: &[Polygon]) -> BoundingBox {
    let mut bbox = BoundingBox {
        min_longitude: f64::INFINITY,
        min_latitude: f64::INFINITY,
        max_longitude: f64::NEG_INFINITY,
        max_latitude: f64::NEG_INFINITY,
    };
    for [lon, lat] in polygons.iter().flat_map(|p| p.exterior.iter().copied()) {
        bbox.min_longitude = bbox.min_longitude.min(lon);
        bbox.min_latitude = bbox.min_latitude.min(lat);
        bbox.max_longitude = bbox.max_longitude.max(lon);
        bbox.max_latitude = bbox.max_latitude.max(lat);
    }
    bbox
}

fn parse_polygon(value: &Value) -> Result<Polygon, String> {
    let mut rings = value
        .as_array()
        .ok_or_else(|| "polygon must be an array of rings".to_string())?
        .iter()
        .map(parse_ring);

    let exterior = rings
        .next()
        .ok_or_else(|| "polygon has no outer ring".to_string())??;
    let holes = rings.collect::<Result<Vec<_>, _>>()?;

    Ok(Polygon { exterior, holes })
}

fn parse_ring(value: &Value) -> Result<Vec<[f64; 2]>, String> {
    let positions = value
        .as_array()
        .ok_or_else(|| "ring must be an array of positions".to_string())?;

    let ring = positions
        .iter()
        .map(|position| {
            let pair = position
                .as_array()
                .filter(|pair| pair.len() >= 2)
                .ok_or_else(|| "position must have longitude and latitude".to_string())?;
            match (pair[0].as_f64(), pair[1].as_f64()) {
                (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => Ok([lon, lat]),
                _ => Err("position coordinates must be numbers".to_string()),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ring.len() < 3 {
        return Err(format!("ring has {} positions, need at least 3", ring.len()));
    }
    Ok(ring)
}

/// Ray casting with an explicit on-edge check.
fn locate(ring: &[[f64; 2]], point: GeoPoint) -> RingPosition {
    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = ring.len() - 1;

    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];

        if on_segment(x, y, xi, yi, xj, yj) {
            return RingPosition::OnEdge;
        }
        if (yi > y) != (yj > y) {
            let x_cross = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }

    if inside {
        RingPosition::Inside
    } else {
        RingPosition::Outside
    }
}

fn on_segment(x: f64, y: f64, ax: f64, ay: f64, bx: f64, by: f64) -> bool {
    let cross = (bx - ax) * (y - ay) - (by - ay) * (x - ax);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    x >= ax.min(bx) - EDGE_EPSILON
        && x <= ax.max(bx) + EDGE_EPSILON
        && y >= ay.min(by) - EDGE_EPSILON
        && y <= ay.max(by) + EDGE_EPSILON
}

// =============================================================================
// Boundary
// =============================================================================

/// A named county or city area.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    pub kind: BoundaryKind,
    pub name: String,
    pub geometry: Geometry,
}

impl Boundary {
    pub fn bbox(&self) -> BoundingBox {
        self.geometry.bbox()
    }

    pub fn covers(&self, point: GeoPoint) -> bool {
        self.bbox().contains(point) && self.geometry.covers(point)
    }
}

/// Parses a GeoJSON FeatureCollection into boundaries of one kind.
///
/// The feature name comes from the `NAME` property, falling back to `name`.
pub fn parse_feature_collection(
    kind: BoundaryKind,
    document: &str,
) -> Result<Vec<Boundary>, BoundaryError> {
    let value: Value = serde_json::from_str(document)?;

    if value.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(BoundaryError::NotFeatureCollection);
    }
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or(BoundaryError::NotFeatureCollection)?;

    features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let properties = feature.get("properties");
            let name = properties
                .and_then(|p| p.get("NAME").or_else(|| p.get("name")))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or(BoundaryError::MissingName { index })?;

            let geometry = feature
                .get("geometry")
                .filter(|g| !g.is_null())
                .ok_or_else(|| BoundaryError::InvalidGeometry {
                    index,
                    reason: "feature has no geometry".to_string(),
                })
                .and_then(|g| {
                    Geometry::from_geojson(g)
                        .map_err(|reason| BoundaryError::InvalidGeometry { index, reason })
                })?;

            Ok(Boundary {
                kind,
                name: name.to_string(),
                geometry,
            })
        })
        .collect()
}

// =============================================================================
// Boundary Set
// =============================================================================

/// All known boundaries, held in memory.
#[derive(Debug, Clone, Default)]
pub struct BoundarySet {
    counties: Vec<Boundary>,
    cities: Vec<Boundary>,
}

impl BoundarySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from GeoJSON county and city documents.
    pub fn from_geojson(counties: &str, cities: &str) -> Result<Self, BoundaryError> {
        let mut set = BoundarySet::new();
        set.extend(parse_feature_collection(BoundaryKind::County, counties)?);
        set.extend(parse_feature_collection(BoundaryKind::City, cities)?);
        Ok(set)
    }

    pub fn push(&mut self, boundary: Boundary) {
        match boundary.kind {
            BoundaryKind::County => self.counties.push(boundary),
            BoundaryKind::City => self.cities.push(boundary),
        }
    }

    pub fn county_count(&self) -> usize {
        self.counties.len()
    }

    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    /// Finds the first covering county and the first covering city.
    pub fn resolve(&self, point: GeoPoint) -> Jurisdiction {
        Jurisdiction::new(
            first_covering(&self.counties, point),
            first_covering(&self.cities, point),
        )
    }
}

impl Extend<Boundary> for BoundarySet {
    fn extend<I: IntoIterator<Item = Boundary>>(&mut self, iter: I) {
        for boundary in iter {
            self.push(boundary);
        }
    }
}

/// First boundary in order that covers the point.
pub fn first_covering(boundaries: &[Boundary], point: GeoPoint) -> Option<String> {
    boundaries
        .iter()
        .find(|boundary| boundary.covers(point))
        .map(|boundary| boundary.name.clone())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_hole() -> Geometry {
        Geometry::new(vec![Polygon {
            exterior: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
            holes: vec![vec![[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]]],
        }])
        .unwrap()
    }

    fn pt(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    #[test]
    fn test_interior_point_is_covered() {
        assert!(square_with_hole().covers(pt(2.0, 2.0)));
    }

    #[test]
    fn test_outer_edge_and_vertex_are_covered() {
        let geometry = square_with_hole();
        assert!(geometry.covers(pt(10.0, 5.0)));
        assert!(geometry.covers(pt(0.0, 0.0)));
        assert!(geometry.covers(pt(5.0, 10.0)));
    }

    #[test]
    fn test_hole_excluded_but_hole_edge_covered() {
        let geometry = square_with_hole();
        assert!(!geometry.covers(pt(5.0, 5.0)));
        assert!(geometry.covers(pt(4.0, 5.0)));
    }

    #[test]
    fn test_outside_point_is_not_covered() {
        let geometry = square_with_hole();
        assert!(!geometry.covers(pt(11.0, 5.0)));
        assert!(!geometry.covers(pt(-0.5, -0.5)));
    }

    #[test]
    fn test_bbox_spans_every_outer_ring() {
        let geometry = Geometry::new(vec![
            square_with_hole().polygons()[0].clone(),
            Polygon {
                exterior: vec![[20.0, -5.0], [25.0, -5.0], [25.0, 1.0], [20.0, -5.0]],
                holes: vec![],
            },
        ])
        .unwrap();

        let bbox = geometry.bbox();
        assert_eq!(
            bbox,
            BoundingBox {
                min_longitude: 0.0,
                min_latitude: -5.0,
                max_longitude: 25.0,
                max_latitude: 10.0,
            }
        );

        let boundary = Boundary {
            kind: BoundaryKind::County,
            name: "Split".to_string(),
            geometry,
        };
        assert_eq!(boundary.bbox(), bbox);
        assert!(boundary.covers(pt(24.0, -4.0)));
        // Inside the box, outside both polygons.
        assert!(!boundary.covers(pt(15.0, 0.0)));
    }

    #[test]
    fn test_multipolygon_geojson_round_trip() {
        let value = json!({
            "type": "MultiPolygon",
            "coordinates": [
                [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                [[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 5.0]]]
            ]
        });

        let geometry = Geometry::from_geojson(&value).unwrap();
        assert_eq!(geometry.polygons().len(), 2);
        assert_eq!(Geometry::from_geojson(&geometry.to_geojson()).unwrap(), geometry);

        let bbox = geometry.bbox();
        assert_eq!(bbox.min_longitude, 0.0);
        assert_eq!(bbox.max_latitude, 6.0);
    }

    #[test]
    fn test_rejects_unsupported_geometry() {
        let value = json!({ "type": "Point", "coordinates": [1.0, 2.0] });
        assert!(Geometry::from_geojson(&value).is_err());
    }

    #[test]
    fn test_feature_collection_names() {
        let document = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "NAME": "Upper" },
                    "geometry": { "type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]] }
                },
                {
                    "type": "Feature",
                    "properties": { "name": "Lower" },
                    "geometry": { "type": "Polygon", "coordinates": [[[0,-10],[10,-10],[10,0],[0,0],[0,-10]]] }
                }
            ]
        }"#;

        let boundaries = parse_feature_collection(BoundaryKind::County, document).unwrap();
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].name, "Upper");
        assert_eq!(boundaries[1].name, "Lower");
    }

    #[test]
    fn test_feature_without_name_is_rejected() {
        let document = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {}, "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] } }
            ]
        }"#;

        let err = parse_feature_collection(BoundaryKind::City, document).unwrap_err();
        assert!(matches!(err, BoundaryError::MissingName { index: 0 }));
    }

    #[test]
    fn test_resolve_first_match_wins_on_overlap() {
        let mut set = BoundarySet::new();
        set.push(Boundary {
            kind: BoundaryKind::County,
            name: "First".to_string(),
            geometry: square_with_hole(),
        });
        set.push(Boundary {
            kind: BoundaryKind::County,
            name: "Second".to_string(),
            geometry: square_with_hole(),
        });
        set.push(Boundary {
            kind: BoundaryKind::City,
            name: "Town".to_string(),
            geometry: Geometry::new(vec![Polygon {
                exterior: vec![[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0]],
                holes: vec![],
            }])
            .unwrap(),
        });

        let inside_town = set.resolve(pt(2.0, 2.0));
        assert_eq!(inside_town.county.as_deref(), Some("First"));
        assert_eq!(inside_town.city.as_deref(), Some("Town"));

        let county_only = set.resolve(pt(8.0, 8.0));
        assert_eq!(county_only.county.as_deref(), Some("First"));
        assert!(county_only.city.is_none());

        assert_eq!(set.resolve(pt(50.0, 50.0)), Jurisdiction::outside());
    }
}
