//! The geometry sum type.
//!
//! Geometries are plain values. Structural invariants (minimum lengths, closed
//! rings, non-empty multi containers) are enforced by the factory in the main
//! `geoscope` crate; this module only describes the shapes.

use crate::position::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed sequence of positions bounding a polygon or a hole.
pub type Ring = Vec<Position>;

/// Discriminator for [`Geometry`] variants, named as in GeoJSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    /// The GeoJSON `type` member for this variant.
    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
        }
    }

    /// True for `Polygon` and `MultiPolygon`.
    pub fn is_polygonal(&self) -> bool {
        matches!(self, GeometryType::Polygon | GeometryType::MultiPolygon)
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A vector geometry.
///
/// Polygons hold their exterior ring first followed by any holes. The
/// exterior is conventionally counter-clockwise and holes clockwise.
///
/// # Examples
///
/// ```
/// use geoscope_types::geometry::{Geometry, GeometryType};
/// use geoscope_types::position::Position;
///
/// let line = Geometry::LineString(vec![Position::new(0.0, 0.0), Position::new(1.0, 1.0)]);
/// assert_eq!(line.geometry_type(), GeometryType::LineString);
/// assert_eq!(line.position_count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Ring>),
    MultiPoint(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Ring>>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    /// The variant discriminator.
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// Visit every position in document order.
    pub fn for_each_position<F: FnMut(&Position)>(&self, f: &mut F) {
        match self {
            Geometry::Point(p) => f(p),
            Geometry::LineString(line) | Geometry::MultiPoint(line) => line.iter().for_each(f),
            Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
                rings.iter().flatten().for_each(f)
            }
            Geometry::MultiPolygon(polygons) => polygons.iter().flatten().flatten().for_each(f),
            Geometry::GeometryCollection(geometries) => {
                for geometry in geometries {
                    geometry.for_each_position(f);
                }
            }
        }
    }

    /// Total number of positions, including ring closing duplicates.
    pub fn position_count(&self) -> usize {
        let mut count = 0;
        self.for_each_position(&mut |_| count += 1);
        count
    }

    /// True when the geometry holds no positions at all.
    pub fn is_empty(&self) -> bool {
        self.position_count() == 0
    }

    /// True for `Polygon` and `MultiPolygon`.
    pub fn is_polygonal(&self) -> bool {
        self.geometry_type().is_polygonal()
    }

    /// Polygons of a polygonal geometry as ring lists; empty for other kinds.
    pub fn polygons(&self) -> Vec<&[Ring]> {
        match self {
            Geometry::Polygon(rings) => vec![rings.as_slice()],
            Geometry::MultiPolygon(polygons) => polygons.iter().map(Vec::as_slice).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Position> for Geometry {
    fn from(position: Position) -> Self {
        Geometry::Point(position)
    }
}

impl From<&Geometry> for geo::Geometry<f64> {
    fn from(geometry: &Geometry) -> Self {
        fn line(positions: &[Position]) -> geo::LineString<f64> {
            positions.iter().map(Position::to_coord).collect()
        }
        fn polygon(rings: &[Ring]) -> geo::Polygon<f64> {
            let mut iter = rings.iter();
            let exterior = iter.next().map(|r| line(r)).unwrap_or_else(|| line(&[]));
            geo::Polygon::new(exterior, iter.map(|r| line(r)).collect())
        }

        match geometry {
            Geometry::Point(p) => geo::Geometry::Point(geo::Point::from(p.to_coord())),
            Geometry::LineString(positions) => geo::Geometry::LineString(line(positions)),
            Geometry::Polygon(rings) => geo::Geometry::Polygon(polygon(rings)),
            Geometry::MultiPoint(positions) => geo::Geometry::MultiPoint(
                positions
                    .iter()
                    .map(|p| geo::Point::from(p.to_coord()))
                    .collect(),
            ),
            Geometry::MultiLineString(lines) => geo::Geometry::MultiLineString(
                geo::MultiLineString::new(lines.iter().map(|l| line(l)).collect()),
            ),
            Geometry::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(
                geo::MultiPolygon::new(polygons.iter().map(|p| polygon(p)).collect()),
            ),
            Geometry::GeometryCollection(geometries) => geo::Geometry::GeometryCollection(
                geo::GeometryCollection::new_from(geometries.iter().map(Into::into).collect()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Ring> {
        vec![vec![
            Position::new(0.0, 0.0),
            Position::new(4.0, 0.0),
            Position::new(4.0, 4.0),
            Position::new(0.0, 4.0),
            Position::new(0.0, 0.0),
        ]]
    }

    #[test]
    fn test_geometry_type_names() {
        assert_eq!(GeometryType::MultiPolygon.name(), "MultiPolygon");
        assert_eq!(Geometry::Polygon(square()).geometry_type().to_string(), "Polygon");
        assert!(Geometry::Polygon(square()).is_polygonal());
        assert!(!Geometry::Point(Position::new(0.0, 0.0)).is_polygonal());
    }

    #[test]
    fn test_position_count_recurses_into_collections() {
        let collection = Geometry::GeometryCollection(vec![
            Geometry::Point(Position::new(0.0, 0.0)),
            Geometry::Polygon(square()),
            Geometry::MultiPolygon(vec![square(), square()]),
        ]);
        assert_eq!(collection.position_count(), 1 + 5 + 10);
        assert!(Geometry::GeometryCollection(vec![]).is_empty());
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Geometry::Polygon(square());
        let mut copy = original.clone();
        if let Geometry::Polygon(rings) = &mut copy {
            rings[0][1].x = 100.0;
        }
        assert_ne!(original, copy);
    }

    #[test]
    fn test_into_geo_geometry() {
        let geo_geom: geo::Geometry<f64> = (&Geometry::Polygon(square())).into();
        match geo_geom {
            geo::Geometry::Polygon(p) => assert_eq!(p.exterior().0.len(), 5),
            other => panic!("unexpected {:?}", other),
        }
    }
}
