//! GeoJSON conversion for geometries, features and feature collections.
//!
//! Incoming geometries are rebuilt through the [`crate::geometry::factory`]
//! constructors, so structurally malformed input (unclosed rings, one-point
//! lines, empty multi containers) fails with [`GeoscopeError::Geometry`]
//! rather than producing a geometry the rest of the toolkit cannot trust.
//! Unparseable JSON fails with [`GeoscopeError::Serialization`].

use crate::error::{GeoscopeError, Result};
use crate::geometry::factory::{
    create_geometry_collection, create_line_string, create_multi_line_string,
    create_multi_point, create_multi_polygon, create_point, create_polygon,
};
use ::geojson::{GeoJson, Value, feature::Id};
use geoscope_types::{Feature, FeatureCollection, FeatureId, Geometry, Position, Ring};
use serde_json::Number;

fn position_to_coords(position: &Position) -> Vec<f64> {
    match position.z {
        Some(z) => vec![position.x, position.y, z],
        None => vec![position.x, position.y],
    }
}

fn positions_to_coords(positions: &[Position]) -> Vec<Vec<f64>> {
    positions.iter().map(position_to_coords).collect()
}

fn rings_to_coords(rings: &[Ring]) -> Vec<Vec<Vec<f64>>> {
    rings.iter().map(|ring| positions_to_coords(ring)).collect()
}

fn coords_to_position(coords: &[f64]) -> Result<Position> {
    match *coords {
        [x, y] => Ok(Position::new(x, y)),
        [x, y, z, ..] => Ok(Position::new_3d(x, y, z)),
        _ => Err(GeoscopeError::Geometry(format!(
            "Position must have at least 2 coordinates, got {}",
            coords.len()
        ))),
    }
}

fn coords_to_positions(coords: &[Vec<f64>]) -> Result<Vec<Position>> {
    coords.iter().map(|c| coords_to_position(c)).collect()
}

fn coords_to_rings(coords: &[Vec<Vec<f64>>]) -> Result<Vec<Ring>> {
    coords.iter().map(|ring| coords_to_positions(ring)).collect()
}

/// Convert a geometry to its GeoJSON counterpart.
pub fn geometry_to_geojson(geometry: &Geometry) -> ::geojson::Geometry {
    let value = match geometry {
        Geometry::Point(p) => Value::Point(position_to_coords(p)),
        Geometry::LineString(line) => Value::LineString(positions_to_coords(line)),
        Geometry::Polygon(rings) => Value::Polygon(rings_to_coords(rings)),
        Geometry::MultiPoint(points) => Value::MultiPoint(positions_to_coords(points)),
        Geometry::MultiLineString(lines) => {
            Value::MultiLineString(lines.iter().map(|l| positions_to_coords(l)).collect())
        }
        Geometry::MultiPolygon(polygons) => {
            Value::MultiPolygon(polygons.iter().map(|p| rings_to_coords(p)).collect())
        }
        Geometry::GeometryCollection(members) => {
            Value::GeometryCollection(members.iter().map(geometry_to_geojson).collect())
        }
    };
    ::geojson::Geometry::new(value)
}

/// Convert a GeoJSON geometry, validating its structure.
pub fn geometry_from_geojson(geometry: &::geojson::Geometry) -> Result<Geometry> {
    match &geometry.value {
        Value::Point(coords) => Ok(create_point(coords_to_position(coords)?)),
        Value::LineString(coords) => create_line_string(coords_to_positions(coords)?),
        Value::Polygon(rings) => create_polygon(coords_to_rings(rings)?),
        Value::MultiPoint(coords) => create_multi_point(coords_to_positions(coords)?),
        Value::MultiLineString(lines) => create_multi_line_string(
            lines
                .iter()
                .map(|l| coords_to_positions(l))
                .collect::<Result<_>>()?,
        ),
        Value::MultiPolygon(polygons) => create_multi_polygon(
            polygons
                .iter()
                .map(|p| coords_to_rings(p))
                .collect::<Result<_>>()?,
        ),
        Value::GeometryCollection(members) => create_geometry_collection(
            members
                .iter()
                .map(geometry_from_geojson)
                .collect::<Result<_>>()?,
        ),
    }
}

fn id_to_geojson(id: &FeatureId) -> Id {
    match id {
        FeatureId::Number(n) => Id::Number(Number::from(*n)),
        FeatureId::String(s) => Id::String(s.clone()),
    }
}

fn id_from_geojson(id: &Id) -> FeatureId {
    match id {
        Id::String(s) => FeatureId::String(s.clone()),
        Id::Number(n) => match n.as_i64() {
            Some(i) => FeatureId::Number(i),
            None => FeatureId::String(n.to_string()),
        },
    }
}

pub fn feature_to_geojson(feature: &Feature) -> ::geojson::Feature {
    ::geojson::Feature {
        bbox: None,
        geometry: Some(geometry_to_geojson(&feature.geometry)),
        id: feature.id.as_ref().map(id_to_geojson),
        properties: Some(feature.properties.clone()),
        foreign_members: None,
    }
}

/// Convert a GeoJSON feature. Features without a geometry are rejected.
pub fn feature_from_geojson(feature: &::geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| GeoscopeError::Geometry("Feature has no geometry".to_string()))?;
    Ok(Feature {
        id: feature.id.as_ref().map(id_from_geojson),
        geometry: geometry_from_geojson(geometry)?,
        properties: feature.properties.clone().unwrap_or_default(),
    })
}

pub fn collection_to_geojson(collection: &FeatureCollection) -> ::geojson::FeatureCollection {
    ::geojson::FeatureCollection {
        bbox: None,
        features: collection.iter().map(feature_to_geojson).collect(),
        foreign_members: None,
    }
}

pub fn collection_from_geojson(collection: &::geojson::FeatureCollection) -> Result<FeatureCollection> {
    collection
        .features
        .iter()
        .map(feature_from_geojson)
        .collect::<Result<Vec<_>>>()
        .map(FeatureCollection::new)
}

/// Serialize a geometry as a GeoJSON string.
pub fn to_geojson_string(geometry: &Geometry) -> Result<String> {
    Ok(serde_json::to_string(&geometry_to_geojson(geometry))?)
}

pub fn collection_to_geojson_string(collection: &FeatureCollection) -> Result<String> {
    Ok(serde_json::to_string(&collection_to_geojson(collection))?)
}

/// Parse a GeoJSON geometry, or the geometry of a single feature.
///
/// # Examples
///
/// ```
/// use geoscope::geojson::parse_geometry;
/// use geoscope::{GeoscopeError, Geometry, Position};
///
/// let point = parse_geometry(r#"{"type":"Point","coordinates":[-74.006,40.7128]}"#).unwrap();
/// assert_eq!(point, Geometry::Point(Position::new(-74.006, 40.7128)));
///
/// let open_ring = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1]]]}"#;
/// assert!(matches!(parse_geometry(open_ring), Err(GeoscopeError::Geometry(_))));
/// ```
pub fn parse_geometry(input: &str) -> Result<Geometry> {
    match input.parse::<GeoJson>()? {
        GeoJson::Geometry(geometry) => geometry_from_geojson(&geometry),
        GeoJson::Feature(feature) => Ok(feature_from_geojson(&feature)?.geometry),
        GeoJson::FeatureCollection(_) => Err(GeoscopeError::Serialization(
            "Expected a GeoJSON geometry, found a FeatureCollection".to_string(),
        )),
    }
}

/// Parse any GeoJSON object into a feature collection. A bare geometry
/// becomes a single feature without properties.
pub fn parse_features(input: &str) -> Result<FeatureCollection> {
    match input.parse::<GeoJson>()? {
        GeoJson::Geometry(geometry) => Ok(FeatureCollection::new(vec![Feature::new(
            geometry_from_geojson(&geometry)?,
        )])),
        GeoJson::Feature(feature) => Ok(FeatureCollection::new(vec![feature_from_geojson(&feature)?])),
        GeoJson::FeatureCollection(collection) => collection_from_geojson(&collection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square() -> Geometry {
        Geometry::Polygon(vec![vec![
            Position::new(0.0, 0.0),
            Position::new(4.0, 0.0),
            Position::new(4.0, 4.0),
            Position::new(0.0, 4.0),
            Position::new(0.0, 0.0),
        ]])
    }

    #[test]
    fn test_geometry_round_trip_keeps_z() {
        let line = Geometry::LineString(vec![
            Position::new_3d(0.0, 0.0, 10.0),
            Position::new_3d(1.0, 1.0, 12.5),
        ]);
        let json = to_geojson_string(&line).unwrap();
        assert!(json.contains("LineString"));
        assert_eq!(parse_geometry(&json).unwrap(), line);
    }

    #[test]
    fn test_collection_with_nested_members() {
        let collection = Geometry::GeometryCollection(vec![
            square(),
            Geometry::MultiPoint(vec![Position::new(1.0, 1.0), Position::new(2.0, 2.0)]),
        ]);
        let converted = geometry_from_geojson(&geometry_to_geojson(&collection)).unwrap();
        assert_eq!(converted, collection);
    }

    #[test]
    fn test_malformed_geometries() {
        let short_line = r#"{"type":"LineString","coordinates":[[0,0]]}"#;
        assert!(matches!(parse_geometry(short_line), Err(GeoscopeError::Geometry(_))));

        let one_coord = r#"{"type":"Point","coordinates":[1]}"#;
        assert!(matches!(parse_geometry(one_coord), Err(GeoscopeError::Geometry(_))));

        let short_position = r#"{"type":"LineString","coordinates":[[0,0],[1]]}"#;
        assert!(matches!(parse_geometry(short_position), Err(GeoscopeError::Geometry(_))));
        assert!(matches!(parse_features(short_position), Err(GeoscopeError::Geometry(_))));

        let empty_multi = r#"{"type":"MultiPolygon","coordinates":[]}"#;
        assert!(matches!(parse_geometry(empty_multi), Err(GeoscopeError::Geometry(_))));

        assert!(matches!(parse_geometry("{not json"), Err(GeoscopeError::Serialization(_))));
    }

    #[test]
    fn test_features_and_ids() {
        let input = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": 7, "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                 "properties": {"name": "a"}},
                {"type": "Feature", "id": "b", "geometry": {"type": "Point", "coordinates": [3.0, 4.0]},
                 "properties": null}
            ]
        })
        .to_string();
        let collection = parse_features(&input).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.features[0].id, Some(FeatureId::Number(7)));
        assert_eq!(collection.features[0].property("name"), Some(&json!("a")));
        assert_eq!(collection.features[1].id, Some(FeatureId::String("b".into())));
        assert!(collection.features[1].properties.is_empty());

        let written = collection_to_geojson_string(&collection).unwrap();
        assert_eq!(parse_features(&written).unwrap(), collection);
    }

    #[test]
    fn test_feature_without_geometry_is_rejected() {
        let input = r#"{"type":"Feature","geometry":null,"properties":{}}"#;
        assert!(matches!(parse_features(input), Err(GeoscopeError::Geometry(_))));
    }

    #[test]
    fn test_bare_geometry_becomes_feature() {
        let collection = parse_features(&to_geojson_string(&square()).unwrap()).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.features[0].geometry, square());
        assert!(collection.features[0].id.is_none());
    }
}
