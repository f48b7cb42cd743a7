//! Attribute and spatial filtering over a slice of features.
//!
//! A [`SpatialQuery`] combines an optional geometry filter (any of the eight
//! topological relationships), an optional WHERE clause, property
//! projection, ordering and a row limit. It deserializes from the camelCase
//! JSON shape used on the wire:
//!
//! ```json
//! {
//!   "geometry": {"type": "Polygon", "coordinates": [...]},
//!   "spatialRel": "intersects",
//!   "where": "population > 1000000",
//!   "fields": ["name", "population"],
//!   "returnGeometry": false,
//!   "orderBy": "population DESC",
//!   "limit": 10
//! }
//! ```

pub mod expr;

pub use expr::{CompareOp, Expr, Literal, Operand, parse_where};

use crate::error::{GeoscopeError, Result};
use crate::geometry::measure;
use crate::index::{Bounded, SpatialIndex};
use crate::topology::{Relationship, relate};
use geoscope_types::{Bounds, Feature, FeatureId, Geometry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Serde adapter writing the query geometry as GeoJSON.
mod geojson_geometry {
    use crate::geojson::{geometry_from_geojson, geometry_to_geojson};
    use geoscope_types::Geometry;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(geometry: &Option<Geometry>, serializer: S) -> Result<S::Ok, S::Error> {
        geometry.as_ref().map(geometry_to_geojson).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Geometry>, D::Error> {
        Option::<::geojson::Geometry>::deserialize(deserializer)?
            .map(|g| geometry_from_geojson(&g).map_err(D::Error::custom))
            .transpose()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialQuery {
    #[serde(default, with = "geojson_geometry", skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    /// Defaults to `intersects` when a geometry is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_rel: Option<Relationship>,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    /// Property names to keep; `None` or `["*"]` keeps all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_geometry: Option<bool>,
    /// Comma-separated `field [ASC|DESC]` terms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl SpatialQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn with_geometry(mut self, geometry: Geometry, relationship: Relationship) -> Self {
        self.geometry = Some(geometry);
        self.spatial_rel = Some(relationship);
        self
    }

    pub fn with_where(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_return_geometry(mut self, return_geometry: bool) -> Self {
        self.return_geometry = Some(return_geometry);
        self
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One feature in a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    pub properties: Map<String, Value>,
}

/// Position of a feature in the slice handed to [`index_features`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSlot {
    pub index: usize,
    pub bounds: Bounds,
}

impl Bounded for FeatureSlot {
    fn bounds(&self) -> Option<Bounds> {
        Some(self.bounds)
    }
}

/// Index a slice of features for use with [`execute`]. Features without
/// bounds (empty collections) are left out; no spatial filter can match them.
pub fn index_features(features: &[Feature]) -> Result<SpatialIndex<FeatureSlot>> {
    let mut index = SpatialIndex::new();
    for (i, feature) in features.iter().enumerate() {
        if let Some(bounds) = measure::bounds(&feature.geometry) {
            index.insert(FeatureSlot { index: i, bounds })?;
        }
    }
    Ok(index)
}

#[derive(Debug, Clone, PartialEq)]
struct SortKey {
    field: String,
    descending: bool,
}

fn parse_order_by(order_by: &str) -> Result<Vec<SortKey>> {
    order_by
        .split(',')
        .map(|term| {
            let words: Vec<&str> = term.split_whitespace().collect();
            let descending = match words.as_slice() {
                [_] => false,
                [_, dir] if dir.eq_ignore_ascii_case("asc") => false,
                [_, dir] if dir.eq_ignore_ascii_case("desc") => true,
                _ => {
                    return Err(GeoscopeError::InvalidInput(format!(
                        "Invalid orderBy term '{}'",
                        term.trim()
                    )));
                }
            };
            Ok(SortKey {
                field: words[0].to_string(),
                descending,
            })
        })
        .collect()
}

/// Numbers, then strings, then booleans; null and missing values last.
fn value_rank(value: Option<&Value>) -> u8 {
    match value {
        Some(Value::Number(_)) => 0,
        Some(Value::String(_)) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 3,
        Some(Value::Null) | None => 4,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => value_rank(a).cmp(&value_rank(b)),
    }
}

fn project(properties: &Map<String, Value>, fields: Option<&[String]>) -> Map<String, Value> {
    match fields {
        Some(fields) if !fields.iter().any(|f| f == "*") => fields
            .iter()
            .filter_map(|f| properties.get(f).map(|v| (f.clone(), v.clone())))
            .collect(),
        _ => properties.clone(),
    }
}

/// Run a query over `features`.
///
/// With an index built by [`index_features`] over the same slice, the
/// geometry filter only tests features whose bounds meet the query
/// geometry's bounds. Results keep input order unless `orderBy` is given;
/// sorting is stable and places null or missing values last.
///
/// # Errors
///
/// `InvalidInput` for a malformed WHERE clause or `orderBy`, or a
/// `spatialRel` without a geometry.
pub fn execute(
    query: &SpatialQuery,
    features: &[Feature],
    index: Option<&SpatialIndex<FeatureSlot>>,
) -> Result<Vec<QueryRecord>> {
    let clause = query.where_clause.as_deref().map(parse_where).transpose()?;
    let sort_keys = query.order_by.as_deref().map(parse_order_by).transpose()?;
    if query.geometry.is_none() && query.spatial_rel.is_some() {
        return Err(GeoscopeError::InvalidInput(
            "spatialRel requires a geometry".to_string(),
        ));
    }

    let candidates: Vec<usize> = match (&query.geometry, index) {
        (Some(geometry), Some(index)) => match measure::bounds(geometry) {
            Some(bounds) => {
                let mut hits: Vec<usize> = index.search(&bounds).iter().map(|s| s.index).collect();
                hits.sort_unstable();
                hits.retain(|&i| i < features.len());
                hits
            }
            None => Vec::new(),
        },
        _ => (0..features.len()).collect(),
    };
    // Disjoint must consider everything, including features the index skips.
    let candidates = if query.spatial_rel == Some(Relationship::Disjoint) {
        (0..features.len()).collect()
    } else {
        candidates
    };

    let relationship = query.spatial_rel.unwrap_or(Relationship::Intersects);
    let mut matched: Vec<&Feature> = candidates
        .into_iter()
        .map(|i| &features[i])
        .filter(|feature| match &query.geometry {
            Some(geometry) => relate(&feature.geometry, geometry, relationship),
            None => true,
        })
        .filter(|feature| clause.as_ref().is_none_or(|c| c.matches(&feature.properties)))
        .collect();

    if let Some(keys) = &sort_keys {
        matched.sort_by(|a, b| {
            keys.iter()
                .map(|key| {
                    let ordering = compare_values(a.property(&key.field), b.property(&key.field));
                    let nulls = matches!(a.property(&key.field), None | Some(Value::Null))
                        || matches!(b.property(&key.field), None | Some(Value::Null));
                    // Nulls stay last regardless of direction.
                    if key.descending && !nulls {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let return_geometry = query.return_geometry.unwrap_or(true);
    let limit = query.limit.unwrap_or(usize::MAX);
    Ok(matched
        .into_iter()
        .take(limit)
        .map(|feature| QueryRecord {
            id: feature.id.clone(),
            geometry: return_geometry.then(|| feature.geometry.clone()),
            properties: project(&feature.properties, query.fields.as_deref()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::create_rectangle;
    use geoscope_types::Position;
    use serde_json::json;

    fn cities() -> Vec<Feature> {
        [
            ("sf", -122.42, 37.77, json!({"name": "San Francisco", "pop": 808437})),
            ("oak", -122.27, 37.80, json!({"name": "Oakland", "pop": 433031})),
            ("sj", -121.89, 37.34, json!({"name": "San Jose", "pop": 1013240})),
            ("la", -118.24, 34.05, json!({"name": "Los Angeles", "pop": 3898747})),
            ("x", -120.0, 36.0, json!({"name": "Nowhere", "pop": null})),
        ]
        .into_iter()
        .map(|(id, x, y, props)| {
            let properties = match props {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            Feature::new(Geometry::Point(Position::new(x, y)))
                .with_id(id)
                .with_properties(properties)
        })
        .collect()
    }

    fn bay_area() -> Geometry {
        create_rectangle(&Bounds::new(-123.0, 37.0, -121.5, 38.5))
    }

    fn ids(records: &[QueryRecord]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.id.as_ref().map(|id| id.to_string()))
            .collect()
    }

    #[test]
    fn test_spatial_and_attribute_filter() {
        let features = cities();
        let query = SpatialQuery::new()
            .with_geometry(bay_area(), Relationship::Within)
            .with_where("pop > 500000");
        let records = execute(&query, &features, None).unwrap();
        assert_eq!(ids(&records), vec!["sf", "sj"]);
    }

    #[test]
    fn test_index_prefilter_matches_full_scan() {
        let features = cities();
        let index = index_features(&features).unwrap();
        for rel in Relationship::ALL {
            let query = SpatialQuery::new().with_geometry(bay_area(), rel);
            let scanned = execute(&query, &features, None).unwrap();
            let indexed = execute(&query, &features, Some(&index)).unwrap();
            assert_eq!(ids(&scanned), ids(&indexed), "{:?}", rel);
        }
    }

    #[test]
    fn test_order_fields_limit() {
        let features = cities();
        let query = SpatialQuery::new()
            .with_order_by("pop DESC")
            .with_fields(["name"])
            .with_return_geometry(false)
            .with_limit(3);
        let records = execute(&query, &features, None).unwrap();
        assert_eq!(ids(&records), vec!["la", "sj", "sf"]);
        assert!(records.iter().all(|r| r.geometry.is_none()));
        assert_eq!(records[0].properties.len(), 1);
        assert_eq!(records[0].properties["name"], json!("Los Angeles"));

        let ascending = execute(&SpatialQuery::new().with_order_by("pop"), &features, None).unwrap();
        assert_eq!(ids(&ascending), vec!["oak", "sf", "sj", "la", "x"]);
    }

    #[test]
    fn test_wire_format() {
        let json = json!({
            "geometry": {"type": "Polygon", "coordinates": [[[-123.0, 37.0], [-121.5, 37.0], [-121.5, 38.5], [-123.0, 38.5], [-123.0, 37.0]]]},
            "spatialRel": "contains",
            "where": "name LIKE 'San%'",
            "returnGeometry": false,
            "orderBy": "name asc",
            "limit": 5
        })
        .to_string();
        let query = SpatialQuery::from_json(&json).unwrap();
        assert_eq!(query.spatial_rel, Some(Relationship::Contains));
        assert_eq!(query.where_clause.as_deref(), Some("name LIKE 'San%'"));

        // A polygon "contains" no city points: the feature is the subject.
        assert!(execute(&query, &cities(), None).unwrap().is_empty());

        let round_trip = SpatialQuery::from_json(&query.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, query);
    }

    #[test]
    fn test_invalid_queries() {
        let features = cities();
        assert!(SpatialQuery::from_json(r#"{"spatialRel": "near"}"#).is_err());
        assert!(SpatialQuery::from_json(
            r#"{"geometry": {"type": "LineString", "coordinates": [[0, 0]]}}"#
        )
        .is_err());

        let bad_where = SpatialQuery::new().with_where("pop >>> 1");
        assert!(matches!(execute(&bad_where, &features, None), Err(GeoscopeError::InvalidInput(_))));

        let bad_order = SpatialQuery::new().with_order_by("pop sideways");
        assert!(execute(&bad_order, &features, None).is_err());

        let rel_only = SpatialQuery {
            spatial_rel: Some(Relationship::Intersects),
            ..SpatialQuery::default()
        };
        assert!(execute(&rel_only, &features, None).is_err());
    }
}
