use crate::geometry::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identity of a feature: GeoJSON allows either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Number(i64),
    String(String),
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Number(n) => write!(f, "{}", n),
            FeatureId::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        FeatureId::String(s.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(s: String) -> Self {
        FeatureId::String(s)
    }
}

impl From<i64> for FeatureId {
    fn from(n: i64) -> Self {
        FeatureId::Number(n)
    }
}

/// A geometry with an opaque property mapping and optional identity.
///
/// Features are created by an external store; the toolkit only reads them.
///
/// # Examples
///
/// ```
/// use geoscope_types::feature::Feature;
/// use geoscope_types::geometry::Geometry;
/// use geoscope_types::position::Position;
/// use serde_json::json;
///
/// let park = Feature::new(Geometry::Point(Position::new(-73.96, 40.78)))
///     .with_id("central-park")
///     .with_property("visitors", json!(42_000_000));
/// assert_eq!(park.property("visitors"), Some(&json!(42_000_000)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry,
            properties: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// An ordered list of features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use serde_json::json;

    #[test]
    fn test_feature_builders() {
        let f = Feature::new(Geometry::Point(Position::new(1.0, 2.0)))
            .with_id(7)
            .with_property("name", json!("a"));
        assert_eq!(f.id, Some(FeatureId::Number(7)));
        assert_eq!(f.property("name"), Some(&json!("a")));
        assert!(f.property("missing").is_none());
    }

    #[test]
    fn test_feature_id_display() {
        assert_eq!(FeatureId::from("abc").to_string(), "abc");
        assert_eq!(FeatureId::from(12).to_string(), "12");
    }

    #[test]
    fn test_collection_from_iter() {
        let fc: FeatureCollection = (0..3)
            .map(|i| Feature::new(Geometry::Point(Position::new(i as f64, 0.0))).with_id(i))
            .collect();
        assert_eq!(fc.len(), 3);
        assert!(!fc.is_empty());
    }
}
