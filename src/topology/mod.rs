//! Topological relationships between geometries.
//!
//! Every relationship starts with a bounding-box rejection and then falls
//! back to point-in-polygon, point-on-line and segment intersection tests.
//! The derived relationships are defined in terms of `intersects` and
//! `contains`:
//!
//! - `overlaps`: intersects, and neither contains the other
//! - `touches`: intersects but does not overlap
//! - `crosses`: intersects, and neither contains nor lies within the other
//! - `disjoint`: does not intersect
//! - `equals`: same type with the same position sequence

pub mod predicates;
pub mod relate;

use crate::error::{GeoscopeError, Result};
use geoscope_types::Geometry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use predicates::{
    line_intersection, locate_in_ring, orientation, point_in_geometry, point_in_polygon,
    point_on_line, point_on_segment, segments_intersect, RingLocation,
};
pub use relate::{
    contains, crosses, disjoint, equals, intersects, overlaps, relate, touches, within,
};

/// The eight supported spatial relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Intersects,
    Contains,
    Within,
    Overlaps,
    Touches,
    Crosses,
    Disjoint,
    Equals,
}

impl Relationship {
    pub const ALL: [Relationship; 8] = [
        Relationship::Intersects,
        Relationship::Contains,
        Relationship::Within,
        Relationship::Overlaps,
        Relationship::Touches,
        Relationship::Crosses,
        Relationship::Disjoint,
        Relationship::Equals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Intersects => "intersects",
            Relationship::Contains => "contains",
            Relationship::Within => "within",
            Relationship::Overlaps => "overlaps",
            Relationship::Touches => "touches",
            Relationship::Crosses => "crosses",
            Relationship::Disjoint => "disjoint",
            Relationship::Equals => "equals",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = GeoscopeError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Relationship::ALL
            .into_iter()
            .find(|r| r.as_str() == lower)
            .ok_or_else(|| GeoscopeError::Topology(format!("Unknown relationship '{}'", s)))
    }
}

/// Evaluate a relationship given by name.
pub fn relate_named(a: &Geometry, b: &Geometry, relationship: &str) -> Result<bool> {
    let relationship: Relationship = relationship.parse()?;
    Ok(relate(a, b, relationship))
}
