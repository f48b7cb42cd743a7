//! # geoscope-types
//!
//! Core data types for the geoscope toolkit.
//!
//! - **Position**: an x/y coordinate with optional z
//! - **Geometry**: the tagged union of Point, LineString, Polygon, their Multi*
//!   forms and GeometryCollection
//! - **Bounds**: axis-aligned bounding boxes
//! - **Feature**: a geometry plus an opaque property map and optional identity
//!
//! All types are serializable with Serde and convert to and from the `geo`
//! crate's primitives where a counterpart exists.
//!
//! ## Examples
//!
//! ```rust
//! use geoscope_types::bounds::Bounds;
//! use geoscope_types::geometry::Geometry;
//! use geoscope_types::position::Position;
//!
//! let nyc = Position::new(-74.0060, 40.7128);
//! let point = Geometry::Point(nyc);
//!
//! let manhattan = Bounds::new(-74.0479, 40.6829, -73.9067, 40.8820);
//! assert!(manhattan.contains_position(&nyc));
//! assert_eq!(point.position_count(), 1);
//! ```

pub mod bounds;
pub mod feature;
pub mod geometry;
pub mod position;

pub use bounds::Bounds;
pub use feature::{Feature, FeatureCollection, FeatureId};
pub use geometry::{Geometry, GeometryType, Ring};
pub use position::Position;
