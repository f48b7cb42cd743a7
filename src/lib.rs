//! Geospatial analysis toolkit: geometry construction and measurement,
//! topological relationships, buffering/overlay/simplification, R-tree
//! indexing, routing, clustering, density, interpolation, terrain analysis
//! and coordinate reference system transforms.
//!
//! ```rust
//! use geoscope::geometry::{area, centroid, create_polygon};
//! use geoscope::projection::ProjectionRegistry;
//! use geoscope::Position;
//!
//! let square = create_polygon(vec![vec![
//!     Position::new(0.0, 0.0),
//!     Position::new(4.0, 0.0),
//!     Position::new(4.0, 4.0),
//!     Position::new(0.0, 4.0),
//!     Position::new(0.0, 0.0),
//! ]])?;
//! assert_eq!(area(&square), 16.0);
//! assert_eq!(centroid(&square), Some(Position::new(2.0, 2.0)));
//!
//! let registry = ProjectionRegistry::with_defaults();
//! let web = registry.transform(&Position::new(-122.4194, 37.7749), "EPSG:4326", "EPSG:3857")?;
//! assert!(web.x < -13_600_000.0);
//! # Ok::<(), geoscope::GeoscopeError>(())
//! ```

pub mod analysis;
pub mod cancel;
pub mod config;
pub mod error;
pub mod geojson;
pub mod geometry;
pub mod index;
pub mod projection;
pub mod query;
pub mod topology;
pub mod transform;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{GeoscopeError, Result};

pub use geoscope_types::{
    Bounds, Feature, FeatureCollection, FeatureId, Geometry, GeometryType, Position, Ring,
};

pub use index::SpatialIndex;
#[cfg(feature = "sync")]
pub use index::SyncSpatialIndex;

pub use topology::Relationship;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{CancelToken, Config, GeoscopeError, Result};

    pub use crate::{Bounds, Feature, FeatureCollection, FeatureId, Geometry, GeometryType, Position, Ring};

    pub use crate::geometry::{
        area, bounds, centroid, create_line_string, create_point, create_polygon, distance,
        length,
    };

    pub use crate::topology::{Relationship, contains, intersects, relate, within};

    pub use crate::transform::{BufferOptions, buffer};

    pub use crate::index::SpatialIndex;

    pub use crate::analysis::{DistanceMetric, Network, dbscan, kmeans};

    pub use crate::projection::ProjectionRegistry;

    pub use crate::query::{SpatialQuery, execute};
}
