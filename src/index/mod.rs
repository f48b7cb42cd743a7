//! Bounding-box spatial index.
//!
//! [`SpatialIndex`] is a dynamic R-tree keyed by the bounds of whatever it
//! stores. Storing `Arc<Feature>` keeps the index to bounds plus a shared
//! reference; the caller keeps ownership of the features themselves.

pub mod rtree;
#[cfg(feature = "sync")]
pub mod sync;

pub use rtree::{IndexStats, SpatialIndex};
#[cfg(feature = "sync")]
pub use sync::SyncSpatialIndex;

use crate::geometry::measure;
use geoscope_types::{Bounds, Feature, Geometry, Position};
use std::sync::Arc;

/// Anything with an axis-aligned bounding box.
pub trait Bounded {
    /// `None` when there is nothing to bound (an empty collection).
    fn bounds(&self) -> Option<Bounds>;
}

impl Bounded for Bounds {
    fn bounds(&self) -> Option<Bounds> {
        Some(*self)
    }
}

impl Bounded for Position {
    fn bounds(&self) -> Option<Bounds> {
        Some(Bounds::from_position(self))
    }
}

impl Bounded for Geometry {
    fn bounds(&self) -> Option<Bounds> {
        measure::bounds(self)
    }
}

impl Bounded for Feature {
    fn bounds(&self) -> Option<Bounds> {
        measure::bounds(&self.geometry)
    }
}

impl<T: Bounded + ?Sized> Bounded for Arc<T> {
    fn bounds(&self) -> Option<Bounds> {
        (**self).bounds()
    }
}

impl<T: Bounded + ?Sized> Bounded for &T {
    fn bounds(&self) -> Option<Bounds> {
        (**self).bounds()
    }
}
