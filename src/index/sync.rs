//! Thread-safe wrapper for shared index access.
//!
//! `SyncSpatialIndex` wraps a [`SpatialIndex`] in `Arc<RwLock<_>>`. Readers
//! run concurrently; inserts and removals take the write lock, which gives
//! the single-writer discipline the plain index expects from its callers.
//!
//! Enable the `sync` feature to use this module:
//!
//! ```toml
//! [dependencies]
//! geoscope = { version = "0.1", features = ["sync"] }
//! ```
//!
//! # Examples
//!
//! ```rust
//! use geoscope::index::SyncSpatialIndex;
//! use geoscope::{Bounds, Feature, Geometry, Position};
//! use std::sync::Arc;
//! use std::thread;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let index: SyncSpatialIndex<Arc<Feature>> = SyncSpatialIndex::new();
//! let writer = index.clone();
//!
//! let handle = thread::spawn(move || {
//!     let feature = Feature::new(Geometry::Point(Position::new(1.0, 1.0)));
//!     writer.insert(Arc::new(feature)).unwrap();
//! });
//! handle.join().unwrap();
//!
//! assert_eq!(index.search(&Bounds::new(0.0, 0.0, 2.0, 2.0)).len(), 1);
//! # Ok(())
//! # }
//! ```

use super::{Bounded, IndexStats, SpatialIndex};
use crate::config::Config;
use crate::error::Result;
use geoscope_types::{Bounds, Position};
use parking_lot::RwLock;
use std::sync::Arc;

/// Thread-safe wrapper around `SpatialIndex` using `Arc<RwLock<_>>`.
///
/// Queries return clones of the stored items, so `T` is usually a cheap
/// handle such as `Arc<Feature>`.
#[derive(Debug)]
pub struct SyncSpatialIndex<T> {
    inner: Arc<RwLock<SpatialIndex<T>>>,
}

impl<T> Clone for SyncSpatialIndex<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SyncSpatialIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncSpatialIndex<T> {
    pub fn new() -> Self {
        Self::from_index(SpatialIndex::new())
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        Ok(Self::from_index(SpatialIndex::with_config(config)?))
    }

    pub fn from_index(index: SpatialIndex<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn stats(&self) -> IndexStats {
        self.inner.read().stats()
    }

    /// Acquires a read lock for several queries under one lock.
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, SpatialIndex<T>> {
        self.inner.read()
    }

    /// Acquires a write lock for several updates under one lock.
    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, SpatialIndex<T>> {
        self.inner.write()
    }
}

impl<T: Clone> SyncSpatialIndex<T> {
    pub fn search(&self, query: &Bounds) -> Vec<T> {
        self.inner.read().search(query).into_iter().cloned().collect()
    }

    pub fn nearest(&self, position: &Position, k: usize) -> Vec<(T, f64)> {
        self.inner
            .read()
            .nearest(position, k)
            .into_iter()
            .map(|(item, dist)| (item.clone(), dist))
            .collect()
    }
}

impl<T: Bounded> SyncSpatialIndex<T> {
    pub fn insert(&self, item: T) -> Result<()> {
        self.inner.write().insert(item)
    }
}

impl<T: Bounded + PartialEq> SyncSpatialIndex<T> {
    pub fn remove(&self, item: &T) -> bool {
        self.inner.write().remove(item)
    }
}
