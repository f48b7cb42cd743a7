//! Dynamic R-tree over item bounding boxes.
//!
//! Nodes hold between `min_entries` and `max_entries` children (the root
//! may hold fewer). Overflowing nodes are split at the median of their
//! children's centers along the longer axis of the node. Insertion descends
//! into the child needing the least enlargement, preferring the smaller
//! child on ties. Every node's bounds is the union of its children and is
//! re-derived after each insert, split and removal.

use super::Bounded;
use crate::config::Config;
use crate::error::{GeoscopeError, Result};
use geoscope_types::{Bounds, Position};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

const DEFAULT_MAX_ENTRIES: usize = 9;
const DEFAULT_MIN_ENTRIES: usize = 4;

#[derive(Debug, Clone)]
struct Entry<T> {
    bounds: Bounds,
    item: T,
}

#[derive(Debug, Clone)]
enum NodeKind<T> {
    Leaf(Vec<Entry<T>>),
    Internal(Vec<Node<T>>),
}

#[derive(Debug, Clone)]
struct Node<T> {
    bounds: Bounds,
    kind: NodeKind<T>,
}

/// Introspection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub feature_count: usize,
    /// Levels from the root to the leaves; 0 for an empty index.
    pub depth: usize,
}

fn union_all<'a>(mut iter: impl Iterator<Item = &'a Bounds>) -> Option<Bounds> {
    let mut acc = *iter.next()?;
    for b in iter {
        acc.extend(b);
    }
    Some(acc)
}

/// Split `items` in two at the median center along the longer axis and
/// return the upper half.
fn split_off<E>(items: &mut Vec<E>, bounds_of: impl Fn(&E) -> &Bounds) -> Vec<E> {
    let Some(total) = union_all(items.iter().map(&bounds_of)) else {
        return Vec::new();
    };
    let by_x = total.width() >= total.height();
    items.sort_by(|a, b| {
        let (ca, cb) = (bounds_of(a).center(), bounds_of(b).center());
        if by_x {
            ca.x.total_cmp(&cb.x)
        } else {
            ca.y.total_cmp(&cb.y)
        }
    });
    let mid = items.len() / 2;
    items.split_off(mid)
}

impl<T> Node<T> {
    fn leaf(entries: Vec<Entry<T>>) -> Option<Self> {
        let bounds = union_all(entries.iter().map(|e| &e.bounds))?;
        Some(Self {
            bounds,
            kind: NodeKind::Leaf(entries),
        })
    }

    fn internal(children: Vec<Node<T>>) -> Option<Self> {
        let bounds = union_all(children.iter().map(|c| &c.bounds))?;
        Some(Self {
            bounds,
            kind: NodeKind::Internal(children),
        })
    }

    fn len(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(entries) => entries.len(),
            NodeKind::Internal(children) => children.len(),
        }
    }

    /// Re-derive bounds from the children; empty nodes keep their old box.
    fn refresh_bounds(&mut self) {
        let derived = match &self.kind {
            NodeKind::Leaf(entries) => union_all(entries.iter().map(|e| &e.bounds)),
            NodeKind::Internal(children) => union_all(children.iter().map(|c| &c.bounds)),
        };
        if let Some(bounds) = derived {
            self.bounds = bounds;
        }
    }

    fn choose_subtree(children: &[Node<T>], bounds: &Bounds) -> usize {
        let mut best = 0;
        let mut best_enlargement = f64::INFINITY;
        let mut best_area = f64::INFINITY;
        for (idx, child) in children.iter().enumerate() {
            let enlargement = child.bounds.enlargement(bounds);
            let area = child.bounds.area();
            if enlargement < best_enlargement
                || (enlargement == best_enlargement && area < best_area)
            {
                best = idx;
                best_enlargement = enlargement;
                best_area = area;
            }
        }
        best
    }

    /// Insert below this node; returns the new sibling when this node split.
    fn insert(&mut self, entry: Entry<T>, max_entries: usize) -> Option<Node<T>> {
        self.bounds.extend(&entry.bounds);
        let sibling = match &mut self.kind {
            NodeKind::Leaf(entries) => {
                entries.push(entry);
                if entries.len() > max_entries {
                    Node::leaf(split_off(entries, |e| &e.bounds))
                } else {
                    None
                }
            }
            NodeKind::Internal(children) => {
                let idx = Self::choose_subtree(children, &entry.bounds);
                if let Some(split) = children[idx].insert(entry, max_entries) {
                    children.push(split);
                }
                if children.len() > max_entries {
                    Node::internal(split_off(children, |c| &c.bounds))
                } else {
                    None
                }
            }
        };
        if sibling.is_some() {
            log::debug!("split R-tree node at {} children", max_entries + 1);
            self.refresh_bounds();
        }
        sibling
    }

    fn drain_entries(self, out: &mut Vec<Entry<T>>) {
        match self.kind {
            NodeKind::Leaf(entries) => out.extend(entries),
            NodeKind::Internal(children) => {
                for child in children {
                    child.drain_entries(out);
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(_) => 1,
            NodeKind::Internal(children) => 1 + children.first().map_or(0, Node::depth),
        }
    }
}

impl<T: PartialEq> Node<T> {
    /// Remove `item`, collecting the entries of any child that drops below
    /// `min_entries` into `orphans`.
    fn remove(
        &mut self,
        bounds: &Bounds,
        item: &T,
        min_entries: usize,
        orphans: &mut Vec<Entry<T>>,
    ) -> bool {
        let removed = match &mut self.kind {
            NodeKind::Leaf(entries) => match entries.iter().position(|e| e.item == *item) {
                Some(idx) => {
                    entries.remove(idx);
                    true
                }
                None => false,
            },
            NodeKind::Internal(children) => {
                let mut found = None;
                for (idx, child) in children.iter_mut().enumerate() {
                    if child.bounds.contains(bounds)
                        && child.remove(bounds, item, min_entries, orphans)
                    {
                        found = Some(idx);
                        break;
                    }
                }
                if let Some(idx) = found
                    && children[idx].len() < min_entries
                {
                    children.swap_remove(idx).drain_entries(orphans);
                }
                found.is_some()
            }
        };
        if removed {
            self.refresh_bounds();
        }
        removed
    }
}

/// A dynamic R-tree.
///
/// # Examples
///
/// ```
/// use geoscope::index::SpatialIndex;
/// use geoscope::{Bounds, Geometry, Position};
///
/// let mut index = SpatialIndex::new();
/// for i in 0..100 {
///     let p = Position::new(i as f64, (i % 10) as f64);
///     index.insert(Geometry::Point(p)).unwrap();
/// }
///
/// let hits = index.search(&Bounds::new(10.0, 0.0, 19.5, 9.0));
/// assert_eq!(hits.len(), 10);
/// assert!(index.stats().depth >= 2);
/// ```
#[derive(Debug, Clone)]
pub struct SpatialIndex<T> {
    root: Option<Node<T>>,
    len: usize,
    max_entries: usize,
    min_entries: usize,
}

impl<T> Default for SpatialIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SpatialIndex<T> {
    /// Empty index with 9/4 node capacity.
    pub fn new() -> Self {
        Self {
            root: None,
            len: 0,
            max_entries: DEFAULT_MAX_ENTRIES,
            min_entries: DEFAULT_MIN_ENTRIES,
        }
    }

    /// Empty index with node capacity taken from `config`.
    pub fn with_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_entries: config.index_max_entries,
            min_entries: config.index_min_entries,
            ..Self::new()
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }

    /// Bounds of everything indexed.
    pub fn bounds(&self) -> Option<Bounds> {
        self.root.as_ref().map(|r| r.bounds)
    }

    fn insert_entry(&mut self, entry: Entry<T>) {
        let root = match self.root.take() {
            None => Node {
                bounds: entry.bounds,
                kind: NodeKind::Leaf(vec![entry]),
            },
            Some(mut root) => match root.insert(entry, self.max_entries) {
                Some(sibling) => {
                    let bounds = root.bounds.union(&sibling.bounds);
                    Node {
                        bounds,
                        kind: NodeKind::Internal(vec![root, sibling]),
                    }
                }
                None => root,
            },
        };
        self.root = Some(root);
    }

    /// Items whose bounds intersect `query`, boundaries included.
    ///
    /// Equivalent to filtering every item by bounding-box overlap; callers
    /// refine with exact geometry tests when they need to.
    pub fn search(&self, query: &Bounds) -> Vec<&T> {
        if !query.is_finite() {
            log::warn!("Rejecting bounding box query with non-finite coordinates");
            return Vec::new();
        }
        let mut results = Vec::new();
        let mut stack: Vec<&Node<T>> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            if !node.bounds.intersects(query) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(entries) => results.extend(
                    entries
                        .iter()
                        .filter(|e| e.bounds.intersects(query))
                        .map(|e| &e.item),
                ),
                NodeKind::Internal(children) => stack.extend(children.iter()),
            }
        }
        results
    }

    /// Up to `k` items ordered by bounding-box distance from `position`.
    pub fn nearest(&self, position: &Position, k: usize) -> Vec<(&T, f64)> {
        let mut results = Vec::with_capacity(k.min(self.len));
        if k == 0 {
            return results;
        }
        let mut heap = BinaryHeap::new();
        if let Some(root) = &self.root {
            heap.push(Candidate {
                dist_sq: root.bounds.min_distance_sq(position),
                item: Item::Node(root),
            });
        }

        while let Some(Candidate { dist_sq, item }) = heap.pop() {
            match item {
                Item::Entry(entry) => {
                    results.push((&entry.item, dist_sq.sqrt()));
                    if results.len() == k {
                        break;
                    }
                }
                Item::Node(node) => match &node.kind {
                    NodeKind::Leaf(entries) => {
                        heap.extend(entries.iter().map(|e| Candidate {
                            dist_sq: e.bounds.min_distance_sq(position),
                            item: Item::Entry(e),
                        }))
                    }
                    NodeKind::Internal(children) => {
                        heap.extend(children.iter().map(|c| Candidate {
                            dist_sq: c.bounds.min_distance_sq(position),
                            item: Item::Node(c),
                        }))
                    }
                },
            }
        }
        results
    }

    /// Every indexed item, in tree order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut items = Vec::with_capacity(self.len);
        let mut stack: Vec<&Node<T>> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            match &node.kind {
                NodeKind::Leaf(entries) => items.extend(entries.iter().map(|e| &e.item)),
                NodeKind::Internal(children) => stack.extend(children.iter()),
            }
        }
        items.into_iter()
    }

    pub fn stats(&self) -> IndexStats {
        let Some(root) = &self.root else {
            return IndexStats::default();
        };
        let mut stats = IndexStats {
            depth: root.depth(),
            feature_count: self.len,
            ..IndexStats::default()
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            stats.node_count += 1;
            match &node.kind {
                NodeKind::Leaf(_) => stats.leaf_count += 1,
                NodeKind::Internal(children) => stack.extend(children.iter()),
            }
        }
        stats
    }
}

impl<T: Bounded> SpatialIndex<T> {
    /// Index an item under its bounds.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the item has no bounds or non-finite bounds.
    pub fn insert(&mut self, item: T) -> Result<()> {
        let bounds = item.bounds().ok_or_else(|| {
            GeoscopeError::InvalidInput("Cannot index an item without bounds".to_string())
        })?;
        if !bounds.is_finite() {
            return Err(GeoscopeError::InvalidInput(
                "Cannot index an item with non-finite bounds".to_string(),
            ));
        }
        self.insert_entry(Entry { bounds, item });
        self.len += 1;
        Ok(())
    }

    /// Build an index from many items, stopping at the first unboundable one.
    pub fn bulk_insert(&mut self, items: impl IntoIterator<Item = T>) -> Result<()> {
        items.into_iter().try_for_each(|item| self.insert(item))
    }
}

impl<T: Bounded + PartialEq> SpatialIndex<T> {
    /// Remove one item equal to `item`. Underfull nodes are dissolved and
    /// their entries reinserted; a root with a single child is collapsed.
    pub fn remove(&mut self, item: &T) -> bool {
        let Some(bounds) = item.bounds() else {
            return false;
        };
        let Some(root) = self.root.as_mut() else {
            return false;
        };

        let mut orphans = Vec::new();
        if !root.remove(&bounds, item, self.min_entries, &mut orphans) {
            return false;
        }
        self.len -= 1;

        // Shrink: drop an empty root, collapse single-child internal roots.
        loop {
            match self.root.take() {
                Some(node) if node.len() == 0 => break,
                Some(Node {
                    kind: NodeKind::Internal(mut children),
                    ..
                }) if children.len() == 1 => self.root = children.pop(),
                other => {
                    self.root = other;
                    break;
                }
            }
        }

        for entry in orphans {
            self.insert_entry(entry);
        }
        true
    }
}

impl<T: Bounded> FromIterator<T> for SpatialIndex<T> {
    /// Items without finite bounds are skipped.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut index = SpatialIndex::new();
        for item in iter {
            if index.insert(item).is_err() {
                log::warn!("Skipping item without finite bounds");
            }
        }
        index
    }
}

enum Item<'a, T> {
    Node(&'a Node<T>),
    Entry(&'a Entry<T>),
}

struct Candidate<'a, T> {
    dist_sq: f64,
    item: Item<'a, T>,
}

impl<T> PartialEq for Candidate<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.dist_sq == other.dist_sq
    }
}

impl<T> Eq for Candidate<'_, T> {}

impl<T> PartialOrd for Candidate<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Candidate<'_, T> {
    // Reversed so the max-heap pops the closest candidate first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.dist_sq.total_cmp(&self.dist_sq)
    }
}
