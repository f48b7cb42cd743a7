//! Boolean overlay of polygonal geometries.
//!
//! Results are built by gathering the relevant vertices and edge
//! intersection points and wrapping them in a Graham-scan convex hull. This
//! is exact for convex inputs; concave inputs yield a convex
//! over-approximation of the true result.

use crate::error::{GeoscopeError, Result};
use crate::geometry::ops::{extract_positions, segments};
use crate::topology::{contains, intersects, line_intersection, point_in_geometry};
use geoscope_types::{Feature, Geometry, Position, Ring};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::cmp::Ordering;

/// Convex hull of a point set as a closed counter-clockwise ring, or `None`
/// when fewer than three non-collinear points remain.
///
/// # Examples
///
/// ```
/// use geoscope::transform::overlay::convex_hull;
/// use geoscope::Position;
///
/// let points = [
///     Position::new(0.0, 0.0),
///     Position::new(2.0, 0.0),
///     Position::new(1.0, 1.0),
///     Position::new(2.0, 2.0),
///     Position::new(0.0, 2.0),
/// ];
/// let hull = convex_hull(&points).unwrap();
/// assert_eq!(hull.len(), 5);
/// ```
pub fn convex_hull(points: &[Position]) -> Option<Ring> {
    let mut pts: Vec<Position> = points.iter().map(Position::to_2d).collect();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
    });
    pts.dedup_by(|a, b| a.equals_2d(b));
    if pts.len() < 3 {
        return None;
    }

    // Pivot: lowest y, then lowest x.
    let pivot_idx = pts
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.y.partial_cmp(&b.y)
                .unwrap_or(Ordering::Equal)
                .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
        })
        .map(|(i, _)| i)?;
    let pivot = pts.swap_remove(pivot_idx);

    pts.sort_by(|a, b| {
        let cross = cross(&pivot, a, b);
        if cross > 0.0 {
            Ordering::Less
        } else if cross < 0.0 {
            Ordering::Greater
        } else {
            dist_sq(&pivot, a)
                .partial_cmp(&dist_sq(&pivot, b))
                .unwrap_or(Ordering::Equal)
        }
    });

    let mut stack: Vec<Position> = vec![pivot];
    for p in pts {
        while stack.len() >= 2 && cross(&stack[stack.len() - 2], &stack[stack.len() - 1], &p) <= 0.0
        {
            stack.pop();
        }
        stack.push(p);
    }

    if stack.len() < 3 {
        return None;
    }
    stack.push(pivot);
    Some(stack)
}

#[inline]
fn cross(o: &Position, a: &Position, b: &Position) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

#[inline]
fn dist_sq(a: &Position, b: &Position) -> f64 {
    (a.x - b.x).powi(2) + (a.y - b.y).powi(2)
}

fn require_polygonal(geometry: &Geometry, operation: &str) -> Result<()> {
    if geometry.is_polygonal() {
        Ok(())
    } else {
        Err(GeoscopeError::Topology(format!(
            "{} requires Polygon or MultiPolygon input, got {}",
            operation,
            geometry.geometry_type()
        )))
    }
}

fn edge_intersections(a: &Geometry, b: &Geometry) -> Vec<Position> {
    let b_segments = segments(b);
    let mut out = Vec::new();
    for (a1, a2) in segments(a) {
        for (b1, b2) in &b_segments {
            if let Some(hit) = line_intersection(&a1, &a2, b1, b2) {
                out.push(hit);
            }
        }
    }
    out
}

fn hull_polygon(points: &[Position]) -> Option<Geometry> {
    convex_hull(points).map(|ring| Geometry::Polygon(vec![ring]))
}

fn polygon_parts(geometry: &Geometry) -> Vec<Vec<Ring>> {
    geometry.polygons().into_iter().map(<[Ring]>::to_vec).collect()
}

/// Union of two polygonal geometries. Disjoint inputs come back as a
/// `MultiPolygon` of their parts.
pub fn union(a: &Geometry, b: &Geometry) -> Result<Option<Geometry>> {
    require_polygonal(a, "union")?;
    require_polygonal(b, "union")?;

    if !intersects(a, b) {
        let mut parts = polygon_parts(a);
        parts.extend(polygon_parts(b));
        return Ok(Some(Geometry::MultiPolygon(parts)));
    }

    let mut points = extract_positions(a);
    points.extend(extract_positions(b));
    Ok(hull_polygon(&points))
}

/// Intersection of two polygonal geometries, `None` when empty.
pub fn intersection(a: &Geometry, b: &Geometry) -> Result<Option<Geometry>> {
    require_polygonal(a, "intersection")?;
    require_polygonal(b, "intersection")?;

    if !intersects(a, b) {
        return Ok(None);
    }

    let mut points: Vec<Position> = extract_positions(a)
        .into_iter()
        .filter(|p| point_in_geometry(p, b))
        .collect();
    points.extend(
        extract_positions(b)
            .into_iter()
            .filter(|p| point_in_geometry(p, a)),
    );
    points.extend(edge_intersections(a, b));
    Ok(hull_polygon(&points))
}

/// `a` minus `b`. Returns `a` unchanged when disjoint and `None` when `b`
/// covers `a`.
pub fn difference(a: &Geometry, b: &Geometry) -> Result<Option<Geometry>> {
    require_polygonal(a, "difference")?;
    require_polygonal(b, "difference")?;

    if !intersects(a, b) {
        return Ok(Some(a.clone()));
    }
    if contains(b, a) {
        return Ok(None);
    }

    let mut points: Vec<Position> = extract_positions(a)
        .into_iter()
        .filter(|p| !point_in_geometry(p, b))
        .collect();
    points.extend(edge_intersections(a, b));
    Ok(hull_polygon(&points))
}

/// Parts of either geometry not covered by the other.
pub fn symmetric_difference(a: &Geometry, b: &Geometry) -> Result<Option<Geometry>> {
    let left = difference(a, b)?;
    let right = difference(b, a)?;
    Ok(match (left, right) {
        (None, None) => None,
        (Some(g), None) | (None, Some(g)) => Some(g),
        (Some(l), Some(r)) => {
            let mut parts = polygon_parts(&l);
            parts.extend(polygon_parts(&r));
            Some(Geometry::MultiPolygon(parts))
        }
    })
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge every group of transitively intersecting polygons. Groups keep the
/// order of their first member; single members are returned unchanged.
pub fn dissolve(geometries: &[Geometry]) -> Result<Vec<Geometry>> {
    for g in geometries {
        require_polygonal(g, "dissolve")?;
    }

    let n = geometries.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if intersects(&geometries[i], &geometries[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj.max(ri)] = ri.min(rj);
                }
            }
        }
    }

    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(i),
            None => groups.push((root, vec![i])),
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (_, members) in groups {
        if let [only] = members.as_slice() {
            out.push(geometries[*only].clone());
            continue;
        }
        let points: Vec<Position> = members
            .iter()
            .flat_map(|&i| extract_positions(&geometries[i]))
            .collect();
        if let Some(hull) = hull_polygon(&points) {
            out.push(hull);
        }
    }
    log::debug!("dissolved {} geometries into {}", n, out.len());
    Ok(out)
}

/// Dissolve features sharing the same value of `key`. Each output feature
/// carries only that property; features without it group under `null`.
pub fn dissolve_by_property(features: &[Feature], key: &str) -> Result<Vec<Feature>> {
    let mut index: FxHashMap<String, usize> = FxHashMap::default();
    let mut groups: Vec<(Value, Vec<Geometry>)> = Vec::new();

    for feature in features {
        let value = feature.property(key).cloned().unwrap_or(Value::Null);
        let group_key = value.to_string();
        let slot = *index.entry(group_key).or_insert_with(|| {
            groups.push((value.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(feature.geometry.clone());
    }

    let mut out = Vec::new();
    for (value, geometries) in groups {
        for geometry in dissolve(&geometries)? {
            out.push(Feature::new(geometry).with_property(key, value.clone()));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::measure::area;

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    fn square(x0: f64, y0: f64, size: f64) -> Geometry {
        Geometry::Polygon(vec![vec![
            p(x0, y0),
            p(x0 + size, y0),
            p(x0 + size, y0 + size),
            p(x0, y0 + size),
            p(x0, y0),
        ]])
    }

    #[test]
    fn test_convex_hull_drops_interior_and_collinear() {
        let pts = [p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0), p(1.0, 1.0), p(2.0, 2.0), p(0.0, 2.0)];
        let hull = convex_hull(&pts).unwrap();
        assert_eq!(hull.len(), 5);
        assert!(!hull.contains(&p(1.0, 0.0)));
        assert!(!hull.contains(&p(1.0, 1.0)));
        assert!(convex_hull(&[p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0)]).is_none());
    }

    #[test]
    fn test_intersection_of_overlapping_squares() {
        let a = square(0.0, 0.0, 4.0);
        let b = square(2.0, 2.0, 4.0);
        let hit = intersection(&a, &b).unwrap().unwrap();
        assert!((area(&hit) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_union_of_disjoint_is_multipolygon() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(5.0, 5.0, 1.0);
        let u = union(&a, &b).unwrap().unwrap();
        assert!(matches!(u, Geometry::MultiPolygon(ref parts) if parts.len() == 2));
        assert!(intersection(&a, &b).unwrap().is_none());
    }

    #[test]
    fn test_union_overlapping_is_hull() {
        let a = square(0.0, 0.0, 4.0);
        let b = square(2.0, 0.0, 4.0);
        let u = union(&a, &b).unwrap().unwrap();
        assert!((area(&u) - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_difference_cases() {
        let big = square(0.0, 0.0, 10.0);
        let small = square(2.0, 2.0, 2.0);
        assert!(difference(&small, &big).unwrap().is_none());
        let far = square(50.0, 50.0, 1.0);
        assert_eq!(difference(&big, &far).unwrap(), Some(big.clone()));

        let a = square(0.0, 0.0, 4.0);
        let b = square(2.0, -1.0, 4.0);
        let d = difference(&a, &b).unwrap().unwrap();
        // Exact answer is an L-shape of area 10; the hull covers it.
        assert!((area(&d) - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric_difference() {
        let a = square(0.0, 0.0, 4.0);
        let b = square(2.0, -1.0, 4.0);
        let sd = symmetric_difference(&a, &b).unwrap().unwrap();
        assert!(matches!(sd, Geometry::MultiPolygon(ref parts) if parts.len() == 2));
        assert!(symmetric_difference(&a, &a).unwrap().is_none());
    }

    #[test]
    fn test_non_polygonal_input_is_topology_error() {
        let line = Geometry::LineString(vec![p(0.0, 0.0), p(1.0, 1.0)]);
        let sq = square(0.0, 0.0, 1.0);
        assert!(matches!(union(&line, &sq), Err(GeoscopeError::Topology(_))));
    }

    #[test]
    fn test_dissolve_groups_transitively() {
        let geoms = vec![
            square(0.0, 0.0, 2.0),
            square(10.0, 10.0, 1.0),
            square(1.0, 0.0, 2.0),
            square(2.5, 0.0, 2.0),
        ];
        let out = dissolve(&geoms).unwrap();
        assert_eq!(out.len(), 2);
        assert!((area(&out[0]) - 9.0).abs() < 1e-9);
        assert_eq!(out[1], geoms[1]);
    }

    #[test]
    fn test_dissolve_by_property() {
        let features = vec![
            Feature::new(square(0.0, 0.0, 2.0)).with_property("zone", "a".into()),
            Feature::new(square(1.0, 0.0, 2.0)).with_property("zone", "a".into()),
            Feature::new(square(1.0, 0.0, 2.0)).with_property("zone", "b".into()),
        ];
        let out = dissolve_by_property(&features, "zone").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].property("zone"), Some(&Value::from("a")));
        assert!((area(&out[0].geometry) - 6.0).abs() < 1e-9);
    }
}
