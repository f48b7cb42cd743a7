//! Relationship evaluation between two geometries.

use super::Relationship;
use super::predicates::{point_in_geometry, segments_intersect};
use crate::geometry::{bounds, extract_positions, segments};
use geoscope_types::Geometry;

fn bounds_disjoint(a: &Geometry, b: &Geometry) -> bool {
    match (bounds(a), bounds(b)) {
        (Some(ba), Some(bb)) => !ba.intersects(&bb),
        _ => true,
    }
}

/// Shared point, crossing boundary, or one geometry inside the other.
pub fn intersects(a: &Geometry, b: &Geometry) -> bool {
    if bounds_disjoint(a, b) {
        return false;
    }

    let a_positions = extract_positions(a);
    if a_positions.iter().any(|p| point_in_geometry(p, b)) {
        return true;
    }
    let b_positions = extract_positions(b);
    if b_positions.iter().any(|p| point_in_geometry(p, a)) {
        return true;
    }

    let a_segments = segments(a);
    let b_segments = segments(b);
    a_segments.iter().any(|(a1, a2)| {
        b_segments
            .iter()
            .any(|(b1, b2)| segments_intersect(a1, a2, b1, b2))
    })
}

/// Every position of `b` lies in (or on the boundary of) `a`.
pub fn contains(a: &Geometry, b: &Geometry) -> bool {
    let (Some(ba), Some(bb)) = (bounds(a), bounds(b)) else {
        return false;
    };
    if !ba.contains(&bb) {
        return false;
    }
    let mut all = true;
    b.for_each_position(&mut |p| {
        if all && !point_in_geometry(p, a) {
            all = false;
        }
    });
    all
}

pub fn within(a: &Geometry, b: &Geometry) -> bool {
    contains(b, a)
}

pub fn overlaps(a: &Geometry, b: &Geometry) -> bool {
    intersects(a, b) && !contains(a, b) && !contains(b, a)
}

pub fn touches(a: &Geometry, b: &Geometry) -> bool {
    intersects(a, b) && !overlaps(a, b)
}

pub fn crosses(a: &Geometry, b: &Geometry) -> bool {
    intersects(a, b) && !contains(a, b) && !within(a, b)
}

pub fn disjoint(a: &Geometry, b: &Geometry) -> bool {
    !intersects(a, b)
}

/// Same type and the same positions in the same order.
pub fn equals(a: &Geometry, b: &Geometry) -> bool {
    a == b
}

/// Evaluate a relationship between `a` and `b`.
///
/// # Examples
///
/// ```
/// use geoscope::topology::{relate, Relationship};
/// use geoscope::{Geometry, Position};
///
/// let square = Geometry::Polygon(vec![vec![
///     Position::new(0.0, 0.0),
///     Position::new(4.0, 0.0),
///     Position::new(4.0, 4.0),
///     Position::new(0.0, 4.0),
///     Position::new(0.0, 0.0),
/// ]]);
/// let inside = Geometry::Point(Position::new(1.0, 1.0));
///
/// assert!(relate(&square, &inside, Relationship::Contains));
/// assert!(relate(&inside, &square, Relationship::Within));
/// assert!(!relate(&square, &inside, Relationship::Disjoint));
/// ```
pub fn relate(a: &Geometry, b: &Geometry, relationship: Relationship) -> bool {
    match relationship {
        Relationship::Intersects => intersects(a, b),
        Relationship::Contains => contains(a, b),
        Relationship::Within => within(a, b),
        Relationship::Overlaps => overlaps(a, b),
        Relationship::Touches => touches(a, b),
        Relationship::Crosses => crosses(a, b),
        Relationship::Disjoint => disjoint(a, b),
        Relationship::Equals => equals(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoscope_types::Position;

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
    fn test_contains_and_within() {
        let outer = square(0.0, 0.0, 10.0);
        let inner = square(2.0, 2.0, 3.0);
        assert!(contains(&outer, &inner));
        assert!(within(&inner, &outer));
        assert!(!contains(&inner, &outer));
        assert!(!overlaps(&outer, &inner));
        assert!(touches(&outer, &inner));
        assert!(!crosses(&outer, &inner));
    }

    #[test]
    fn test_partial_overlap() {
        let a = square(0.0, 0.0, 4.0);
        let b = square(2.0, 2.0, 4.0);
        assert!(intersects(&a, &b));
        assert!(overlaps(&a, &b));
        assert!(!touches(&a, &b));
        assert!(crosses(&a, &b));
    }

    #[test]
    fn test_crossing_lines_without_shared_vertices() {
        let a = Geometry::LineString(vec![p(0.0, 0.0), p(2.0, 2.0)]);
        let b = Geometry::LineString(vec![p(0.0, 2.0), p(2.0, 0.0)]);
        assert!(intersects(&a, &b));
        assert!(crosses(&a, &b));
    }

    #[test]
    fn test_disjoint_by_bounds() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(5.0, 5.0, 1.0);
        assert!(disjoint(&a, &b));
        assert!(!relate(&a, &b, Relationship::Intersects));
    }

    #[test]
    fn test_equals_requires_same_order() {
        let a = Geometry::LineString(vec![p(0.0, 0.0), p(1.0, 1.0)]);
        let b = Geometry::LineString(vec![p(1.0, 1.0), p(0.0, 0.0)]);
        assert!(equals(&a, &a.clone()));
        assert!(!equals(&a, &b));
        assert!(!equals(&Geometry::Point(p(0.0, 0.0)), &Geometry::MultiPoint(vec![p(0.0, 0.0)])));
    }

    #[test]
    fn test_point_in_hole_is_disjoint() {
        let holed = Geometry::Polygon(vec![
            vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0), p(0.0, 0.0)],
            vec![p(4.0, 4.0), p(4.0, 6.0), p(6.0, 6.0), p(6.0, 4.0), p(4.0, 4.0)],
        ]);
        assert!(disjoint(&holed, &Geometry::Point(p(5.0, 5.0))));
        assert!(contains(&holed, &Geometry::Point(p(1.0, 1.0))));
    }
}
