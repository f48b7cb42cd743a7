//! Low-level point and segment predicates.

use crate::geometry::ops::open_ring;
use geoscope_types::{Geometry, Position, Ring};

const EPSILON: f64 = 1e-10;

/// Twice the signed area of triangle (a, b, c); positive when counter-clockwise.
#[inline]
pub fn orientation(a: &Position, b: &Position, c: &Position) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

#[inline]
fn within_segment_box(p: &Position, a: &Position, b: &Position) -> bool {
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

/// True when `p` lies on the closed segment `a`-`b`.
pub fn point_on_segment(p: &Position, a: &Position, b: &Position) -> bool {
    let scale = (b.x - a.x).abs().max((b.y - a.y).abs()).max(1.0);
    orientation(a, b, p).abs() <= EPSILON * scale && within_segment_box(p, a, b)
}

/// True when `p` lies on any segment of the polyline.
pub fn point_on_line(p: &Position, line: &[Position]) -> bool {
    match line {
        [] => false,
        [only] => only.equals_2d(p),
        _ => line.windows(2).any(|w| point_on_segment(p, &w[0], &w[1])),
    }
}

/// Where a point sits relative to a single ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingLocation {
    Inside,
    Boundary,
    Outside,
}

/// Ray-casting classification of `p` against a ring. The ring may be open
/// or closed.
pub fn locate_in_ring(p: &Position, ring: &[Position]) -> RingLocation {
    let vertices = open_ring(ring);
    let n = vertices.len();
    if n < 3 {
        return RingLocation::Outside;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&vertices[i], &vertices[j]);
        if point_on_segment(p, a, b) {
            return RingLocation::Boundary;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }

    if inside {
        RingLocation::Inside
    } else {
        RingLocation::Outside
    }
}

/// Point-in-polygon test. The exterior boundary counts as inside; the
/// interior of a hole does not, but a hole's boundary is still polygon
/// boundary and so counts as inside.
///
/// # Examples
///
/// ```
/// use geoscope::topology::point_in_polygon;
/// use geoscope::Position;
///
/// let square = vec![vec![
///     Position::new(0.0, 0.0),
///     Position::new(4.0, 0.0),
///     Position::new(4.0, 4.0),
///     Position::new(0.0, 4.0),
///     Position::new(0.0, 0.0),
/// ]];
/// assert!(point_in_polygon(&Position::new(2.0, 2.0), &square));
/// assert!(point_in_polygon(&Position::new(4.0, 2.0), &square));
/// assert!(!point_in_polygon(&Position::new(5.0, 2.0), &square));
/// ```
pub fn point_in_polygon(p: &Position, rings: &[Ring]) -> bool {
    let Some((exterior, holes)) = rings.split_first() else {
        return false;
    };
    match locate_in_ring(p, exterior) {
        RingLocation::Outside => false,
        RingLocation::Boundary => true,
        RingLocation::Inside => holes
            .iter()
            .all(|hole| locate_in_ring(p, hole) != RingLocation::Inside),
    }
}

/// Segment intersection test including touching endpoints and collinear
/// overlap.
pub fn segments_intersect(a1: &Position, a2: &Position, b1: &Position, b2: &Position) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    if ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
    {
        return true;
    }

    (d1.abs() <= EPSILON && within_segment_box(a1, b1, b2))
        || (d2.abs() <= EPSILON && within_segment_box(a2, b1, b2))
        || (d3.abs() <= EPSILON && within_segment_box(b1, a1, a2))
        || (d4.abs() <= EPSILON && within_segment_box(b2, a1, a2))
}

/// Intersection point of two segments, or `None` when they are parallel or
/// do not meet within both parameter ranges `t, u ∈ [0, 1]`.
pub fn line_intersection(
    a1: &Position,
    a2: &Position,
    b1: &Position,
    b2: &Position,
) -> Option<Position> {
    let denom = (a2.x - a1.x) * (b2.y - b1.y) - (a2.y - a1.y) * (b2.x - b1.x);
    if denom.abs() < EPSILON {
        return None;
    }

    let t = ((b1.x - a1.x) * (b2.y - b1.y) - (b1.y - a1.y) * (b2.x - b1.x)) / denom;
    let u = ((b1.x - a1.x) * (a2.y - a1.y) - (b1.y - a1.y) * (a2.x - a1.x)) / denom;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(Position::new(
            a1.x + t * (a2.x - a1.x),
            a1.y + t * (a2.y - a1.y),
        ))
    } else {
        None
    }
}

/// True when the position lies in, or on the boundary of, the geometry.
pub fn point_in_geometry(p: &Position, geometry: &Geometry) -> bool {
    match geometry {
        Geometry::Point(q) => q.equals_2d(p),
        Geometry::MultiPoint(points) => points.iter().any(|q| q.equals_2d(p)),
        Geometry::LineString(line) => point_on_line(p, line),
        Geometry::MultiLineString(lines) => lines.iter().any(|l| point_on_line(p, l)),
        Geometry::Polygon(rings) => point_in_polygon(p, rings),
        Geometry::MultiPolygon(polygons) => polygons.iter().any(|rings| point_in_polygon(p, rings)),
        Geometry::GeometryCollection(geometries) => {
            geometries.iter().any(|g| point_in_geometry(p, g))
        }
    }
}
