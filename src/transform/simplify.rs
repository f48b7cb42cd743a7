//! Line simplification, smoothing and densification.

use crate::error::{GeoscopeError, Result};
use crate::geometry::measure::distance;
use geoscope_types::{Geometry, Position, Ring};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplifyOptions {
    pub tolerance: f64,
    /// Skip the radial-distance pre-pass and run Douglas-Peucker alone.
    #[serde(default)]
    pub high_quality: bool,
}

impl SimplifyOptions {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            high_quality: false,
        }
    }

    pub fn with_high_quality(mut self, high_quality: bool) -> Self {
        self.high_quality = high_quality;
        self
    }
}

/// Distance from `p` to the closed segment `a`-`b`.
pub(crate) fn segment_distance(p: &Position, a: &Position, b: &Position) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(p, a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    (p.x - (a.x + t * dx)).hypot(p.y - (a.y + t * dy))
}

/// Douglas-Peucker simplification.
///
/// Keeps the endpoints and every vertex farther than `tolerance` from the
/// chord of its enclosing range. Ranges are processed from an explicit
/// stack, so deep inputs cannot overflow the call stack. Running it twice
/// with the same tolerance changes nothing.
///
/// # Examples
///
/// ```
/// use geoscope::transform::simplify::douglas_peucker;
/// use geoscope::Position;
///
/// let line = vec![
///     Position::new(0.0, 0.0),
///     Position::new(1.0, 0.1),
///     Position::new(2.0, -0.1),
///     Position::new(3.0, 5.0),
///     Position::new(4.0, 6.0),
///     Position::new(5.0, 7.0),
/// ];
/// let simplified = douglas_peucker(&line, 1.0);
/// assert_eq!(simplified.first(), line.first());
/// assert_eq!(simplified.last(), line.last());
/// assert!(simplified.len() < line.len());
/// ```
pub fn douglas_peucker(points: &[Position], tolerance: f64) -> Vec<Position> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let mut max_dist = 0.0;
        let mut index = start;
        for i in (start + 1)..end {
            let d = segment_distance(&points[i], &points[start], &points[end]);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }
        if max_dist > tolerance {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Drop vertices closer than `tolerance` to the last kept vertex. The last
/// vertex is always kept.
pub fn radial_distance(points: &[Position], tolerance: f64) -> Vec<Position> {
    let Some((first, rest)) = points.split_first() else {
        return Vec::new();
    };
    let mut out = vec![*first];
    let Some((last, middle)) = rest.split_last() else {
        return out;
    };
    for p in middle {
        if out.last().is_some_and(|prev| distance(prev, p) > tolerance) {
            out.push(*p);
        }
    }
    out.push(*last);
    out
}

fn triangle_area(a: &Position, b: &Position, c: &Position) -> f64 {
    ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)).abs() / 2.0
}

/// Visvalingam-Whyatt: repeatedly remove the vertex whose triangle with its
/// neighbours has the smallest area, until every remaining area is at least
/// `min_area`.
pub fn visvalingam_whyatt(points: &[Position], min_area: f64) -> Vec<Position> {
    let mut out = points.to_vec();
    while out.len() > 2 {
        let smallest = (1..out.len() - 1)
            .map(|i| (i, triangle_area(&out[i - 1], &out[i], &out[i + 1])))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match smallest {
            Some((i, area)) if area < min_area => {
                out.remove(i);
            }
            _ => break,
        }
    }
    out
}

fn is_closed(points: &[Position]) -> bool {
    points.len() > 2 && points[0].equals_2d(&points[points.len() - 1])
}

/// Chaikin corner cutting. Open lines keep their endpoints; closed rings are
/// cut all the way round and re-closed.
pub fn smooth(points: &[Position], iterations: usize) -> Vec<Position> {
    let mut current = points.to_vec();
    for _ in 0..iterations {
        if current.len() < 3 {
            break;
        }
        let closed = is_closed(&current);
        let mut next = Vec::with_capacity(current.len() * 2);
        if !closed {
            next.push(current[0]);
        }
        for w in current.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            next.push(Position::new(0.75 * a.x + 0.25 * b.x, 0.75 * a.y + 0.25 * b.y));
            next.push(Position::new(0.25 * a.x + 0.75 * b.x, 0.25 * a.y + 0.75 * b.y));
        }
        if closed {
            next.push(next[0]);
        } else {
            next.push(current[current.len() - 1]);
        }
        current = next;
    }
    current
}

/// Insert evenly spaced vertices so no segment is longer than `max_length`.
pub fn densify(points: &[Position], max_length: f64) -> Result<Vec<Position>> {
    if !max_length.is_finite() || max_length <= 0.0 {
        return Err(GeoscopeError::InvalidInput(format!(
            "Densify segment length must be positive and finite, got {}",
            max_length
        )));
    }
    let Some(first) = points.first() else {
        return Ok(Vec::new());
    };
    let mut out = vec![*first];
    for w in points.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        let pieces = (distance(a, b) / max_length).ceil().max(1.0) as usize;
        for i in 1..pieces {
            let t = i as f64 / pieces as f64;
            out.push(Position::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)));
        }
        out.push(*b);
    }
    Ok(out)
}

/// Turn angle at `b` in degrees: 0 for straight on, 180 for a full reversal.
fn turn_angle(a: &Position, b: &Position, c: &Position) -> Option<f64> {
    let (ux, uy) = (b.x - a.x, b.y - a.y);
    let (vx, vy) = (c.x - b.x, c.y - b.y);
    let norms = ux.hypot(uy) * vx.hypot(vy);
    if norms == 0.0 {
        return None;
    }
    Some(((ux * vx + uy * vy) / norms).clamp(-1.0, 1.0).acos().to_degrees())
}

/// Remove vertices whose turn angle exceeds `threshold_deg`, repeating until
/// none remain. Closed rings stay closed.
pub fn remove_spikes(points: &[Position], threshold_deg: f64) -> Vec<Position> {
    let closed = is_closed(points);
    let mut current: Vec<Position> = if closed {
        points[..points.len() - 1].to_vec()
    } else {
        points.to_vec()
    };
    let min_len = if closed { 3 } else { 2 };

    loop {
        let n = current.len();
        if n <= min_len {
            break;
        }
        let spike = (0..n).find(|&i| {
            let (prev, next) = if closed {
                ((i + n - 1) % n, (i + 1) % n)
            } else if i == 0 || i == n - 1 {
                return false;
            } else {
                (i - 1, i + 1)
            };
            turn_angle(&current[prev], &current[i], &current[next])
                .is_some_and(|angle| angle > threshold_deg)
        });
        match spike {
            Some(i) => {
                current.remove(i);
            }
            None => break,
        }
    }

    if closed && let Some(first) = current.first().copied() {
        current.push(first);
    }
    current
}

fn simplify_path(points: &[Position], options: &SimplifyOptions) -> Vec<Position> {
    if options.high_quality {
        douglas_peucker(points, options.tolerance)
    } else {
        douglas_peucker(&radial_distance(points, options.tolerance), options.tolerance)
    }
}

fn simplify_ring(ring: &Ring, options: &SimplifyOptions) -> Ring {
    let simplified = simplify_path(ring, options);
    if simplified.len() < 4 {
        ring.clone()
    } else {
        simplified
    }
}

fn simplify_rings(rings: &[Ring], options: &SimplifyOptions) -> Vec<Ring> {
    rings.iter().map(|r| simplify_ring(r, options)).collect()
}

/// Simplify every line and ring of a geometry. Rings that would drop below
/// four positions are kept as they were.
pub fn simplify(geometry: &Geometry, options: &SimplifyOptions) -> Result<Geometry> {
    if !options.tolerance.is_finite() || options.tolerance < 0.0 {
        return Err(GeoscopeError::InvalidInput(format!(
            "Simplify tolerance must be non-negative and finite, got {}",
            options.tolerance
        )));
    }

    Ok(match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => geometry.clone(),
        Geometry::LineString(line) => Geometry::LineString(simplify_path(line, options)),
        Geometry::MultiLineString(lines) => Geometry::MultiLineString(
            lines.iter().map(|l| simplify_path(l, options)).collect(),
        ),
        Geometry::Polygon(rings) => Geometry::Polygon(simplify_rings(rings, options)),
        Geometry::MultiPolygon(polygons) => Geometry::MultiPolygon(
            polygons
                .iter()
                .map(|rings| simplify_rings(rings, options))
                .collect(),
        ),
        Geometry::GeometryCollection(geometries) => Geometry::GeometryCollection(
            geometries
                .iter()
                .map(|g| simplify(g, options))
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}
