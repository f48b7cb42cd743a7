//! Fixed-distance buffers around points, lines and polygons.
//!
//! Distances are converted to meters through a fixed unit table and then
//! applied directly in coordinate units, so buffers are planar.

use crate::config::Config;
use crate::error::{GeoscopeError, Result};
use crate::geometry::measure::signed_ring_area;
use crate::geometry::ops::open_ring;
use geoscope_types::{Geometry, Position, Ring};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Distance units accepted by [`BufferOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Meters,
    Kilometers,
    Feet,
    Miles,
    /// Degrees of arc at the equator.
    Degrees,
}

impl Units {
    /// Meters per unit.
    pub const fn to_meters(self) -> f64 {
        match self {
            Units::Meters => 1.0,
            Units::Kilometers => 1000.0,
            Units::Feet => 0.3048,
            Units::Miles => 1609.34,
            Units::Degrees => 111_320.0,
        }
    }
}

/// End-cap shape for line buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapStyle {
    #[default]
    Round,
    Flat,
    Square,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferOptions {
    pub distance: f64,
    #[serde(default)]
    pub units: Units,
    /// Vertices used for a full circle.
    #[serde(default = "BufferOptions::default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub cap: CapStyle,
}

impl BufferOptions {
    const fn default_steps() -> usize {
        32
    }

    pub fn new(distance: f64) -> Self {
        Self {
            distance,
            units: Units::default(),
            steps: Self::default_steps(),
            cap: CapStyle::default(),
        }
    }

    /// Options for `distance` using the configured step count.
    pub fn from_config(config: &Config, distance: f64) -> Self {
        Self {
            steps: config.buffer_steps,
            ..Self::new(distance)
        }
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_cap(mut self, cap: CapStyle) -> Self {
        self.cap = cap;
        self
    }

    /// The buffer distance in meters.
    pub fn distance_meters(&self) -> f64 {
        self.distance * self.units.to_meters()
    }

    fn validate(&self) -> Result<f64> {
        let d = self.distance_meters();
        if !d.is_finite() || d <= 0.0 {
            return Err(GeoscopeError::InvalidInput(format!(
                "Buffer distance must be positive and finite, got {}",
                self.distance
            )));
        }
        if self.steps < 3 {
            return Err(GeoscopeError::InvalidInput(format!(
                "Buffer steps must be at least 3, got {}",
                self.steps
            )));
        }
        Ok(d)
    }
}

/// Buffer a geometry. Single points, lines and polygons yield a `Polygon`;
/// multi-part inputs and collections yield a `MultiPolygon`.
///
/// # Examples
///
/// ```
/// use geoscope::transform::buffer::{buffer, BufferOptions};
/// use geoscope::{Geometry, Position};
///
/// let circle = buffer(
///     &Geometry::Point(Position::new(0.0, 0.0)),
///     &BufferOptions::new(10.0).with_steps(4),
/// )
/// .unwrap();
/// let Geometry::Polygon(rings) = circle else { unreachable!() };
/// assert_eq!(rings[0].len(), 5);
/// ```
pub fn buffer(geometry: &Geometry, options: &BufferOptions) -> Result<Geometry> {
    let d = options.validate()?;
    match geometry {
        Geometry::Point(p) => Ok(Geometry::Polygon(buffer_point(p, d, options.steps))),
        Geometry::LineString(line) => Ok(Geometry::Polygon(buffer_line(line, d, options)?)),
        Geometry::Polygon(rings) => Ok(Geometry::Polygon(buffer_polygon(rings, d)?)),
        _ => {
            let mut polygons = Vec::new();
            collect_parts(geometry, d, options, &mut polygons)?;
            if polygons.is_empty() {
                return Err(GeoscopeError::InvalidInput(
                    "Nothing to buffer in an empty collection".to_string(),
                ));
            }
            Ok(Geometry::MultiPolygon(polygons))
        }
    }
}

fn collect_parts(
    geometry: &Geometry,
    d: f64,
    options: &BufferOptions,
    out: &mut Vec<Vec<Ring>>,
) -> Result<()> {
    match geometry {
        Geometry::Point(p) => out.push(buffer_point(p, d, options.steps)),
        Geometry::MultiPoint(points) => {
            out.extend(points.iter().map(|p| buffer_point(p, d, options.steps)))
        }
        Geometry::LineString(line) => out.push(buffer_line(line, d, options)?),
        Geometry::MultiLineString(lines) => {
            for line in lines {
                out.push(buffer_line(line, d, options)?);
            }
        }
        Geometry::Polygon(rings) => out.push(buffer_polygon(rings, d)?),
        Geometry::MultiPolygon(polygons) => {
            for rings in polygons {
                out.push(buffer_polygon(rings, d)?);
            }
        }
        Geometry::GeometryCollection(geometries) => {
            for g in geometries {
                collect_parts(g, d, options, out)?;
            }
        }
    }
    Ok(())
}

fn buffer_point(center: &Position, d: f64, steps: usize) -> Vec<Ring> {
    let mut ring: Ring = (0..steps)
        .map(|i| {
            let theta = TAU * i as f64 / steps as f64;
            Position::new(center.x + d * theta.cos(), center.y + d * theta.sin())
        })
        .collect();
    ring.push(ring[0]);
    vec![ring]
}

fn arc(center: &Position, d: f64, start: f64, sweep: f64, segments: usize, out: &mut Ring) {
    // Interior arc vertices only; the caller supplies both endpoints.
    for i in 1..segments {
        let theta = start + sweep * i as f64 / segments as f64;
        out.push(Position::new(
            center.x + d * theta.cos(),
            center.y + d * theta.sin(),
        ));
    }
}

#[inline]
fn unit_normal(a: &Position, b: &Position) -> (f64, f64) {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    (-dy / len, dx / len)
}

/// Averaged normal at a joint, scaled to keep the offset distance along both
/// edges (capped at twice the distance for sharp turns).
fn joint_offset(n1: (f64, f64), n2: (f64, f64), d: f64) -> (f64, f64) {
    let (sx, sy) = (n1.0 + n2.0, n1.1 + n2.1);
    let len = sx.hypot(sy);
    if len < 1e-12 {
        return (n1.0 * d, n1.1 * d);
    }
    let (nx, ny) = (sx / len, sy / len);
    let cos_half = (nx * n1.0 + ny * n1.1).max(0.5);
    (nx * d / cos_half, ny * d / cos_half)
}

fn buffer_line(line: &[Position], d: f64, options: &BufferOptions) -> Result<Vec<Ring>> {
    let mut path: Vec<Position> = Vec::with_capacity(line.len());
    for p in line {
        if path.last().is_none_or(|last: &Position| !last.equals_2d(p)) {
            path.push(*p);
        }
    }
    match path.len() {
        0 => {
            return Err(GeoscopeError::InvalidInput(
                "Cannot buffer an empty line".to_string(),
            ));
        }
        1 => return Ok(buffer_point(&path[0], d, options.steps)),
        _ => {}
    }

    let normals: Vec<(f64, f64)> = path.windows(2).map(|w| unit_normal(&w[0], &w[1])).collect();
    let offsets: Vec<(f64, f64)> = (0..path.len())
        .map(|i| {
            if i == 0 {
                (normals[0].0 * d, normals[0].1 * d)
            } else if i == path.len() - 1 {
                let n = normals[i - 1];
                (n.0 * d, n.1 * d)
            } else {
                joint_offset(normals[i - 1], normals[i], d)
            }
        })
        .collect();

    let left = |i: usize| Position::new(path[i].x + offsets[i].0, path[i].y + offsets[i].1);
    let right = |i: usize| Position::new(path[i].x - offsets[i].0, path[i].y - offsets[i].1);

    let last = path.len() - 1;
    let cap_segments = (options.steps / 2).max(2);
    let end_dir = (path[last].y - path[last - 1].y).atan2(path[last].x - path[last - 1].x);
    let start_dir = (path[1].y - path[0].y).atan2(path[1].x - path[0].x);
    let (ex, ey) = (end_dir.cos() * d, end_dir.sin() * d);
    let (sx, sy) = (start_dir.cos() * d, start_dir.sin() * d);

    // Right side forward, around the end, left side back, around the start.
    let mut ring: Ring = Vec::with_capacity(path.len() * 2 + cap_segments * 2 + 5);
    if options.cap == CapStyle::Square {
        let r0 = right(0);
        ring.push(Position::new(r0.x - sx, r0.y - sy));
    }
    ring.extend((0..=last).map(right));
    match options.cap {
        CapStyle::Round => arc(&path[last], d, end_dir - PI / 2.0, PI, cap_segments, &mut ring),
        CapStyle::Square => {
            let (r, l) = (right(last), left(last));
            ring.push(Position::new(r.x + ex, r.y + ey));
            ring.push(Position::new(l.x + ex, l.y + ey));
        }
        CapStyle::Flat => {}
    }
    ring.extend((0..=last).rev().map(left));
    match options.cap {
        CapStyle::Round => arc(&path[0], d, start_dir + PI / 2.0, PI, cap_segments, &mut ring),
        CapStyle::Square => {
            let l0 = left(0);
            ring.push(Position::new(l0.x - sx, l0.y - sy));
        }
        CapStyle::Flat => {}
    }
    ring.push(ring[0]);
    Ok(vec![ring])
}

/// Offset one ring outward (or inward for holes) by `d`.
fn offset_ring(ring: &[Position], d: f64) -> Ring {
    let vertices = open_ring(ring);
    let n = vertices.len();
    let normals: Vec<(f64, f64)> = (0..n)
        .map(|i| unit_normal(&vertices[i], &vertices[(i + 1) % n]))
        .collect();

    let mut out: Ring = (0..n)
        .map(|i| {
            let (ox, oy) = joint_offset(normals[(i + n - 1) % n], normals[i], d);
            Position::new(vertices[i].x + ox, vertices[i].y + oy)
        })
        .collect();
    out.push(out[0]);
    out
}

fn buffer_polygon(rings: &[Ring], d: f64) -> Result<Vec<Ring>> {
    let Some((exterior, holes)) = rings.split_first() else {
        return Err(GeoscopeError::InvalidInput(
            "Cannot buffer a polygon without rings".to_string(),
        ));
    };
    if open_ring(exterior).len() < 3 {
        return Err(GeoscopeError::InvalidInput(
            "Polygon exterior needs at least 3 distinct vertices".to_string(),
        ));
    }

    // Left-hand normals point inward on a counter-clockwise ring, so the
    // exterior moves against them and holes (clockwise) move with them.
    let exterior_sign = if signed_ring_area(exterior) >= 0.0 { -1.0 } else { 1.0 };
    let mut out = vec![offset_ring(exterior, exterior_sign * d)];

    for hole in holes {
        let vertices = open_ring(hole);
        if vertices.len() < 3 {
            continue;
        }
        let original = signed_ring_area(hole);
        let hole_sign = if original <= 0.0 { -1.0 } else { 1.0 };
        let shrunk = offset_ring(hole, hole_sign * d);
        let after = signed_ring_area(&shrunk);
        let (min_x, max_x, min_y, max_y) = vertices.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(a, b, c, e), p| (a.min(p.x), b.max(p.x), c.min(p.y), e.max(p.y)),
        );
        let collapsed = (max_x - min_x).min(max_y - min_y) <= 2.0 * d
            || after.signum() != original.signum()
            || after.abs() < 1e-12;
        if collapsed {
            log::debug!("dropping hole collapsed by buffer distance {}", d);
        } else {
            out.push(shrunk);
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

    fn rings(g: &Geometry) -> &Vec<Ring> {
        match g {
            Geometry::Polygon(r) => r,
            other => panic!("expected polygon, got {:?}", other.geometry_type()),
        }
    }

    #[test]
    fn test_point_buffer_four_steps() {
        let result = buffer(
            &Geometry::Point(p(0.0, 0.0)),
            &BufferOptions::new(10.0).with_steps(4),
        )
        .unwrap();
        let ring = &rings(&result)[0];
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        for v in &ring[..4] {
            assert!((v.x.hypot(v.y) - 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_units_convert_to_meters() {
        let opts = BufferOptions::new(2.0).with_units(Units::Kilometers);
        assert_eq!(opts.distance_meters(), 2000.0);
        assert_eq!(Units::Miles.to_meters(), 1609.34);
        assert_eq!(Units::Degrees.to_meters(), 111_320.0);
    }

    #[test]
    fn test_invalid_options() {
        let pt = Geometry::Point(p(0.0, 0.0));
        assert!(buffer(&pt, &BufferOptions::new(f64::NAN)).is_err());
        assert!(buffer(&pt, &BufferOptions::new(0.0)).is_err());
        assert!(buffer(&pt, &BufferOptions::new(1.0).with_steps(2)).is_err());
    }

    #[test]
    fn test_line_buffer_flat_cap_is_rectangle() {
        let line = Geometry::LineString(vec![p(0.0, 0.0), p(10.0, 0.0)]);
        let result = buffer(&line, &BufferOptions::new(1.0).with_cap(CapStyle::Flat)).unwrap();
        let ring = &rings(&result)[0];
        assert!((area(&result) - 20.0).abs() < 1e-9);
        assert!(signed_ring_area(ring) > 0.0);
    }

    #[test]
    fn test_line_buffer_caps_add_area() {
        let line = Geometry::LineString(vec![p(0.0, 0.0), p(10.0, 0.0)]);
        let square = buffer(&line, &BufferOptions::new(1.0).with_cap(CapStyle::Square)).unwrap();
        assert!((area(&square) - 24.0).abs() < 1e-9);
        let round = buffer(&line, &BufferOptions::new(1.0).with_steps(64)).unwrap();
        let expected = 20.0 + PI;
        assert!((area(&round) - expected).abs() < 0.05);
    }

    #[test]
    fn test_polygon_buffer_grows() {
        let square = Geometry::Polygon(vec![vec![
            p(0.0, 0.0),
            p(4.0, 0.0),
            p(4.0, 4.0),
            p(0.0, 4.0),
            p(0.0, 0.0),
        ]]);
        let grown = buffer(&square, &BufferOptions::new(1.0)).unwrap();
        // Averaged-normal miter corners give a 6x6 square.
        assert!((area(&grown) - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_polygon_buffer_drops_collapsed_hole() {
        let poly = Geometry::Polygon(vec![
            vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0), p(0.0, 0.0)],
            vec![p(4.0, 4.0), p(4.0, 5.0), p(5.0, 5.0), p(5.0, 4.0), p(4.0, 4.0)],
        ]);
        let thin = buffer(&poly, &BufferOptions::new(0.1)).unwrap();
        assert_eq!(rings(&thin).len(), 2);
        let thick = buffer(&poly, &BufferOptions::new(1.0)).unwrap();
        assert_eq!(rings(&thick).len(), 1);
    }

    #[test]
    fn test_multi_input_gives_multipolygon() {
        let mp = Geometry::MultiPoint(vec![p(0.0, 0.0), p(100.0, 0.0)]);
        let result = buffer(&mp, &BufferOptions::new(1.0)).unwrap();
        assert!(matches!(result, Geometry::MultiPolygon(ref polys) if polys.len() == 2));
    }

    #[test]
    fn test_from_config_uses_steps() {
        let config = Config::default().with_buffer_steps(8);
        let opts = BufferOptions::from_config(&config, 5.0);
        assert_eq!(opts.steps, 8);
        assert_eq!(opts.distance, 5.0);
    }
}
