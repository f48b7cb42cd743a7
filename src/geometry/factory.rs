//! Validated geometry construction and parametric shape generators.
//!
//! Every constructor either returns a structurally sound geometry or a
//! [`GeoscopeError::Geometry`]; nothing partially built escapes.

use crate::error::{GeoscopeError, Result};
use geoscope_types::{Bounds, Geometry, Position, Ring};
use std::f64::consts::{FRAC_PI_2, TAU};

pub fn create_point(position: impl Into<Position>) -> Geometry {
    Geometry::Point(position.into())
}

/// Build a LineString; fewer than two positions is an error.
pub fn create_line_string(positions: Vec<Position>) -> Result<Geometry> {
    check_line(&positions, "LineString")?;
    Ok(Geometry::LineString(positions))
}

/// Build a Polygon from an exterior ring followed by optional holes.
///
/// # Errors
///
/// Fails when there are no rings, or when any ring has fewer than four
/// positions or is not closed.
///
/// # Examples
///
/// ```
/// use geoscope::geometry::factory::create_polygon;
/// use geoscope::Position;
///
/// let square = create_polygon(vec![vec![
///     Position::new(0.0, 0.0),
///     Position::new(4.0, 0.0),
///     Position::new(4.0, 4.0),
///     Position::new(0.0, 4.0),
///     Position::new(0.0, 0.0),
/// ]])
/// .unwrap();
/// assert_eq!(geoscope::geometry::area(&square), 16.0);
///
/// let open = create_polygon(vec![vec![
///     Position::new(0.0, 0.0),
///     Position::new(4.0, 0.0),
///     Position::new(4.0, 4.0),
///     Position::new(0.0, 4.0),
/// ]]);
/// assert!(open.is_err());
/// ```
pub fn create_polygon(rings: Vec<Ring>) -> Result<Geometry> {
    check_polygon(&rings, "Polygon")?;
    Ok(Geometry::Polygon(rings))
}

pub fn create_multi_point(positions: Vec<Position>) -> Result<Geometry> {
    if positions.is_empty() {
        return Err(GeoscopeError::Geometry(
            "MultiPoint must contain at least one position".to_string(),
        ));
    }
    Ok(Geometry::MultiPoint(positions))
}

pub fn create_multi_line_string(lines: Vec<Vec<Position>>) -> Result<Geometry> {
    if lines.is_empty() {
        return Err(GeoscopeError::Geometry(
            "MultiLineString must contain at least one line".to_string(),
        ));
    }
    for (idx, line) in lines.iter().enumerate() {
        check_line(line, &format!("MultiLineString line {}", idx))?;
    }
    Ok(Geometry::MultiLineString(lines))
}

pub fn create_multi_polygon(polygons: Vec<Vec<Ring>>) -> Result<Geometry> {
    if polygons.is_empty() {
        return Err(GeoscopeError::Geometry(
            "MultiPolygon must contain at least one polygon".to_string(),
        ));
    }
    for (idx, rings) in polygons.iter().enumerate() {
        check_polygon(rings, &format!("MultiPolygon polygon {}", idx))?;
    }
    Ok(Geometry::MultiPolygon(polygons))
}

/// Collections may be empty; each member must itself be well formed.
pub fn create_geometry_collection(geometries: Vec<Geometry>) -> Result<Geometry> {
    for geometry in &geometries {
        check_geometry(geometry)?;
    }
    Ok(Geometry::GeometryCollection(geometries))
}

/// Re-run the structural checks on an existing geometry.
pub fn check_geometry(geometry: &Geometry) -> Result<()> {
    match geometry {
        Geometry::Point(_) => Ok(()),
        Geometry::LineString(line) => check_line(line, "LineString"),
        Geometry::Polygon(rings) => check_polygon(rings, "Polygon"),
        Geometry::MultiPoint(points) => {
            if points.is_empty() {
                Err(GeoscopeError::Geometry(
                    "MultiPoint must contain at least one position".to_string(),
                ))
            } else {
                Ok(())
            }
        }
        Geometry::MultiLineString(lines) => {
            if lines.is_empty() {
                return Err(GeoscopeError::Geometry(
                    "MultiLineString must contain at least one line".to_string(),
                ));
            }
            for (idx, line) in lines.iter().enumerate() {
                check_line(line, &format!("MultiLineString line {}", idx))?;
            }
            Ok(())
        }
        Geometry::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                return Err(GeoscopeError::Geometry(
                    "MultiPolygon must contain at least one polygon".to_string(),
                ));
            }
            for (idx, rings) in polygons.iter().enumerate() {
                check_polygon(rings, &format!("MultiPolygon polygon {}", idx))?;
            }
            Ok(())
        }
        Geometry::GeometryCollection(geometries) => {
            geometries.iter().try_for_each(check_geometry)
        }
    }
}

fn check_line(positions: &[Position], what: &str) -> Result<()> {
    if positions.len() < 2 {
        return Err(GeoscopeError::Geometry(format!(
            "{} requires at least 2 positions, got {}",
            what,
            positions.len()
        )));
    }
    Ok(())
}

fn check_polygon(rings: &[Ring], what: &str) -> Result<()> {
    if rings.is_empty() {
        return Err(GeoscopeError::Geometry(format!(
            "{} requires at least one ring",
            what
        )));
    }
    for (idx, ring) in rings.iter().enumerate() {
        if ring.len() < 4 {
            return Err(GeoscopeError::Geometry(format!(
                "{} ring {} requires at least 4 positions, got {}",
                what,
                idx,
                ring.len()
            )));
        }
        if !ring[0].equals_2d(&ring[ring.len() - 1]) {
            return Err(GeoscopeError::Geometry(format!(
                "{} ring {} is not closed",
                what, idx
            )));
        }
    }
    Ok(())
}

/// A circle approximated by `steps` vertices, counter-clockwise from angle 0.
pub fn create_circle(center: Position, radius: f64, steps: usize) -> Result<Geometry> {
    create_ellipse(center, radius, radius, 0.0, steps)
}

/// An ellipse with semi-axes `rx`, `ry`, rotated counter-clockwise by
/// `rotation_deg`.
pub fn create_ellipse(
    center: Position,
    rx: f64,
    ry: f64,
    rotation_deg: f64,
    steps: usize,
) -> Result<Geometry> {
    if steps < 3 {
        return Err(GeoscopeError::InvalidInput(format!(
            "at least 3 steps are required, got {}",
            steps
        )));
    }
    if !(rx.is_finite() && ry.is_finite() && rx > 0.0 && ry > 0.0) {
        return Err(GeoscopeError::InvalidInput(format!(
            "radii must be positive and finite, got ({}, {})",
            rx, ry
        )));
    }

    let (sin_r, cos_r) = rotation_deg.to_radians().sin_cos();
    let ring = closed((0..steps).map(|i| {
        let theta = TAU * i as f64 / steps as f64;
        let (x, y) = (rx * theta.cos(), ry * theta.sin());
        Position::new(
            center.x + x * cos_r - y * sin_r,
            center.y + x * sin_r + y * cos_r,
        )
    }));
    create_polygon(vec![ring])
}

/// A regular polygon whose first vertex sits at `rotation_deg` from the x axis.
pub fn create_regular_polygon(
    center: Position,
    radius: f64,
    sides: usize,
    rotation_deg: f64,
) -> Result<Geometry> {
    if sides < 3 {
        return Err(GeoscopeError::InvalidInput(format!(
            "a regular polygon needs at least 3 sides, got {}",
            sides
        )));
    }
    if !(radius.is_finite() && radius > 0.0) {
        return Err(GeoscopeError::InvalidInput(format!(
            "radius must be positive and finite, got {}",
            radius
        )));
    }

    let start = rotation_deg.to_radians();
    let ring = closed((0..sides).map(|i| {
        let theta = start + TAU * i as f64 / sides as f64;
        Position::new(center.x + radius * theta.cos(), center.y + radius * theta.sin())
    }));
    create_polygon(vec![ring])
}

/// A star with `points` tips alternating between the outer and inner radius.
/// The first tip points up (north) before rotation.
pub fn create_star(
    center: Position,
    outer_radius: f64,
    inner_radius: f64,
    points: usize,
    rotation_deg: f64,
) -> Result<Geometry> {
    if points < 2 {
        return Err(GeoscopeError::InvalidInput(format!(
            "a star needs at least 2 points, got {}",
            points
        )));
    }
    if !(outer_radius.is_finite() && inner_radius.is_finite())
        || inner_radius <= 0.0
        || outer_radius <= inner_radius
    {
        return Err(GeoscopeError::InvalidInput(format!(
            "star radii must satisfy 0 < inner < outer, got inner={} outer={}",
            inner_radius, outer_radius
        )));
    }

    let start = FRAC_PI_2 + rotation_deg.to_radians();
    let vertices = points * 2;
    let ring = closed((0..vertices).map(|i| {
        let theta = start + TAU * i as f64 / vertices as f64;
        let r = if i % 2 == 0 { outer_radius } else { inner_radius };
        Position::new(center.x + r * theta.cos(), center.y + r * theta.sin())
    }));
    create_polygon(vec![ring])
}

/// The rectangle covering a bounding box, counter-clockwise from the lower-left.
pub fn create_rectangle(bounds: &Bounds) -> Geometry {
    Geometry::Polygon(vec![vec![
        Position::new(bounds.min_x, bounds.min_y),
        Position::new(bounds.max_x, bounds.min_y),
        Position::new(bounds.max_x, bounds.max_y),
        Position::new(bounds.min_x, bounds.max_y),
        Position::new(bounds.min_x, bounds.min_y),
    ]])
}

fn closed(vertices: impl Iterator<Item = Position>) -> Ring {
    let mut ring: Ring = vertices.collect();
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::measure::{area, signed_ring_area};

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn test_line_string_needs_two_positions() {
        assert!(create_line_string(vec![p(0.0, 0.0)]).is_err());
        assert!(create_line_string(vec![p(0.0, 0.0), p(1.0, 1.0)]).is_ok());
    }

    #[test]
    fn test_polygon_structural_errors() {
        assert!(matches!(
            create_polygon(vec![]),
            Err(GeoscopeError::Geometry(_))
        ));
        let short = vec![p(0.0, 0.0), p(1.0, 0.0), p(0.0, 0.0)];
        assert!(create_polygon(vec![short]).is_err());
        let unclosed = vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)];
        let err = create_polygon(vec![unclosed]).unwrap_err();
        assert!(err.to_string().contains("not closed"));
    }

    #[test]
    fn test_empty_multi_containers_fail() {
        assert!(create_multi_point(vec![]).is_err());
        assert!(create_multi_line_string(vec![]).is_err());
        assert!(create_multi_polygon(vec![]).is_err());
        assert!(create_geometry_collection(vec![]).is_ok());
    }

    #[test]
    fn test_multi_line_string_checks_members() {
        let result = create_multi_line_string(vec![vec![p(0.0, 0.0), p(1.0, 0.0)], vec![p(2.0, 2.0)]]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_circle_vertices_on_radius() {
        let circle = create_circle(p(10.0, -5.0), 3.0, 24).unwrap();
        let Geometry::Polygon(rings) = circle else {
            panic!("expected polygon");
        };
        assert_eq!(rings[0].len(), 25);
        for v in &rings[0] {
            let d = ((v.x - 10.0).powi(2) + (v.y + 5.0).powi(2)).sqrt();
            assert!((d - 3.0).abs() < 1e-9);
        }
        assert!(signed_ring_area(&rings[0]) > 0.0);
    }

    #[test]
    fn test_circle_requires_three_steps() {
        assert!(create_circle(p(0.0, 0.0), 1.0, 2).is_err());
        assert!(create_circle(p(0.0, 0.0), -1.0, 8).is_err());
    }

    #[test]
    fn test_ellipse_area_approaches_pi_ab() {
        let ellipse = create_ellipse(p(0.0, 0.0), 4.0, 2.0, 30.0, 720).unwrap();
        let expected = std::f64::consts::PI * 8.0;
        assert!((area(&ellipse) - expected).abs() / expected < 1e-3);
    }

    #[test]
    fn test_regular_hexagon() {
        let hex = create_regular_polygon(p(0.0, 0.0), 1.0, 6, 0.0).unwrap();
        let expected = 3.0 * 3f64.sqrt() / 2.0;
        assert!((area(&hex) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_star_alternates_radii() {
        let star = create_star(p(0.0, 0.0), 2.0, 1.0, 5, 0.0).unwrap();
        let Geometry::Polygon(rings) = star else {
            panic!("expected polygon");
        };
        assert_eq!(rings[0].len(), 11);
        assert!((rings[0][0].y - 2.0).abs() < 1e-12);
        let r1 = (rings[0][1].x.powi(2) + rings[0][1].y.powi(2)).sqrt();
        assert!((r1 - 1.0).abs() < 1e-12);
        assert!(create_star(p(0.0, 0.0), 1.0, 2.0, 5, 0.0).is_err());
    }

    #[test]
    fn test_rectangle_from_bounds() {
        let rect = create_rectangle(&Bounds::new(0.0, 0.0, 2.0, 3.0));
        assert_eq!(area(&rect), 6.0);
        assert!(check_geometry(&rect).is_ok());
    }
}
