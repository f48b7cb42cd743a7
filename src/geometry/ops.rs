//! Structural helpers shared by the topology and transform engines.

use geoscope_types::{Geometry, Position, Ring};

/// Append the first position when the ring is open.
pub fn close_ring(mut ring: Ring) -> Ring {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last())
        && !first.equals_2d(last)
    {
        ring.push(first);
    }
    ring
}

/// Reverse the order of every position sequence, keeping the member order.
pub fn reverse(geometry: &Geometry) -> Geometry {
    fn rev(positions: &[Position]) -> Vec<Position> {
        positions.iter().rev().copied().collect()
    }

    match geometry {
        Geometry::Point(p) => Geometry::Point(*p),
        Geometry::LineString(line) => Geometry::LineString(rev(line)),
        Geometry::MultiPoint(points) => Geometry::MultiPoint(rev(points)),
        Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(|r| rev(r)).collect()),
        Geometry::MultiLineString(lines) => {
            Geometry::MultiLineString(lines.iter().map(|l| rev(l)).collect())
        }
        Geometry::MultiPolygon(polygons) => Geometry::MultiPolygon(
            polygons
                .iter()
                .map(|rings| rings.iter().map(|r| rev(r)).collect())
                .collect(),
        ),
        Geometry::GeometryCollection(geometries) => {
            Geometry::GeometryCollection(geometries.iter().map(reverse).collect())
        }
    }
}

/// Flatten any geometry to its positions in document order.
pub fn extract_positions(geometry: &Geometry) -> Vec<Position> {
    let mut out = Vec::with_capacity(geometry.position_count());
    geometry.for_each_position(&mut |p| out.push(*p));
    out
}

/// Every boundary segment of a geometry: consecutive pairs along lines and
/// rings. Points contribute nothing.
pub fn segments(geometry: &Geometry) -> Vec<(Position, Position)> {
    let mut out = Vec::new();
    collect_segments(geometry, &mut out);
    out
}

fn push_path(path: &[Position], out: &mut Vec<(Position, Position)>) {
    out.extend(path.windows(2).map(|w| (w[0], w[1])));
}

fn collect_segments(geometry: &Geometry, out: &mut Vec<(Position, Position)>) {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => {}
        Geometry::LineString(line) => push_path(line, out),
        Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
            rings.iter().for_each(|r| push_path(r, out))
        }
        Geometry::MultiPolygon(polygons) => {
            polygons.iter().flatten().for_each(|r| push_path(r, out))
        }
        Geometry::GeometryCollection(geometries) => {
            geometries.iter().for_each(|g| collect_segments(g, out))
        }
    }
}

/// Rebuild a geometry with every position passed through `f`, stopping at
/// the first error.
pub fn try_map_positions<F, E>(geometry: &Geometry, f: &mut F) -> Result<Geometry, E>
where
    F: FnMut(&Position) -> Result<Position, E>,
{
    let mut path = |positions: &[Position]| -> Result<Vec<Position>, E> {
        positions.iter().map(&mut *f).collect()
    };
    Ok(match geometry {
        Geometry::Point(p) => Geometry::Point(f(p)?),
        Geometry::LineString(line) => Geometry::LineString(path(line)?),
        Geometry::MultiPoint(points) => Geometry::MultiPoint(path(points)?),
        Geometry::Polygon(rings) => {
            Geometry::Polygon(rings.iter().map(|r| path(r)).collect::<Result<_, E>>()?)
        }
        Geometry::MultiLineString(lines) => {
            Geometry::MultiLineString(lines.iter().map(|l| path(l)).collect::<Result<_, E>>()?)
        }
        Geometry::MultiPolygon(polygons) => Geometry::MultiPolygon(
            polygons
                .iter()
                .map(|rings| rings.iter().map(|r| path(r)).collect::<Result<_, E>>())
                .collect::<Result<_, E>>()?,
        ),
        Geometry::GeometryCollection(geometries) => Geometry::GeometryCollection(
            geometries
                .iter()
                .map(|g| try_map_positions(g, f))
                .collect::<Result<_, E>>()?,
        ),
    })
}

/// Ring positions without the closing duplicate.
pub(crate) fn open_ring(ring: &[Position]) -> &[Position] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first.equals_2d(last) => {
            &ring[..ring.len() - 1]
        }
        _ => ring,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn test_close_ring() {
        let ring = close_ring(vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)]);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[3], p(0.0, 0.0));
        assert_eq!(close_ring(ring.clone()), ring);
        assert!(close_ring(Vec::new()).is_empty());
    }

    #[test]
    fn test_reverse_twice_is_identity() {
        let poly = Geometry::Polygon(vec![vec![
            p(0.0, 0.0),
            p(2.0, 0.0),
            p(2.0, 2.0),
            p(0.0, 0.0),
        ]]);
        let reversed = reverse(&poly);
        assert_ne!(reversed, poly);
        assert_eq!(reverse(&reversed), poly);
    }

    #[test]
    fn test_extract_positions_flattens_collections() {
        let geom = Geometry::GeometryCollection(vec![
            Geometry::Point(p(1.0, 1.0)),
            Geometry::LineString(vec![p(0.0, 0.0), p(3.0, 3.0)]),
        ]);
        assert_eq!(
            extract_positions(&geom),
            vec![p(1.0, 1.0), p(0.0, 0.0), p(3.0, 3.0)]
        );
    }

    #[test]
    fn test_segments() {
        let ring = vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 0.0)];
        assert_eq!(segments(&Geometry::Polygon(vec![ring])).len(), 3);
        assert!(segments(&Geometry::Point(p(0.0, 0.0))).is_empty());
    }

    #[test]
    fn test_try_map_positions() {
        let line = Geometry::LineString(vec![p(0.0, 0.0), p(1.0, 2.0)]);
        let shifted: Result<Geometry, ()> = try_map_positions(&line, &mut |q| Ok(p(q.x + 1.0, q.y)));
        assert_eq!(shifted, Ok(Geometry::LineString(vec![p(1.0, 0.0), p(2.0, 2.0)])));
        let failed: Result<Geometry, &str> = try_map_positions(&line, &mut |_| Err("nope"));
        assert_eq!(failed, Err("nope"));
    }

    #[test]
    fn test_open_ring() {
        let ring = vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 0.0)];
        assert_eq!(open_ring(&ring).len(), 3);
        assert_eq!(open_ring(&ring[..3]).len(), 3);
    }
}
