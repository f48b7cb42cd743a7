//! Planar and spherical measurements.

use geoscope_types::{Bounds, Geometry, Position, Ring};

/// Default sphere radius for haversine distances, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Bounding box of every position, `None` for an empty geometry.
pub fn bounds(geometry: &Geometry) -> Option<Bounds> {
    let mut bounds: Option<Bounds> = None;
    geometry.for_each_position(&mut |p| match bounds.as_mut() {
        Some(b) => b.extend_position(p),
        None => bounds = Some(Bounds::from_position(p)),
    });
    bounds
}

/// Shoelace area of a ring; positive for counter-clockwise rings.
pub fn signed_ring_area(ring: &[Position]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let a = &ring[i];
        let b = &ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

fn polygon_area(rings: &[Ring]) -> f64 {
    let mut iter = rings.iter();
    let Some(exterior) = iter.next() else {
        return 0.0;
    };
    let holes: f64 = iter.map(|hole| signed_ring_area(hole).abs()).sum();
    (signed_ring_area(exterior).abs() - holes).max(0.0)
}

/// Planar area with holes subtracted. Non-areal geometries have zero area.
///
/// # Examples
///
/// ```
/// use geoscope::geometry::area;
/// use geoscope::{Geometry, Position};
///
/// let ring = vec![
///     Position::new(0.0, 0.0),
///     Position::new(4.0, 0.0),
///     Position::new(4.0, 4.0),
///     Position::new(0.0, 4.0),
///     Position::new(0.0, 0.0),
/// ];
/// let mut reversed = ring.clone();
/// reversed.reverse();
/// assert_eq!(area(&Geometry::Polygon(vec![ring])), 16.0);
/// assert_eq!(area(&Geometry::Polygon(vec![reversed])), 16.0);
/// ```
pub fn area(geometry: &Geometry) -> f64 {
    match geometry {
        Geometry::Polygon(rings) => polygon_area(rings),
        Geometry::MultiPolygon(polygons) => polygons.iter().map(|p| polygon_area(p)).sum(),
        Geometry::GeometryCollection(geometries) => geometries.iter().map(area).sum(),
        Geometry::Point(_)
        | Geometry::LineString(_)
        | Geometry::MultiPoint(_)
        | Geometry::MultiLineString(_) => 0.0,
    }
}

/// Euclidean length of a position sequence.
pub fn path_length(positions: &[Position]) -> f64 {
    positions.windows(2).map(|w| distance(&w[0], &w[1])).sum()
}

/// Planar length of lines, or perimeter of polygons (every ring).
pub fn length(geometry: &Geometry) -> f64 {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => 0.0,
        Geometry::LineString(line) => path_length(line),
        Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
            rings.iter().map(|r| path_length(r)).sum()
        }
        Geometry::MultiPolygon(polygons) => polygons
            .iter()
            .flatten()
            .map(|r| path_length(r))
            .sum(),
        Geometry::GeometryCollection(geometries) => geometries.iter().map(length).sum(),
    }
}

/// Great-circle length in meters, treating x as longitude and y as latitude.
pub fn haversine_length(geometry: &Geometry, radius: f64) -> f64 {
    fn path(positions: &[Position], radius: f64) -> f64 {
        positions
            .windows(2)
            .map(|w| haversine_distance(&w[0], &w[1], radius))
            .sum()
    }
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => 0.0,
        Geometry::LineString(line) => path(line, radius),
        Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
            rings.iter().map(|r| path(r, radius)).sum()
        }
        Geometry::MultiPolygon(polygons) => {
            polygons.iter().flatten().map(|r| path(r, radius)).sum()
        }
        Geometry::GeometryCollection(geometries) => geometries
            .iter()
            .map(|g| haversine_length(g, radius))
            .sum(),
    }
}

/// Planar Euclidean distance between two positions (z ignored).
#[inline]
pub fn distance(a: &Position, b: &Position) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Great-circle distance in meters on a sphere of the given radius.
///
/// Positions are longitude/latitude in degrees.
///
/// # Examples
///
/// ```
/// use geoscope::geometry::{haversine_distance, EARTH_RADIUS_M};
/// use geoscope::Position;
///
/// let nyc = Position::new(-74.0060, 40.7128);
/// let la = Position::new(-118.2437, 34.0522);
/// let d = haversine_distance(&nyc, &la, EARTH_RADIUS_M);
/// assert!(d > 3_900_000.0 && d < 4_000_000.0);
/// ```
pub fn haversine_distance(a: &Position, b: &Position, radius: f64) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let delta_lat = (b.y - a.y).to_radians();
    let delta_lon = (b.x - a.x).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    radius * c
}

#[derive(Default)]
struct CentroidAccumulator {
    area: f64,
    area_x: f64,
    area_y: f64,
    length: f64,
    length_x: f64,
    length_y: f64,
    points: usize,
    point_x: f64,
    point_y: f64,
}

impl CentroidAccumulator {
    fn add_point(&mut self, p: &Position) {
        self.points += 1;
        self.point_x += p.x;
        self.point_y += p.y;
    }

    fn add_path(&mut self, positions: &[Position]) {
        for w in positions.windows(2) {
            let len = distance(&w[0], &w[1]);
            self.length += len;
            self.length_x += len * (w[0].x + w[1].x) / 2.0;
            self.length_y += len * (w[0].y + w[1].y) / 2.0;
        }
        positions.iter().for_each(|p| self.add_point(p));
    }

    /// Adds the ring's area contribution with the given sign.
    fn add_ring(&mut self, ring: &[Position], sign: f64) {
        let signed = signed_ring_area(ring);
        if signed == 0.0 {
            return;
        }
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..ring.len() {
            let a = &ring[i];
            let b = &ring[(i + 1) % ring.len()];
            let cross = a.x * b.y - b.x * a.y;
            cx += (a.x + b.x) * cross;
            cy += (a.y + b.y) * cross;
        }
        // Centroid of the ring is (cx, cy) / (6 * signed); weight by |area|.
        let weight = signed.abs() * sign;
        self.area += weight;
        self.area_x += weight * cx / (6.0 * signed);
        self.area_y += weight * cy / (6.0 * signed);
    }

    fn add_polygon(&mut self, rings: &[Ring]) {
        for (idx, ring) in rings.iter().enumerate() {
            self.add_ring(ring, if idx == 0 { 1.0 } else { -1.0 });
            self.add_path(ring);
        }
    }

    fn add(&mut self, geometry: &Geometry) {
        match geometry {
            Geometry::Point(p) => self.add_point(p),
            Geometry::MultiPoint(points) => points.iter().for_each(|p| self.add_point(p)),
            Geometry::LineString(line) => self.add_path(line),
            Geometry::MultiLineString(lines) => lines.iter().for_each(|l| self.add_path(l)),
            Geometry::Polygon(rings) => self.add_polygon(rings),
            Geometry::MultiPolygon(polygons) => polygons.iter().for_each(|p| self.add_polygon(p)),
            Geometry::GeometryCollection(geometries) => geometries.iter().for_each(|g| self.add(g)),
        }
    }

    fn finish(&self) -> Option<Position> {
        if self.area.abs() > f64::EPSILON {
            Some(Position::new(self.area_x / self.area, self.area_y / self.area))
        } else if self.length > 0.0 {
            Some(Position::new(
                self.length_x / self.length,
                self.length_y / self.length,
            ))
        } else if self.points > 0 {
            let n = self.points as f64;
            Some(Position::new(self.point_x / n, self.point_y / n))
        } else {
            None
        }
    }
}

/// Centroid using the highest dimension present: area-weighted for
/// polygons (holes subtracted), length-weighted for lines, mean for points.
///
/// # Examples
///
/// ```
/// use geoscope::geometry::centroid;
/// use geoscope::{Geometry, Position};
///
/// let square = Geometry::Polygon(vec![vec![
///     Position::new(0.0, 0.0),
///     Position::new(4.0, 0.0),
///     Position::new(4.0, 4.0),
///     Position::new(0.0, 4.0),
///     Position::new(0.0, 0.0),
/// ]]);
/// assert_eq!(centroid(&square), Some(Position::new(2.0, 2.0)));
/// ```
pub fn centroid(geometry: &Geometry) -> Option<Position> {
    let mut acc = CentroidAccumulator::default();
    acc.add(geometry);
    acc.finish()
}

/// Arithmetic mean of positions.
pub fn mean_position(positions: &[Position]) -> Option<Position> {
    if positions.is_empty() {
        return None;
    }
    let n = positions.len() as f64;
    let (sx, sy) = positions
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Position::new(sx / n, sy / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    fn square(x0: f64, y0: f64, size: f64) -> Ring {
        vec![
            p(x0, y0),
            p(x0 + size, y0),
            p(x0 + size, y0 + size),
            p(x0, y0 + size),
            p(x0, y0),
        ]
    }

    #[test]
    fn test_polygon_area_and_centroid() {
        let poly = Geometry::Polygon(vec![square(0.0, 0.0, 4.0)]);
        assert_eq!(area(&poly), 16.0);
        assert_eq!(centroid(&poly), Some(p(2.0, 2.0)));
    }

    #[test]
    fn test_area_subtracts_holes() {
        let mut hole = square(1.0, 1.0, 1.0);
        hole.reverse();
        let poly = Geometry::Polygon(vec![square(0.0, 0.0, 4.0), hole]);
        assert_eq!(area(&poly), 15.0);
        let c = centroid(&poly).unwrap();
        // The hole pulls the centroid away from (1.5, 1.5).
        assert!(c.x > 2.0 && c.y > 2.0);
    }

    #[test]
    fn test_area_invariant_under_reversal() {
        let ring = vec![p(0.0, 0.0), p(5.0, 1.0), p(3.0, 4.0), p(-1.0, 2.0), p(0.0, 0.0)];
        let mut reversed = ring.clone();
        reversed.reverse();
        assert_eq!(
            area(&Geometry::Polygon(vec![ring.clone()])),
            area(&Geometry::Polygon(vec![reversed.clone()]))
        );
        assert_eq!(signed_ring_area(&ring), -signed_ring_area(&reversed));
    }

    #[test]
    fn test_bounds_of_collection() {
        let geom = Geometry::GeometryCollection(vec![
            Geometry::Point(p(-3.0, 7.0)),
            Geometry::Polygon(vec![square(0.0, 0.0, 2.0)]),
        ]);
        let b = bounds(&geom).unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (-3.0, 0.0, 2.0, 7.0));
        assert!(bounds(&Geometry::GeometryCollection(vec![])).is_none());
    }

    #[test]
    fn test_length() {
        let line = Geometry::LineString(vec![p(0.0, 0.0), p(3.0, 4.0), p(3.0, 10.0)]);
        assert_eq!(length(&line), 11.0);
        let poly = Geometry::Polygon(vec![square(0.0, 0.0, 2.0)]);
        assert_eq!(length(&poly), 8.0);
    }

    #[test]
    fn test_line_centroid_is_length_weighted() {
        let line = Geometry::LineString(vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 1.0)]);
        let c = centroid(&line).unwrap();
        assert!((c.x - (10.0 * 5.0 + 1.0 * 10.0) / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_multipoint_centroid_is_mean() {
        let mp = Geometry::MultiPoint(vec![p(0.0, 0.0), p(2.0, 0.0), p(1.0, 3.0)]);
        assert_eq!(centroid(&mp), Some(p(1.0, 1.0)));
    }

    #[test]
    fn test_haversine_radius_scales() {
        let a = p(0.0, 0.0);
        let b = p(1.0, 0.0);
        let d1 = haversine_distance(&a, &b, EARTH_RADIUS_M);
        let d2 = haversine_distance(&a, &b, 2.0 * EARTH_RADIUS_M);
        assert!((d1 - 111_194.9).abs() < 1.0);
        assert!((d2 - 2.0 * d1).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_length() {
        let line = Geometry::LineString(vec![p(0.0, 0.0), p(0.0, 1.0), p(0.0, 2.0)]);
        let len = haversine_length(&line, EARTH_RADIUS_M);
        assert!((len - 2.0 * 111_194.9).abs() < 2.0);
    }
}
