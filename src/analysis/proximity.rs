//! Distance queries between positions, lines and routes.

use crate::cancel::{self, CancelToken};
use crate::error::{GeoscopeError, Result};
use crate::geometry::measure::{EARTH_RADIUS_M, haversine_distance};
use crate::transform::simplify::segment_distance;
use geo::{Distance, Euclidean, Geodesic, Point, Rhumb};
use geoscope_types::Position;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};

/// Distance metrics for spatial calculations.
///
/// - **Haversine**: Fast spherical distance, good for most lon/lat calculations
/// - **Geodesic**: Ellipsoidal distance (Karney 2013), slower
/// - **Rhumb**: Constant bearing distance, useful for navigation
/// - **Euclidean**: Planar distance, only for projected coordinates
///
/// Every metric except `Euclidean` reads positions as longitude/latitude
/// degrees and returns meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Haversine,
    Geodesic,
    Rhumb,
    Euclidean,
}

impl DistanceMetric {
    pub fn is_geographic(&self) -> bool {
        !matches!(self, DistanceMetric::Euclidean)
    }
}

/// Distance between two positions with the given metric.
///
/// # Examples
///
/// ```rust
/// use geoscope::analysis::proximity::{distance_between, DistanceMetric};
/// use geoscope::Position;
///
/// let nyc = Position::new(-74.0060, 40.7128);
/// let la = Position::new(-118.2437, 34.0522);
///
/// let dist = distance_between(&nyc, &la, DistanceMetric::Haversine);
/// assert!(dist > 3_900_000.0);
///
/// let dist_geodesic = distance_between(&nyc, &la, DistanceMetric::Geodesic);
/// assert!(dist_geodesic > 3_900_000.0);
/// ```
pub fn distance_between(a: &Position, b: &Position, metric: DistanceMetric) -> f64 {
    let (pa, pb) = (Point::from(a.to_coord()), Point::from(b.to_coord()));
    match metric {
        DistanceMetric::Haversine => haversine_distance(a, b, EARTH_RADIUS_M),
        DistanceMetric::Geodesic => Geodesic.distance(pa, pb),
        DistanceMetric::Rhumb => Rhumb.distance(pa, pb),
        DistanceMetric::Euclidean => Euclidean.distance(pa, pb),
    }
}

fn sort_by_distance(hits: &mut [(usize, f64)]) {
    hits.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
}

/// The `n` candidates closest to `target`, as `(index, distance)` pairs
/// sorted nearest first.
pub fn nearest_n(
    target: &Position,
    candidates: &[Position],
    n: usize,
    metric: DistanceMetric,
) -> Vec<(usize, f64)> {
    let mut hits: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(idx, p)| (idx, distance_between(target, p, metric)))
        .collect();
    sort_by_distance(&mut hits);
    hits.truncate(n);
    hits
}

/// Every candidate within `max_distance` of `target`, nearest first.
pub fn within_distance(
    target: &Position,
    candidates: &[Position],
    max_distance: f64,
    metric: DistanceMetric,
) -> Vec<(usize, f64)> {
    let mut hits: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(idx, p)| (idx, distance_between(target, p, metric)))
        .filter(|(_, d)| *d <= max_distance)
        .collect();
    sort_by_distance(&mut hits);
    hits
}

/// For each point, its `k` nearest other points as `(index, distance)`.
///
/// Euclidean queries run on an `rstar` tree; geographic metrics compare all
/// pairs.
pub fn k_nearest_neighbors(
    points: &[Position],
    k: usize,
    metric: DistanceMetric,
    cancel: Option<&CancelToken>,
) -> Result<Vec<Vec<(usize, f64)>>> {
    if k == 0 {
        return Err(GeoscopeError::InvalidInput(
            "k must be greater than zero".to_string(),
        ));
    }

    if metric == DistanceMetric::Euclidean {
        let tree = RTree::bulk_load(
            points
                .iter()
                .enumerate()
                .map(|(idx, p)| GeomWithData::new([p.x, p.y], idx))
                .collect(),
        );
        return points
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                cancel::check(cancel)?;
                Ok(tree
                    .nearest_neighbor_iter(&[p.x, p.y])
                    .filter(|hit| hit.data != idx)
                    .take(k)
                    .map(|hit| {
                        let [x, y] = *hit.geom();
                        (hit.data, (x - p.x).hypot(y - p.y))
                    })
                    .collect())
            })
            .collect();
    }

    points
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            cancel::check(cancel)?;
            let mut hits: Vec<(usize, f64)> = points
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != idx)
                .map(|(other, q)| (other, distance_between(p, q, metric)))
                .collect();
            sort_by_distance(&mut hits);
            hits.truncate(k);
            Ok(hits)
        })
        .collect()
}

/// Full `origins x destinations` distance table.
pub fn distance_matrix(
    origins: &[Position],
    destinations: &[Position],
    metric: DistanceMetric,
    cancel: Option<&CancelToken>,
) -> Result<Vec<Vec<f64>>> {
    origins
        .iter()
        .map(|o| {
            cancel::check(cancel)?;
            Ok(destinations
                .iter()
                .map(|d| distance_between(o, d, metric))
                .collect())
        })
        .collect()
}

/// Planar distance from `p` to the closed segment `a`-`b`.
pub fn point_to_segment_distance(p: &Position, a: &Position, b: &Position) -> f64 {
    segment_distance(p, a, b)
}

/// Meters per degree at latitude `lat` on the default sphere.
fn local_scale(lat: f64) -> (f64, f64) {
    let per_degree = EARTH_RADIUS_M.to_radians();
    (per_degree * lat.to_radians().cos(), per_degree)
}

/// Shortest distance from `p` to a polyline.
///
/// Geographic metrics project the line onto a local equirectangular plane
/// centered on `p`, which is accurate for corridor-scale distances.
pub fn point_to_line_distance(p: &Position, line: &[Position], metric: DistanceMetric) -> f64 {
    match line {
        [] => f64::INFINITY,
        [only] => distance_between(p, only, metric),
        _ if metric == DistanceMetric::Euclidean => line
            .windows(2)
            .map(|w| segment_distance(p, &w[0], &w[1]))
            .fold(f64::INFINITY, f64::min),
        _ => {
            let (sx, sy) = local_scale(p.y);
            let project =
                |q: &Position| Position::new((q.x - p.x) * sx, (q.y - p.y) * sy);
            let origin = Position::new(0.0, 0.0);
            line.windows(2)
                .map(|w| segment_distance(&origin, &project(&w[0]), &project(&w[1])))
                .fold(f64::INFINITY, f64::min)
        }
    }
}

/// Indices of the points lying within `max_distance` of the route.
pub fn within_corridor(
    points: &[Position],
    route: &[Position],
    max_distance: f64,
    metric: DistanceMetric,
) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| point_to_line_distance(p, route, metric) <= max_distance)
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn test_metrics_agree_roughly() {
        let a = p(-74.0060, 40.7128);
        let b = p(-73.9442, 40.6782);
        let h = distance_between(&a, &b, DistanceMetric::Haversine);
        let g = distance_between(&a, &b, DistanceMetric::Geodesic);
        let r = distance_between(&a, &b, DistanceMetric::Rhumb);
        assert!((h - g).abs() / g < 0.01);
        assert!((h - r).abs() / r < 0.01);
        assert_eq!(distance_between(&p(0.0, 0.0), &p(3.0, 4.0), DistanceMetric::Euclidean), 5.0);
    }

    #[test]
    fn test_nearest_n_and_within_distance() {
        let candidates = vec![p(10.0, 0.0), p(1.0, 0.0), p(5.0, 0.0), p(2.0, 0.0)];
        let nearest = nearest_n(&p(0.0, 0.0), &candidates, 2, DistanceMetric::Euclidean);
        assert_eq!(nearest, vec![(1, 1.0), (3, 2.0)]);
        let within = within_distance(&p(0.0, 0.0), &candidates, 5.0, DistanceMetric::Euclidean);
        assert_eq!(within.iter().map(|h| h.0).collect::<Vec<_>>(), vec![1, 3, 2]);
    }

    #[test]
    fn test_k_nearest_neighbors_euclidean_matches_brute_force() {
        let points: Vec<Position> = (0..40)
            .map(|i| p((i * 7 % 13) as f64, (i * 5 % 11) as f64 + i as f64 * 0.01))
            .collect();
        let fast = k_nearest_neighbors(&points, 3, DistanceMetric::Euclidean, None).unwrap();
        for (idx, hits) in fast.iter().enumerate() {
            let brute = nearest_n(&points[idx], &points, 4, DistanceMetric::Euclidean);
            let brute_d: Vec<f64> = brute.iter().filter(|h| h.0 != idx).map(|h| h.1).take(3).collect();
            let fast_d: Vec<f64> = hits.iter().map(|h| h.1).collect();
            for (f, b) in fast_d.iter().zip(&brute_d) {
                assert!((f - b).abs() < 1e-12);
            }
        }
        assert!(k_nearest_neighbors(&points, 0, DistanceMetric::Euclidean, None).is_err());
    }

    #[test]
    fn test_distance_matrix_shape_and_cancel() {
        let a = vec![p(0.0, 0.0), p(1.0, 0.0)];
        let b = vec![p(0.0, 1.0), p(0.0, 2.0), p(0.0, 3.0)];
        let m = distance_matrix(&a, &b, DistanceMetric::Euclidean, None).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m[0], vec![1.0, 2.0, 3.0]);

        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            distance_matrix(&a, &b, DistanceMetric::Euclidean, Some(&token)),
            Err(GeoscopeError::Cancelled)
        );
    }

    #[test]
    fn test_point_to_segment() {
        assert_eq!(point_to_segment_distance(&p(1.0, 1.0), &p(0.0, 0.0), &p(2.0, 0.0)), 1.0);
        assert_eq!(point_to_segment_distance(&p(-3.0, 4.0), &p(0.0, 0.0), &p(2.0, 0.0)), 5.0);
    }

    #[test]
    fn test_corridor_geographic() {
        // Route along the equator; 0.001 degrees of latitude is about 111 m.
        let route = vec![p(0.0, 0.0), p(1.0, 0.0)];
        let points = vec![p(0.5, 0.001), p(0.5, 0.01), p(2.0, 0.0)];
        let d = point_to_line_distance(&points[0], &route, DistanceMetric::Haversine);
        assert!((d - 111.19).abs() < 0.5);
        assert_eq!(within_corridor(&points, &route, 200.0, DistanceMetric::Haversine), vec![0]);
    }
}
