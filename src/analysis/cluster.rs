//! Point clustering: DBSCAN, k-means, agglomerative and silhouette scoring.

use crate::cancel::{self, CancelToken};
use crate::config::Config;
use crate::error::{GeoscopeError, Result};
use crate::geometry::measure::{EARTH_RADIUS_M, haversine_distance, mean_position};
use geoscope_types::Position;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Distance used when comparing points during clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMetric {
    #[default]
    Euclidean,
    Manhattan,
    /// Great-circle meters; positions are lon/lat degrees.
    Haversine,
}

impl ClusterMetric {
    pub fn distance(&self, a: &Position, b: &Position) -> f64 {
        match self {
            ClusterMetric::Euclidean => (a.x - b.x).hypot(a.y - b.y),
            ClusterMetric::Manhattan => (a.x - b.x).abs() + (a.y - b.y).abs(),
            ClusterMetric::Haversine => haversine_distance(a, b, EARTH_RADIUS_M),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    /// Indices into the input slice, ascending.
    pub members: Vec<usize>,
    /// Member positions, in the same order as `members`.
    pub positions: Vec<Position>,
    pub centroid: Position,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Clusters plus a per-point label; `None` marks noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    pub clusters: Vec<Cluster>,
    pub labels: Vec<Option<usize>>,
}

impl Clustering {
    pub fn noise(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Rebuild clusters from labels, numbering them by smallest member.
    fn from_labels(points: &[Position], raw: &[Option<usize>]) -> Self {
        let mut renumber: FxHashMap<usize, usize> = FxHashMap::default();
        let mut members: Vec<Vec<usize>> = Vec::new();
        let labels = raw
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                label.map(|l| {
                    let id = *renumber.entry(l).or_insert_with(|| {
                        members.push(Vec::new());
                        members.len() - 1
                    });
                    members[id].push(idx);
                    id
                })
            })
            .collect();
        let clusters = members
            .into_iter()
            .enumerate()
            .filter_map(|(id, members)| {
                let positions: Vec<Position> = members.iter().map(|&i| points[i]).collect();
                mean_position(&positions).map(|centroid| Cluster {
                    id,
                    members,
                    positions,
                    centroid,
                })
            })
            .collect();
        Self { clusters, labels }
    }
}

fn check_finite(points: &[Position]) -> Result<()> {
    match points.iter().position(|p| !p.is_finite()) {
        Some(idx) => Err(GeoscopeError::InvalidInput(format!(
            "Point {} has non-finite coordinates",
            idx
        ))),
        None => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct DbscanOptions {
    /// Neighborhood radius in the metric's units.
    pub eps: f64,
    /// Neighbors (the point itself included) needed for a core point.
    pub min_points: usize,
    pub metric: ClusterMetric,
    pub cancel: Option<CancelToken>,
}

impl DbscanOptions {
    pub fn new(eps: f64, min_points: usize) -> Self {
        Self {
            eps,
            min_points,
            metric: ClusterMetric::default(),
            cancel: None,
        }
    }

    pub fn with_metric(mut self, metric: ClusterMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Density-based clustering.
///
/// Core points connected through core neighborhoods form a cluster. A border
/// point joins the cluster of its nearest core neighbor, so membership does
/// not depend on input order. Points near no core are noise.
///
/// # Examples
///
/// ```
/// use geoscope::analysis::cluster::{dbscan, DbscanOptions};
/// use geoscope::Position;
///
/// let points = vec![
///     Position::new(0.0, 0.0),
///     Position::new(0.5, 0.0),
///     Position::new(0.0, 0.5),
///     Position::new(50.0, 50.0),
/// ];
/// let result = dbscan(&points, &DbscanOptions::new(1.0, 3)).unwrap();
/// assert_eq!(result.clusters.len(), 1);
/// assert_eq!(result.noise(), vec![3]);
/// ```
pub fn dbscan(points: &[Position], options: &DbscanOptions) -> Result<Clustering> {
    if !options.eps.is_finite() || options.eps <= 0.0 {
        return Err(GeoscopeError::InvalidInput(format!(
            "DBSCAN eps must be positive and finite, got {}",
            options.eps
        )));
    }
    if options.min_points == 0 {
        return Err(GeoscopeError::InvalidInput(
            "DBSCAN min_points must be at least 1".to_string(),
        ));
    }
    check_finite(points)?;

    let neighbors: Vec<Vec<usize>> = points
        .iter()
        .map(|p| {
            cancel::check(options.cancel.as_ref())?;
            Ok(points
                .iter()
                .enumerate()
                .filter(|(_, q)| options.metric.distance(p, q) <= options.eps)
                .map(|(j, _)| j)
                .collect())
        })
        .collect::<Result<_>>()?;
    let is_core: Vec<bool> = neighbors
        .iter()
        .map(|n| n.len() >= options.min_points)
        .collect();

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut next_id = 0;
    for seed in 0..points.len() {
        if !is_core[seed] || labels[seed].is_some() {
            continue;
        }
        labels[seed] = Some(next_id);
        let mut stack = vec![seed];
        while let Some(current) = stack.pop() {
            for &n in &neighbors[current] {
                if is_core[n] && labels[n].is_none() {
                    labels[n] = Some(next_id);
                    stack.push(n);
                }
            }
        }
        next_id += 1;
    }

    for idx in 0..points.len() {
        if is_core[idx] {
            continue;
        }
        let nearest_core = neighbors[idx]
            .iter()
            .filter(|&&n| is_core[n])
            .min_by(|&&a, &&b| {
                let da = options.metric.distance(&points[idx], &points[a]);
                let db = options.metric.distance(&points[idx], &points[b]);
                da.partial_cmp(&db)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| {
                        (points[a].x, points[a].y)
                            .partial_cmp(&(points[b].x, points[b].y))
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
            });
        labels[idx] = nearest_core.and_then(|&core| labels[core]);
    }

    let result = Clustering::from_labels(points, &labels);
    log::debug!(
        "DBSCAN found {} clusters and {} noise points",
        result.clusters.len(),
        result.labels.iter().filter(|l| l.is_none()).count()
    );
    Ok(result)
}

#[derive(Debug, Clone)]
pub struct KMeansOptions {
    pub k: usize,
    pub max_iterations: usize,
    pub metric: ClusterMetric,
    /// Seed for k-means++ initialisation; equal seeds give equal results.
    pub seed: u64,
    pub cancel: Option<CancelToken>,
}

impl KMeansOptions {
    pub fn new(k: usize) -> Self {
        Self::from_config(&Config::default(), k)
    }

    pub fn from_config(config: &Config, k: usize) -> Self {
        Self {
            k,
            max_iterations: config.kmeans_max_iterations,
            metric: ClusterMetric::default(),
            seed: 42,
            cancel: None,
        }
    }

    pub fn with_metric(mut self, metric: ClusterMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansResult {
    pub clustering: Clustering,
    /// Final centroids indexed by the label used during iteration.
    pub centroids: Vec<Position>,
    pub iterations: usize,
    pub converged: bool,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
}

fn check_k(k: usize, n: usize) -> Result<()> {
    if k == 0 || k > n {
        return Err(GeoscopeError::InvalidInput(format!(
            "k must be between 1 and the number of points ({}), got {}",
            n, k
        )));
    }
    Ok(())
}

/// k-means++: first centroid uniform, then proportional to squared distance.
fn seed_centroids(points: &[Position], k: usize, metric: ClusterMetric, rng: &mut StdRng) -> Vec<Position> {
    let mut centroids = vec![points[rng.gen_range(0..points.len())]];
    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| metric.distance(p, c))
                    .fold(f64::INFINITY, f64::min)
                    .powi(2)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.r#gen::<f64>() * total;
            weights
                .iter()
                .position(|w| {
                    target -= w;
                    target <= 0.0 && *w > 0.0
                })
                .unwrap_or(points.len() - 1)
        } else {
            rng.gen_range(0..points.len())
        };
        centroids.push(points[chosen]);
    }
    centroids
}

fn nearest_centroid(p: &Position, centroids: &[Position], metric: ClusterMetric) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, metric.distance(p, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// Lloyd's k-means with k-means++ seeding.
///
/// Stops when an iteration changes no label or after `max_iterations`.
/// A cluster that loses all members keeps its previous centroid.
pub fn kmeans(points: &[Position], options: &KMeansOptions) -> Result<KMeansResult> {
    check_k(options.k, points.len())?;
    check_finite(points)?;

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut centroids = seed_centroids(points, options.k, options.metric, &mut rng);
    let mut labels: Vec<usize> = vec![usize::MAX; points.len()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        cancel::check(options.cancel.as_ref())?;
        iterations += 1;

        let mut changed = false;
        for (idx, p) in points.iter().enumerate() {
            let (best, _) = nearest_centroid(p, &centroids, options.metric);
            if labels[idx] != best {
                labels[idx] = best;
                changed = true;
            }
        }
        if !changed {
            converged = true;
            break;
        }

        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<Position> = points
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == cluster)
                .map(|(p, _)| *p)
                .collect();
            if let Some(mean) = mean_position(&members) {
                *centroid = mean;
            }
        }
    }

    // Labels stay unassigned only when max_iterations is zero.
    for (idx, p) in points.iter().enumerate() {
        if labels[idx] == usize::MAX {
            labels[idx] = nearest_centroid(p, &centroids, options.metric).0;
        }
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| options.metric.distance(p, &centroids[l]).powi(2))
        .sum();
    log::debug!(
        "k-means with k={} stopped after {} iterations (converged: {})",
        options.k,
        iterations,
        converged
    );

    let raw: Vec<Option<usize>> = labels.iter().map(|&l| Some(l)).collect();
    Ok(KMeansResult {
        clustering: Clustering::from_labels(points, &raw),
        centroids,
        iterations,
        converged,
        inertia,
    })
}

/// Agglomerative clustering with average linkage, merged until `k` clusters
/// remain. Linkage distances are maintained with the Lance-Williams update.
pub fn hierarchical(
    points: &[Position],
    k: usize,
    metric: ClusterMetric,
    cancel: Option<&CancelToken>,
) -> Result<Clustering> {
    check_k(k, points.len())?;
    check_finite(points)?;

    let n = points.len();
    let mut dist: Vec<Vec<f64>> = points
        .iter()
        .map(|p| {
            cancel::check(cancel)?;
            Ok(points.iter().map(|q| metric.distance(p, q)).collect())
        })
        .collect::<Result<_>>()?;
    let mut sizes = vec![1usize; n];
    let mut active: Vec<bool> = vec![true; n];
    let mut assignment: Vec<usize> = (0..n).collect();
    let mut remaining = n;

    while remaining > k {
        cancel::check(cancel)?;
        let mut best = (usize::MAX, usize::MAX, f64::INFINITY);
        for i in (0..n).filter(|&i| active[i]) {
            for j in (i + 1..n).filter(|&j| active[j]) {
                if dist[i][j] < best.2 {
                    best = (i, j, dist[i][j]);
                }
            }
        }
        let (i, j, _) = best;
        if i == usize::MAX {
            break;
        }

        let (ni, nj) = (sizes[i] as f64, sizes[j] as f64);
        for m in (0..n).filter(|&m| active[m] && m != i && m != j) {
            let merged = (ni * dist[i][m] + nj * dist[j][m]) / (ni + nj);
            dist[i][m] = merged;
            dist[m][i] = merged;
        }
        sizes[i] += sizes[j];
        active[j] = false;
        for a in assignment.iter_mut().filter(|a| **a == j) {
            *a = i;
        }
        remaining -= 1;
    }

    let raw: Vec<Option<usize>> = assignment.into_iter().map(Some).collect();
    Ok(Clustering::from_labels(points, &raw))
}

/// Mean silhouette coefficient over labelled points.
///
/// Noise is ignored. Returns `None` when fewer than two clusters are present.
pub fn silhouette_score(points: &[Position], labels: &[Option<usize>], metric: ClusterMetric) -> Option<f64> {
    let mut groups: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for (idx, label) in labels.iter().enumerate().take(points.len()) {
        if let Some(l) = label {
            groups.entry(*l).or_default().push(idx);
        }
    }
    if groups.len() < 2 {
        return None;
    }

    let mean_distance = |p: &Position, members: &[usize], skip: usize| -> f64 {
        let (sum, count) = members
            .iter()
            .filter(|&&m| m != skip)
            .fold((0.0, 0usize), |(s, c), &m| (s + metric.distance(p, &points[m]), c + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    };

    let mut total = 0.0;
    let mut count = 0usize;
    for (label, members) in &groups {
        for &idx in members {
            count += 1;
            if members.len() == 1 {
                continue;
            }
            let p = &points[idx];
            let a = mean_distance(p, members, idx);
            let b = groups
                .iter()
                .filter(|(other, _)| *other != label)
                .map(|(_, others)| mean_distance(p, others, usize::MAX))
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 {
                total += (b - a) / denom;
            }
        }
    }
    Some(total / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    fn two_blobs() -> Vec<Position> {
        vec![
            p(0.0, 0.0),
            p(0.1, 0.0),
            p(0.0, 0.1),
            p(10.0, 10.0),
            p(10.1, 10.0),
            p(10.0, 10.1),
        ]
    }

    #[test]
    fn test_dbscan_two_clusters() {
        let result = dbscan(&two_blobs(), &DbscanOptions::new(0.5, 2)).unwrap();
        assert_eq!(result.clusters.len(), 2);
        assert_eq!(result.clusters[0].members, vec![0, 1, 2]);
        assert_eq!(result.clusters[1].members, vec![3, 4, 5]);
        assert!(result.noise().is_empty());
    }

    #[test]
    fn test_dbscan_membership_order_independent() {
        // Index 2 sits between the groups and links to the right-hand one.
        let points = vec![
            p(0.0, 0.0),
            p(0.0, 0.5),
            p(1.4, 0.0),
            p(2.0, 0.0),
            p(2.0, 0.5),
        ];
        let forward = dbscan(&points, &DbscanOptions::new(1.0, 2)).unwrap();
        let mut reversed_points = points.clone();
        reversed_points.reverse();
        let backward = dbscan(&reversed_points, &DbscanOptions::new(1.0, 2)).unwrap();

        let n = points.len();
        for i in 0..n {
            for j in 0..n {
                let same_fwd = forward.labels[i].is_some() && forward.labels[i] == forward.labels[j];
                let same_bwd = backward.labels[n - 1 - i].is_some()
                    && backward.labels[n - 1 - i] == backward.labels[n - 1 - j];
                assert_eq!(same_fwd, same_bwd, "pair ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn test_dbscan_rejects_bad_eps() {
        assert!(dbscan(&two_blobs(), &DbscanOptions::new(0.0, 2)).is_err());
        assert!(dbscan(&two_blobs(), &DbscanOptions::new(f64::NAN, 2)).is_err());
    }

    #[test]
    fn test_kmeans_is_deterministic_and_separates_blobs() {
        let opts = KMeansOptions::new(2).with_seed(7);
        let a = kmeans(&two_blobs(), &opts).unwrap();
        let b = kmeans(&two_blobs(), &opts).unwrap();
        assert_eq!(a, b);
        assert!(a.converged);
        assert_eq!(a.clustering.clusters.len(), 2);
        assert_eq!(a.clustering.labels[0], a.clustering.labels[2]);
        assert_ne!(a.clustering.labels[0], a.clustering.labels[3]);
    }

    #[test]
    fn test_kmeans_k_out_of_range() {
        assert!(kmeans(&two_blobs(), &KMeansOptions::new(0)).is_err());
        assert!(kmeans(&two_blobs(), &KMeansOptions::new(7)).is_err());
    }

    #[test]
    fn test_kmeans_from_config() {
        let config = Config::default().with_kmeans_max_iterations(3);
        let opts = KMeansOptions::from_config(&config, 2);
        assert_eq!(opts.max_iterations, 3);
        let result = kmeans(&two_blobs(), &opts.with_metric(ClusterMetric::Manhattan)).unwrap();
        assert!(result.iterations <= 3);
    }

    #[test]
    fn test_hierarchical_merges_nearest_first() {
        let result = hierarchical(&two_blobs(), 2, ClusterMetric::Euclidean, None).unwrap();
        assert_eq!(result.clusters.len(), 2);
        assert_eq!(result.clusters[0].members, vec![0, 1, 2]);
        let single = hierarchical(&two_blobs(), 1, ClusterMetric::Euclidean, None).unwrap();
        assert_eq!(single.clusters[0].len(), 6);
    }

    #[test]
    fn test_silhouette() {
        let points = two_blobs();
        let labels = vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1)];
        let score = silhouette_score(&points, &labels, ClusterMetric::Euclidean).unwrap();
        assert!(score > 0.95);
        assert_eq!(silhouette_score(&points, &[Some(0); 6], ClusterMetric::Euclidean), None);
    }
}
