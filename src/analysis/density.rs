//! Kernel density, point/line density and Getis-Ord Gi* hotspots.

use super::grid::{Grid, GridSpec, compute_rows};
use super::proximity::{DistanceMetric, distance_between};
use crate::cancel::{self, CancelToken};
use crate::error::{GeoscopeError, Result};
use geoscope_types::Position;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Kernel shapes, each normalized to integrate to one over the plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Gaussian,
    #[default]
    Quartic,
    Triangular,
    Uniform,
}

impl Kernel {
    /// Kernel value at scaled distance `u = d / bandwidth`.
    pub fn weight(&self, u: f64) -> f64 {
        match self {
            Kernel::Gaussian => (-0.5 * u * u).exp() / (2.0 * PI),
            _ if u > 1.0 => 0.0,
            Kernel::Quartic => 3.0 / PI * (1.0 - u * u).powi(2),
            Kernel::Triangular => 3.0 / PI * (1.0 - u),
            Kernel::Uniform => 1.0 / PI,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KernelDensityOptions {
    pub spec: GridSpec,
    pub bandwidth: f64,
    pub kernel: Kernel,
    pub cancel: Option<CancelToken>,
}

impl KernelDensityOptions {
    pub fn new(spec: GridSpec, bandwidth: f64) -> Self {
        Self {
            spec,
            bandwidth,
            kernel: Kernel::default(),
            cancel: None,
        }
    }

    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

fn check_radius(radius: f64, what: &str) -> Result<()> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(GeoscopeError::InvalidInput(format!(
            "{} must be positive and finite, got {}",
            what, radius
        )))
    }
}

/// Kernel density surface in planar units. Each cell holds
/// `sum(w_i * K(d_i / h)) / h^2`.
///
/// # Examples
///
/// ```
/// use geoscope::analysis::density::{kernel_density, KernelDensityOptions};
/// use geoscope::analysis::grid::GridSpec;
/// use geoscope::Position;
///
/// let spec = GridSpec::new(10, 10, Position::new(0.0, 10.0), 1.0).unwrap();
/// let points = [Position::new(5.0, 5.0)];
/// let surface = kernel_density(&points, None, &KernelDensityOptions::new(spec, 2.0)).unwrap();
/// let (_, max) = surface.min_max().unwrap();
/// assert!(max > 0.0);
/// ```
pub fn kernel_density(
    points: &[Position],
    weights: Option<&[f64]>,
    options: &KernelDensityOptions,
) -> Result<Grid> {
    check_radius(options.bandwidth, "Bandwidth")?;
    if let Some(w) = weights
        && w.len() != points.len()
    {
        return Err(GeoscopeError::InvalidInput(format!(
            "Expected {} weights, got {}",
            points.len(),
            w.len()
        )));
    }

    let h = options.bandwidth;
    let norm = h * h;
    let spec = options.spec;
    compute_rows(spec, options.cancel.as_ref(), |row, col| {
        let center = spec.cell_center(row, col);
        points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let u = (p.x - center.x).hypot(p.y - center.y) / h;
                weights.map_or(1.0, |w| w[i]) * options.kernel.weight(u)
            })
            .sum::<f64>()
            / norm
    })
}

/// Points within `radius` of each cell center, per unit area.
pub fn point_density(
    points: &[Position],
    spec: GridSpec,
    radius: f64,
    cancel: Option<&CancelToken>,
) -> Result<Grid> {
    check_radius(radius, "Search radius")?;
    let area = PI * radius * radius;
    compute_rows(spec, cancel, |row, col| {
        let center = spec.cell_center(row, col);
        let count = points
            .iter()
            .filter(|p| (p.x - center.x).hypot(p.y - center.y) <= radius)
            .count();
        count as f64 / area
    })
}

/// Length of segment `a`-`b` inside the circle around `c`.
fn clipped_length(a: &Position, b: &Position, c: &Position, radius: f64) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let (fx, fy) = (a.x - c.x, a.y - c.y);
    let qa = dx * dx + dy * dy;
    if qa == 0.0 {
        return 0.0;
    }
    let qb = 2.0 * (fx * dx + fy * dy);
    let qc = fx * fx + fy * fy - radius * radius;
    let disc = qb * qb - 4.0 * qa * qc;
    if disc <= 0.0 {
        return 0.0;
    }
    let sqrt_disc = disc.sqrt();
    let t1 = ((-qb - sqrt_disc) / (2.0 * qa)).max(0.0);
    let t2 = ((-qb + sqrt_disc) / (2.0 * qa)).min(1.0);
    if t2 <= t1 {
        0.0
    } else {
        (t2 - t1) * qa.sqrt()
    }
}

/// Line length within `radius` of each cell center, per unit area.
pub fn line_density(
    lines: &[Vec<Position>],
    spec: GridSpec,
    radius: f64,
    cancel: Option<&CancelToken>,
) -> Result<Grid> {
    check_radius(radius, "Search radius")?;
    let area = PI * radius * radius;
    compute_rows(spec, cancel, |row, col| {
        let center = spec.cell_center(row, col);
        let total: f64 = lines
            .iter()
            .flat_map(|line| line.windows(2))
            .map(|w| clipped_length(&w[0], &w[1], &center, radius))
            .sum();
        total / area
    })
}

/// Standard normal CDF via Abramowitz & Stegun 26.2.17 (error below 7.5e-8).
pub fn normal_cdf(x: f64) -> f64 {
    const P: f64 = 0.231_641_9;
    const B: [f64; 5] = [
        0.319_381_530,
        -0.356_563_782,
        1.781_477_937,
        -1.821_255_978,
        1.330_274_429,
    ];
    let z = x.abs();
    let t = 1.0 / (1.0 + P * z);
    let pdf = (-0.5 * z * z).exp() / (2.0 * PI).sqrt();
    let poly = t * (B[0] + t * (B[1] + t * (B[2] + t * (B[3] + t * B[4]))));
    let upper = pdf * poly;
    if x >= 0.0 { 1.0 - upper } else { upper }
}

/// Hotspot significance bands at 90, 95 and 99 percent confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotClass {
    Hot99,
    Hot95,
    Hot90,
    NotSignificant,
    Cold90,
    Cold95,
    Cold99,
}

impl HotspotClass {
    pub fn from_z(z: f64) -> Self {
        match z {
            z if z >= 2.576 => HotspotClass::Hot99,
            z if z >= 1.96 => HotspotClass::Hot95,
            z if z >= 1.645 => HotspotClass::Hot90,
            z if z <= -2.576 => HotspotClass::Cold99,
            z if z <= -1.96 => HotspotClass::Cold95,
            z if z <= -1.645 => HotspotClass::Cold90,
            _ => HotspotClass::NotSignificant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub z_score: f64,
    /// Two-tailed.
    pub p_value: f64,
    pub class: HotspotClass,
}

/// Getis-Ord Gi* with binary weights: every point within `distance_band`
/// (itself included) has weight one.
pub fn getis_ord_gi_star(
    points: &[Position],
    values: &[f64],
    distance_band: f64,
    metric: DistanceMetric,
    cancel: Option<&CancelToken>,
) -> Result<Vec<Hotspot>> {
    if points.len() != values.len() {
        return Err(GeoscopeError::InvalidInput(format!(
            "Expected {} values, got {}",
            points.len(),
            values.len()
        )));
    }
    if points.len() < 2 {
        return Err(GeoscopeError::InvalidInput(
            "Gi* needs at least two observations".to_string(),
        ));
    }
    check_radius(distance_band, "Distance band")?;

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let s = (values.iter().map(|v| v * v).sum::<f64>() / n - mean * mean)
        .max(0.0)
        .sqrt();

    points
        .iter()
        .map(|p| {
            cancel::check(cancel)?;
            let (w_sum, wx_sum) = points
                .iter()
                .zip(values)
                .filter(|(q, _)| distance_between(p, q, metric) <= distance_band)
                .fold((0.0, 0.0), |(w, wx), (_, v)| (w + 1.0, wx + v));
            let denom = s * ((n * w_sum - w_sum * w_sum) / (n - 1.0)).max(0.0).sqrt();
            let z = if denom > 0.0 {
                (wx_sum - mean * w_sum) / denom
            } else {
                0.0
            };
            Ok(Hotspot {
                z_score: z,
                p_value: 2.0 * (1.0 - normal_cdf(z.abs())),
                class: HotspotClass::from_z(z),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn test_kernels_integrate_to_one() {
        // Riemann sum over a fine grid around a unit-bandwidth kernel.
        for kernel in [Kernel::Gaussian, Kernel::Quartic, Kernel::Triangular, Kernel::Uniform] {
            let step = 0.01;
            let mut total = 0.0;
            let mut x = -6.0;
            while x <= 6.0 {
                let mut y = -6.0;
                while y <= 6.0 {
                    total += kernel.weight(f64::hypot(x, y)) * step * step;
                    y += step;
                }
                x += step;
            }
            assert!((total - 1.0).abs() < 0.01, "{:?} integrates to {}", kernel, total);
        }
    }

    #[test]
    fn test_kernel_density_peaks_at_point() {
        let spec = GridSpec::new(11, 11, p(0.0, 11.0), 1.0).unwrap();
        let grid = kernel_density(&[p(5.5, 5.5)], None, &KernelDensityOptions::new(spec, 3.0)).unwrap();
        let peak = grid.get(5, 5).unwrap();
        assert!((peak - 3.0 / PI / 9.0).abs() < 1e-12);
        assert_eq!(grid.get(0, 0), Some(0.0));
    }

    #[test]
    fn test_kernel_density_rejects_bad_input() {
        let spec = GridSpec::new(2, 2, p(0.0, 2.0), 1.0).unwrap();
        assert!(kernel_density(&[p(0.0, 0.0)], None, &KernelDensityOptions::new(spec, 0.0)).is_err());
        assert!(kernel_density(&[p(0.0, 0.0)], Some(&[]), &KernelDensityOptions::new(spec, 1.0)).is_err());
        let token = CancelToken::new();
        token.cancel();
        let opts = KernelDensityOptions::new(spec, 1.0).with_cancel(token);
        assert_eq!(kernel_density(&[], None, &opts), Err(GeoscopeError::Cancelled));
    }

    #[test]
    fn test_point_density() {
        let spec = GridSpec::new(1, 1, p(0.0, 2.0), 2.0).unwrap();
        let grid = point_density(&[p(1.0, 1.0), p(1.5, 1.0), p(10.0, 10.0)], spec, 1.0, None).unwrap();
        assert!((grid.get(0, 0).unwrap() - 2.0 / PI).abs() < 1e-12);
    }

    #[test]
    fn test_line_density_clips_to_circle() {
        let spec = GridSpec::new(1, 1, p(-1.0, 1.0), 2.0).unwrap();
        let line = vec![p(-10.0, 0.0), p(10.0, 0.0)];
        let grid = line_density(&[line], spec, 1.0, None).unwrap();
        assert!((grid.get(0, 0).unwrap() - 2.0 / PI).abs() < 1e-12);
    }

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((normal_cdf(-1.96) - 0.025).abs() < 1e-4);
        assert!((normal_cdf(1.0) + normal_cdf(-1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gi_star_finds_hot_cluster() {
        let mut points = Vec::new();
        let mut values = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                points.push(p(i as f64, j as f64));
                values.push(if i >= 7 && j >= 7 { 100.0 } else { 1.0 });
            }
        }
        let result = getis_ord_gi_star(&points, &values, 1.5, DistanceMetric::Euclidean, None).unwrap();
        let hot = &result[8 * 10 + 8];
        assert_eq!(hot.class, HotspotClass::Hot99);
        assert!(hot.p_value < 0.01);
        let cold = &result[0];
        assert!(cold.z_score < 0.0);
    }

    #[test]
    fn test_hotspot_classes() {
        assert_eq!(HotspotClass::from_z(2.0), HotspotClass::Hot95);
        assert_eq!(HotspotClass::from_z(-1.7), HotspotClass::Cold90);
        assert_eq!(HotspotClass::from_z(0.3), HotspotClass::NotSignificant);
    }
}
