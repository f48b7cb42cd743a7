//! Surface interpolation from scattered samples: inverse distance weighting
//! and ordinary kriging.

use super::grid::{Grid, GridSpec, compute_rows};
use crate::cancel::{self, CancelToken};
use crate::error::{GeoscopeError, Result};
use geoscope_types::Position;
use serde::{Deserialize, Serialize};

fn check_samples(points: &[Position], values: &[f64]) -> Result<()> {
    if points.is_empty() {
        return Err(GeoscopeError::InvalidInput(
            "Interpolation needs at least one sample".to_string(),
        ));
    }
    if points.len() != values.len() {
        return Err(GeoscopeError::InvalidInput(format!(
            "Expected {} sample values, got {}",
            points.len(),
            values.len()
        )));
    }
    if points.iter().any(|p| !p.is_finite()) || values.iter().any(|v| !v.is_finite()) {
        return Err(GeoscopeError::InvalidInput(
            "Samples must have finite coordinates and values".to_string(),
        ));
    }
    Ok(())
}

#[inline]
fn planar(a: &Position, b: &Position) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

#[derive(Debug, Clone)]
pub struct IdwOptions {
    pub spec: GridSpec,
    pub power: f64,
    /// Only samples within this distance contribute; cells with none are NaN.
    pub radius: Option<f64>,
    pub cancel: Option<CancelToken>,
}

impl IdwOptions {
    pub fn new(spec: GridSpec) -> Self {
        Self {
            spec,
            power: 2.0,
            radius: None,
            cancel: None,
        }
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Inverse distance weighted surface. A cell center that coincides with a
/// sample takes that sample's value.
pub fn idw(points: &[Position], values: &[f64], options: &IdwOptions) -> Result<Grid> {
    check_samples(points, values)?;
    if !options.power.is_finite() || options.power <= 0.0 {
        return Err(GeoscopeError::InvalidInput(format!(
            "IDW power must be positive, got {}",
            options.power
        )));
    }
    let radius = options.radius.unwrap_or(f64::INFINITY);
    let spec = options.spec;

    compute_rows(spec, options.cancel.as_ref(), |row, col| {
        let center = spec.cell_center(row, col);
        let mut weighted = 0.0;
        let mut total = 0.0;
        for (p, v) in points.iter().zip(values) {
            let d = planar(p, &center);
            if d == 0.0 {
                return *v;
            }
            if d <= radius {
                let w = d.powf(-options.power);
                weighted += w * v;
                total += w;
            }
        }
        if total > 0.0 { weighted / total } else { f64::NAN }
    })
}

/// One lag class of an empirical variogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariogramBin {
    /// Mean separation of the pairs in this bin.
    pub lag: f64,
    pub semivariance: f64,
    pub pairs: usize,
}

/// Semivariance by distance class. Pairs farther than
/// `lag_size * lag_count` are ignored and empty bins are omitted.
pub fn empirical_variogram(
    points: &[Position],
    values: &[f64],
    lag_size: f64,
    lag_count: usize,
) -> Result<Vec<VariogramBin>> {
    check_samples(points, values)?;
    if !lag_size.is_finite() || lag_size <= 0.0 || lag_count == 0 {
        return Err(GeoscopeError::InvalidInput(format!(
            "Variogram needs a positive lag size and count, got {} x {}",
            lag_size, lag_count
        )));
    }

    let mut sums = vec![(0.0, 0.0, 0usize); lag_count];
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            let d = planar(&points[i], &points[j]);
            let bin = (d / lag_size) as usize;
            if bin < lag_count {
                let diff = values[i] - values[j];
                let entry = &mut sums[bin];
                entry.0 += d;
                entry.1 += diff * diff;
                entry.2 += 1;
            }
        }
    }
    Ok(sums
        .into_iter()
        .filter(|(_, _, n)| *n > 0)
        .map(|(d, sq, n)| VariogramBin {
            lag: d / n as f64,
            semivariance: sq / (2.0 * n as f64),
            pairs: n,
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariogramModel {
    #[default]
    Spherical,
    Exponential,
    Gaussian,
    Linear,
}

impl VariogramModel {
    pub const ALL: [VariogramModel; 4] = [
        VariogramModel::Spherical,
        VariogramModel::Exponential,
        VariogramModel::Gaussian,
        VariogramModel::Linear,
    ];
}

/// A theoretical variogram. `sill` is the total sill, nugget included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Variogram {
    pub model: VariogramModel,
    pub nugget: f64,
    pub sill: f64,
    pub range: f64,
}

impl Variogram {
    pub fn new(model: VariogramModel, nugget: f64, sill: f64, range: f64) -> Self {
        Self {
            model,
            nugget,
            sill,
            range,
        }
    }

    /// Semivariance at separation `h`; zero at `h == 0`.
    pub fn evaluate(&self, h: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }
        let partial = self.sill - self.nugget;
        let r = self.range.max(f64::MIN_POSITIVE);
        let shape = match self.model {
            VariogramModel::Spherical if h >= r => 1.0,
            VariogramModel::Spherical => {
                let t = h / r;
                1.5 * t - 0.5 * t * t * t
            }
            VariogramModel::Exponential => 1.0 - (-3.0 * h / r).exp(),
            VariogramModel::Gaussian => 1.0 - (-3.0 * h * h / (r * r)).exp(),
            VariogramModel::Linear => (h / r).min(1.0),
        };
        self.nugget + partial * shape
    }
}

/// Fit a model to the empirical variogram of the samples.
///
/// The sill is the sample variance and the nugget zero; the range is chosen
/// by grid search minimising the pair-weighted squared error.
pub fn fit_variogram(
    points: &[Position],
    values: &[f64],
    model: VariogramModel,
    lag_size: f64,
    lag_count: usize,
) -> Result<Variogram> {
    let bins = empirical_variogram(points, values, lag_size, lag_count)?;
    if bins.is_empty() {
        return Err(GeoscopeError::InvalidInput(
            "No sample pairs fall within the variogram lags".to_string(),
        ));
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sill = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    const STEPS: usize = 100;
    let max_lag = lag_size * lag_count as f64;
    let mut best = Variogram::new(model, 0.0, sill, max_lag);
    let mut best_err = f64::INFINITY;
    for step in 1..=STEPS {
        let candidate = Variogram::new(model, 0.0, sill, max_lag * step as f64 / STEPS as f64);
        let err: f64 = bins
            .iter()
            .map(|b| b.pairs as f64 * (candidate.evaluate(b.lag) - b.semivariance).powi(2))
            .sum();
        if err < best_err {
            best_err = err;
            best = candidate;
        }
    }
    log::debug!(
        "Fitted {:?} variogram: sill {:.4}, range {:.4}",
        model,
        best.sill,
        best.range
    );
    Ok(best)
}

/// LU factorisation with partial pivoting (Gaussian elimination).
struct Lu {
    lu: Vec<Vec<f64>>,
    perm: Vec<usize>,
}

impl Lu {
    const PIVOT_EPSILON: f64 = 1e-12;

    fn factor(mut a: Vec<Vec<f64>>) -> Result<Self> {
        let n = a.len();
        let mut perm: Vec<usize> = (0..n).collect();
        for k in 0..n {
            let pivot = (k..n)
                .max_by(|&i, &j| {
                    a[i][k]
                        .abs()
                        .partial_cmp(&a[j][k].abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(k);
            if a[pivot][k].abs() < Self::PIVOT_EPSILON {
                return Err(GeoscopeError::InvalidInput(
                    "Kriging system is singular (duplicate sample locations?)".to_string(),
                ));
            }
            a.swap(k, pivot);
            perm.swap(k, pivot);
            for i in k + 1..n {
                let factor = a[i][k] / a[k][k];
                a[i][k] = factor;
                for j in k + 1..n {
                    a[i][j] -= factor * a[k][j];
                }
            }
        }
        Ok(Self { lu: a, perm })
    }

    fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.lu.len();
        let mut x: Vec<f64> = self.perm.iter().map(|&i| b[i]).collect();
        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[i][j] * x[j];
            }
        }
        for i in (0..n).rev() {
            for j in i + 1..n {
                x[i] -= self.lu[i][j] * x[j];
            }
            x[i] /= self.lu[i][i];
        }
        x
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KrigingResult {
    pub estimate: Grid,
    /// Kriging variance per cell.
    pub variance: Grid,
}

/// Ordinary kriging onto the cells of `spec`.
pub fn kriging(
    points: &[Position],
    values: &[f64],
    variogram: &Variogram,
    spec: GridSpec,
    cancel: Option<&CancelToken>,
) -> Result<KrigingResult> {
    check_samples(points, values)?;
    let n = points.len();

    let mut system = vec![vec![1.0; n + 1]; n + 1];
    for i in 0..n {
        for j in 0..n {
            system[i][j] = variogram.evaluate(planar(&points[i], &points[j]));
        }
    }
    system[n][n] = 0.0;
    let lu = Lu::factor(system)?;

    let solve_cell = |row: usize, col: usize| -> (f64, f64) {
        let center = spec.cell_center(row, col);
        let mut rhs: Vec<f64> = points
            .iter()
            .map(|p| variogram.evaluate(planar(p, &center)))
            .collect();
        rhs.push(1.0);
        let weights = lu.solve(&rhs);
        let estimate = weights[..n].iter().zip(values).map(|(w, v)| w * v).sum();
        // Weights end with the Lagrange multiplier, paired with the 1 in rhs.
        let variance: f64 = weights.iter().zip(&rhs).map(|(w, g)| w * g).sum();
        (estimate, variance.max(0.0))
    };

    let estimate = compute_rows(spec, cancel, |r, c| solve_cell(r, c).0)?;
    cancel::check(cancel)?;
    let variance = compute_rows(spec, cancel, |r, c| solve_cell(r, c).1)?;
    Ok(KrigingResult { estimate, variance })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    fn spec() -> GridSpec {
        GridSpec::new(4, 4, p(0.0, 4.0), 1.0).unwrap()
    }

    fn samples() -> (Vec<Position>, Vec<f64>) {
        (
            vec![p(0.5, 3.5), p(3.5, 3.5), p(0.5, 0.5), p(3.5, 0.5), p(2.0, 2.2)],
            vec![1.0, 2.0, 3.0, 4.0, 2.5],
        )
    }

    #[test]
    fn test_idw_exact_at_samples_and_bounded() {
        let (points, values) = samples();
        let grid = idw(&points, &values, &IdwOptions::new(spec())).unwrap();
        assert_eq!(grid.get(0, 0), Some(1.0));
        assert_eq!(grid.get(3, 3), Some(4.0));
        let (lo, hi) = grid.min_max().unwrap();
        assert!(lo >= 1.0 && hi <= 4.0);
    }

    #[test]
    fn test_idw_radius_leaves_gaps() {
        let grid = idw(&[p(0.5, 3.5)], &[7.0], &IdwOptions::new(spec()).with_radius(1.5)).unwrap();
        assert_eq!(grid.get(0, 1), Some(7.0));
        assert!(grid.get(3, 3).unwrap().is_nan());
        assert_eq!(grid.value(3, 3), None);
    }

    #[test]
    fn test_idw_rejects_mismatched_values() {
        let (points, _) = samples();
        assert!(idw(&points, &[1.0], &IdwOptions::new(spec())).is_err());
        assert!(idw(&[], &[], &IdwOptions::new(spec())).is_err());
    }

    #[test]
    fn test_empirical_variogram_bins() {
        let points = vec![p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)];
        let values = vec![0.0, 1.0, 2.0];
        let bins = empirical_variogram(&points, &values, 1.5, 2).unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].pairs, 2);
        assert_eq!(bins[0].semivariance, 0.5);
        assert_eq!(bins[1].lag, 2.0);
        assert_eq!(bins[1].semivariance, 2.0);
    }

    #[test]
    fn test_variogram_models() {
        for model in VariogramModel::ALL {
            let v = Variogram::new(model, 0.1, 1.0, 10.0);
            assert_eq!(v.evaluate(0.0), 0.0);
            assert!(v.evaluate(1.0) > 0.1);
            assert!(v.evaluate(5.0) <= v.evaluate(8.0));
        }
        let sph = Variogram::new(VariogramModel::Spherical, 0.0, 2.0, 10.0);
        assert_eq!(sph.evaluate(12.0), 2.0);
    }

    #[test]
    fn test_fit_variogram_uses_sample_variance() {
        let points: Vec<Position> = (0..20).map(|i| p(i as f64, 0.0)).collect();
        let values: Vec<f64> = (0..20).map(|i| (i as f64 * 0.5).sin()).collect();
        let v = fit_variogram(&points, &values, VariogramModel::Exponential, 1.0, 10).unwrap();
        let mean = values.iter().sum::<f64>() / 20.0;
        let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 20.0;
        assert!((v.sill - var).abs() < 1e-12);
        assert!(v.range > 0.0 && v.range <= 10.0);
    }

    #[test]
    fn test_kriging_honours_samples() {
        let (points, values) = samples();
        let variogram = Variogram::new(VariogramModel::Spherical, 0.0, 1.5, 6.0);
        let result = kriging(&points, &values, &variogram, spec(), None).unwrap();
        assert!((result.estimate.get(0, 0).unwrap() - 1.0).abs() < 1e-9);
        assert!((result.estimate.get(3, 3).unwrap() - 4.0).abs() < 1e-9);
        assert!(result.variance.get(0, 0).unwrap() < 1e-9);
        assert!(result.variance.get(1, 2).unwrap() > 0.0);
    }

    #[test]
    fn test_kriging_singular_system() {
        let points = vec![p(1.0, 1.0), p(1.0, 1.0)];
        let variogram = Variogram::new(VariogramModel::Linear, 0.0, 1.0, 5.0);
        let err = kriging(&points, &[1.0, 2.0], &variogram, spec(), None).unwrap_err();
        assert!(matches!(err, GeoscopeError::InvalidInput(_)));
    }
}
