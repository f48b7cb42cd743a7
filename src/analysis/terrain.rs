//! Elevation surface derivatives and D8 hydrology.
//!
//! Gradients use central differences over the 3x3 window; edge cells reuse
//! the nearest valid row or column. Horizontal and vertical units must match
//! (a projected DEM). Output cells are `NaN` where the input is nodata.

use super::grid::{Grid, compute_rows};
use crate::cancel::{self, CancelToken};
use crate::error::{GeoscopeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlopeUnits {
    #[default]
    Degrees,
    Percent,
}

/// Neighbor value, falling back to the center for nodata or off-grid cells.
fn neighbor(dem: &Grid, row: usize, col: usize, dr: isize, dc: isize, center: f64) -> f64 {
    let v = dem.clamped(row as isize + dr, col as isize + dc);
    if dem.is_nodata(v) { center } else { v }
}

/// `(dz/dx, dz/dy)` with y pointing north, or `None` for a nodata cell.
fn gradient(dem: &Grid, row: usize, col: usize) -> Option<(f64, f64)> {
    let z = dem.value(row, col)?;
    let cs = dem.cell_size();
    let east = neighbor(dem, row, col, 0, 1, z);
    let west = neighbor(dem, row, col, 0, -1, z);
    let north = neighbor(dem, row, col, -1, 0, z);
    let south = neighbor(dem, row, col, 1, 0, z);
    Some(((east - west) / (2.0 * cs), (north - south) / (2.0 * cs)))
}

/// Compass bearing of steepest descent in degrees, `-1` on flat cells.
fn downslope_bearing(dzdx: f64, dzdy: f64) -> f64 {
    if dzdx == 0.0 && dzdy == 0.0 {
        return -1.0;
    }
    (-dzdx).atan2(-dzdy).to_degrees().rem_euclid(360.0)
}

pub fn slope(dem: &Grid, units: SlopeUnits, cancel: Option<&CancelToken>) -> Result<Grid> {
    compute_rows(dem.spec, cancel, |row, col| match gradient(dem, row, col) {
        Some((dx, dy)) => {
            let rise = dx.hypot(dy);
            match units {
                SlopeUnits::Degrees => rise.atan().to_degrees(),
                SlopeUnits::Percent => rise * 100.0,
            }
        }
        None => f64::NAN,
    })
}

/// Aspect as a compass bearing (0 = north, 90 = east) of the downslope
/// direction. Flat cells are `-1`.
pub fn aspect(dem: &Grid, cancel: Option<&CancelToken>) -> Result<Grid> {
    compute_rows(dem.spec, cancel, |row, col| match gradient(dem, row, col) {
        Some((dx, dy)) => downslope_bearing(dx, dy),
        None => f64::NAN,
    })
}

/// Shaded relief in `0..=255` for a light at `azimuth` (compass degrees) and
/// `altitude` (degrees above the horizon).
pub fn hillshade(dem: &Grid, azimuth: f64, altitude: f64, cancel: Option<&CancelToken>) -> Result<Grid> {
    if !(0.0..=90.0).contains(&altitude) || !azimuth.is_finite() {
        return Err(GeoscopeError::InvalidInput(format!(
            "Hillshade needs a finite azimuth and altitude in 0..=90, got {} / {}",
            azimuth, altitude
        )));
    }
    let zenith = (90.0 - altitude).to_radians();
    let light = azimuth.to_radians();

    compute_rows(dem.spec, cancel, |row, col| {
        let Some((dx, dy)) = gradient(dem, row, col) else {
            return f64::NAN;
        };
        let slope_rad = dx.hypot(dy).atan();
        let facing = (-dx).atan2(-dy);
        let shade = zenith.cos() * slope_rad.cos()
            + zenith.sin() * slope_rad.sin() * (light - facing).cos();
        (255.0 * shade).max(0.0)
    })
}

/// Zevenbergen-Thorne curvature in 1/100 z-units. Positive values are
/// convex (ridges), negative concave (valleys).
pub fn curvature(dem: &Grid, cancel: Option<&CancelToken>) -> Result<Grid> {
    let l2 = dem.cell_size() * dem.cell_size();
    compute_rows(dem.spec, cancel, |row, col| {
        let Some(z) = dem.value(row, col) else {
            return f64::NAN;
        };
        let east = neighbor(dem, row, col, 0, 1, z);
        let west = neighbor(dem, row, col, 0, -1, z);
        let north = neighbor(dem, row, col, -1, 0, z);
        let south = neighbor(dem, row, col, 1, 0, z);
        let d = ((east + west) / 2.0 - z) / l2;
        let e = ((north + south) / 2.0 - z) / l2;
        -2.0 * (d + e) * 100.0
    })
}

/// D8 neighbors as `(code, row offset, col offset)`, ESRI encoding.
const D8: [(u8, isize, isize); 8] = [
    (1, 0, 1),
    (2, 1, 1),
    (4, 1, 0),
    (8, 1, -1),
    (16, 0, -1),
    (32, -1, -1),
    (64, -1, 0),
    (128, -1, 1),
];

fn offset(code: u8) -> Option<(isize, isize)> {
    D8.iter().find(|(c, _, _)| *c == code).map(|(_, dr, dc)| (*dr, *dc))
}

/// D8 flow direction: each cell points at its steepest downhill neighbor.
/// Sinks and flats are `0`; nodata cells are `NaN`.
pub fn flow_direction(dem: &Grid, cancel: Option<&CancelToken>) -> Result<Grid> {
    let cs = dem.cell_size();
    let (h, w) = (dem.height() as isize, dem.width() as isize);
    compute_rows(dem.spec, cancel, |row, col| {
        let Some(z) = dem.value(row, col) else {
            return f64::NAN;
        };
        let mut best = (0u8, 0.0);
        for (code, dr, dc) in D8 {
            let (r, c) = (row as isize + dr, col as isize + dc);
            if r < 0 || c < 0 || r >= h || c >= w {
                continue;
            }
            let Some(zn) = dem.value(r as usize, c as usize) else {
                continue;
            };
            let dist = if dr != 0 && dc != 0 { cs * std::f64::consts::SQRT_2 } else { cs };
            let drop = (z - zn) / dist;
            if drop > best.1 {
                best = (code, drop);
            }
        }
        best.0 as f64
    })
}

/// Number of upstream cells draining through each cell, excluding itself.
///
/// Cells are processed in topological order of the flow graph. Cells caught
/// in a direction cycle are left with the contributions that reached them.
pub fn flow_accumulation(directions: &Grid, cancel: Option<&CancelToken>) -> Result<Grid> {
    let (h, w) = (directions.height(), directions.width());
    let target = |idx: usize| -> Option<usize> {
        let code = directions.value(idx / w, idx % w)?;
        let (dr, dc) = offset(code as u8).filter(|_| code.fract() == 0.0)?;
        let (r, c) = ((idx / w) as isize + dr, (idx % w) as isize + dc);
        (r >= 0 && c >= 0 && (r as usize) < h && (c as usize) < w).then(|| r as usize * w + c as usize)
    };

    let n = h * w;
    let targets: Vec<Option<usize>> = (0..n).map(target).collect();
    let mut indegree = vec![0usize; n];
    for t in targets.iter().flatten() {
        indegree[*t] += 1;
    }

    let mut acc = vec![0.0; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut processed = 0usize;
    while let Some(idx) = queue.pop_front() {
        if processed % w.max(1) == 0 {
            cancel::check(cancel)?;
        }
        processed += 1;
        if let Some(t) = targets[idx] {
            acc[t] += acc[idx] + 1.0;
            indegree[t] -= 1;
            if indegree[t] == 0 {
                queue.push_back(t);
            }
        }
    }
    if processed < n {
        log::warn!("Flow directions contain cycles; {} cells left unresolved", n - processed);
    }

    for (idx, value) in acc.iter_mut().enumerate() {
        if directions.value(idx / w, idx % w).is_none() {
            *value = f64::NAN;
        }
    }
    Grid::from_values(directions.spec, acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoscope_types::Position;

    /// Plane rising 1 unit per cell to the east.
    fn east_ramp() -> Grid {
        let rows = (0..5).map(|_| (0..5).map(|c| c as f64).collect()).collect();
        Grid::from_rows(rows, Position::new(0.0, 5.0), 1.0).unwrap()
    }

    #[test]
    fn test_slope_of_ramp() {
        let deg = slope(&east_ramp(), SlopeUnits::Degrees, None).unwrap();
        assert!((deg.get(2, 2).unwrap() - 45.0).abs() < 1e-9);
        let pct = slope(&east_ramp(), SlopeUnits::Percent, None).unwrap();
        assert!((pct.get(2, 2).unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_aspect_faces_downhill() {
        let grid = aspect(&east_ramp(), None).unwrap();
        // Rising east means the slope faces west.
        assert!((grid.get(2, 2).unwrap() - 270.0).abs() < 1e-9);

        let flat = Grid::from_rows(vec![vec![1.0; 3]; 3], Position::new(0.0, 3.0), 1.0).unwrap();
        assert_eq!(aspect(&flat, None).unwrap().get(1, 1), Some(-1.0));
    }

    #[test]
    fn test_hillshade_range() {
        let lit = hillshade(&east_ramp(), 270.0, 45.0, None).unwrap();
        let dark = hillshade(&east_ramp(), 90.0, 45.0, None).unwrap();
        assert!((lit.get(2, 2).unwrap() - 255.0).abs() < 1e-9);
        assert!(dark.get(2, 2).unwrap() < 1e-9);
        assert!(hillshade(&east_ramp(), 0.0, 95.0, None).is_err());
    }

    #[test]
    fn test_curvature_sign() {
        let peak = Grid::from_rows(
            vec![vec![0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 0.0]],
            Position::new(0.0, 3.0),
            1.0,
        )
        .unwrap();
        assert!(curvature(&peak, None).unwrap().get(1, 1).unwrap() > 0.0);
        assert_eq!(curvature(&east_ramp(), None).unwrap().get(2, 2), Some(0.0));
    }

    #[test]
    fn test_flow_direction_and_accumulation() {
        // Valley draining south along the middle column.
        let rows = vec![
            vec![5.0, 4.0, 5.0],
            vec![4.0, 3.0, 4.0],
            vec![3.0, 2.0, 3.0],
            vec![2.5, 1.0, 2.5],
        ];
        let dem = Grid::from_rows(rows, Position::new(0.0, 4.0), 1.0).unwrap();
        let dirs = flow_direction(&dem, None).unwrap();
        assert_eq!(dirs.get(0, 1), Some(4.0));
        assert_eq!(dirs.get(3, 1), Some(0.0));

        let acc = flow_accumulation(&dirs, None).unwrap();
        assert_eq!(acc.get(3, 1), Some(11.0));
        assert_eq!(acc.get(0, 0), Some(0.0));
    }

    #[test]
    fn test_nodata_propagates() {
        let dem = Grid::from_rows(
            vec![vec![1.0, 2.0], vec![-9999.0, 3.0]],
            Position::new(0.0, 2.0),
            1.0,
        )
        .unwrap()
        .with_nodata(-9999.0);
        let s = slope(&dem, SlopeUnits::Degrees, None).unwrap();
        assert!(s.get(1, 0).unwrap().is_nan());
        assert!(s.get(0, 0).unwrap().is_finite());
    }
}
