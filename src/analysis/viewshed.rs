//! Visibility analysis over an elevation grid.
//!
//! A target is visible when its elevation angle from the observer's eye is at
//! least the steepest angle of every cell crossed on the Bresenham ray
//! between them.

use super::grid::{Grid, compute_rows};
use crate::cancel::{self, CancelToken};
use crate::config::Config;
use crate::error::{GeoscopeError, Result};
use geoscope_types::Position;
use serde::{Deserialize, Serialize};

/// Grid cells on the line from `(r0, c0)` to `(r1, c1)`, both ends included.
pub fn bresenham_line(r0: isize, c0: isize, r1: isize, c1: isize) -> Vec<(isize, isize)> {
    let dr = (r1 - r0).abs();
    let dc = (c1 - c0).abs();
    let sr = if r0 < r1 { 1 } else { -1 };
    let sc = if c0 < c1 { 1 } else { -1 };
    let mut err = dc - dr;
    let (mut r, mut c) = (r0, c0);
    let mut cells = Vec::with_capacity((dr.max(dc) + 1) as usize);
    loop {
        cells.push((r, c));
        if r == r1 && c == c1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dr {
            err -= dr;
            c += sc;
        }
        if e2 < dc {
            err += dc;
            r += sr;
        }
    }
    cells
}

#[derive(Debug, Clone)]
pub struct ViewshedOptions {
    /// Eye height above the observer's ground cell.
    pub observer_height: f64,
    /// Height added to each target cell.
    pub target_height: f64,
    /// Cells farther than this (in world units, like `cell_size`) are never visible.
    pub max_radius: Option<f64>,
    pub cancel: Option<CancelToken>,
}

impl Default for ViewshedOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ViewshedOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            observer_height: config.observer_height,
            target_height: 0.0,
            max_radius: None,
            cancel: None,
        }
    }

    pub fn with_observer_height(mut self, height: f64) -> Self {
        self.observer_height = height;
        self
    }

    pub fn with_target_height(mut self, height: f64) -> Self {
        self.target_height = height;
        self
    }

    pub fn with_max_radius(mut self, radius: f64) -> Self {
        self.max_radius = Some(radius);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Observer cell and eye elevation.
fn eye(dem: &Grid, observer: &Position, height: f64) -> Result<(usize, usize, f64)> {
    let (row, col) = dem.world_to_cell(observer).ok_or_else(|| {
        GeoscopeError::InvalidInput(format!(
            "Observer ({}, {}) lies outside the elevation grid",
            observer.x, observer.y
        ))
    })?;
    let ground = dem.value(row, col).ok_or_else(|| {
        GeoscopeError::InvalidInput("Observer stands on a nodata cell".to_string())
    })?;
    Ok((row, col, ground + height))
}

/// Walk the ray from the eye to a target. Returns the first blocking cell, or
/// `None` when the target is visible.
fn first_obstruction(
    dem: &Grid,
    from: (usize, usize, f64),
    to: (usize, usize),
    target_height: f64,
) -> Option<Option<(usize, usize)>> {
    let (r0, c0, eye_z) = from;
    let (r1, c1) = to;
    let target_z = dem.value(r1, c1)? + target_height;
    if (r0, c0) == (r1, c1) {
        return Some(None);
    }
    let cs = dem.cell_size();
    let planar = |r: isize, c: isize| {
        ((r - r0 as isize) as f64 * cs).hypot((c - c0 as isize) as f64 * cs)
    };
    let target_slope = (target_z - eye_z) / planar(r1 as isize, c1 as isize);

    let cells = bresenham_line(r0 as isize, c0 as isize, r1 as isize, c1 as isize);
    for &(r, c) in &cells[1..cells.len() - 1] {
        let Some(z) = dem.value(r as usize, c as usize) else {
            continue;
        };
        if (z - eye_z) / planar(r, c) > target_slope {
            return Some(Some((r as usize, c as usize)));
        }
    }
    Some(None)
}

/// Visibility grid: `1.0` visible, `0.0` hidden, `NaN` for nodata targets.
pub fn viewshed(dem: &Grid, observer: &Position, options: &ViewshedOptions) -> Result<Grid> {
    let origin = eye(dem, observer, options.observer_height)?;
    let cs = dem.cell_size();
    compute_rows(dem.spec, options.cancel.as_ref(), |row, col| {
        if let Some(radius) = options.max_radius {
            let d = ((row as f64 - origin.0 as f64) * cs).hypot((col as f64 - origin.1 as f64) * cs);
            if d > radius {
                return 0.0;
            }
        }
        match first_obstruction(dem, origin, (row, col), options.target_height) {
            Some(None) => 1.0,
            Some(Some(_)) => 0.0,
            None => f64::NAN,
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineOfSight {
    pub visible: bool,
    /// Center of the first cell blocking the view.
    pub blocked_at: Option<Position>,
}

pub fn line_of_sight(
    dem: &Grid,
    from: &Position,
    to: &Position,
    observer_height: f64,
    target_height: f64,
) -> Result<LineOfSight> {
    let origin = eye(dem, from, observer_height)?;
    let target = dem.world_to_cell(to).ok_or_else(|| {
        GeoscopeError::InvalidInput(format!(
            "Target ({}, {}) lies outside the elevation grid",
            to.x, to.y
        ))
    })?;
    let blocked = first_obstruction(dem, origin, target, target_height).ok_or_else(|| {
        GeoscopeError::InvalidInput("Target lies on a nodata cell".to_string())
    })?;
    Ok(LineOfSight {
        visible: blocked.is_none(),
        blocked_at: blocked.map(|(r, c)| dem.cell_center(r, c)),
    })
}

/// Number of observers that can see each cell.
pub fn cumulative_viewshed(dem: &Grid, observers: &[Position], options: &ViewshedOptions) -> Result<Grid> {
    let mut total = Grid::filled(dem.spec, 0.0);
    for observer in observers {
        cancel::check(options.cancel.as_ref())?;
        let single = viewshed(dem, observer, options)?;
        for (acc, v) in total.values.iter_mut().zip(&single.values) {
            if *v == 1.0 {
                *acc += 1.0;
            }
        }
    }
    Ok(total)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub position: Position,
    pub visible_cells: usize,
}

/// Candidate with the largest viewshed. Without explicit candidates every
/// `sample_step`-th cell center is tried. Ties keep the earliest candidate.
pub fn optimal_viewpoint(
    dem: &Grid,
    candidates: Option<&[Position]>,
    sample_step: usize,
    options: &ViewshedOptions,
) -> Result<Option<Viewpoint>> {
    let sampled: Vec<Position>;
    let candidates = match candidates {
        Some(c) => c,
        None => {
            if sample_step == 0 {
                return Err(GeoscopeError::InvalidInput(
                    "Sample step must be at least 1".to_string(),
                ));
            }
            sampled = (0..dem.height())
                .step_by(sample_step)
                .flat_map(|r| (0..dem.width()).step_by(sample_step).map(move |c| (r, c)))
                .filter(|&(r, c)| dem.value(r, c).is_some())
                .map(|(r, c)| dem.cell_center(r, c))
                .collect();
            &sampled
        }
    };

    let mut best: Option<Viewpoint> = None;
    for position in candidates {
        cancel::check(options.cancel.as_ref())?;
        let grid = viewshed(dem, position, options)?;
        let visible_cells = grid.values.iter().filter(|v| **v == 1.0).count();
        if best.is_none_or(|b| visible_cells > b.visible_cells) {
            best = Some(Viewpoint {
                position: *position,
                visible_cells,
            });
        }
    }
    Ok(best)
}
