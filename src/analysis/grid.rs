//! Raster grid shared by the density, terrain, viewshed and interpolation
//! algorithms.
//!
//! Row 0 is the northern edge: the origin is the top-left corner, x grows
//! with the column and y shrinks with the row.

use crate::cancel::{self, CancelToken};
use crate::error::{GeoscopeError, Result};
use geoscope_types::{Bounds, Position};
use serde::{Deserialize, Serialize};

/// Shape and placement of a grid, without values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    /// Top-left corner.
    pub origin: Position,
    pub cell_size: f64,
}

impl GridSpec {
    pub fn new(width: usize, height: usize, origin: Position, cell_size: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GeoscopeError::InvalidInput(format!(
                "Grid dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GeoscopeError::InvalidInput(format!(
                "Grid cell size must be positive and finite, got {}",
                cell_size
            )));
        }
        if !origin.is_finite() {
            return Err(GeoscopeError::InvalidInput(
                "Grid origin must be finite".to_string(),
            ));
        }
        Ok(Self {
            width,
            height,
            origin,
            cell_size,
        })
    }

    /// Smallest grid of `cell_size` cells covering `bounds`.
    pub fn covering(bounds: &Bounds, cell_size: f64) -> Result<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GeoscopeError::InvalidInput(format!(
                "Grid cell size must be positive and finite, got {}",
                cell_size
            )));
        }
        let width = ((bounds.width() / cell_size).ceil() as usize).max(1);
        let height = ((bounds.height() / cell_size).ceil() as usize).max(1);
        Self::new(
            width,
            height,
            Position::new(bounds.min_x, bounds.max_y),
            cell_size,
        )
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// World coordinates of a cell center.
    pub fn cell_center(&self, row: usize, col: usize) -> Position {
        Position::new(
            self.origin.x + (col as f64 + 0.5) * self.cell_size,
            self.origin.y - (row as f64 + 0.5) * self.cell_size,
        )
    }

    /// Cell containing a world position, `None` outside the grid.
    pub fn world_to_cell(&self, position: &Position) -> Option<(usize, usize)> {
        let col = ((position.x - self.origin.x) / self.cell_size).floor();
        let row = ((self.origin.y - position.y) / self.cell_size).floor();
        if col < 0.0 || row < 0.0 || !col.is_finite() || !row.is_finite() {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < self.height && col < self.width).then_some((row, col))
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            self.origin.x,
            self.origin.y - self.height as f64 * self.cell_size,
            self.origin.x + self.width as f64 * self.cell_size,
            self.origin.y,
        )
    }
}

/// A row-major raster of `f64` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub spec: GridSpec,
    pub values: Vec<f64>,
    /// Sentinel for missing cells.
    pub nodata: Option<f64>,
}

impl Grid {
    pub fn filled(spec: GridSpec, value: f64) -> Self {
        Self {
            values: vec![value; spec.cell_count()],
            spec,
            nodata: None,
        }
    }

    /// Wrap existing row-major values; the length must match the spec.
    pub fn from_values(spec: GridSpec, values: Vec<f64>) -> Result<Self> {
        if values.len() != spec.cell_count() {
            return Err(GeoscopeError::InvalidInput(format!(
                "Grid of {}x{} needs {} values, got {}",
                spec.width,
                spec.height,
                spec.cell_count(),
                values.len()
            )));
        }
        Ok(Self {
            spec,
            values,
            nodata: None,
        })
    }

    /// Build from nested rows, north first.
    pub fn from_rows(rows: Vec<Vec<f64>>, origin: Position, cell_size: f64) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return Err(GeoscopeError::InvalidInput(
                "Grid rows must all have the same length".to_string(),
            ));
        }
        let spec = GridSpec::new(width, height, origin, cell_size)?;
        Self::from_values(spec, rows.into_iter().flatten().collect())
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.spec.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.spec.height
    }

    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.spec.cell_size
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        row * self.spec.width + col
    }

    /// Raw cell value, `None` outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.spec.height && col < self.spec.width).then(|| self.values[self.index(row, col)])
    }

    /// Cell value, `None` outside the grid, for nodata and for NaN.
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.get(row, col).filter(|v| !self.is_nodata(*v))
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        if row < self.spec.height && col < self.spec.width {
            let idx = self.index(row, col);
            self.values[idx] = value;
        }
    }

    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| nd == value)
    }

    /// Value at clamped coordinates; edge cells repeat outward.
    pub(crate) fn clamped(&self, row: isize, col: isize) -> f64 {
        let r = row.clamp(0, self.spec.height as isize - 1) as usize;
        let c = col.clamp(0, self.spec.width as isize - 1) as usize;
        self.values[self.index(r, c)]
    }

    pub fn cell_center(&self, row: usize, col: usize) -> Position {
        self.spec.cell_center(row, col)
    }

    pub fn world_to_cell(&self, position: &Position) -> Option<(usize, usize)> {
        self.spec.world_to_cell(position)
    }

    /// Min and max over valid cells.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| !self.is_nodata(*v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.spec.width)
    }
}

/// Fill a grid cell by cell. Rows are independent; with the `parallel`
/// feature they run on the rayon pool. The token is checked once per row.
pub(crate) fn compute_rows<F>(spec: GridSpec, cancel: Option<&CancelToken>, cell: F) -> Result<Grid>
where
    F: Fn(usize, usize) -> f64 + Sync,
{
    let row_values = |row: usize| -> Result<Vec<f64>> {
        cancel::check(cancel)?;
        Ok((0..spec.width).map(|col| cell(row, col)).collect())
    };

    #[cfg(feature = "parallel")]
    let rows: Vec<Vec<f64>> = {
        use rayon::prelude::*;
        (0..spec.height)
            .into_par_iter()
            .map(row_values)
            .collect::<Result<Vec<_>>>()?
    };

    #[cfg(not(feature = "parallel"))]
    let rows: Vec<Vec<f64>> = (0..spec.height)
        .map(row_values)
        .collect::<Result<Vec<_>>>()?;

    Grid::from_values(spec, rows.into_iter().flatten().collect())
}
