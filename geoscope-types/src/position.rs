use serde::{Deserialize, Serialize};

/// A coordinate tuple with x, y and an optional z.
///
/// Positions have no identity; they are copied by value. For geographic data
/// `x` is longitude and `y` is latitude, both in degrees.
///
/// # Examples
///
/// ```
/// use geoscope_types::position::Position;
///
/// let p = Position::new(-74.0060, 40.7128);
/// assert_eq!(p.x, -74.0060);
/// assert!(p.z.is_none());
///
/// let drone = Position::new_3d(-74.0060, 40.7128, 100.0);
/// assert_eq!(drone.z, Some(100.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Position {
    /// Create a 2D position.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Create a 3D position.
    #[inline]
    pub const fn new_3d(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    /// Longitude alias for `x`.
    #[inline]
    pub fn lon(&self) -> f64 {
        self.x
    }

    /// Latitude alias for `y`.
    #[inline]
    pub fn lat(&self) -> f64 {
        self.y
    }

    /// The z value, or `0.0` when absent.
    #[inline]
    pub fn z_or_zero(&self) -> f64 {
        self.z.unwrap_or(0.0)
    }

    /// True when every present coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_none_or(f64::is_finite)
    }

    /// Same x and y, ignoring z.
    #[inline]
    pub fn equals_2d(&self, other: &Position) -> bool {
        self.x == other.x && self.y == other.y
    }

    /// Copy of this position with the z value dropped.
    #[inline]
    pub fn to_2d(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Convert to a `geo::Coord` (z is dropped).
    #[inline]
    pub fn to_coord(&self) -> geo::Coord<f64> {
        geo::coord! { x: self.x, y: self.y }
    }

    /// Coordinates as a GeoJSON-style vector (`[x, y]` or `[x, y, z]`).
    pub fn to_vec(&self) -> Vec<f64> {
        match self.z {
            Some(z) => vec![self.x, self.y, z],
            None => vec![self.x, self.y],
        }
    }
}

impl From<geo::Coord<f64>> for Position {
    fn from(coord: geo::Coord<f64>) -> Self {
        Self::new(coord.x, coord.y)
    }
}

impl From<geo::Point<f64>> for Position {
    fn from(point: geo::Point<f64>) -> Self {
        Self::new(point.x(), point.y())
    }
}

impl From<Position> for geo::Coord<f64> {
    fn from(position: Position) -> Self {
        position.to_coord()
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<[f64; 2]> for Position {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<(f64, f64, f64)> for Position {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new_3d(x, y, z)
    }
}

impl From<Position> for (f64, f64) {
    fn from(position: Position) -> Self {
        (position.x, position.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_creation() {
        let p = Position::new(-74.0, 40.7);
        assert_eq!(p.lon(), -74.0);
        assert_eq!(p.lat(), 40.7);
        assert_eq!(p.z_or_zero(), 0.0);

        let p3 = Position::new_3d(1.0, 2.0, 3.0);
        assert_eq!(p3.z, Some(3.0));
        assert_eq!(p3.to_2d(), Position::new(1.0, 2.0));
    }

    #[test]
    fn test_position_finite() {
        assert!(Position::new(1.0, 2.0).is_finite());
        assert!(!Position::new(f64::NAN, 2.0).is_finite());
        assert!(!Position::new_3d(1.0, 2.0, f64::INFINITY).is_finite());
    }

    #[test]
    fn test_position_conversions() {
        let p: Position = (3.0, 4.0).into();
        let coord: geo::Coord<f64> = p.into();
        assert_eq!(coord.x, 3.0);
        assert_eq!(Position::from(coord), p);
        assert_eq!(Position::from([3.0, 4.0]), p);
        assert_eq!(Position::new_3d(1.0, 2.0, 3.0).to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_equals_2d_ignores_z() {
        let a = Position::new_3d(1.0, 1.0, 5.0);
        let b = Position::new(1.0, 1.0);
        assert!(a.equals_2d(&b));
        assert_ne!(a, b);
    }
}
