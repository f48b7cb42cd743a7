use crate::position::Position;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box, optionally carrying a z range.
///
/// Invariant: `min_x <= max_x` and `min_y <= max_y`.
///
/// # Examples
///
/// ```
/// use geoscope_types::bounds::Bounds;
/// use geoscope_types::position::Position;
///
/// let manhattan = Bounds::new(-74.0479, 40.6829, -73.9067, 40.8820);
/// assert!(manhattan.contains_position(&Position::new(-74.0, 40.75)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_z: Option<f64>,
}

impl Bounds {
    /// Create a 2D box. Swapped corners are normalized.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
            min_z: None,
            max_z: None,
        }
    }

    /// Create a box with a z range.
    pub fn new_3d(min_x: f64, min_y: f64, min_z: f64, max_x: f64, max_y: f64, max_z: f64) -> Self {
        let mut bounds = Self::new(min_x, min_y, max_x, max_y);
        bounds.min_z = Some(min_z.min(max_z));
        bounds.max_z = Some(min_z.max(max_z));
        bounds
    }

    /// A degenerate box around a single position.
    pub fn from_position(p: &Position) -> Self {
        Self {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
            min_z: p.z,
            max_z: p.z,
        }
    }

    /// Smallest box covering every position, `None` for an empty slice.
    pub fn from_positions<'a, I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Position>,
    {
        let mut iter = positions.into_iter();
        let mut bounds = Self::from_position(iter.next()?);
        for p in iter {
            bounds.extend_position(p);
        }
        Some(bounds)
    }

    /// Grow in place to include a position.
    pub fn extend_position(&mut self, p: &Position) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
        if let Some(z) = p.z {
            self.min_z = Some(self.min_z.map_or(z, |m| m.min(z)));
            self.max_z = Some(self.max_z.map_or(z, |m| m.max(z)));
        }
    }

    /// Grow in place to include another box.
    pub fn extend(&mut self, other: &Bounds) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
        self.min_z = merge_opt(self.min_z, other.min_z, f64::min);
        self.max_z = merge_opt(self.max_z, other.max_z, f64::max);
    }

    /// Union of two boxes.
    pub fn union(&self, other: &Bounds) -> Bounds {
        let mut merged = *self;
        merged.extend(other);
        merged
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Planar area of the 2D footprint.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Area added by growing this box to also cover `other`.
    pub fn enlargement(&self, other: &Bounds) -> f64 {
        self.union(other).area() - self.area()
    }

    pub fn center(&self) -> Position {
        Position::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Closed-interval overlap test in x and y.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// True when `other` lies entirely inside this box.
    pub fn contains(&self, other: &Bounds) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    pub fn contains_position(&self, p: &Position) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Expand by the same amount in every planar direction.
    pub fn expand(&self, amount: f64) -> Self {
        Self {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
            min_z: self.min_z,
            max_z: self.max_z,
        }
    }

    /// Squared planar distance from a position to the nearest point of the box.
    pub fn min_distance_sq(&self, p: &Position) -> f64 {
        let dx = if p.x < self.min_x {
            self.min_x - p.x
        } else if p.x > self.max_x {
            p.x - self.max_x
        } else {
            0.0
        };
        let dy = if p.y < self.min_y {
            self.min_y - p.y
        } else if p.y > self.max_y {
            p.y - self.max_y
        } else {
            0.0
        };
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Convert to a `geo::Rect` (z dropped).
    pub fn to_rect(&self) -> geo::Rect<f64> {
        geo::Rect::new(
            geo::coord! { x: self.min_x, y: self.min_y },
            geo::coord! { x: self.max_x, y: self.max_y },
        )
    }
}

impl From<geo::Rect<f64>> for Bounds {
    fn from(rect: geo::Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

fn merge_opt(a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}
