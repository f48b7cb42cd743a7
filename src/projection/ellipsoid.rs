//! Reference ellipsoids.

use serde::{Deserialize, Serialize};

/// An ellipsoid of revolution given by semi-major axis and inverse
/// flattening. A sphere has `inv_f == f64::INFINITY`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub a: f64,
    pub inv_f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid::new(6_378_137.0, 298.257_223_563);
    pub const GRS80: Ellipsoid = Ellipsoid::new(6_378_137.0, 298.257_222_101);
    pub const CLARKE_1866: Ellipsoid = Ellipsoid::new(6_378_206.4, 294.978_698_213_898);
    pub const AIRY_1830: Ellipsoid = Ellipsoid::new(6_377_563.396, 299.324_964_6);

    pub const fn new(a: f64, inv_f: f64) -> Self {
        Self { a, inv_f }
    }

    pub const fn sphere(radius: f64) -> Self {
        Self {
            a: radius,
            inv_f: f64::INFINITY,
        }
    }

    /// Build from both semi-axes.
    pub fn from_axes(a: f64, b: f64) -> Self {
        if a == b {
            Self::sphere(a)
        } else {
            Self::new(a, a / (a - b))
        }
    }

    /// Look up a `+ellps` name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "wgs84" => Some(Self::WGS84),
            "grs80" => Some(Self::GRS80),
            "clrk66" => Some(Self::CLARKE_1866),
            "airy" => Some(Self::AIRY_1830),
            _ => None,
        }
    }

    #[inline]
    pub fn f(&self) -> f64 {
        if self.inv_f.is_infinite() { 0.0 } else { 1.0 / self.inv_f }
    }

    /// Semi-minor axis.
    #[inline]
    pub fn b(&self) -> f64 {
        self.a * (1.0 - self.f())
    }

    /// First eccentricity squared.
    #[inline]
    pub fn e2(&self) -> f64 {
        let f = self.f();
        f * (2.0 - f)
    }

    #[inline]
    pub fn e(&self) -> f64 {
        self.e2().sqrt()
    }

    /// Second eccentricity squared.
    #[inline]
    pub fn ep2(&self) -> f64 {
        let e2 = self.e2();
        e2 / (1.0 - e2)
    }

    /// Third flattening `n = f / (2 - f)`.
    #[inline]
    pub fn n(&self) -> f64 {
        let f = self.f();
        f / (2.0 - f)
    }

    pub fn is_sphere(&self) -> bool {
        self.f() == 0.0
    }
}
