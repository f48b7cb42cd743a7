//! Geodetic datum shifts through earth-centred cartesian coordinates.

use super::ellipsoid::Ellipsoid;
use crate::error::{GeoscopeError, Result};
use serde::{Deserialize, Serialize};

const ARC_SECONDS_TO_RADIANS: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Fixed iteration count for the cartesian to geodetic inverse.
const GEODETIC_ITERATIONS: usize = 5;

/// Seven-parameter Helmert transform in the position-vector convention.
///
/// Translations are in meters, rotations in arc-seconds and scale in parts
/// per million. Rotations are assumed small (first-order rotation matrix).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Helmert {
    pub tx: f64,
    pub ty: f64,
    pub tz: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
    pub ds: f64,
}

impl Helmert {
    pub const IDENTITY: Helmert = Helmert {
        tx: 0.0,
        ty: 0.0,
        tz: 0.0,
        rx: 0.0,
        ry: 0.0,
        rz: 0.0,
        ds: 0.0,
    };

    pub fn translation(tx: f64, ty: f64, tz: f64) -> Self {
        Self {
            tx,
            ty,
            tz,
            ..Self::IDENTITY
        }
    }

    /// Build from a `+towgs84` list of 3 or 7 numbers.
    pub fn from_params(params: &[f64]) -> Result<Self> {
        match *params {
            [tx, ty, tz] => Ok(Self::translation(tx, ty, tz)),
            [tx, ty, tz, rx, ry, rz, ds] => Ok(Self {
                tx,
                ty,
                tz,
                rx,
                ry,
                rz,
                ds,
            }),
            _ => Err(GeoscopeError::Projection(format!(
                "towgs84 needs 3 or 7 parameters, got {}",
                params.len()
            ))),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Scale factor and rotation matrix `(1 + s) * (I + R)`.
    fn matrix(&self) -> [[f64; 3]; 3] {
        let (rx, ry, rz) = (
            self.rx * ARC_SECONDS_TO_RADIANS,
            self.ry * ARC_SECONDS_TO_RADIANS,
            self.rz * ARC_SECONDS_TO_RADIANS,
        );
        let m = 1.0 + self.ds * 1e-6;
        [
            [m, -rz * m, ry * m],
            [rz * m, m, -rx * m],
            [-ry * m, rx * m, m],
        ]
    }

    pub fn apply(&self, xyz: [f64; 3]) -> [f64; 3] {
        let m = self.matrix();
        let t = [self.tx, self.ty, self.tz];
        std::array::from_fn(|i| t[i] + m[i][0] * xyz[0] + m[i][1] * xyz[1] + m[i][2] * xyz[2])
    }

    /// Exact inverse of [`Helmert::apply`], solving the 3x3 system.
    pub fn apply_inverse(&self, xyz: [f64; 3]) -> [f64; 3] {
        let m = self.matrix();
        let b = [xyz[0] - self.tx, xyz[1] - self.ty, xyz[2] - self.tz];
        let det = |c: [[f64; 3]; 3]| {
            c[0][0] * (c[1][1] * c[2][2] - c[1][2] * c[2][1])
                - c[0][1] * (c[1][0] * c[2][2] - c[1][2] * c[2][0])
                + c[0][2] * (c[1][0] * c[2][1] - c[1][1] * c[2][0])
        };
        let d = det(m);
        std::array::from_fn(|col| {
            let mut replaced = m;
            for (row, value) in b.iter().enumerate() {
                replaced[row][col] = *value;
            }
            det(replaced) / d
        })
    }
}

/// Geodetic degrees and ellipsoidal height to earth-centred cartesian meters.
pub fn geodetic_to_ecef(lon: f64, lat: f64, h: f64, ellipsoid: &Ellipsoid) -> [f64; 3] {
    let (phi, lam) = (lat.to_radians(), lon.to_radians());
    let e2 = ellipsoid.e2();
    let n = ellipsoid.a / (1.0 - e2 * phi.sin().powi(2)).sqrt();
    [
        (n + h) * phi.cos() * lam.cos(),
        (n + h) * phi.cos() * lam.sin(),
        (n * (1.0 - e2) + h) * phi.sin(),
    ]
}

/// Earth-centred cartesian meters to `(lon, lat, h)` in degrees and meters.
pub fn ecef_to_geodetic(xyz: [f64; 3], ellipsoid: &Ellipsoid) -> (f64, f64, f64) {
    let [x, y, z] = xyz;
    let e2 = ellipsoid.e2();
    let p = x.hypot(y);
    let lon = y.atan2(x);

    let mut lat = z.atan2(p * (1.0 - e2));
    let mut h = 0.0;
    for _ in 0..GEODETIC_ITERATIONS {
        let n = ellipsoid.a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        h = if lat.cos().abs() > 1e-12 {
            p / lat.cos() - n
        } else {
            z.abs() - n * (1.0 - e2)
        };
        lat = z.atan2(p * (1.0 - e2 * n / (n + h)));
    }
    (lon.to_degrees(), lat.to_degrees(), h)
}

/// A datum: its ellipsoid plus the shift that takes it to WGS84.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatumTransform {
    pub ellipsoid: Ellipsoid,
    pub to_wgs84: Helmert,
}

impl DatumTransform {
    pub const WGS84: DatumTransform = DatumTransform {
        ellipsoid: Ellipsoid::WGS84,
        to_wgs84: Helmert::IDENTITY,
    };

    pub fn new(ellipsoid: Ellipsoid, to_wgs84: Helmert) -> Self {
        Self {
            ellipsoid,
            to_wgs84,
        }
    }

    /// Look up a `+datum` name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "wgs84" => Some(Self::WGS84),
            "nad83" => Some(Self::new(Ellipsoid::GRS80, Helmert::IDENTITY)),
            "nad27" => Some(Self::new(
                Ellipsoid::CLARKE_1866,
                Helmert::translation(-8.0, 160.0, 176.0),
            )),
            "osgb36" => Some(Self::new(
                Ellipsoid::AIRY_1830,
                Helmert {
                    tx: 446.448,
                    ty: -125.157,
                    tz: 542.06,
                    rx: 0.1502,
                    ry: 0.247,
                    rz: 0.8421,
                    ds: -20.4894,
                },
            )),
            _ => None,
        }
    }

    /// True when no shift or ellipsoid change is involved.
    pub fn is_wgs84(&self) -> bool {
        self.to_wgs84.is_identity() && self.ellipsoid == Ellipsoid::WGS84
    }

    /// Geodetic coordinates on this datum to WGS84.
    pub fn to_wgs84(&self, lon: f64, lat: f64, h: f64) -> (f64, f64, f64) {
        if self.to_wgs84.is_identity() {
            return (lon, lat, h);
        }
        let xyz = geodetic_to_ecef(lon, lat, h, &self.ellipsoid);
        ecef_to_geodetic(self.to_wgs84.apply(xyz), &Ellipsoid::WGS84)
    }

    /// WGS84 geodetic coordinates to this datum.
    pub fn from_wgs84(&self, lon: f64, lat: f64, h: f64) -> (f64, f64, f64) {
        if self.to_wgs84.is_identity() {
            return (lon, lat, h);
        }
        let xyz = geodetic_to_ecef(lon, lat, h, &Ellipsoid::WGS84);
        ecef_to_geodetic(self.to_wgs84.apply_inverse(xyz), &self.ellipsoid)
    }
}
