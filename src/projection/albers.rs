//! Albers equal-area conic on the ellipsoid.

use super::ellipsoid::Ellipsoid;
use serde::{Deserialize, Serialize};

const INVERSE_ITERATIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlbersEqualArea {
    pub lat_0: f64,
    pub lon_0: f64,
    pub lat_1: f64,
    pub lat_2: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

/// Cone constants for one ellipsoid.
struct Cone {
    n: f64,
    c: f64,
    rho0: f64,
}

fn q(phi: f64, ellipsoid: &Ellipsoid) -> f64 {
    let s = phi.sin();
    let e2 = ellipsoid.e2();
    if e2 == 0.0 {
        return 2.0 * s;
    }
    let e = e2.sqrt();
    (1.0 - e2) * (s / (1.0 - e2 * s * s) - (1.0 / (2.0 * e)) * ((1.0 - e * s) / (1.0 + e * s)).ln())
}

fn m(phi: f64, ellipsoid: &Ellipsoid) -> f64 {
    phi.cos() / (1.0 - ellipsoid.e2() * phi.sin().powi(2)).sqrt()
}

impl AlbersEqualArea {
    fn cone(&self, ellipsoid: &Ellipsoid) -> Cone {
        let (phi0, phi1, phi2) = (
            self.lat_0.to_radians(),
            self.lat_1.to_radians(),
            self.lat_2.to_radians(),
        );
        let (m1, m2) = (m(phi1, ellipsoid), m(phi2, ellipsoid));
        let (q1, q2) = (q(phi1, ellipsoid), q(phi2, ellipsoid));
        let n = if (phi1 - phi2).abs() > 1e-10 {
            (m1 * m1 - m2 * m2) / (q2 - q1)
        } else {
            phi1.sin()
        };
        let c = m1 * m1 + n * q1;
        let rho0 = ellipsoid.a * (c - n * q(phi0, ellipsoid)).max(0.0).sqrt() / n;
        Cone { n, c, rho0 }
    }

    pub fn forward(&self, lon: f64, lat: f64, ellipsoid: &Ellipsoid) -> (f64, f64) {
        let cone = self.cone(ellipsoid);
        let rho = ellipsoid.a * (cone.c - cone.n * q(lat.to_radians(), ellipsoid)).max(0.0).sqrt() / cone.n;
        let theta = cone.n * (lon - self.lon_0).to_radians();
        (
            self.false_easting + rho * theta.sin(),
            self.false_northing + cone.rho0 - rho * theta.cos(),
        )
    }

    pub fn inverse(&self, x: f64, y: f64, ellipsoid: &Ellipsoid) -> (f64, f64) {
        let cone = self.cone(ellipsoid);
        let (dx, dy) = (x - self.false_easting, cone.rho0 - (y - self.false_northing));
        let sign = cone.n.signum();
        let rho = dx.hypot(dy) * sign;
        let theta = (dx * sign).atan2(dy * sign);
        let q_val = (cone.c - (rho * cone.n / ellipsoid.a).powi(2)) / cone.n;

        let e2 = ellipsoid.e2();
        let mut phi = (q_val / 2.0).clamp(-1.0, 1.0).asin();
        if e2 > 0.0 {
            let e = e2.sqrt();
            for _ in 0..INVERSE_ITERATIONS {
                let s = phi.sin();
                let one = 1.0 - e2 * s * s;
                let delta = one * one / (2.0 * phi.cos())
                    * (q_val / (1.0 - e2) - s / one
                        + (1.0 / (2.0 * e)) * ((1.0 - e * s) / (1.0 + e * s)).ln());
                phi += delta;
                if delta.abs() < 1e-14 {
                    break;
                }
            }
        }
        (self.lon_0 + (theta / cone.n).to_degrees(), phi.to_degrees())
    }
}
