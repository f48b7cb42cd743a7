//! Cylindrical projections: Mercator (spherical and ellipsoidal) and
//! equidistant cylindrical.

use super::ellipsoid::Ellipsoid;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;

/// Latitude limit of the square Web Mercator world.
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_78;

const INVERSE_ITERATIONS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mercator {
    pub lon_0: f64,
    /// Scale at the equator, usually derived from `lat_ts`.
    pub k0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl Mercator {
    /// Spherical Web Mercator on a 6378137 m sphere.
    pub const WEB: Mercator = Mercator {
        lon_0: 0.0,
        k0: 1.0,
        false_easting: 0.0,
        false_northing: 0.0,
    };

    /// Scale factor for a latitude of true scale on the given ellipsoid.
    pub fn scale_for_lat_ts(lat_ts: f64, ellipsoid: &Ellipsoid) -> f64 {
        let phi = lat_ts.to_radians();
        phi.cos() / (1.0 - ellipsoid.e2() * phi.sin().powi(2)).sqrt()
    }

    pub fn forward(&self, lon: f64, lat: f64, ellipsoid: &Ellipsoid) -> (f64, f64) {
        let lat = lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
        let (phi, lam) = (lat.to_radians(), (lon - self.lon_0).to_radians());
        let r = self.k0 * ellipsoid.a;
        let y = if ellipsoid.is_sphere() {
            (FRAC_PI_4 + phi / 2.0).tan().ln()
        } else {
            let e = ellipsoid.e();
            let es = e * phi.sin();
            ((FRAC_PI_4 + phi / 2.0).tan() * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).ln()
        };
        (self.false_easting + r * lam, self.false_northing + r * y)
    }

    pub fn inverse(&self, x: f64, y: f64, ellipsoid: &Ellipsoid) -> (f64, f64) {
        let r = self.k0 * ellipsoid.a;
        let lon = self.lon_0 + ((x - self.false_easting) / r).to_degrees();
        let ts = (-(y - self.false_northing) / r).exp();
        let mut phi = std::f64::consts::FRAC_PI_2 - 2.0 * ts.atan();
        if !ellipsoid.is_sphere() {
            let e = ellipsoid.e();
            for _ in 0..INVERSE_ITERATIONS {
                let es = e * phi.sin();
                let next = std::f64::consts::FRAC_PI_2
                    - 2.0 * (ts * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).atan();
                let done = (next - phi).abs() < 1e-14;
                phi = next;
                if done {
                    break;
                }
            }
        }
        (lon, phi.to_degrees())
    }
}

/// Plate carrée with a standard parallel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquidistantCylindrical {
    pub lat_ts: f64,
    pub lat_0: f64,
    pub lon_0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl EquidistantCylindrical {
    pub fn forward(&self, lon: f64, lat: f64, ellipsoid: &Ellipsoid) -> (f64, f64) {
        let a = ellipsoid.a;
        (
            self.false_easting + a * (lon - self.lon_0).to_radians() * self.lat_ts.to_radians().cos(),
            self.false_northing + a * (lat - self.lat_0).to_radians(),
        )
    }

    pub fn inverse(&self, x: f64, y: f64, ellipsoid: &Ellipsoid) -> (f64, f64) {
        let a = ellipsoid.a;
        (
            self.lon_0 + ((x - self.false_easting) / (a * self.lat_ts.to_radians().cos())).to_degrees(),
            self.lat_0 + ((y - self.false_northing) / a).to_degrees(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_mercator_known_values() {
        let sphere = Ellipsoid::sphere(6_378_137.0);
        let (x, y) = Mercator::WEB.forward(180.0, MAX_MERCATOR_LATITUDE, &sphere);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!((y - 20_037_508.342_789_244).abs() < 1.0);

        let (x, y) = Mercator::WEB.forward(-122.4194, 37.7749, &sphere);
        assert!((x + 13_627_665.27).abs() < 0.1);
        assert!((y - 4_547_675.35).abs() < 0.1);
    }

    #[test]
    fn test_latitude_is_clamped() {
        let sphere = Ellipsoid::sphere(6_378_137.0);
        let top = Mercator::WEB.forward(0.0, 90.0, &sphere);
        let limit = Mercator::WEB.forward(0.0, MAX_MERCATOR_LATITUDE, &sphere);
        assert_eq!(top, limit);
        assert!(top.1.is_finite());
    }

    #[test]
    fn test_ellipsoidal_round_trip() {
        let merc = Mercator {
            lon_0: 10.0,
            k0: Mercator::scale_for_lat_ts(30.0, &Ellipsoid::WGS84),
            false_easting: 0.0,
            false_northing: 0.0,
        };
        for &(lon, lat) in &[(10.0, 0.0), (-40.0, 60.0), (120.0, -75.0)] {
            let (x, y) = merc.forward(lon, lat, &Ellipsoid::WGS84);
            let (lon2, lat2) = merc.inverse(x, y, &Ellipsoid::WGS84);
            assert!((lon - lon2).abs() < 1e-9);
            assert!((lat - lat2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_eqc_round_trip() {
        let eqc = EquidistantCylindrical {
            lat_ts: 0.0,
            lat_0: 0.0,
            lon_0: 0.0,
            false_easting: 0.0,
            false_northing: 0.0,
        };
        let (x, y) = eqc.forward(180.0, 90.0, &Ellipsoid::WGS84);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!((y - 10_018_754.171_394_622).abs() < 1e-6);
        let (lon, lat) = eqc.inverse(x, y, &Ellipsoid::WGS84);
        assert!((lon - 180.0).abs() < 1e-9 && (lat - 90.0).abs() < 1e-9);
    }
}
