//! Universal Transverse Mercator zones and their EPSG codes.

use super::tmerc::TransverseMercator;
use crate::error::{GeoscopeError, Result};

pub const UTM_SCALE_FACTOR: f64 = 0.9996;
pub const UTM_FALSE_EASTING: f64 = 500_000.0;
pub const UTM_SOUTH_FALSE_NORTHING: f64 = 10_000_000.0;

const NORTH_BASE: u32 = 32_600;
const SOUTH_BASE: u32 = 32_700;

/// Transverse Mercator parameters for a zone.
pub fn zone_projection(zone: u8, south: bool) -> TransverseMercator {
    TransverseMercator::new(
        0.0,
        f64::from(zone) * 6.0 - 183.0,
        UTM_SCALE_FACTOR,
        UTM_FALSE_EASTING,
        if south { UTM_SOUTH_FALSE_NORTHING } else { 0.0 },
    )
}

/// Split a WGS84 UTM code (32601-32660 north, 32701-32760 south) into zone
/// and hemisphere.
pub fn parse_utm_code(code: u32) -> Result<(u8, bool)> {
    let (base, south) = match code {
        32_601..=32_660 => (NORTH_BASE, false),
        32_701..=32_760 => (SOUTH_BASE, true),
        _ => {
            return Err(GeoscopeError::Projection(format!(
                "EPSG:{} is not a WGS84 UTM zone code",
                code
            )));
        }
    };
    Ok(((code - base) as u8, south))
}

pub fn utm_code(zone: u8, south: bool) -> u32 {
    let base = if south { SOUTH_BASE } else { NORTH_BASE };
    base + u32::from(zone)
}

/// Zone number for a position, including the Norway and Svalbard exceptions.
pub fn zone_for(lon: f64, lat: f64) -> u8 {
    let lon = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return 32;
    }
    if (72.0..=84.0).contains(&lat) && (0.0..42.0).contains(&lon) {
        return match lon {
            l if l < 9.0 => 31,
            l if l < 21.0 => 33,
            l if l < 33.0 => 35,
            _ => 37,
        };
    }
    (((lon + 180.0) / 6.0).floor() as u8 + 1).min(60)
}

/// EPSG code of the UTM zone covering a WGS84 position.
pub fn utm_code_for(lon: f64, lat: f64) -> Result<u32> {
    if !lon.is_finite() || !lat.is_finite() || !(-80.0..=84.0).contains(&lat) {
        return Err(GeoscopeError::Projection(format!(
            "No UTM zone covers ({}, {})",
            lon, lat
        )));
    }
    Ok(utm_code(zone_for(lon, lat), lat < 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ellipsoid::Ellipsoid;

    #[test]
    fn test_parse_utm_code() {
        assert_eq!(parse_utm_code(32610).unwrap(), (10, false));
        assert_eq!(parse_utm_code(32760).unwrap(), (60, true));
        assert!(parse_utm_code(32600).is_err());
        assert!(parse_utm_code(32661).is_err());
        assert!(parse_utm_code(4326).is_err());
    }

    #[test]
    fn test_zone_lookup() {
        assert_eq!(utm_code_for(-122.4194, 37.7749).unwrap(), 32610);
        assert_eq!(utm_code_for(151.2093, -33.8688).unwrap(), 32756);
        assert_eq!(utm_code_for(180.0, 0.0).unwrap(), 32601);
        assert_eq!(zone_for(5.3, 60.4), 32);
        assert_eq!(zone_for(15.0, 78.0), 33);
        assert!(utm_code_for(0.0, 85.0).is_err());
    }

    #[test]
    fn test_known_utm_coordinates() {
        let (x, y) = zone_projection(10, false).forward(-122.4194, 37.7749, &Ellipsoid::WGS84);
        assert!((x - 551_130.768).abs() < 0.01);
        assert!((y - 4_180_998.881).abs() < 0.01);

        let (_, y) = zone_projection(56, true).forward(151.2093, -33.8688, &Ellipsoid::WGS84);
        assert!(y > 6_000_000.0 && y < 6_300_000.0);
    }
}
