//! A parser for the subset of proj4 definition strings the engine supports.
//!
//! Recognised projections: `longlat` (and `latlong`/`lonlat`), `merc`,
//! `utm`, `tmerc`, `aea` and `eqc`. Parameters the engine does not use, such
//! as `+no_defs`, `+wktext` or `+nadgrids`, are ignored.

use super::albers::AlbersEqualArea;
use super::datum::{DatumTransform, Helmert};
use super::ellipsoid::Ellipsoid;
use super::mercator::{EquidistantCylindrical, Mercator};
use super::tmerc::TransverseMercator;
use super::{CrsUnits, Projection};
use crate::error::{GeoscopeError, Result};
use rustc_hash::FxHashMap;

/// Everything a definition string determines.
#[derive(Debug, Clone, PartialEq)]
pub struct Proj4 {
    pub projection: Projection,
    pub datum: DatumTransform,
    pub units: CrsUnits,
}

struct Params<'a> {
    values: FxHashMap<&'a str, Option<&'a str>>,
}

impl<'a> Params<'a> {
    fn parse(definition: &'a str) -> Result<Self> {
        let mut values = FxHashMap::default();
        for token in definition.split_whitespace() {
            let Some(body) = token.strip_prefix('+') else {
                return Err(GeoscopeError::Projection(format!(
                    "Malformed proj4 token '{}'",
                    token
                )));
            };
            match body.split_once('=') {
                Some((key, value)) => values.insert(key, Some(value)),
                None => values.insert(body, None),
            };
        }
        Ok(Self { values })
    }

    fn flag(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn text(&self, key: &str) -> Option<&'a str> {
        self.values.get(key).copied().flatten()
    }

    fn number(&self, key: &str) -> Result<Option<f64>> {
        self.text(key)
            .map(|raw| {
                raw.parse::<f64>().map_err(|_| {
                    GeoscopeError::Projection(format!("Invalid +{} value '{}'", key, raw))
                })
            })
            .transpose()
    }

    fn number_or(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self.number(key)?.unwrap_or(default))
    }

    /// `+k` and `+k_0` are synonyms.
    fn scale(&self) -> Result<Option<f64>> {
        match self.number("k_0")? {
            Some(k) => Ok(Some(k)),
            None => self.number("k"),
        }
    }
}

fn ellipsoid(params: &Params<'_>) -> Result<Ellipsoid> {
    if let Some(name) = params.text("ellps") {
        return Ellipsoid::by_name(name).ok_or_else(|| {
            GeoscopeError::Projection(format!("Unsupported ellipsoid '{}'", name))
        });
    }
    match (params.number("a")?, params.number("b")?, params.number("rf")?) {
        (Some(a), Some(b), _) => Ok(Ellipsoid::from_axes(a, b)),
        (Some(a), None, Some(rf)) => Ok(Ellipsoid::new(a, rf)),
        (Some(a), None, None) => Ok(Ellipsoid::sphere(a)),
        _ => Ok(Ellipsoid::WGS84),
    }
}

fn datum(params: &Params<'_>) -> Result<DatumTransform> {
    let mut datum = match params.text("datum") {
        Some(name) => DatumTransform::by_name(name).ok_or_else(|| {
            GeoscopeError::Projection(format!("Unsupported datum '{}'", name))
        })?,
        None => DatumTransform::new(ellipsoid(params)?, Helmert::IDENTITY),
    };
    if let Some(raw) = params.text("towgs84") {
        let values = raw
            .split(',')
            .map(|v| {
                v.trim().parse::<f64>().map_err(|_| {
                    GeoscopeError::Projection(format!("Invalid +towgs84 value '{}'", raw))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        datum.to_wgs84 = Helmert::from_params(&values)?;
    }
    Ok(datum)
}

fn units(params: &Params<'_>, geographic: bool) -> Result<CrsUnits> {
    if geographic {
        return Ok(CrsUnits::Degrees);
    }
    match params.text("units") {
        None | Some("m") => Ok(CrsUnits::Meters),
        Some("km") => Ok(CrsUnits::Kilometers),
        Some("ft") => Ok(CrsUnits::Feet),
        Some("us-ft") => Ok(CrsUnits::UsFeet),
        Some(other) => Err(GeoscopeError::Projection(format!(
            "Unsupported units '{}'",
            other
        ))),
    }
}

fn projection(params: &Params<'_>, datum: &DatumTransform) -> Result<Projection> {
    let name = params
        .text("proj")
        .ok_or_else(|| GeoscopeError::Projection("Definition has no +proj".to_string()))?;

    Ok(match name {
        "longlat" | "latlong" | "lonlat" => Projection::LongLat,
        "merc" => {
            let k0 = match params.scale()? {
                Some(k) => k,
                None => Mercator::scale_for_lat_ts(params.number_or("lat_ts", 0.0)?, &datum.ellipsoid),
            };
            Projection::Mercator(Mercator {
                lon_0: params.number_or("lon_0", 0.0)?,
                k0,
                false_easting: params.number_or("x_0", 0.0)?,
                false_northing: params.number_or("y_0", 0.0)?,
            })
        }
        "utm" => {
            let zone = params.number("zone")?.ok_or_else(|| {
                GeoscopeError::Projection("+proj=utm requires +zone".to_string())
            })?;
            if zone.fract() != 0.0 || !(1.0..=60.0).contains(&zone) {
                return Err(GeoscopeError::Projection(format!(
                    "UTM zone must be 1-60, got {}",
                    zone
                )));
            }
            Projection::Utm {
                zone: zone as u8,
                south: params.flag("south"),
            }
        }
        "tmerc" => Projection::TransverseMercator(TransverseMercator::new(
            params.number_or("lat_0", 0.0)?,
            params.number_or("lon_0", 0.0)?,
            params.scale()?.unwrap_or(1.0),
            params.number_or("x_0", 0.0)?,
            params.number_or("y_0", 0.0)?,
        )),
        "aea" => {
            let lat_1 = params.number("lat_1")?.ok_or_else(|| {
                GeoscopeError::Projection("+proj=aea requires +lat_1".to_string())
            })?;
            let lat_2 = params.number_or("lat_2", lat_1)?;
            if (lat_1 + lat_2).abs() < 1e-10 {
                return Err(GeoscopeError::Projection(
                    "Albers standard parallels must not be symmetric about the equator"
                        .to_string(),
                ));
            }
            Projection::AlbersEqualArea(AlbersEqualArea {
                lat_0: params.number_or("lat_0", 0.0)?,
                lon_0: params.number_or("lon_0", 0.0)?,
                lat_1,
                lat_2,
                false_easting: params.number_or("x_0", 0.0)?,
                false_northing: params.number_or("y_0", 0.0)?,
            })
        }
        "eqc" => Projection::EquidistantCylindrical(EquidistantCylindrical {
            lat_ts: params.number_or("lat_ts", 0.0)?,
            lat_0: params.number_or("lat_0", 0.0)?,
            lon_0: params.number_or("lon_0", 0.0)?,
            false_easting: params.number_or("x_0", 0.0)?,
            false_northing: params.number_or("y_0", 0.0)?,
        }),
        other => {
            return Err(GeoscopeError::Projection(format!(
                "Unsupported projection '+proj={}'",
                other
            )));
        }
    })
}

/// Parse a proj4 definition string.
///
/// # Examples
///
/// ```
/// use geoscope::projection::proj4::parse_proj4;
/// use geoscope::projection::Projection;
///
/// let parsed = parse_proj4("+proj=utm +zone=33 +south +datum=WGS84 +units=m +no_defs").unwrap();
/// assert_eq!(parsed.projection, Projection::Utm { zone: 33, south: true });
///
/// assert!(parse_proj4("+proj=robin +datum=WGS84").is_err());
/// ```
pub fn parse_proj4(definition: &str) -> Result<Proj4> {
    let params = Params::parse(definition)?;
    let datum = datum(&params)?;
    let projection = projection(&params, &datum)?;
    let units = units(&params, projection == Projection::LongLat)?;
    Ok(Proj4 {
        projection,
        datum,
        units,
    })
}
