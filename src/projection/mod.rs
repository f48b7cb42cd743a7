//! Coordinate reference systems: projections, datums and a registry of
//! EPSG-coded definitions.
//!
//! All conversions pivot through WGS84 geographic coordinates. A
//! [`CrsDefinition`] knows how to take its own coordinates to WGS84 and
//! back; [`ProjectionRegistry`] looks definitions up by code.

pub mod albers;
pub mod datum;
pub mod ellipsoid;
pub mod mercator;
pub mod proj4;
pub mod registry;
pub mod tmerc;
pub mod utm;

pub use albers::AlbersEqualArea;
pub use datum::{DatumTransform, Helmert, ecef_to_geodetic, geodetic_to_ecef};
pub use ellipsoid::Ellipsoid;
pub use mercator::{EquidistantCylindrical, MAX_MERCATOR_LATITUDE, Mercator};
pub use proj4::{Proj4, parse_proj4};
pub use registry::{ProjectionRegistry, parse_code};
pub use tmerc::TransverseMercator;

use crate::error::{GeoscopeError, Result};
use geoscope_types::Position;
use serde::{Deserialize, Serialize};

/// Linear units of a projected CRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsUnits {
    Degrees,
    Meters,
    Kilometers,
    Feet,
    UsFeet,
}

impl CrsUnits {
    /// Metres per unit. Degrees report 1 since they never scale.
    pub fn to_meters(&self) -> f64 {
        match self {
            CrsUnits::Degrees | CrsUnits::Meters => 1.0,
            CrsUnits::Kilometers => 1000.0,
            CrsUnits::Feet => 0.3048,
            CrsUnits::UsFeet => 1200.0 / 3937.0,
        }
    }
}

/// The map projection of a CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    LongLat,
    Mercator(Mercator),
    TransverseMercator(TransverseMercator),
    Utm { zone: u8, south: bool },
    AlbersEqualArea(AlbersEqualArea),
    EquidistantCylindrical(EquidistantCylindrical),
}

impl Projection {
    pub fn is_geographic(&self) -> bool {
        matches!(self, Projection::LongLat)
    }

    /// Geodetic degrees to projected metres.
    pub fn forward(&self, lon: f64, lat: f64, ellipsoid: &Ellipsoid) -> (f64, f64) {
        match self {
            Projection::LongLat => (lon, lat),
            Projection::Mercator(p) => p.forward(lon, lat, ellipsoid),
            Projection::TransverseMercator(p) => p.forward(lon, lat, ellipsoid),
            Projection::Utm { zone, south } => {
                utm::zone_projection(*zone, *south).forward(lon, lat, ellipsoid)
            }
            Projection::AlbersEqualArea(p) => p.forward(lon, lat, ellipsoid),
            Projection::EquidistantCylindrical(p) => p.forward(lon, lat, ellipsoid),
        }
    }

    /// Projected metres to geodetic degrees.
    pub fn inverse(&self, x: f64, y: f64, ellipsoid: &Ellipsoid) -> (f64, f64) {
        match self {
            Projection::LongLat => (x, y),
            Projection::Mercator(p) => p.inverse(x, y, ellipsoid),
            Projection::TransverseMercator(p) => p.inverse(x, y, ellipsoid),
            Projection::Utm { zone, south } => {
                utm::zone_projection(*zone, *south).inverse(x, y, ellipsoid)
            }
            Projection::AlbersEqualArea(p) => p.inverse(x, y, ellipsoid),
            Projection::EquidistantCylindrical(p) => p.inverse(x, y, ellipsoid),
        }
    }
}

/// A registered coordinate reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsDefinition {
    pub code: u32,
    pub name: String,
    /// proj4 definition the rest of the fields were parsed from.
    pub definition: String,
    pub units: CrsUnits,
    pub projection: Projection,
    pub datum: DatumTransform,
}

impl CrsDefinition {
    /// Parse a definition from a proj4 string.
    pub fn from_proj4(code: u32, name: impl Into<String>, definition: impl Into<String>) -> Result<Self> {
        let definition = definition.into();
        let parsed = parse_proj4(&definition)?;
        Ok(Self {
            code,
            name: name.into(),
            definition,
            units: parsed.units,
            projection: parsed.projection,
            datum: parsed.datum,
        })
    }

    /// `EPSG:<code>`.
    pub fn epsg(&self) -> String {
        format!("EPSG:{}", self.code)
    }

    pub fn is_geographic(&self) -> bool {
        self.projection.is_geographic()
    }

    /// Coordinates in this CRS to WGS84 longitude/latitude.
    ///
    /// A z value is treated as ellipsoidal height and carried through the
    /// datum shift; positions without z are shifted at height 0.
    pub fn to_wgs84(&self, position: &Position) -> Result<Position> {
        if !position.is_finite() {
            return Err(GeoscopeError::InvalidInput(format!(
                "Cannot transform non-finite position ({}, {})",
                position.x, position.y
            )));
        }
        let scale = self.units.to_meters();
        let (lon, lat) = self.projection.inverse(
            position.x * scale,
            position.y * scale,
            &self.datum.ellipsoid,
        );
        let (lon, lat, h) = self.datum.to_wgs84(lon, lat, position.z_or_zero());
        Ok(Position {
            x: lon,
            y: lat,
            z: position.z.map(|_| h),
        })
    }

    /// WGS84 longitude/latitude to coordinates in this CRS.
    pub fn from_wgs84(&self, position: &Position) -> Result<Position> {
        if !position.is_finite() {
            return Err(GeoscopeError::InvalidInput(format!(
                "Cannot transform non-finite position ({}, {})",
                position.x, position.y
            )));
        }
        if !(-90.0..=90.0).contains(&position.y) {
            return Err(GeoscopeError::Projection(format!(
                "Latitude {} is outside [-90, 90]",
                position.y
            )));
        }
        let (lon, lat, h) = self
            .datum
            .from_wgs84(position.x, position.y, position.z_or_zero());
        let (x, y) = self.projection.forward(lon, lat, &self.datum.ellipsoid);
        let scale = self.units.to_meters();
        Ok(Position {
            x: x / scale,
            y: y / scale,
            z: position.z.map(|_| h),
        })
    }
}
