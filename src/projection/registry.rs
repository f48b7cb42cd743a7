//! Lookup of CRS definitions by EPSG code.

use super::{CrsDefinition, utm};
use crate::error::{GeoscopeError, Result};
use crate::geometry::try_map_positions;
use geoscope_types::{Geometry, Position};
use log::{debug, error};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

const BUILTIN_DEFINITIONS: &[(u32, &str, &str)] = &[
    (4326, "WGS 84", "+proj=longlat +datum=WGS84 +no_defs"),
    (
        3857,
        "WGS 84 / Pseudo-Mercator",
        "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs",
    ),
    (4269, "NAD83", "+proj=longlat +datum=NAD83 +no_defs"),
    (4267, "NAD27", "+proj=longlat +datum=NAD27 +no_defs"),
    (
        5070,
        "NAD83 / Conus Albers",
        "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs",
    ),
    (
        27700,
        "OSGB36 / British National Grid",
        "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000 +ellps=airy +towgs84=446.448,-125.157,542.06,0.1502,0.2470,0.8421,-20.4894 +units=m +no_defs",
    ),
    (4258, "ETRS89", "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs"),
    (
        4087,
        "WGS 84 / World Equidistant Cylindrical",
        "+proj=eqc +lat_ts=0 +lat_0=0 +lon_0=0 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs",
    ),
];

/// Built-in definitions, parsed once per process and shared read-only.
static BUILTIN: Lazy<Vec<CrsDefinition>> = Lazy::new(|| {
    let fixed = BUILTIN_DEFINITIONS
        .iter()
        .map(|&(code, name, def)| (code, name.to_string(), def.to_string()));
    let zones = (1..=60u8).flat_map(|zone| {
        [false, true].into_iter().map(move |south| {
            let hemisphere = if south { "S" } else { "N" };
            let suffix = if south { " +south" } else { "" };
            (
                utm::utm_code(zone, south),
                format!("WGS 84 / UTM zone {}{}", zone, hemisphere),
                format!("+proj=utm +zone={}{} +datum=WGS84 +units=m +no_defs", zone, suffix),
            )
        })
    });

    fixed
        .chain(zones)
        .filter_map(|(code, name, def)| match CrsDefinition::from_proj4(code, name, def) {
            Ok(definition) => Some(definition),
            Err(e) => {
                error!("Built-in EPSG:{} failed to parse: {}", code, e);
                None
            }
        })
        .collect()
});

/// Parse `EPSG:4326`, `epsg:4326` or a bare `4326`.
pub fn parse_code(code: &str) -> Result<u32> {
    let trimmed = code.trim();
    let digits = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("epsg:") => &trimmed[5..],
        _ => trimmed,
    };
    digits
        .parse::<u32>()
        .map_err(|_| GeoscopeError::Projection(format!("Malformed CRS code '{}'", code)))
}

/// A set of CRS definitions.
///
/// Registries are plain values: build one with [`ProjectionRegistry::with_defaults`]
/// and extend it with [`ProjectionRegistry::register_proj4`].
///
/// # Examples
///
/// ```
/// use geoscope::projection::ProjectionRegistry;
/// use geoscope::Position;
///
/// let registry = ProjectionRegistry::with_defaults();
/// let sf = Position::new(-122.4194, 37.7749);
/// let web = registry.transform(&sf, "EPSG:4326", "EPSG:3857").unwrap();
/// assert!((web.x + 13_627_665.27).abs() < 0.1);
///
/// let back = registry.transform(&web, "EPSG:3857", "EPSG:4326").unwrap();
/// assert!((back.x - sf.x).abs() < 1e-6 && (back.y - sf.y).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProjectionRegistry {
    definitions: FxHashMap<u32, CrsDefinition>,
}

impl ProjectionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in definitions.
    pub fn with_defaults() -> Self {
        let definitions = BUILTIN
            .iter()
            .map(|definition| (definition.code, definition.clone()))
            .collect();
        Self { definitions }
    }

    /// Add or replace a definition.
    pub fn register(&mut self, definition: CrsDefinition) {
        if self.definitions.contains_key(&definition.code) {
            debug!("Replacing definition for EPSG:{}", definition.code);
        }
        self.definitions.insert(definition.code, definition);
    }

    /// Parse and register a proj4 definition.
    pub fn register_proj4(&mut self, code: &str, name: &str, definition: &str) -> Result<()> {
        let code = parse_code(code)?;
        self.register(CrsDefinition::from_proj4(code, name, definition)?);
        Ok(())
    }

    pub fn get(&self, code: &str) -> Result<&CrsDefinition> {
        let numeric = parse_code(code)?;
        if let Some(definition) = self.definitions.get(&numeric) {
            return Ok(definition);
        }
        if (32_600..=32_799).contains(&numeric) {
            utm::parse_utm_code(numeric)?;
        }
        Err(GeoscopeError::Projection(format!(
            "Unknown CRS code 'EPSG:{}'",
            numeric
        )))
    }

    pub fn contains(&self, code: &str) -> bool {
        parse_code(code)
            .map(|numeric| self.definitions.contains_key(&numeric))
            .unwrap_or(false)
    }

    /// Registered codes in ascending order, formatted as `EPSG:<n>`.
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<u32> = self.definitions.keys().copied().collect();
        codes.sort_unstable();
        codes.into_iter().map(|c| format!("EPSG:{}", c)).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn to_wgs84(&self, position: &Position, from: &str) -> Result<Position> {
        self.get(from)?.to_wgs84(position)
    }

    pub fn from_wgs84(&self, position: &Position, to: &str) -> Result<Position> {
        self.get(to)?.from_wgs84(position)
    }

    /// Transform a position between two registered systems via WGS84.
    pub fn transform(&self, position: &Position, from: &str, to: &str) -> Result<Position> {
        let (source, target) = (self.get(from)?, self.get(to)?);
        if source.code == target.code {
            return Ok(*position);
        }
        target.from_wgs84(&source.to_wgs84(position)?)
    }

    /// Transform every position of a geometry.
    pub fn transform_geometry(&self, geometry: &Geometry, from: &str, to: &str) -> Result<Geometry> {
        let (source, target) = (self.get(from)?, self.get(to)?);
        if source.code == target.code {
            return Ok(geometry.clone());
        }
        try_map_positions(geometry, &mut |p: &Position| {
            target.from_wgs84(&source.to_wgs84(p)?)
        })
    }

    /// Code of the UTM zone covering a WGS84 position, e.g. `EPSG:32610`.
    pub fn utm_code_for(&self, position: &Position) -> Result<String> {
        let code = utm::utm_code_for(position.x, position.y)?;
        Ok(format!("EPSG:{}", code))
    }
}
