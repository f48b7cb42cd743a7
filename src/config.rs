//! Toolkit-wide defaults.
//!
//! `Config` carries the tunables that several engines share. It is designed to
//! be loaded from JSON (or TOML with the `toml` feature) and handed to the
//! constructors that accept it: [`SpatialIndex::with_config`],
//! [`BufferOptions::from_config`], [`KMeansOptions::from_config`] and
//! [`ViewshedOptions::from_config`].
//!
//! [`SpatialIndex::with_config`]: crate::index::SpatialIndex::with_config
//! [`BufferOptions::from_config`]: crate::transform::buffer::BufferOptions::from_config
//! [`KMeansOptions::from_config`]: crate::analysis::cluster::KMeansOptions::from_config
//! [`ViewshedOptions::from_config`]: crate::analysis::viewshed::ViewshedOptions::from_config

use crate::error::{GeoscopeError, Result};
use serde::{Deserialize, Serialize};

/// Toolkit configuration.
///
/// # Example
///
/// ```rust
/// use geoscope::Config;
///
/// let config = Config::default();
/// assert_eq!(config.index_max_entries, 9);
///
/// let json = r#"{ "buffer_steps": 64, "earth_radius_m": 6378137.0 }"#;
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.buffer_steps, 64);
/// assert_eq!(config.index_min_entries, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Sphere radius for haversine distances, in meters.
    #[serde(default = "Config::default_earth_radius_m")]
    pub earth_radius_m: f64,

    /// Maximum entries per R-tree node before a split.
    #[serde(default = "Config::default_index_max_entries")]
    pub index_max_entries: usize,

    /// Minimum entries per non-root R-tree node.
    #[serde(default = "Config::default_index_min_entries")]
    pub index_min_entries: usize,

    /// Vertices used to approximate a full circle when buffering.
    #[serde(default = "Config::default_buffer_steps")]
    pub buffer_steps: usize,

    /// Turn angle in degrees above which a vertex counts as a spike.
    #[serde(default = "Config::default_spike_angle_threshold")]
    pub spike_angle_threshold: f64,

    /// Iteration cap for k-means.
    #[serde(default = "Config::default_kmeans_max_iterations")]
    pub kmeans_max_iterations: usize,

    /// Observer eye height above the terrain for viewshed analysis, in meters.
    #[serde(default = "Config::default_observer_height")]
    pub observer_height: f64,
}

impl Config {
    const fn default_earth_radius_m() -> f64 {
        6_371_000.0
    }

    const fn default_index_max_entries() -> usize {
        9
    }

    const fn default_index_min_entries() -> usize {
        4
    }

    const fn default_buffer_steps() -> usize {
        32
    }

    const fn default_spike_angle_threshold() -> f64 {
        160.0
    }

    const fn default_kmeans_max_iterations() -> usize {
        100
    }

    const fn default_observer_height() -> f64 {
        1.7
    }

    pub fn with_earth_radius(mut self, radius_m: f64) -> Self {
        self.earth_radius_m = radius_m;
        self
    }

    /// Set R-tree node capacity.
    pub fn with_index_capacity(mut self, max_entries: usize, min_entries: usize) -> Self {
        assert!(max_entries >= 2, "Node capacity must be at least 2");
        self.index_max_entries = max_entries;
        self.index_min_entries = min_entries;
        self
    }

    pub fn with_buffer_steps(mut self, steps: usize) -> Self {
        assert!(steps >= 3, "Buffer steps must be at least 3");
        self.buffer_steps = steps;
        self
    }

    pub fn with_spike_angle_threshold(mut self, degrees: f64) -> Self {
        self.spike_angle_threshold = degrees;
        self
    }

    pub fn with_kmeans_max_iterations(mut self, iterations: usize) -> Self {
        assert!(iterations > 0, "k-means needs at least one iteration");
        self.kmeans_max_iterations = iterations;
        self
    }

    pub fn with_observer_height(mut self, height_m: f64) -> Self {
        self.observer_height = height_m;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.earth_radius_m.is_finite() || self.earth_radius_m <= 0.0 {
            return Err(GeoscopeError::Config(
                "Earth radius must be a positive finite number".to_string(),
            ));
        }
        if self.index_max_entries < 2 {
            return Err(GeoscopeError::Config(
                "Index node capacity must be at least 2".to_string(),
            ));
        }
        if self.index_min_entries < 1 || self.index_min_entries > (self.index_max_entries + 1) / 2
        {
            return Err(GeoscopeError::Config(format!(
                "Index minimum fill must be between 1 and {}, got {}",
                (self.index_max_entries + 1) / 2,
                self.index_min_entries
            )));
        }
        if self.buffer_steps < 3 {
            return Err(GeoscopeError::Config(
                "Buffer steps must be at least 3".to_string(),
            ));
        }
        if !(0.0..=180.0).contains(&self.spike_angle_threshold) {
            return Err(GeoscopeError::Config(format!(
                "Spike angle threshold must be within [0, 180] degrees, got {}",
                self.spike_angle_threshold
            )));
        }
        if self.kmeans_max_iterations == 0 {
            return Err(GeoscopeError::Config(
                "k-means iteration cap must be greater than zero".to_string(),
            ));
        }
        if !self.observer_height.is_finite() {
            return Err(GeoscopeError::Config(
                "Observer height must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(toml_str).map_err(|e| GeoscopeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GeoscopeError::Serialization(e.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            earth_radius_m: Self::default_earth_radius_m(),
            index_max_entries: Self::default_index_max_entries(),
            index_min_entries: Self::default_index_min_entries(),
            buffer_steps: Self::default_buffer_steps(),
            spike_angle_threshold: Self::default_spike_angle_threshold(),
            kmeans_max_iterations: Self::default_kmeans_max_iterations(),
            observer_height: Self::default_observer_height(),
        }
    }
}
