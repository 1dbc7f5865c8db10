use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, sync::Arc, time::Duration};

use crate::{
    cache::CoordinateCache,
    geocode::OpenCageGeocoder,
    locator::{DeviceLocator, IpLocator, UnavailableLocator},
    model::{Coordinate, DEFAULT_LOCATION},
    resolver::LocationResolver,
};

/// Geocoding service credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub api_key: String,
}

/// Where the device fix comes from when no cached location exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    /// IP-based geolocation.
    #[default]
    Ip,
    /// No location capability; always use the default location.
    None,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// locator = "ip"
/// cache_ttl_secs = 1800
///
/// [geocoder]
/// api_key = "..."
///
/// [default_location]
/// lat = 34.038287
/// lon = -84.581747
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub locator: LocatorKind,

    /// Seconds a resolved location is trusted; absent means forever.
    pub cache_ttl_secs: Option<u64>,

    pub geocoder: Option<GeocoderConfig>,

    /// Overrides the built-in fallback site.
    pub default_location: Option<Coordinate>,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "wxloc", "wxloc")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_geocoder_api_key(&mut self, api_key: String) {
        self.geocoder = Some(GeocoderConfig { api_key });
    }

    /// Returns the geocoding API key, if present and non-empty.
    pub fn geocoder_api_key(&self) -> Option<&str> {
        self.geocoder
            .as_ref()
            .map(|cfg| cfg.api_key.as_str())
            .filter(|key| !key.trim().is_empty())
    }

    /// Configured fallback site, or the built-in one.
    pub fn default_location(&self) -> Coordinate {
        self.default_location.unwrap_or(DEFAULT_LOCATION)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Fresh, empty session cache honoring the configured TTL.
    pub fn new_cache(&self) -> CoordinateCache {
        match self.cache_ttl() {
            Some(ttl) => CoordinateCache::with_ttl(ttl),
            None => CoordinateCache::new(),
        }
    }

    pub fn device_locator(&self) -> Result<Arc<dyn DeviceLocator>> {
        let locator: Arc<dyn DeviceLocator> = match self.locator {
            LocatorKind::Ip => {
                Arc::new(IpLocator::new().context("Failed to create IP locator")?)
            }
            LocatorKind::None => Arc::new(UnavailableLocator),
        };
        Ok(locator)
    }

    /// Build a resolver over `cache` using the configured services.
    ///
    /// `locator` overrides the configured device locator when given.
    pub fn resolver(
        &self,
        cache: Arc<CoordinateCache>,
        locator: Option<Arc<dyn DeviceLocator>>,
    ) -> Result<LocationResolver> {
        let locator = match locator {
            Some(l) => l,
            None => self.device_locator()?,
        };

        let mut resolver =
            LocationResolver::new(cache, locator).with_default_location(self.default_location());

        if let Some(key) = self.geocoder_api_key() {
            let geocoder = OpenCageGeocoder::new(key.to_owned())
                .context("Failed to create geocoding client")?;
            resolver = resolver.with_geocoder(Arc::new(geocoder));
        }

        Ok(resolver)
    }
}
