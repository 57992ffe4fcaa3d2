//! Runtime configuration shared by the library crates and the CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

use crate::error::{LandsatError, LandsatResult};

/// Configuration for catalog search, mounting and raster composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandsatConfig {
    /// Fully qualified catalog table the SQL selects from.
    pub catalog_table: String,

    /// Local directory under which remote prefixes are mounted.
    pub mount_base: PathBuf,

    /// Row limit for a search without an explicit limit.
    pub default_limit: usize,

    /// Number of clipped composites kept per scene metadata cache.
    pub clip_cache_capacity: usize,

    /// Extra attempts after a transient catalog failure.
    pub catalog_retries: u32,

    /// WRS-2 polygon set as a GeoJSON FeatureCollection.
    pub wrs_geojson: Option<PathBuf>,

    /// FUSE mount program.
    pub mount_command: String,

    /// FUSE unmount program.
    pub unmount_command: String,

    /// GDAL block cache size in megabytes; GDAL's own default when unset.
    pub gdal_cache_max_mb: Option<usize>,

    /// Scratch directory for intermediate rasters.
    pub work_dir: PathBuf,
}

impl Default for LandsatConfig {
    fn default() -> Self {
        Self {
            catalog_table: "bigquery-public-data.cloud_storage_geo_index.landsat_index".to_string(),
            mount_base: PathBuf::from("/imagery"),
            default_limit: 10,
            clip_cache_capacity: 32,
            catalog_retries: 1,
            wrs_geojson: None,
            mount_command: "gcsfuse".to_string(),
            unmount_command: "fusermount".to_string(),
            gdal_cache_max_mb: None,
            work_dir: std::env::temp_dir(),
        }
    }
}

impl LandsatConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a YAML file, then let environment variables override it.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> LandsatResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LandsatError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config: LandsatConfig = serde_yaml::from_str(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("LANDSAT_CATALOG_TABLE") {
            self.catalog_table = val;
        }

        if let Ok(val) = std::env::var("LANDSAT_MOUNT_BASE") {
            self.mount_base = PathBuf::from(val);
        }

        if let Some(limit) = parse_env("LANDSAT_DEFAULT_LIMIT") {
            self.default_limit = limit;
        }

        if let Some(capacity) = parse_env("LANDSAT_CLIP_CACHE_CAPACITY") {
            self.clip_cache_capacity = capacity;
        }

        if let Some(retries) = parse_env("LANDSAT_CATALOG_RETRIES") {
            self.catalog_retries = retries;
        }

        if let Ok(val) = std::env::var("LANDSAT_WRS_GEOJSON") {
            self.wrs_geojson = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("LANDSAT_MOUNT_COMMAND") {
            self.mount_command = val;
        }

        if let Ok(val) = std::env::var("LANDSAT_UNMOUNT_COMMAND") {
            self.unmount_command = val;
        }

        if let Some(cache_max) = parse_env("LANDSAT_GDAL_CACHEMAX") {
            self.gdal_cache_max_mb = Some(cache_max);
        }

        if let Ok(val) = std::env::var("LANDSAT_WORK_DIR") {
            self.work_dir = PathBuf::from(val);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LandsatResult<()> {
        if self.catalog_table.trim().is_empty() {
            return Err(LandsatError::Config("catalog_table must not be empty".to_string()));
        }

        if self.default_limit == 0 {
            return Err(LandsatError::Config("default_limit must be > 0".to_string()));
        }

        if self.clip_cache_capacity == 0 {
            return Err(LandsatError::Config("clip_cache_capacity must be > 0".to_string()));
        }

        if self.gdal_cache_max_mb == Some(0) {
            return Err(LandsatError::Config("gdal_cache_max_mb must be > 0".to_string()));
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    let val = std::env::var(name).ok()?;
    match val.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(variable = name, value = %val, "Ignoring unparsable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = LandsatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.mount_base, PathBuf::from("/imagery"));
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config = LandsatConfig {
            default_limit: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LandsatError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_gdal_cache() {
        let config = LandsatConfig {
            gdal_cache_max_mb: Some(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LandsatError::Config(_))));
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("landsat.yaml");
        std::fs::write(&path, "default_limit: 25\ngdal_cache_max_mb: 512\n").unwrap();

        let config = LandsatConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.default_limit, 25);
        assert_eq!(config.gdal_cache_max_mb, Some(512));
        assert_eq!(config.mount_base, PathBuf::from("/imagery"));
    }
}
