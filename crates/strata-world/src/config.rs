//! World configuration.
//!
//! Chunk geometry, seeding, and terrain shaping parameters. Configuration can
//! be loaded from and saved to a TOML file.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::terrain::TerrainConfig;

/// Smallest terrain margin that keeps every neighbor of a chunk inside the
/// render radius within the terrain radius.
pub const MIN_TERRAIN_MARGIN: u32 = 2;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("Config IO failed: {0}")]
    Io(#[from] io::Error),
    /// The file is not valid TOML for this schema
    #[error("Config parse failed: {0}")]
    Parse(#[from] toml::de::Error),
    /// Serializing the config failed
    #[error("Config serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// A value is outside its allowed range
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// World geometry and generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed shared by terrain and structure generators
    pub seed: u32,
    /// Chunk edge length in voxels (x and z)
    pub chunk_size: u32,
    /// Chunk height in voxels
    pub max_height: u32,
    /// Edge length of one voxel in world units
    pub dimension: f32,
    /// Extra chunks terrained beyond the render radius, at least
    /// [`MIN_TERRAIN_MARGIN`]
    pub terrain_margin: u32,
    /// Terrain shaping
    pub terrain: TerrainConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            chunk_size: 16,
            max_height: 128,
            dimension: 1.0,
            terrain_margin: 2,
            terrain: TerrainConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".into()));
        }
        if self.max_height == 0 {
            return Err(ConfigError::Invalid("max_height must be positive".into()));
        }
        if !(self.dimension.is_finite() && self.dimension > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "dimension must be a positive number, got {}",
                self.dimension
            )));
        }
        if self.terrain_margin < MIN_TERRAIN_MARGIN {
            return Err(ConfigError::Invalid(format!(
                "terrain_margin {} is below the minimum of {MIN_TERRAIN_MARGIN}",
                self.terrain_margin
            )));
        }
        if self.terrain.sea_level >= self.max_height {
            return Err(ConfigError::Invalid(format!(
                "sea_level {} must be below max_height {}",
                self.terrain.sea_level, self.max_height
            )));
        }
        Ok(())
    }

    /// Number of voxels in one chunk volume.
    #[must_use]
    pub const fn chunk_volume(&self) -> usize {
        (self.chunk_size as usize) * (self.chunk_size as usize) * (self.max_height as usize)
    }

    /// Parses and validates a configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("World config not found at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path)
            .map_err(ConfigError::from)
            .and_then(|contents| Self::from_toml_str(&contents))
        {
            Ok(config) => {
                info!("Loaded world config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to load world config: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        info!("Saved world config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_volume(), 16 * 16 * 128);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = WorldConfig::from_toml_str("seed = 7\nchunk_size = 8\n").expect("parse");
        assert_eq!(config.seed, 7);
        assert_eq!(config.chunk_size, 8);
        assert_eq!(config.max_height, WorldConfig::default().max_height);
        assert_eq!(config.terrain_margin, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            WorldConfig::from_toml_str("chunk_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            WorldConfig::from_toml_str("max_height = 16\n[terrain]\nsea_level = 20\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            WorldConfig::from_toml_str("chunk_size = \"big\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_terrain_margin_minimum() {
        for margin in [0, 1] {
            let config = WorldConfig {
                terrain_margin: margin,
                ..WorldConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "margin {margin} accepted"
            );
        }
        assert!(matches!(
            WorldConfig::from_toml_str("terrain_margin = 1"),
            Err(ConfigError::Invalid(_))
        ));
        let config = WorldConfig {
            terrain_margin: MIN_TERRAIN_MARGIN,
            ..WorldConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("world.toml");

        let config = WorldConfig {
            seed: 99,
            max_height: 64,
            ..WorldConfig::default()
        };
        config.save_to(&path).expect("save");

        let loaded = WorldConfig::load_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = WorldConfig::load_from(dir.path().join("absent.toml"));
        assert_eq!(loaded, WorldConfig::default());
    }
}
