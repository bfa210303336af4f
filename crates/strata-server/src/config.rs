//! Server configuration.
//!
//! Provides the world section plus spawn, view, and logging settings.
//! Configuration can be loaded from and saved to a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use strata_world::{ConfigError, WorldConfig};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "strata.toml";

/// Largest accepted render radius in chunks.
pub const MAX_RENDER_RADIUS: u32 = 32;

/// Server configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Render radius given to clients that do not ask for one
    pub default_render_radius: u32,
    /// Where clients join, in world units
    pub spawn_position: Vec3,
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Optional block palette file; the built-in palette when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<PathBuf>,
    /// World geometry and generation
    pub world: WorldConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_render_radius: 4,
            spawn_position: Vec3::new(8.0, 90.0, 8.0),
            log_filter: "strata=info".to_owned(),
            blocks: None,
            world: WorldConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        if self.default_render_radius > MAX_RENDER_RADIUS {
            return Err(ConfigError::Invalid(format!(
                "default_render_radius {} exceeds {MAX_RENDER_RADIUS}",
                self.default_render_radius
            )));
        }
        if !self.spawn_position.is_finite() {
            return Err(ConfigError::Invalid("spawn_position must be finite".into()));
        }
        Ok(())
    }

    /// Parses and validates a configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file. `Ok(None)` when the file does not exist.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents).map(Some)
    }

    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(Some(config)) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Ok(None) => {
                info!("Config file not found at {}, using defaults", path.display());
                Self::default()
            },
            Err(e) => {
                warn!("Failed to load config file: {e}");
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

        info!("Saved config to {}", path.display());
        Ok(())
    }
}
