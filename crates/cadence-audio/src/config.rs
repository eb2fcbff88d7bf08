//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cadence_core::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mixer::BusDefinition;

/// Engine settings, read from `engine.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frame clock tick interval in milliseconds.
    pub tick_interval_ms: u64,
    pub pool: PoolConfig,
    pub mixer: MixerConfig,
}

/// Emitter pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Emitters created up front.
    pub warm_up: usize,
    /// Hard cap on emitters. `None` lets the pool grow as needed.
    pub max_emitters: Option<usize>,
}

/// Mixer buses and their starting volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub default_volume: f32,
    pub buses: Vec<BusDefinition>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            pool: PoolConfig::default(),
            mixer: MixerConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            warm_up: 4,
            max_emitters: None,
        }
    }
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            buses: vec![
                BusDefinition::new("Master"),
                BusDefinition::new("BGM"),
                BusDefinition::new("SFX"),
            ],
        }
    }
}

impl EngineConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("Invalid config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Platform config location, e.g. `~/.config/cadence/engine.json`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "cadence", "Cadence")
            .map(|dirs| dirs.config_dir().join("engine.json"))
    }

    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing file yields the defaults; a file that exists but does not
    /// parse or validate is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            warn!("No config directory available, using default engine config");
            return Ok(Self::default());
        };

        if !path.exists() {
            info!("No engine config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        info!("Loading engine config from {}", path.display());
        Self::load(&path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be positive".to_string()));
        }
        if self.pool.max_emitters == Some(0) {
            return Err(Error::Config("pool.max_emitters must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.mixer.default_volume) {
            return Err(Error::Config(format!(
                "mixer.default_volume must be within 0..=1, got {}",
                self.mixer.default_volume
            )));
        }
        Ok(())
    }

    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
