//! TOML configuration store.
//!
//! Implements [`ConfigPort`] over a single file.  A missing file yields the
//! built-in defaults; a file that cannot be read or parsed is
//! [`ConfigError::Corrupted`]; a parsed file that fails range checks is
//! rejected with [`ConfigError::ValidationFailed`].  Fields absent from the
//! file keep their defaults.

use std::io::ErrorKind;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::ConfigPort;
use crate::config::IrrigationConfig;
use crate::error::ConfigError;

pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Validate and write `config`, replacing the file.
    pub fn save(&self, config: &IrrigationConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let text = toml::to_string_pretty(config).map_err(|e| {
            warn!("Config: serialise failed: {e}");
            ConfigError::Corrupted
        })?;
        std::fs::write(&self.path, text).map_err(|e| {
            warn!("Config: write {} failed: {e}", self.path.display());
            ConfigError::Corrupted
        })?;
        info!("Config: saved to {}", self.path.display());
        Ok(())
    }
}

impl ConfigPort for TomlConfigStore {
    fn load(&self) -> Result<IrrigationConfig, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "Config: {} not found, using defaults",
                    self.path.display()
                );
                return Ok(IrrigationConfig::default());
            }
            Err(e) => {
                warn!("Config: read {} failed: {e}", self.path.display());
                return Err(ConfigError::Corrupted);
            }
        };

        let config: IrrigationConfig = toml::from_str(&text).map_err(|e| {
            warn!("Config: parse {} failed: {e}", self.path.display());
            ConfigError::Corrupted
        })?;
        config.validate()?;
        info!("Config: loaded {}", self.path.display());
        Ok(config)
    }
}
