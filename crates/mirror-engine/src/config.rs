//! Engine configuration, loaded from JSON.
//!
//! ```json
//! {
//!   "tick": { "fixed_dt": 0.016666666666666666 },
//!   "registry": { "max_entities": 4096 }
//! }
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use mirror_ecs::registry::RegistryConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("fixed_dt must be positive and finite, got {fixed_dt}")]
    InvalidTickRate { fixed_dt: f64 },
}

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep scheduler.
///
/// `fixed_dt` is the duration in seconds of each simulation tick. A value of
/// `1.0 / 60.0` gives 60 ticks per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for TickConfig {
    /// 60 Hz.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
        }
    }
}

impl TickConfig {
    /// A config ticking `hz` times per second.
    pub fn from_hz(hz: f64) -> Self {
        Self { fixed_dt: 1.0 / hz }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fixed_dt > 0.0 && self.fixed_dt.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::InvalidTickRate {
                fixed_dt: self.fixed_dt,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Everything needed to build a [`Scheduler`](crate::scheduler::Scheduler)
/// and its registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick: TickConfig,
    pub registry: RegistryConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tick.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
