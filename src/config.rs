//! Configuration for meme-attribution

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::attribution::NormalizerPolicy;
use crate::error::AttributionError;

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("meme-attribution")
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("memes.db")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding the memes, interactions and users tables
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Share of the supply handed to contributors, in basis points (9500 = 95%)
    #[serde(default = "default_target_sum_bps")]
    pub target_sum_bps: u32,

    /// Per-user ceiling, in basis points of the supply (1000 = 10 percentage points).
    /// Flat regardless of contributor count; product owners may revisit.
    #[serde(default = "default_per_user_cap_bps")]
    pub per_user_cap_bps: u32,

    /// Distribution units emitted per percentage point of supply
    #[serde(default = "default_units_per_percent")]
    pub units_per_percent: u64,
}

fn default_target_sum_bps() -> u32 {
    9_500
}

fn default_per_user_cap_bps() -> u32 {
    1_000
}

fn default_units_per_percent() -> u64 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            target_sum_bps: default_target_sum_bps(),
            per_user_cap_bps: default_per_user_cap_bps(),
            units_per_percent: default_units_per_percent(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AttributionError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AttributionError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), AttributionError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AttributionError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build the normalizer policy, rejecting out-of-range values
    pub fn policy(&self) -> Result<NormalizerPolicy, AttributionError> {
        NormalizerPolicy::new(self.target_sum_bps, self.per_user_cap_bps, self.units_per_percent)
    }
}
