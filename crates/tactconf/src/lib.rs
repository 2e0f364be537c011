//! Configuration loading for tactus evaluation runs.
//!
//! Scoring, tracker and dataset settings are plain values passed into the
//! scorer at call time; this crate only resolves them from files and the
//! environment.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/tactus/config.toml` (system)
//! 2. `~/.config/tactus/config.toml` (user)
//! 3. `./tactus.toml` (local override), or the file given with `--config`
//! 4. Environment variables (`TACTUS_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! datasets_dir = "~/datasets"
//!
//! [scoring]
//! tolerance = 1.5
//! limit = 5
//! timeout_secs = 60
//!
//! [tracker]
//! max_hypotheses = 30
//!
//! [telemetry]
//! log_level = "debug"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use sections::{OnsetsConfig, PathsConfig, ScoringConfig, TelemetryConfig, TrackerConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },
}

/// Complete evaluation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TactusConfig {
    pub paths: PathsConfig,
    pub scoring: ScoringConfig,
    pub tracker: TrackerConfig,
    pub onsets: OnsetsConfig,
    pub telemetry: TelemetryConfig,
}

impl TactusConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./tactus.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        loader::load_layered(&files, &mut loader::process_env)
    }

    /// Serialize the effective config to a TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::from("# Tactus evaluation configuration\n\n");
        // Serializing plain structs of scalars and paths cannot fail.
        output.push_str(&toml::to_string_pretty(self).unwrap_or_default());
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TactusConfig::default();
        assert_eq!(config.scoring.tolerance, 1.5);
        assert_eq!(config.scoring.limit, None);
        assert!(!config.scoring.skip_failures);
        assert_eq!(config.tracker.max_hypotheses, 30);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_to_toml_round_trips() {
        let mut config = TactusConfig::default();
        config.scoring.limit = Some(5);
        let text = config.to_toml();
        assert!(text.contains("[scoring]"));
        assert!(text.contains("[tracker]"));
        assert!(text.contains("limit = 5"));

        let parsed: TactusConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
