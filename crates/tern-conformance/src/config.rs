//! TOML configuration for the conformance runner

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file, read from the working directory
pub const DEFAULT_CONFIG_PATH: &str = "tern_conformance.toml";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid configuration TOML
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },
}

/// Conformance runner configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConformanceConfig {
    /// Only run scenarios whose name contains one of these substrings
    pub filter: Vec<String>,

    /// Scenario name patterns (substring) to skip
    pub skip: Vec<String>,

    /// Worker threads (defaults to the number of CPUs)
    pub jobs: Option<usize>,

    /// Per-turn job limit handed to every runtime
    pub max_jobs_per_turn: Option<usize>,

    /// Directory for saving JSON results
    pub results_dir: Option<PathBuf>,
}

impl ConformanceConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given. Otherwise try the default location and fall
    /// back to defaults when it does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Whether a scenario name passes the filter
    pub fn selects(&self, name: &str) -> bool {
        self.filter.is_empty() || self.filter.iter().any(|f| name.contains(f.as_str()))
    }

    /// Number of worker threads to use
    pub fn worker_count(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get).max(1)
    }
}
