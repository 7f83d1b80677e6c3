//! TOML configuration for the runtime host

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{TernError, TernResult};

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Stop a drain after this many jobs (None = unlimited)
    pub max_jobs_per_turn: Option<usize>,

    /// Report promises that are rejected without a handler
    pub track_rejections: bool,

    /// Log every job the host runs at `debug` level
    pub log_jobs: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_jobs_per_turn: None,
            track_rejections: true,
            log_jobs: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> TernResult<Self> {
        toml::from_str(content).map_err(|source| TernError::Config {
            origin: "<inline>".to_string(),
            source,
        })
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> TernResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| TernError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| TernError::Config {
            origin: path.display().to_string(),
            source,
        })
    }

    /// Set the per-drain job limit
    pub fn with_max_jobs_per_turn(mut self, limit: usize) -> Self {
        self.max_jobs_per_turn = Some(limit);
        self
    }

    /// Enable or disable rejection tracking
    pub fn with_track_rejections(mut self, enabled: bool) -> Self {
        self.track_rejections = enabled;
        self
    }

    /// Enable or disable per-job logging
    pub fn with_log_jobs(mut self, enabled: bool) -> Self {
        self.log_jobs = enabled;
        self
    }
}
