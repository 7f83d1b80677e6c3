//! Runtime error types

use std::path::PathBuf;

use tern_vm_core::{JobKind, VmError};
use thiserror::Error;

/// Errors surfaced by the runtime host
#[derive(Debug, Error)]
pub enum TernError {
    /// The synchronous part of a turn completed abruptly
    #[error(transparent)]
    Vm(#[from] VmError),

    /// A promise job completed abruptly
    #[error(transparent)]
    Job(#[from] JobError),

    /// The drain stopped at `max_jobs_per_turn` with work still queued
    #[error("job limit of {limit} exceeded ({pending} jobs still queued)")]
    JobLimitExceeded {
        /// Configured limit
        limit: usize,
        /// Jobs left in the queue
        pending: usize,
    },

    /// Reading a configuration file failed
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML for the expected shape
    #[error("failed to parse config '{origin}': {source}")]
    Config {
        /// File path, or `<inline>` for in-memory sources
        origin: String,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },
}

/// A promise job that completed abruptly (HostReportErrors)
#[derive(Debug, Error)]
#[error("promise job #{seq} ({kind:?}) failed: {error}")]
pub struct JobError {
    /// Sequence number of the job in its queue
    pub seq: u64,
    /// Job kind
    pub kind: JobKind,
    /// The abrupt completion
    #[source]
    pub error: VmError,
}

/// Result type for runtime operations
pub type TernResult<T> = Result<T, TernError>;
