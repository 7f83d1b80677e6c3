//! # Tern VM Runtime
//!
//! Host for the Tern promise engine, providing:
//! - Synchronous turns followed by a full job-queue drain
//! - Configuration loaded from TOML
//! - Drain statistics shared with other threads
//! - Unhandled rejection and job error reporting through `tracing`

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod runtime;

pub use config::RuntimeConfig;
pub use error::{JobError, TernError, TernResult};
pub use runtime::{DrainStats, Tern, TurnReport, UnhandledRejection};

pub use tern_vm_core::{Value, VmContext, VmError, VmResult};
