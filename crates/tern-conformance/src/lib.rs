//! Conformance runner for the Tern promise engine
//!
//! Runs a catalog of named promise scenarios, each against a fresh runtime,
//! across worker threads, and reports the results.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod parallel;
pub mod report;
pub mod runner;
pub mod scenarios;

pub use config::{ConfigError, ConformanceConfig};
pub use parallel::{ParallelConfig, run_parallel};
pub use report::{FailureInfo, FeatureReport, RunSummary, TestReport};
pub use runner::{ScenarioRunner, TestOutcome, TestResult};
pub use scenarios::{Scenario, catalog};
