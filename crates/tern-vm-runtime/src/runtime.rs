//! Tern - host runtime that runs synchronous turns and drains the job queue
//!
//! A turn is one call into the engine followed by a drain of the job queue
//! to empty. Jobs run strictly in FIFO order and each runs to completion;
//! a job that throws is reported and the drain carries on with the next one.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tern_vm_core::{JobFailure, ObjectId, Value, VmContext, VmResult};
use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::error::{JobError, TernError};

/// Job statistics accumulated over the lifetime of a runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainStats {
    /// Synchronous turns run
    pub turns: u64,
    /// Jobs run, all kinds
    pub jobs: u64,
    /// Promise reaction jobs run
    pub reaction_jobs: u64,
    /// Thenable resolution jobs run
    pub thenable_jobs: u64,
    /// Jobs that completed abruptly
    pub job_errors: u64,
    /// Unhandled rejections reported
    pub unhandled_rejections: u64,
}

/// A promise that was rejected during a turn and never got a handler
#[derive(Debug, Clone)]
pub struct UnhandledRejection {
    /// The rejected promise
    pub promise: ObjectId,
    /// Its rejection reason
    pub reason: Value,
}

/// Outcome of one turn
#[derive(Debug)]
pub struct TurnReport<T> {
    /// Completion of the synchronous part of the turn
    pub result: VmResult<T>,
    /// Jobs run by the drain that followed
    pub jobs_executed: usize,
    /// First job that completed abruptly
    pub job_error: Option<JobError>,
    /// Rejected promises still unhandled once the queue was empty
    pub unhandled_rejections: Vec<UnhandledRejection>,
    /// Set when the drain stopped at the configured job limit
    pub job_limit: Option<TernError>,
}

impl<T> TurnReport<T> {
    /// The turn's value, or the first error in order of: the synchronous
    /// completion, the job limit, the first job error
    pub fn into_result(self) -> Result<T, TernError> {
        let value = self.result?;
        if let Some(limit) = self.job_limit {
            return Err(limit);
        }
        if let Some(job_error) = self.job_error {
            return Err(job_error.into());
        }
        Ok(value)
    }

    /// Whether anything went wrong during the turn
    pub fn is_clean(&self) -> bool {
        self.result.is_ok()
            && self.job_error.is_none()
            && self.job_limit.is_none()
            && self.unhandled_rejections.is_empty()
    }
}

struct DrainReport {
    jobs_executed: usize,
    job_error: Option<JobError>,
    job_limit: Option<TernError>,
    unhandled_rejections: Vec<UnhandledRejection>,
}

/// High-level runtime owning one execution context
pub struct Tern {
    ctx: VmContext,
    config: RuntimeConfig,
    stats: Arc<Mutex<DrainStats>>,
}

impl Tern {
    /// Create new runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create new runtime with the given configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        let mut ctx = VmContext::new();
        ctx.rejection_tracker_mut()
            .set_enabled(config.track_rejections);
        Self {
            ctx,
            config,
            stats: Arc::new(Mutex::new(DrainStats::default())),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The execution context
    pub fn context(&self) -> &VmContext {
        &self.ctx
    }

    /// The execution context, mutably
    pub fn context_mut(&mut self) -> &mut VmContext {
        &mut self.ctx
    }

    /// Snapshot of the accumulated statistics
    pub fn stats(&self) -> DrainStats {
        *self.stats.lock()
    }

    /// Shared handle to the statistics, readable from other threads
    pub fn stats_handle(&self) -> Arc<Mutex<DrainStats>> {
        Arc::clone(&self.stats)
    }

    /// Run one synchronous turn and drain the job queue to empty
    pub fn run<T, F>(&mut self, f: F) -> TurnReport<T>
    where
        F: FnOnce(&mut VmContext) -> VmResult<T>,
    {
        let turn = {
            let mut stats = self.stats.lock();
            stats.turns += 1;
            stats.turns
        };
        debug!(turn, "turn start");

        let result = f(&mut self.ctx);
        if let Err(err) = &result {
            debug!(turn, %err, "turn completed abruptly");
        }
        let drain = self.drain_queue();

        debug!(
            turn,
            jobs = drain.jobs_executed,
            unhandled = drain.unhandled_rejections.len(),
            "turn finished"
        );
        TurnReport {
            result,
            jobs_executed: drain.jobs_executed,
            job_error: drain.job_error,
            unhandled_rejections: drain.unhandled_rejections,
            job_limit: drain.job_limit,
        }
    }

    /// Drain the job queue without running a synchronous turn
    pub fn drain(&mut self) -> TurnReport<()> {
        let drain = self.drain_queue();
        TurnReport {
            result: Ok(()),
            jobs_executed: drain.jobs_executed,
            job_error: drain.job_error,
            unhandled_rejections: drain.unhandled_rejections,
            job_limit: drain.job_limit,
        }
    }

    fn drain_queue(&mut self) -> DrainReport {
        let limit = self.config.max_jobs_per_turn;
        let log_jobs = self.config.log_jobs;
        let outcome = self.ctx.run_jobs_with(limit, |seq, kind| {
            if log_jobs {
                debug!(seq, ?kind, "running job");
            }
        });

        let jobs_executed = outcome.executed();
        let job_limit = match limit {
            Some(limit) if outcome.limit_reached => {
                let pending = self.ctx.job_queue().len();
                warn!(limit, pending, "job limit reached, leaving jobs queued");
                Some(TernError::JobLimitExceeded { limit, pending })
            }
            _ => None,
        };
        let job_error = outcome
            .first_failure
            .map(|JobFailure { seq, kind, error }| JobError { seq, kind, error });
        let unhandled_rejections = self.collect_unhandled();

        let mut stats = self.stats.lock();
        stats.jobs += jobs_executed as u64;
        stats.reaction_jobs += outcome.reaction_jobs as u64;
        stats.thenable_jobs += outcome.thenable_jobs as u64;
        stats.job_errors += outcome.failures as u64;
        stats.unhandled_rejections += unhandled_rejections.len() as u64;

        DrainReport {
            jobs_executed,
            job_error,
            job_limit,
            unhandled_rejections,
        }
    }

    fn collect_unhandled(&mut self) -> Vec<UnhandledRejection> {
        let promises = self.ctx.rejection_tracker_mut().take_pending();
        promises
            .into_iter()
            .map(|promise| {
                let reason = self
                    .ctx
                    .promise_result(&Value::Object(promise))
                    .unwrap_or_default();
                warn!(
                    promise = promise.index(),
                    reason = %self.ctx.describe(&reason),
                    "unhandled promise rejection"
                );
                UnhandledRejection { promise, reason }
            })
            .collect()
    }
}

impl Default for Tern {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Tern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tern")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_creation() {
        let tern = Tern::new();
        assert_eq!(tern.stats(), DrainStats::default());
        assert!(tern.context().job_queue().is_empty());
    }

    #[test]
    fn test_turn_counts() {
        let mut tern = Tern::new();
        let report = tern.run(|_| Ok(1));
        assert!(report.is_clean());
        assert_eq!(report.into_result().unwrap(), 1);
        tern.drain();
        assert_eq!(tern.stats().turns, 1);
    }
}
