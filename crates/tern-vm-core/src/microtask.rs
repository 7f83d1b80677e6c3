//! Job queue for promise reactions.
//!
//! ## Ordering Guarantees
//!
//! - FIFO: first queued, first executed
//! - Jobs enqueued while draining run in the same drain, after everything
//!   that was already queued
//! - A job runs to completion before the next one starts
//!
//! ## Error Handling
//!
//! A job that completes abruptly does not stop the drain. The first error
//! is kept (with the job's sequence number) and returned to the caller;
//! the remaining jobs still run.

use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::context::VmContext;
use crate::error::VmError;
use crate::heap::ObjectId;
use crate::promise::PromiseReaction;
use crate::value::Value;

/// A queued promise job
#[derive(Clone, Debug)]
pub enum Job {
    /// Run a reaction's handler with the settled value and settle the
    /// dependent capability with the outcome
    PromiseReaction {
        /// The reaction to run
        reaction: PromiseReaction,
        /// Fulfillment value or rejection reason
        argument: Value,
    },
    /// Call a thenable's `then` with fresh resolving functions for `promise`
    PromiseResolveThenable {
        /// Promise being resolved
        promise: ObjectId,
        /// The thenable it was resolved with
        thenable: Value,
        /// `thenable.then`, read once at resolution time
        then: Value,
    },
}

/// Kind of a queued job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// `PromiseReactionJob`
    PromiseReaction,
    /// `PromiseResolveThenableJob`
    PromiseResolveThenable,
}

impl Job {
    /// Kind of this job
    pub fn kind(&self) -> JobKind {
        match self {
            Self::PromiseReaction { .. } => JobKind::PromiseReaction,
            Self::PromiseResolveThenable { .. } => JobKind::PromiseResolveThenable,
        }
    }
}

/// FIFO queue of promise jobs, tagged with monotonically increasing
/// sequence numbers
#[derive(Debug, Default)]
pub struct JobQueue {
    queue: VecDeque<(u64, Job)>,
    next_seq: u64,
}

impl JobQueue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job to the back of the queue and return its sequence number
    pub fn enqueue(&mut self, job: Job) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back((seq, job));
        seq
    }

    /// Take the next job
    pub fn dequeue(&mut self) -> Option<(u64, Job)> {
        self.queue.pop_front()
    }

    /// Peek the next job sequence number
    pub fn peek_seq(&self) -> Option<u64> {
        self.queue.front().map(|(seq, _)| *seq)
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total number of jobs ever enqueued
    pub fn total_enqueued(&self) -> u64 {
        self.next_seq
    }

    /// Drop all pending jobs
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

/// First job failure seen during a drain
#[derive(Debug)]
pub struct JobFailure {
    /// Sequence number of the failing job
    pub seq: u64,
    /// Kind of the failing job
    pub kind: JobKind,
    /// The abrupt completion
    pub error: VmError,
}

/// What a call to [`VmContext::run_jobs`] did
#[derive(Debug, Default)]
pub struct DrainOutcome {
    /// Reaction jobs executed
    pub reaction_jobs: usize,
    /// Thenable jobs executed
    pub thenable_jobs: usize,
    /// Jobs that completed abruptly
    pub failures: usize,
    /// First job that completed abruptly
    pub first_failure: Option<JobFailure>,
    /// The drain stopped at the job limit with work still queued
    pub limit_reached: bool,
}

impl DrainOutcome {
    /// Total jobs executed
    pub fn executed(&self) -> usize {
        self.reaction_jobs + self.thenable_jobs
    }
}

impl VmContext {
    /// HostEnqueuePromiseJob
    pub fn enqueue_job(&mut self, job: Job) {
        let kind = job.kind();
        let seq = self.job_queue_mut().enqueue(job);
        trace!(seq, ?kind, "enqueue promise job");
    }

    /// Run a single job to completion
    pub fn run_job(&mut self, job: Job) -> Result<(), VmError> {
        match job {
            Job::PromiseReaction { reaction, argument } => {
                self.run_reaction_job(reaction, argument)
            }
            Job::PromiseResolveThenable {
                promise,
                thenable,
                then,
            } => self.run_resolve_thenable_job(promise, thenable, then),
        }
    }

    /// Drain the job queue to empty, or until `limit` jobs have run
    pub fn run_jobs(&mut self, limit: Option<usize>) -> DrainOutcome {
        self.run_jobs_with(limit, |_, _| {})
    }

    /// Same as [`run_jobs`](Self::run_jobs), calling `on_job` with each
    /// job's sequence number and kind just before it runs
    pub fn run_jobs_with<F>(&mut self, limit: Option<usize>, mut on_job: F) -> DrainOutcome
    where
        F: FnMut(u64, JobKind),
    {
        let mut outcome = DrainOutcome::default();
        loop {
            if limit.is_some_and(|limit| outcome.executed() >= limit) {
                outcome.limit_reached = !self.job_queue().is_empty();
                break;
            }
            let Some((seq, job)) = self.job_queue_mut().dequeue() else {
                break;
            };
            let kind = job.kind();
            trace!(seq, ?kind, "run promise job");
            on_job(seq, kind);
            match kind {
                JobKind::PromiseReaction => outcome.reaction_jobs += 1,
                JobKind::PromiseResolveThenable => outcome.thenable_jobs += 1,
            }
            if let Err(error) = self.run_job(job) {
                warn!(seq, ?kind, %error, "promise job failed");
                outcome.failures += 1;
                if outcome.first_failure.is_none() {
                    outcome.first_failure = Some(JobFailure { seq, kind, error });
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thenable_job(promise: ObjectId, n: i32) -> Job {
        Job::PromiseResolveThenable {
            promise,
            thenable: Value::int32(n),
            then: Value::undefined(),
        }
    }

    #[test]
    fn test_fifo_with_sequence_numbers() {
        let ctx = VmContext::new();
        let promise = ctx.intrinsics().promise_prototype;
        let mut queue = JobQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.enqueue(thenable_job(promise, 1)), 0);
        assert_eq!(queue.enqueue(thenable_job(promise, 2)), 1);
        assert_eq!(queue.peek_seq(), Some(0));
        assert_eq!(queue.len(), 2);

        let (seq, job) = queue.dequeue().unwrap();
        assert_eq!(seq, 0);
        assert!(matches!(job, Job::PromiseResolveThenable { thenable: Value::Number(n), .. } if n == 1.0));
        assert_eq!(queue.dequeue().unwrap().0, 1);
        assert!(queue.dequeue().is_none());
        assert_eq!(queue.total_enqueued(), 2);
    }

    #[test]
    fn test_clear() {
        let ctx = VmContext::new();
        let promise = ctx.intrinsics().promise_prototype;
        let mut queue = JobQueue::new();
        queue.enqueue(thenable_job(promise, 1));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.enqueue(thenable_job(promise, 2)), 1);
    }

    #[test]
    fn test_run_jobs_with_reports_each_job_and_stops_at_limit() {
        let mut ctx = VmContext::new();
        let ctor = ctx.promise_constructor();
        let promise = ctx.promise_resolve(&ctor, Value::int32(1)).unwrap();
        let noop = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
        for _ in 0..3 {
            ctx.invoke(&promise, "then", &[noop.clone()]).unwrap();
        }

        let mut seen = Vec::new();
        let outcome = ctx.run_jobs_with(Some(2), |seq, kind| seen.push((seq, kind)));
        assert_eq!(
            seen,
            vec![(0, JobKind::PromiseReaction), (1, JobKind::PromiseReaction)]
        );
        assert_eq!(outcome.reaction_jobs, 2);
        assert_eq!(outcome.failures, 0);
        assert!(outcome.limit_reached);
        assert_eq!(ctx.job_queue().len(), 1);

        let outcome = ctx.run_jobs(None);
        assert_eq!(outcome.executed(), 1);
        assert!(!outcome.limit_reached);
        assert!(ctx.job_queue().is_empty());
    }
}
