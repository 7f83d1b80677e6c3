//! Parallel scenario runner.
//!
//! Distributes scenarios across N worker threads. Runtimes are single-threaded,
//! so every worker builds its own runtime per scenario. Communication uses
//! bounded crossbeam channels for backpressure.

use std::sync::Arc;

use colored::Colorize;
use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::{debug, warn};

use tern_vm_runtime::RuntimeConfig;

use crate::report::RunSummary;
use crate::runner::{ScenarioRunner, TestOutcome, TestResult};
use crate::scenarios::Scenario;

/// Shared configuration for all parallel workers
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    /// Configuration for every runtime a worker creates
    pub runtime: RuntimeConfig,
    /// Scenario name patterns (substring) to skip
    pub skip: Vec<String>,
    /// Maximum failure details to keep in the `RunSummary`
    pub max_failures: usize,
    /// Verbosity level (mirrors the CLI `-v` count)
    pub verbose: u8,
    /// Suppress non-JSON output when true
    pub json_mode: bool,
}

/// Run `scenarios` across `num_jobs` worker threads.
///
/// Blocks until every scenario has a result. Fails only when no worker
/// thread could be spawned.
pub fn run_parallel(
    scenarios: Vec<Scenario>,
    config: Arc<ParallelConfig>,
    num_jobs: usize,
) -> std::io::Result<RunSummary> {
    let num_jobs = num_jobs.max(1);
    let (job_tx, job_rx) = bounded::<Scenario>(num_jobs * 4);
    let (result_tx, result_rx) = bounded::<TestResult>(num_jobs * 8);

    let mut handles = Vec::with_capacity(num_jobs);
    let mut spawn_error = None;
    for i in 0..num_jobs {
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        let cfg = Arc::clone(&config);

        let spawned = std::thread::Builder::new()
            .name(format!("tern-conformance-{i}"))
            .spawn(move || worker_main(i, job_rx, result_tx, cfg));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                warn!(worker = i, %err, "failed to spawn worker");
                spawn_error = Some(err);
            }
        }
    }
    if handles.is_empty() {
        return Err(spawn_error
            .unwrap_or_else(|| std::io::Error::other("no conformance worker could be spawned")));
    }
    debug!(workers = handles.len(), scenarios = scenarios.len(), "run started");

    // The result channel closes once every worker drops its sender.
    drop(result_tx);
    drop(job_rx);

    let send_handle = std::thread::spawn(move || {
        for scenario in scenarios {
            if job_tx.send(scenario).is_err() {
                break;
            }
        }
    });

    let mut summary = RunSummary::new(config.max_failures);
    for result in &result_rx {
        if !config.json_mode {
            print_progress(&result, config.verbose, summary.total);
        }
        summary.record(&result);
    }
    if config.verbose == 1 && !config.json_mode {
        eprintln!();
    }

    if send_handle.join().is_err() {
        warn!("scenario feeder thread panicked");
    }
    for handle in handles {
        if handle.join().is_err() {
            warn!("worker thread panicked");
        }
    }

    Ok(summary)
}

fn worker_main(
    id: usize,
    job_rx: Receiver<Scenario>,
    result_tx: Sender<TestResult>,
    cfg: Arc<ParallelConfig>,
) {
    let runner = ScenarioRunner::new(cfg.runtime.clone()).with_skip(cfg.skip.clone());
    let mut ran = 0usize;
    for scenario in &job_rx {
        let result = runner.run(&scenario);
        ran += 1;
        if result_tx.send(result).is_err() {
            break;
        }
    }
    debug!(worker = id, ran, "worker finished");
}

fn print_progress(result: &TestResult, verbose: u8, seen: usize) {
    match verbose {
        0 => {}
        1 => {
            let ch = match result.outcome {
                TestOutcome::Pass => ".".green(),
                TestOutcome::Fail => "F".red(),
                TestOutcome::Skip => "S".yellow(),
                TestOutcome::Crash => "!".red().bold(),
            };
            eprint!("{}", ch);
            if seen % 80 == 79 {
                eprintln!();
            }
        }
        _ => {
            let status = match result.outcome {
                TestOutcome::Pass => "PASS".green(),
                TestOutcome::Fail => "FAIL".red(),
                TestOutcome::Skip => "SKIP".yellow(),
                TestOutcome::Crash => "CRASH".red().bold(),
            };
            eprintln!("[{}] {} {}ms", status, result.name, result.duration_ms);
            if let Some(ref err) = result.error {
                eprintln!("  Error: {}", err);
            }
        }
    }
}
