use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

use tern_conformance::{ConformanceConfig, ParallelConfig, catalog, run_parallel};
use tern_vm_runtime::RuntimeConfig;

#[derive(Parser, Debug)]
#[command(name = "tern-conformance")]
#[command(about = "Run promise conformance scenarios against the Tern engine")]
struct Args {
    /// Configuration file (defaults to tern_conformance.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only run scenarios whose name contains this pattern (repeatable)
    #[arg(short, long)]
    filter: Vec<String>,

    /// Number of worker threads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Stop each drain after this many jobs
    #[arg(long)]
    max_jobs_per_turn: Option<usize>,

    /// Directory to save JSON results into
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Only list scenarios without running them
    #[arg(long)]
    list: bool,

    /// Increase verbosity (-v progress, -vv per-scenario lines)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

const MAX_FAILURE_DETAILS: usize = 100;

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let mut config = ConformanceConfig::load_or_default(args.config.as_deref())
        .context("loading conformance config")?;
    config.filter.extend(args.filter.iter().cloned());
    if args.jobs.is_some() {
        config.jobs = args.jobs;
    }
    if args.max_jobs_per_turn.is_some() {
        config.max_jobs_per_turn = args.max_jobs_per_turn;
    }
    if args.results_dir.is_some() {
        config.results_dir = args.results_dir.clone();
    }

    let scenarios: Vec<_> = catalog()
        .into_iter()
        .filter(|scenario| config.selects(scenario.name))
        .collect();

    if args.list {
        for scenario in &scenarios {
            println!("{}", scenario.name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let jobs = config.worker_count();
    if !args.json {
        println!("{}", "Tern Conformance Runner".bold().cyan());
        println!("Scenarios: {}  Workers: {}", scenarios.len(), jobs);
    }

    let mut runtime = RuntimeConfig::default();
    runtime.max_jobs_per_turn = config.max_jobs_per_turn;
    let parallel = Arc::new(ParallelConfig {
        runtime,
        skip: config.skip.clone(),
        max_failures: MAX_FAILURE_DETAILS,
        verbose: args.verbose,
        json_mode: args.json,
    });

    let summary = run_parallel(scenarios, parallel, jobs).context("spawning workers")?;
    let report = summary.into_report();

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        report.print_summary();
    }

    if let Some(dir) = &config.results_dir {
        let path = report
            .save(dir)
            .with_context(|| format!("saving results to {}", dir.display()))?;
        info!(path = %path.display(), "results saved");
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
