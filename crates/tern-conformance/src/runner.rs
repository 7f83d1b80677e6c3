//! Single-scenario execution

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, trace};

use tern_vm_runtime::{RuntimeConfig, Tern};

use crate::scenarios::Scenario;

/// Runs scenarios, each against its own runtime
#[derive(Debug, Clone, Default)]
pub struct ScenarioRunner {
    runtime_config: RuntimeConfig,
    skip: Vec<String>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// Scenario name
    pub name: String,
    /// Feature group
    pub feature: String,
    /// Scenario outcome
    pub outcome: TestOutcome,
    /// Execution time in milliseconds
    pub duration_ms: u64,
    /// Error message if failed or crashed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Scenario outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    /// Scenario passed
    Pass,
    /// A check inside the scenario failed
    Fail,
    /// Scenario matched a skip pattern
    Skip,
    /// Scenario panicked
    Crash,
}

impl ScenarioRunner {
    /// Create a runner whose runtimes use `runtime_config`
    pub fn new(runtime_config: RuntimeConfig) -> Self {
        Self {
            runtime_config,
            skip: Vec::new(),
        }
    }

    /// Skip scenarios whose name contains any of `patterns`
    pub fn with_skip(mut self, patterns: Vec<String>) -> Self {
        self.skip = patterns;
        self
    }

    /// Run one scenario on a fresh runtime
    pub fn run(&self, scenario: &Scenario) -> TestResult {
        let mut result = TestResult {
            name: scenario.name.to_string(),
            feature: scenario.feature.to_string(),
            outcome: TestOutcome::Skip,
            duration_ms: 0,
            error: None,
        };
        if self.skip.iter().any(|p| scenario.name.contains(p.as_str())) {
            trace!(scenario = scenario.name, "skipped");
            return result;
        }

        let mut tern = Tern::with_config(self.runtime_config.clone());
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| (scenario.body)(&mut tern)));
        result.duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(())) => result.outcome = TestOutcome::Pass,
            Ok(Err(message)) => {
                result.outcome = TestOutcome::Fail;
                result.error = Some(message);
            }
            Err(payload) => {
                result.outcome = TestOutcome::Crash;
                result.error = Some(panic_message(payload.as_ref()));
            }
        }
        debug!(
            scenario = scenario.name,
            outcome = ?result.outcome,
            duration_ms = result.duration_ms,
            "scenario finished"
        );
        result
    }

    /// Run scenarios sequentially on the current thread
    pub fn run_all(&self, scenarios: &[Scenario]) -> Vec<TestResult> {
        scenarios.iter().map(|scenario| self.run(scenario)).collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing(_: &mut Tern) -> crate::scenarios::Outcome {
        Ok(())
    }

    fn failing(_: &mut Tern) -> crate::scenarios::Outcome {
        Err("expected 1, got 2".into())
    }

    fn crashing(_: &mut Tern) -> crate::scenarios::Outcome {
        panic!("scenario blew up")
    }

    #[test]
    fn test_outcomes() {
        let runner = ScenarioRunner::default();
        let pass = runner.run(&Scenario::new("core/pass", "core", passing));
        assert_eq!(pass.outcome, TestOutcome::Pass);
        assert!(pass.error.is_none());

        let fail = runner.run(&Scenario::new("core/fail", "core", failing));
        assert_eq!(fail.outcome, TestOutcome::Fail);
        assert_eq!(fail.error.as_deref(), Some("expected 1, got 2"));

        let crash = runner.run(&Scenario::new("core/crash", "core", crashing));
        assert_eq!(crash.outcome, TestOutcome::Crash);
        assert_eq!(crash.error.as_deref(), Some("scenario blew up"));
    }

    #[test]
    fn test_skip_patterns() {
        let runner = ScenarioRunner::default().with_skip(vec!["race/".to_string()]);
        let skipped = runner.run(&Scenario::new("race/empty", "race", failing));
        assert_eq!(skipped.outcome, TestOutcome::Skip);
        let ran = runner.run(&Scenario::new("all/empty", "all", passing));
        assert_eq!(ran.outcome, TestOutcome::Pass);
    }
}
