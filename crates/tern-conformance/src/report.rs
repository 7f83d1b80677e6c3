//! Run summaries and reports

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::runner::{TestOutcome, TestResult};

/// Name of the JSON file written by [`TestReport::save`]
pub const RESULTS_FILE: &str = "latest.json";

/// Conformance run report
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    /// Total number of scenarios
    pub total: usize,
    /// Number of passed scenarios
    pub passed: usize,
    /// Number of failed scenarios
    pub failed: usize,
    /// Number of skipped scenarios
    pub skipped: usize,
    /// Number of crashed scenarios
    pub crashed: usize,
    /// Pass rate as percentage, excluding skipped
    pub pass_rate: f64,
    /// Results by feature
    pub by_feature: BTreeMap<String, FeatureReport>,
    /// Failed scenario details, sorted by name
    pub failures: Vec<FailureInfo>,
}

/// Per-feature report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureReport {
    /// Total scenarios for this feature
    pub total: usize,
    /// Passed scenarios
    pub passed: usize,
    /// Failed or crashed scenarios
    pub failed: usize,
    /// Skipped scenarios
    pub skipped: usize,
}

/// Information about a failed scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureInfo {
    /// Scenario name
    pub name: String,
    /// Error message
    pub error: String,
    /// Whether the scenario panicked
    pub crashed: bool,
}

/// Incrementally built summary of a run
#[derive(Debug)]
pub struct RunSummary {
    /// Scenarios recorded so far
    pub total: usize,
    /// Passed so far
    pub passed: usize,
    /// Failed so far
    pub failed: usize,
    /// Skipped so far
    pub skipped: usize,
    /// Crashed so far
    pub crashed: usize,
    by_feature: BTreeMap<String, FeatureReport>,
    failures: Vec<FailureInfo>,
    max_failures: usize,
}

impl RunSummary {
    /// Create an empty summary keeping at most `max_failures` failure details
    pub fn new(max_failures: usize) -> Self {
        Self {
            total: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            crashed: 0,
            by_feature: BTreeMap::new(),
            failures: Vec::new(),
            max_failures,
        }
    }

    /// Record one scenario result
    pub fn record(&mut self, result: &TestResult) {
        self.total += 1;
        let feature = self.by_feature.entry(result.feature.clone()).or_default();
        feature.total += 1;

        match result.outcome {
            TestOutcome::Pass => {
                self.passed += 1;
                feature.passed += 1;
            }
            TestOutcome::Skip => {
                self.skipped += 1;
                feature.skipped += 1;
            }
            TestOutcome::Fail | TestOutcome::Crash => {
                let crashed = result.outcome == TestOutcome::Crash;
                if crashed {
                    self.crashed += 1;
                } else {
                    self.failed += 1;
                }
                feature.failed += 1;
                if self.failures.len() < self.max_failures {
                    self.failures.push(FailureInfo {
                        name: result.name.clone(),
                        error: result.error.clone().unwrap_or_default(),
                        crashed,
                    });
                }
            }
        }
    }

    /// Finish the run and produce a report
    pub fn into_report(mut self) -> TestReport {
        let run_count = self.passed + self.failed + self.crashed;
        let pass_rate = if run_count > 0 {
            (self.passed as f64 / run_count as f64) * 100.0
        } else {
            0.0
        };
        self.failures.sort_by(|a, b| a.name.cmp(&b.name));

        TestReport {
            total: self.total,
            passed: self.passed,
            failed: self.failed,
            skipped: self.skipped,
            crashed: self.crashed,
            pass_rate,
            by_feature: self.by_feature,
            failures: self.failures,
        }
    }
}

impl TestReport {
    /// Generate a report from collected results
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut summary = RunSummary::new(usize::MAX);
        for result in results {
            summary.record(result);
        }
        summary.into_report()
    }

    /// No scenario failed or crashed
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.crashed == 0
    }

    /// Print a summary to stdout
    pub fn print_summary(&self) {
        println!("\n{}", "=== Conformance Results ===".bold());
        println!("Total:   {}", self.total);
        println!(
            "Passed:  {} ({:.1}%)",
            self.passed.to_string().green(),
            self.pass_rate
        );
        println!("Failed:  {}", self.failed.to_string().red());
        println!("Skipped: {}", self.skipped.to_string().yellow());
        println!("Crashed: {}", self.crashed.to_string().red().bold());

        println!("\n{}", "=== By feature ===".bold());
        for (name, feature) in &self.by_feature {
            let line = format!(
                "  {:<12} {}/{} passed, {} skipped",
                name, feature.passed, feature.total, feature.skipped
            );
            if feature.failed > 0 {
                println!("{}", line.red());
            } else {
                println!("{}", line);
            }
        }

        if !self.failures.is_empty() {
            println!("\n{}", "=== Failures ===".bold());
            for failure in &self.failures {
                let tag = if failure.crashed { "CRASH" } else { "FAIL" };
                println!("  [{}] {} - {}", tag.red(), failure.name, failure.error);
            }
        }
    }

    /// Export to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as JSON into `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(RESULTS_FILE);
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, feature: &str, outcome: TestOutcome, error: Option<&str>) -> TestResult {
        TestResult {
            name: name.to_string(),
            feature: feature.to_string(),
            outcome,
            duration_ms: 1,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_report_generation() {
        let results = vec![
            result("race/b", "race", TestOutcome::Fail, Some("wrong winner")),
            result("all/a", "all", TestOutcome::Pass, None),
            result("all/b", "all", TestOutcome::Skip, None),
            result("all/c", "all", TestOutcome::Crash, Some("panic")),
        ];

        let report = TestReport::from_results(&results);

        assert_eq!(report.total, 4);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.crashed, 1);
        assert_eq!(report.skipped, 1);
        assert!((report.pass_rate - 100.0 / 3.0).abs() < 1e-9);
        assert!(!report.is_success());
        assert_eq!(
            report.by_feature["all"],
            FeatureReport { total: 3, passed: 1, failed: 1, skipped: 1 }
        );
        let names: Vec<_> = report.failures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["all/c", "race/b"]);
    }

    #[test]
    fn test_failure_details_are_capped() {
        let mut summary = RunSummary::new(1);
        summary.record(&result("all/a", "all", TestOutcome::Fail, Some("one")));
        summary.record(&result("all/b", "all", TestOutcome::Fail, Some("two")));
        let report = summary.into_report();
        assert_eq!(report.failed, 2);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_json_uses_lowercase_outcomes() {
        let json = serde_json::to_string(&result("all/a", "all", TestOutcome::Pass, None)).unwrap();
        assert!(json.contains("\"outcome\":\"pass\""));
        assert!(!json.contains("error"));
    }
}
