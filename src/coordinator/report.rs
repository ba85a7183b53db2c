// src/coordinator/report.rs

//! Per-unit results and the summary of a finished run.

use std::time::Duration;

use tracing::{info, warn};

use crate::unit::{RunId, UnitOutcome};

/// Receives per-unit progress while a run executes.
///
/// Called from the background executor, one unit at a time.
pub trait RunReporter: Send + Sync {
    fn unit_started(&self, run_id: RunId, unit: &str);

    fn unit_finished(&self, run_id: RunId, result: &UnitResult);
}

/// Reporter that writes to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn unit_started(&self, run_id: RunId, unit: &str) {
        info!(run_id, unit, "unit started");
    }

    fn unit_finished(&self, run_id: RunId, result: &UnitResult) {
        match &result.outcome {
            UnitOutcome::Passed => {
                info!(run_id, unit = %result.name, duration = ?result.duration, "unit passed");
            }
            UnitOutcome::Failed(reason) => {
                warn!(run_id, unit = %result.name, duration = ?result.duration, %reason, "unit failed");
            }
            UnitOutcome::Panicked(reason) => {
                warn!(run_id, unit = %result.name, duration = ?result.duration, %reason, "unit panicked");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitResult {
    pub name: String,
    pub outcome: UnitOutcome,
    pub duration: Duration,
}

/// Summary delivered once a run has completed.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub run_id: RunId,
    /// Executed units in execution order.
    pub results: Vec<UnitResult>,
    pub skipped_unsupported: usize,
    pub skipped_unfocused: usize,
    pub focus_applied: bool,
}

impl RunReport {
    pub fn executed(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, outcome: UnitOutcome) -> UnitResult {
        UnitResult {
            name: name.to_string(),
            outcome,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn counts_failures_and_panics_together() {
        let report = RunReport {
            run_id: 1,
            results: vec![
                result("a", UnitOutcome::Passed),
                result("b", UnitOutcome::Failed("nope".into())),
                result("c", UnitOutcome::Panicked("boom".into())),
            ],
            ..Default::default()
        };
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 2);
        assert!(!report.all_passed());
        assert_eq!(report.executed(), vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_run_counts_as_passed() {
        assert!(RunReport::default().all_passed());
    }
}
