//! Scenario and suite results
//!
//! Produced by the runner, consumed by whatever reports test outcomes. Every
//! failure carries the step index, the resource address and the raw cause.

use crate::error::{FailureKind, HarnessError};
use crate::runner::RunnerState;
use crate::types::{ResourceAddress, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the lifecycle a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Before any step
    PreCheck,
    /// Applying configuration
    Apply,
    /// Running post-apply checks
    Assert,
    /// Re-planning after apply
    Plan,
    /// Import verification
    Import,
    /// Teardown
    Destroy,
    /// Post-teardown verification
    DestroyCheck,
    /// Runner bookkeeping outside any step
    Runner,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreCheck => "precheck",
            Self::Apply => "apply",
            Self::Assert => "assert",
            Self::Plan => "plan",
            Self::Import => "import",
            Self::Destroy => "destroy",
            Self::DestroyCheck => "destroy-check",
            Self::Runner => "runner",
        };
        f.write_str(name)
    }
}

/// One failure, located
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDiagnostic {
    /// Zero-based step index; `None` outside the step sequence
    pub step: Option<usize>,
    /// Lifecycle phase
    pub phase: Phase,
    /// Classification
    pub kind: FailureKind,
    /// Resource involved, if known
    pub address: Option<ResourceAddress>,
    /// Raw cause, human readable
    pub message: String,
}

impl StepDiagnostic {
    /// Build from an error, flattening aggregates into several diagnostics
    #[must_use]
    pub fn from_error(step: Option<usize>, phase: Phase, error: HarnessError) -> Vec<Self> {
        error
            .flatten()
            .into_iter()
            .map(|err| Self {
                step,
                phase,
                kind: err.kind(),
                address: err.address().cloned(),
                message: err.to_string(),
            })
            .collect()
    }
}

impl fmt::Display for StepDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(step) => write!(f, "step {} ({})", step + 1, self.phase)?,
            None => write!(f, "{}", self.phase)?,
        }
        if let Some(address) = &self.address {
            write!(f, " [{address}]")?;
        }
        write!(f, " {}: {}", self.kind, self.message)
    }
}

/// Outcome of one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario name
    pub name: String,
    /// Ordered failures
    pub diagnostics: Vec<StepDiagnostic>,
    /// Runner states visited, in order
    pub trace: Vec<RunnerState>,
    /// Resources that may have outlived the scenario
    pub leaked: Vec<ResourceAddress>,
    /// Steps that ran to completion
    pub steps_completed: usize,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl ScenarioResult {
    /// Create an empty result
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diagnostics: Vec::new(),
            trace: Vec::new(),
            leaked: Vec::new(),
            steps_completed: 0,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Whether the scenario passed
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.diagnostics.is_empty() && self.leaked.is_empty()
    }

    /// First diagnostic of a given kind
    #[must_use]
    pub fn first_of(&self, kind: FailureKind) -> Option<&StepDiagnostic> {
        self.diagnostics.iter().find(|d| d.kind == kind)
    }

    /// Whether any diagnostic has this kind
    #[inline]
    #[must_use]
    pub fn has_failure(&self, kind: FailureKind) -> bool {
        self.first_of(kind).is_some()
    }

    /// Number of times a runner state was entered
    #[must_use]
    pub fn times_entered(&self, state: RunnerState) -> usize {
        self.trace.iter().filter(|s| **s == state).count()
    }

    /// Record failures for a step
    pub fn record(&mut self, step: Option<usize>, phase: Phase, error: HarnessError) {
        self.diagnostics
            .extend(StepDiagnostic::from_error(step, phase, error));
    }
}

/// Outcome of a suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Run identifier
    pub run_id: RunId,
    /// Results in input order
    pub results: Vec<ScenarioResult>,
    /// Whether the run was cancelled
    pub cancelled: bool,
}

impl SuiteReport {
    /// Whether every scenario passed
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(ScenarioResult::passed)
    }

    /// Number of passing scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    /// Addresses leaked across all scenarios
    #[must_use]
    pub fn leaked(&self) -> Vec<(&str, &ResourceAddress)> {
        self.results
            .iter()
            .flat_map(|r| r.leaked.iter().map(move |a| (r.name.as_str(), a)))
            .collect()
    }

    /// Result by scenario name
    #[must_use]
    pub fn result(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// JSON rendering
    ///
    /// # Errors
    /// Propagates `serde_json` serialization errors.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!("=== acctest run {} ===\n\n", self.run_id));
        for result in &self.results {
            let status = if result.passed() { "PASS" } else { "FAIL" };
            report.push_str(&format!(
                "--- {status}: {} ({} steps, {}ms)\n",
                result.name, result.steps_completed, result.duration_ms
            ));
            for diagnostic in &result.diagnostics {
                report.push_str(&format!("    {diagnostic}\n"));
            }
            for address in &result.leaked {
                report.push_str(&format!("    LEAKED {address}\n"));
            }
        }

        report.push_str(&format!(
            "\nScenarios: {} passed, {} failed",
            self.passed_count(),
            self.results.len() - self.passed_count()
        ));
        if self.cancelled {
            report.push_str(" (cancelled)");
        }

        let leaked = self.leaked();
        if !leaked.is_empty() {
            report.push_str(&format!("\n!!! {} resources may have leaked\n", leaked.len()));
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}
