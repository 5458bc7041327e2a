//! Scenario Runner
//!
//! Drives one scenario through its lifecycle:
//!
//! ```text
//! Init -> ApplyingStep(i) -> Asserting(i) -> { ApplyingStep(i+1) | Importing(i+1) | Failed | Destroying }
//!      -> Destroying -> Destroyed -> Done
//! ```
//!
//! Teardown runs exactly once per scenario whatever happened before it,
//! including a panic in a check or in the engine.
//! Cancellation is observed between phases, never in the middle of an apply,
//! and a cancelled scenario still tears down.

use crate::config::HarnessConfig;
use crate::engine::ProvisioningEngine;
use crate::error::{ApplyError, HarnessError};
use crate::result::{Phase, ScenarioResult};
use crate::scenario::{ImportStep, PreCheck, Step, StepKind, TestScenario};
use crate::types::{AttributeMap, StateSnapshot};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runner lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunnerState {
    /// Prechecks, nothing applied yet
    Init,
    /// Applying step `i`
    ApplyingStep(usize),
    /// Running step `i`'s checks
    Asserting(usize),
    /// Verifying import for step `i`
    Importing(usize),
    /// A step failed; remaining steps are skipped
    Failed,
    /// Tearing down
    Destroying,
    /// Teardown attempted; destroy check pending
    Destroyed,
    /// Terminal
    Done,
}

/// Validates a runner state transition
///
/// # Errors
/// `HarnessError::IllegalTransition` when the table forbids the move.
pub fn validate_transition(from: RunnerState, to: RunnerState) -> Result<(), HarnessError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(HarnessError::IllegalTransition { from, to })
    }
}

fn allowed(from: RunnerState, to: RunnerState) -> bool {
    use RunnerState::*;
    match (from, to) {
        (Init, ApplyingStep(0) | Importing(0) | Failed | Destroying) => true,
        (ApplyingStep(i), Asserting(j)) => i == j,
        (ApplyingStep(_), Failed) => true,
        (Asserting(i) | Importing(i), ApplyingStep(j) | Importing(j)) => j == i + 1,
        (Asserting(_) | Importing(_), Failed | Destroying) => true,
        (Failed, Destroying) => true,
        (Destroying, Destroyed) => true,
        (Destroyed, Done) => true,
        _ => false,
    }
}

/// Per-run bookkeeping
struct Run {
    state: RunnerState,
    result: ScenarioResult,
    tracked: StateSnapshot,
    last_config: Option<String>,
}

impl Run {
    fn new(name: &str) -> Self {
        let mut result = ScenarioResult::new(name);
        result.trace.push(RunnerState::Init);
        Self {
            state: RunnerState::Init,
            result,
            tracked: StateSnapshot::new(),
            last_config: None,
        }
    }

    fn enter(&mut self, next: RunnerState) {
        if let Err(err) = validate_transition(self.state, next) {
            tracing::error!(error = %err, "runner state machine violated");
            self.result.record(None, Phase::Runner, err);
        }
        tracing::debug!(from = ?self.state, to = ?next, "runner transition");
        self.state = next;
        self.result.trace.push(next);
    }
}

type StepFailure = (Phase, HarnessError);

/// Runs scenarios against one engine workspace
pub struct ScenarioRunner {
    engine: Arc<dyn ProvisioningEngine>,
    config: HarnessConfig,
}

impl std::fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScenarioRunner {
    /// Create runner
    #[inline]
    #[must_use]
    pub fn new(engine: Arc<dyn ProvisioningEngine>, config: HarnessConfig) -> Self {
        Self { engine, config }
    }

    /// Run a scenario to completion
    ///
    /// Never returns early: every failure becomes a diagnostic on the result
    /// and teardown always runs.
    #[tracing::instrument(skip_all, fields(scenario = %scenario.name))]
    pub async fn run(&self, scenario: &TestScenario, cancel: &CancellationToken) -> ScenarioResult {
        let started = Instant::now();
        let mut run = Run::new(&scenario.name);

        tracing::info!(steps = scenario.steps.len(), "starting scenario");
        let steps = AssertUnwindSafe(self.execute_steps(scenario, cancel, &mut run))
            .catch_unwind()
            .await;
        if let Err(payload) = steps {
            let message = panic_message(payload);
            tracing::error!(%message, state = ?run.state, "step panicked");
            run.result.record(
                step_of(run.state),
                phase_of(run.state),
                HarnessError::HarnessPanic(message),
            );
            if run.state != RunnerState::Failed {
                run.enter(RunnerState::Failed);
            }
        }
        self.teardown(scenario, &mut run).await;
        run.enter(RunnerState::Done);

        let mut result = run.result;
        result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if result.passed() {
            tracing::info!(duration_ms = result.duration_ms, "scenario passed");
        } else {
            for diagnostic in &result.diagnostics {
                tracing::error!(%diagnostic, "scenario failure");
            }
        }
        result
    }

    async fn execute_steps(
        &self,
        scenario: &TestScenario,
        cancel: &CancellationToken,
        run: &mut Run,
    ) {
        let harness_precheck = PreCheck::env(self.config.required_env.iter().cloned());
        if let Err(err) = harness_precheck.run().and_then(|()| scenario.precheck.run()) {
            run.result.record(None, Phase::PreCheck, err);
            run.enter(RunnerState::Failed);
            return;
        }

        for (index, step) in scenario.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(step = index, "cancelled before step");
                run.result.record(Some(index), Phase::Apply, HarnessError::Cancelled);
                run.enter(RunnerState::Failed);
                return;
            }

            let outcome = match &step.kind {
                StepKind::Apply => self.apply_step(index, step, cancel, run).await,
                StepKind::Import(import) => {
                    self.import_step(index, step, import, cancel, run).await
                }
            };

            if let Err((phase, err)) = outcome {
                run.result.record(Some(index), phase, err);
                run.enter(RunnerState::Failed);
                return;
            }
            run.result.steps_completed += 1;
        }
    }

    async fn apply_step(
        &self,
        index: usize,
        step: &Step,
        cancel: &CancellationToken,
        run: &mut Run,
    ) -> Result<(), StepFailure> {
        run.enter(RunnerState::ApplyingStep(index));
        tracing::info!(step = index, "applying configuration");

        match self.engine.apply(&step.config).await {
            Ok(state) => {
                run.tracked = state;
                run.last_config = Some(step.config.clone());
            }
            Err(ApplyError {
                partial_state,
                cause,
            }) => {
                run.tracked = partial_state;
                return Err((Phase::Apply, HarnessError::ConfigurationApplyFailure(cause)));
            }
        }

        run.enter(RunnerState::Asserting(index));
        run_checks(step, &run.tracked, cancel).await?;

        if self.config.plan_after_apply {
            let plan = self
                .engine
                .plan(&step.config, &run.tracked)
                .await
                .map_err(|e| (Phase::Plan, HarnessError::PlanFailure(e)))?;
            if plan.has_changes() {
                return Err((
                    Phase::Plan,
                    HarnessError::NonEmptyPlanAfterApply {
                        changes: plan.render(),
                    },
                ));
            }
        }

        Ok(())
    }

    async fn import_step(
        &self,
        index: usize,
        step: &Step,
        import: &ImportStep,
        cancel: &CancellationToken,
        run: &mut Run,
    ) -> Result<(), StepFailure> {
        run.enter(RunnerState::Importing(index));
        let address = &import.address;
        tracing::info!(step = index, %address, "verifying import");

        let config = if step.config.is_empty() {
            run.last_config.clone().ok_or_else(|| {
                (
                    Phase::Import,
                    HarnessError::AddressUnresolved {
                        address: address.clone(),
                        reason: "no configuration applied before import".to_string(),
                    },
                )
            })?
        } else {
            step.config.clone()
        };

        let applied = run.tracked.get(address).cloned().ok_or_else(|| {
            (
                Phase::Import,
                HarnessError::AddressUnresolved {
                    address: address.clone(),
                    reason: "not found in state".to_string(),
                },
            )
        })?;

        let mismatch = |detail: String| {
            (
                Phase::Import,
                HarnessError::ImportRoundTripMismatch {
                    address: address.clone(),
                    detail,
                },
            )
        };

        let imported_state = self
            .engine
            .import(address, &applied.id)
            .await
            .map_err(|e| mismatch(e.to_string()))?;
        let imported = imported_state
            .get(address)
            .cloned()
            .ok_or_else(|| mismatch("import produced no instance".to_string()))?;

        if import.verify {
            let differences =
                attribute_differences(&applied.attributes, &imported.attributes, &import.ignore);
            if !differences.is_empty() {
                return Err(mismatch(format!(
                    "attributes differ: {}",
                    differences.join(", ")
                )));
            }
        }

        let mut merged = run.tracked.clone();
        merged.insert(imported);

        let plan = self
            .engine
            .plan(&config, &merged)
            .await
            .map_err(|e| (Phase::Plan, HarnessError::PlanFailure(e)))?;
        if plan.has_changes() {
            return Err(mismatch(format!(
                "imported state plans with changes: {}",
                plan.render().join(", ")
            )));
        }

        run_checks(step, &merged, cancel).await
    }

    async fn teardown(&self, scenario: &TestScenario, run: &mut Run) {
        run.enter(RunnerState::Destroying);
        let snapshot = run.tracked.clone();
        let timeout = self.config.cleanup_timeout();
        tracing::info!(resources = snapshot.len(), "destroying");

        let destroy = AssertUnwindSafe(self.engine.destroy(&snapshot)).catch_unwind();
        let skip_check = match tokio::time::timeout(timeout, destroy).await {
            Ok(Ok(Ok(()))) => false,
            Ok(Ok(Err(err))) => {
                run.result
                    .record(None, Phase::Destroy, HarnessError::DestroyFailure(err));
                false
            }
            Ok(Err(payload)) => {
                let message = panic_message(payload);
                tracing::error!(%message, "destroy panicked");
                run.result.leaked = snapshot.addresses();
                run.result
                    .record(None, Phase::Destroy, HarnessError::HarnessPanic(message));
                true
            }
            Err(_) => {
                let leaked = snapshot.addresses();
                tracing::error!(?leaked, "cleanup timed out");
                run.result.leaked.clone_from(&leaked);
                run.result.record(
                    None,
                    Phase::Destroy,
                    HarnessError::CleanupTimedOut {
                        timeout_secs: timeout.as_secs(),
                        leaked,
                    },
                );
                true
            }
        };

        run.enter(RunnerState::Destroyed);

        if skip_check {
            return;
        }
        if let Some(check) = &scenario.check_destroy {
            let checked = AssertUnwindSafe(check.check_destroyed(&snapshot))
                .catch_unwind()
                .await;
            let err = match checked {
                Ok(Ok(())) => return,
                Ok(Err(err)) => err,
                Err(payload) => HarnessError::HarnessPanic(panic_message(payload)),
            };
            run.result.record(None, Phase::DestroyCheck, err);
        }
    }
}

fn step_of(state: RunnerState) -> Option<usize> {
    match state {
        RunnerState::ApplyingStep(i) | RunnerState::Asserting(i) | RunnerState::Importing(i) => {
            Some(i)
        }
        _ => None,
    }
}

fn phase_of(state: RunnerState) -> Phase {
    match state {
        RunnerState::Init => Phase::PreCheck,
        RunnerState::ApplyingStep(_) => Phase::Apply,
        RunnerState::Asserting(_) => Phase::Assert,
        RunnerState::Importing(_) => Phase::Import,
        _ => Phase::Runner,
    }
}

/// Text of a panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "unknown panic".to_string(), |s| (*s).to_string()),
    }
}

async fn run_checks(
    step: &Step,
    state: &StateSnapshot,
    cancel: &CancellationToken,
) -> Result<(), StepFailure> {
    for check in &step.checks {
        if cancel.is_cancelled() {
            return Err((Phase::Assert, HarnessError::Cancelled));
        }
        tracing::debug!(check = %check.describe(), "running check");
        check.check(state).await.map_err(|e| (Phase::Assert, e))?;
    }
    Ok(())
}

/// Keys whose values differ between applied and imported attributes
///
/// A key missing on one side compares as the empty string.
fn attribute_differences(
    applied: &AttributeMap,
    imported: &AttributeMap,
    ignore: &[String],
) -> Vec<String> {
    let keys: BTreeSet<&String> = applied.keys().chain(imported.keys()).collect();
    keys.into_iter()
        .filter(|key| !ignore.contains(key))
        .filter_map(|key| {
            let left = applied.get(key).map_or("", String::as_str);
            let right = imported.get(key).map_or("", String::as_str);
            (left != right).then(|| format!("{key}: {left:?} != {right:?}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = RunnerState> {
        prop_oneof![
            Just(RunnerState::Init),
            (0..4_usize).prop_map(RunnerState::ApplyingStep),
            (0..4_usize).prop_map(RunnerState::Asserting),
            (0..4_usize).prop_map(RunnerState::Importing),
            Just(RunnerState::Failed),
            Just(RunnerState::Destroying),
            Just(RunnerState::Destroyed),
            Just(RunnerState::Done),
        ]
    }

    proptest! {
        #[test]
        fn done_only_follows_destroyed(from in any_state()) {
            prop_assert_eq!(
                validate_transition(from, RunnerState::Done).is_ok(),
                from == RunnerState::Destroyed
            );
        }

        #[test]
        fn done_is_terminal(to in any_state()) {
            prop_assert!(validate_transition(RunnerState::Done, to).is_err());
        }
    }

    #[test]
    fn happy_path_transitions_are_allowed() {
        use RunnerState::*;
        let path = [
            Init,
            ApplyingStep(0),
            Asserting(0),
            Importing(1),
            ApplyingStep(2),
            Asserting(2),
            Destroying,
            Destroyed,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(validate_transition(pair[0], pair[1]).is_ok(), "{pair:?}");
        }
    }

    #[test]
    fn skipping_teardown_is_illegal() {
        use RunnerState::*;
        assert!(validate_transition(Asserting(0), Done).is_err());
        assert!(validate_transition(Failed, Done).is_err());
        assert!(validate_transition(Failed, ApplyingStep(1)).is_err());
        assert!(validate_transition(Done, Destroying).is_err());
    }

    #[test]
    fn steps_cannot_be_skipped_or_reordered() {
        use RunnerState::*;
        assert!(validate_transition(Asserting(0), ApplyingStep(2)).is_err());
        assert!(validate_transition(ApplyingStep(1), Asserting(0)).is_err());
        assert!(validate_transition(Init, ApplyingStep(1)).is_err());
    }

    #[test]
    fn illegal_move_is_recorded_as_runner_bookkeeping() {
        let mut run = Run::new("illegal");
        run.enter(RunnerState::Done);

        let diagnostic = &run.result.diagnostics[0];
        assert_eq!(diagnostic.kind, crate::FailureKind::HarnessPanic);
        assert_eq!(diagnostic.phase, Phase::Runner);
        assert_eq!(diagnostic.step, None);
        assert_eq!(run.state, RunnerState::Done);
    }

    #[test]
    fn panics_are_attributed_to_the_current_phase() {
        assert_eq!(phase_of(RunnerState::Asserting(1)), Phase::Assert);
        assert_eq!(step_of(RunnerState::Asserting(1)), Some(1));
        assert_eq!(phase_of(RunnerState::Importing(2)), Phase::Import);
        assert_eq!(phase_of(RunnerState::Failed), Phase::Runner);
        assert_eq!(step_of(RunnerState::Failed), None);
    }

    #[test]
    fn attribute_differences_respects_ignore_and_missing() {
        let applied: AttributeMap = [("a", "1"), ("b", "2"), ("c", "")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let imported: AttributeMap = [("a", "1"), ("b", "3"), ("secret", "x")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let diff = attribute_differences(&applied, &imported, &["secret".to_string()]);
        assert_eq!(diff, vec![r#"b: "2" != "3""#.to_string()]);
    }
}
