//! Suite runner
//!
//! Runs independent scenarios concurrently, each against its own engine
//! workspace, bounded by `max_parallel`. Results come back in input order.

use crate::config::HarnessConfig;
use crate::engine::EngineFactory;
use crate::error::HarnessError;
use crate::result::{Phase, ScenarioResult, SuiteReport};
use crate::runner::{panic_message, ScenarioRunner};
use crate::scenario::TestScenario;
use crate::types::RunId;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Runs a batch of scenarios
pub struct SuiteRunner {
    config: HarnessConfig,
    factory: Arc<dyn EngineFactory>,
}

impl std::fmt::Debug for SuiteRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SuiteRunner {
    /// Create suite runner
    #[inline]
    #[must_use]
    pub fn new(config: HarnessConfig, factory: Arc<dyn EngineFactory>) -> Self {
        Self { config, factory }
    }

    /// Run every scenario
    ///
    /// Scenarios still waiting for a slot when `cancel` fires are reported as
    /// cancelled without touching the engine. Started scenarios stop between
    /// phases and still tear down.
    #[tracing::instrument(skip_all, fields(scenarios = scenarios.len()))]
    pub async fn run(&self, scenarios: Vec<TestScenario>, cancel: CancellationToken) -> SuiteReport {
        let run_id = RunId::new();
        let slots = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        tracing::info!(%run_id, max_parallel = self.config.max_parallel, "starting suite");

        let mut handles = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let name = scenario.name.clone();
            let slots = Arc::clone(&slots);
            let factory = Arc::clone(&self.factory);
            let config = self.config.clone();
            let cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = slots.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    tracing::warn!(scenario = %scenario.name, "cancelled before start");
                    return not_started(&scenario.name);
                };

                let runner = ScenarioRunner::new(factory.workspace(&scenario.name), config);
                runner.run(&scenario, &cancel).await
            });
            handles.push((name, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => panicked(&name, err),
            };
            results.push(result);
        }

        let report = SuiteReport {
            run_id,
            results,
            cancelled: cancel.is_cancelled(),
        };
        tracing::info!(
            passed = report.passed_count(),
            total = report.results.len(),
            cancelled = report.cancelled,
            "suite finished"
        );
        report
    }
}

fn not_started(name: &str) -> ScenarioResult {
    let mut result = ScenarioResult::new(name);
    result.record(None, Phase::PreCheck, HarnessError::Cancelled);
    result
}

fn panicked(name: &str, err: JoinError) -> ScenarioResult {
    let message = if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        err.to_string()
    };
    tracing::error!(scenario = %name, %message, "scenario task aborted");

    let mut result = ScenarioResult::new(name);
    result.record(None, Phase::Apply, HarnessError::HarnessPanic(message));
    result
}
