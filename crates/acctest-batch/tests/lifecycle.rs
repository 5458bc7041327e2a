//! Batch Application scenarios end to end against the simulated cloud

use acctest_batch::{schema, BatchScenarios, RESOURCE_TYPE, SCENARIOS};
use acctest_core::{
    CancellationToken, Check, DestroyPolicy, FailureKind, HarnessConfig, HarnessError,
    ResourceAddress, ScenarioResult, ScenarioRunner, StateSnapshot, SuiteRunner,
    TransientOnDestroy,
};
use acctest_sim::{FaultPlan, SimulatedCloud, SimulatedEngine, SimulatedEngineFactory};
use acctest_test_utils::{fast_config, init_tracing};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const SEED: u64 = 7;

fn batch_cloud(faults: FaultPlan) -> SimulatedCloud {
    let cloud = SimulatedCloud::with_faults(faults);
    schema::register(&cloud);
    cloud
}

fn scenarios(cloud: &SimulatedCloud, config: &HarnessConfig) -> BatchScenarios {
    BatchScenarios::new(Arc::new(cloud.client(RESOURCE_TYPE)), config.clone())
}

async fn run(cloud: &SimulatedCloud, config: HarnessConfig, name: &str) -> ScenarioResult {
    init_tracing();
    let scenario = scenarios(cloud, &config)
        .by_name(name, SEED)
        .expect("known scenario");
    let engine = Arc::new(SimulatedEngine::new(name, cloud.clone()));
    ScenarioRunner::new(engine, config)
        .run(&scenario, &CancellationToken::new())
        .await
}

fn application() -> ResourceAddress {
    ResourceAddress::new(RESOURCE_TYPE, "test")
}

#[tokio::test]
async fn basic_creates_imports_and_destroys() {
    let cloud = batch_cloud(FaultPlan::none());
    let result = run(&cloud, fast_config(), "basic").await;

    assert!(result.passed(), "{:?}", result.diagnostics);
    assert_eq!(result.steps_completed, 2);
    assert!(cloud.is_empty());
}

/// Records the application id each step's state carries
#[derive(Debug, Default)]
struct RecordId(Mutex<Vec<String>>);

#[async_trait]
impl Check for RecordId {
    async fn check(&self, state: &StateSnapshot) -> Result<(), HarnessError> {
        if let Some(instance) = state.get(&application()) {
            self.0.lock().push(instance.id.clone());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "record application id".to_string()
    }
}

#[tokio::test]
async fn update_sets_display_name_and_keeps_id() {
    init_tracing();
    let cloud = batch_cloud(FaultPlan::none());
    let config = fast_config();
    let ids = Arc::new(RecordId::default());
    let mut scenario = scenarios(&cloud, &config)
        .by_name("update", SEED)
        .expect("known scenario");
    for step in &mut scenario.steps {
        step.checks.push(ids.clone());
    }

    let engine = Arc::new(SimulatedEngine::new("update", cloud.clone()));
    let result = ScenarioRunner::new(engine, config)
        .run(&scenario, &CancellationToken::new())
        .await;

    assert!(result.passed(), "{:?}", result.diagnostics);
    assert_eq!(result.steps_completed, 2);
    let ids = ids.0.lock().clone();
    assert_eq!(ids.len(), 2);
    assert!(!ids[0].is_empty());
    assert_eq!(ids[0], ids[1], "update must not replace the application");
    assert!(cloud.is_empty());
}

#[tokio::test]
async fn suite_runs_every_scenario_without_collisions() {
    init_tracing();
    let cloud = batch_cloud(FaultPlan::none());
    let config = fast_config();
    let all = scenarios(&cloud, &config).all(SEED);
    let factory = Arc::new(SimulatedEngineFactory::new(cloud.clone()));

    let report = SuiteRunner::new(config, factory)
        .run(all, CancellationToken::new())
        .await;

    let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, SCENARIOS);
    assert!(report.passed(), "{}", report.generate_text());
    assert!(cloud.is_empty());
}

#[tokio::test]
async fn dropped_application_is_not_found() {
    let cloud = batch_cloud(FaultPlan::none().drop_creates(RESOURCE_TYPE));
    let result = run(&cloud, fast_config(), "basic").await;

    let diagnostic = result
        .first_of(FailureKind::ResourceNotFoundUnexpectedly)
        .expect("missing diagnostic");
    assert_eq!(diagnostic.address, Some(application()));
    assert!(diagnostic.message.contains("acctestbatchapp-"));
    assert!(diagnostic.message.contains("acctestRG-"));
    assert!(cloud.is_empty());
}

#[tokio::test]
async fn leaked_application_fails_destroy_check() {
    let cloud = batch_cloud(FaultPlan::none().leak_deletes(RESOURCE_TYPE));
    let result = run(&cloud, fast_config(), "basic").await;

    let diagnostic = result
        .first_of(FailureKind::ResourceStillPresentAfterDestroy)
        .expect("missing diagnostic");
    assert_eq!(diagnostic.address, Some(application()));
    assert_eq!(cloud.resources_of(RESOURCE_TYPE).len(), 1);
}

#[tokio::test]
async fn single_stale_not_found_does_not_hide_a_leak() {
    let cloud = batch_cloud(
        FaultPlan::none()
            .leak_deletes(RESOURCE_TYPE)
            .stale_deleted_reads(1),
    );
    let result = run(&cloud, fast_config(), "basic").await;
    assert!(result.has_failure(FailureKind::ResourceStillPresentAfterDestroy));
}

#[tokio::test]
async fn transient_reads_after_destroy() {
    let cloud = batch_cloud(FaultPlan::none().transient_absent_reads(5));
    let result = run(&cloud, fast_config(), "basic").await;
    assert!(result.passed(), "{:?}", result.diagnostics);

    let cloud = batch_cloud(FaultPlan::none().transient_absent_reads(5));
    let strict = fast_config().with_destroy_policy(DestroyPolicy {
        on_transient: TransientOnDestroy::Fail,
        confirmation_delay_ms: 0,
        ..DestroyPolicy::default()
    });
    let result = run(&cloud, strict, "basic").await;
    assert!(result.has_failure(FailureKind::TransientApiFailure));
    assert!(!result.has_failure(FailureKind::ResourceStillPresentAfterDestroy));
}

#[tokio::test]
async fn failed_application_apply_cleans_up_dependencies() {
    let cloud = batch_cloud(FaultPlan::none().fail_apply(application()));
    let result = run(&cloud, fast_config(), "update").await;

    let diagnostic = result
        .first_of(FailureKind::ConfigurationApplyFailure)
        .expect("missing diagnostic");
    assert_eq!(diagnostic.step, Some(0));
    assert_eq!(result.steps_completed, 0);
    assert!(cloud.is_empty(), "group, storage and batch account must be destroyed");
}

#[tokio::test(start_paused = true)]
async fn slow_teardown_reports_every_tracked_address() {
    let cloud = batch_cloud(FaultPlan::none().destroy_delay(Duration::from_secs(600)));
    let config = fast_config().with_cleanup_timeout(Duration::from_secs(60));
    let result = run(&cloud, config, "basic").await;

    assert!(result.has_failure(FailureKind::CleanupTimedOut));
    assert_eq!(result.leaked.len(), 4);
    assert!(result.leaked.contains(&application()));
    assert_eq!(cloud.len(), 4);
}

#[tokio::test]
async fn cancelled_run_touches_nothing() {
    init_tracing();
    let cloud = batch_cloud(FaultPlan::none());
    let config = fast_config();
    let scenario = scenarios(&cloud, &config)
        .by_name("update", SEED)
        .expect("known scenario");
    let token = CancellationToken::new();
    token.cancel();

    let result = ScenarioRunner::new(Arc::new(SimulatedEngine::new("ws", cloud.clone())), config)
        .run(&scenario, &token)
        .await;

    assert!(result.has_failure(FailureKind::Cancelled));
    assert_eq!(result.steps_completed, 0);
    assert!(cloud.is_empty());
}
