//! Suite runner against a shared simulated cloud

use acctest_core::prelude::*;
use acctest_core::{FailureKind, RetryPolicy};
use acctest_sim::{FaultPlan, SimulatedCloud, SimulatedEngineFactory};
use acctest_test_utils::{fast_config, init_tracing, item_config, item_keys, sim_cloud, ITEM_TYPE};
use async_trait::async_trait;
use std::sync::Arc;

fn item_scenario(cloud: &SimulatedCloud, config: &HarnessConfig, name: &str) -> TestScenario {
    let reader = || RemoteStateReader::new(ITEM_TYPE, Arc::new(cloud.client(ITEM_TYPE)));
    let existence = Arc::new(
        ExistenceAssertion::new(reader(), item_keys()).with_retry(RetryPolicy::none()),
    );

    TestScenario::new(name)
        .step(
            Step::apply(item_config(&format!("rg-{name}"), &format!("item-{name}"), ""))
                .check(ExistsCheck::new(
                    existence,
                    ResourceAddress::new(ITEM_TYPE, "test"),
                )),
        )
        .with_destroy_check(Arc::new(DestructionAssertion::new(
            reader(),
            item_keys(),
            config.destroy,
        )))
}

fn suite(cloud: &SimulatedCloud, config: HarnessConfig) -> (SuiteRunner, Arc<SimulatedEngineFactory>) {
    let factory = Arc::new(SimulatedEngineFactory::new(cloud.clone()));
    let runner = SuiteRunner::new(config, factory.clone());
    (runner, factory)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn results_follow_input_order() {
    init_tracing();
    let cloud = sim_cloud(FaultPlan::none());
    let config = fast_config().with_max_parallel(2);
    let names = ["c", "a", "d", "b", "e"];
    let scenarios = names
        .iter()
        .map(|name| item_scenario(&cloud, &config, name))
        .collect();

    let (runner, factory) = suite(&cloud, config);
    let report = runner.run(scenarios, CancellationToken::new()).await;

    let got: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(got, names);
    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.passed_count(), 5);
    assert!(!report.cancelled);
    assert_eq!(factory.workspace_count(), 5);
    assert!(cloud.is_empty());
}

#[tokio::test]
async fn one_failure_does_not_affect_siblings() {
    init_tracing();
    let cloud = sim_cloud(FaultPlan::none());
    let config = fast_config();
    let broken = TestScenario::new("broken").step(Step::apply("resource \"sim_item\" {"));
    let scenarios = vec![
        item_scenario(&cloud, &config, "ok-1"),
        broken,
        item_scenario(&cloud, &config, "ok-2"),
    ];

    let (runner, _) = suite(&cloud, config);
    let report = runner.run(scenarios, CancellationToken::new()).await;

    assert!(!report.passed());
    assert_eq!(report.passed_count(), 2);
    let broken = report.result("broken").expect("missing result");
    assert!(broken.has_failure(FailureKind::ConfigurationApplyFailure));
    assert!(report.result("ok-2").is_some_and(ScenarioResult::passed));
}

#[tokio::test]
async fn cancelled_suite_reports_every_scenario() {
    init_tracing();
    let cloud = sim_cloud(FaultPlan::none());
    let config = fast_config();
    let scenarios = ["a", "b"]
        .iter()
        .map(|name| item_scenario(&cloud, &config, name))
        .collect();
    let token = CancellationToken::new();
    token.cancel();

    let (runner, factory) = suite(&cloud, config);
    let report = runner.run(scenarios, token).await;

    assert!(report.cancelled);
    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        assert!(result.has_failure(FailureKind::Cancelled), "{}", result.name);
    }
    assert_eq!(factory.workspace_count(), 0);
    assert_eq!(cloud.read_count(), 0);
}

#[derive(Debug)]
struct Explodes;

#[async_trait]
impl Check for Explodes {
    async fn check(&self, _: &StateSnapshot) -> Result<(), HarnessError> {
        panic!("check exploded")
    }

    fn describe(&self) -> String {
        "explodes".to_string()
    }
}

#[tokio::test]
async fn panicking_scenario_still_tears_down() {
    init_tracing();
    let cloud = sim_cloud(FaultPlan::none());
    let config = fast_config();
    let exploding = TestScenario::new("explodes")
        .step(Step::apply(item_config("rg-x", "item-x", "")).check(Explodes));
    let scenarios = vec![exploding, item_scenario(&cloud, &config, "fine")];

    let (runner, _) = suite(&cloud, config);
    let report = runner.run(scenarios, CancellationToken::new()).await;

    let exploded = report.result("explodes").expect("missing result");
    let diagnostic = exploded
        .first_of(FailureKind::HarnessPanic)
        .expect("missing diagnostic");
    assert!(diagnostic.message.contains("check exploded"));
    assert_eq!(diagnostic.step, Some(0));
    assert_eq!(exploded.times_entered(acctest_core::RunnerState::Destroying), 1);
    assert!(exploded.leaked.is_empty());
    assert!(report.result("fine").is_some_and(ScenarioResult::passed));
    assert!(cloud.is_empty(), "panicking scenario must still destroy what it applied");
}

#[tokio::test]
async fn report_serializes_and_lists_leaks() {
    init_tracing();
    let cloud = sim_cloud(FaultPlan::none().leak_deletes(ITEM_TYPE));
    let config = fast_config();
    let scenarios = vec![item_scenario(&cloud, &config, "leaky")];

    let (runner, _) = suite(&cloud, config);
    let report = runner.run(scenarios, CancellationToken::new()).await;

    let json = report.to_json().expect("serializable");
    assert!(json.contains("ResourceStillPresentAfterDestroy"));
    let text = report.generate_text();
    assert!(text.contains("leaky"));
}
