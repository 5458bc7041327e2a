//! Batch Application scenarios
//!
//! - `basic`: create, assert existence, verify import round-trip
//! - `update`: create, then set a display name and assert the live value

use crate::template::{display_name, template};
use crate::{identity_keys, LABEL, RESOURCE_TYPE};
use acctest_core::{
    ControlPlaneClient, DestructionAssertion, ExistenceAssertion, ExistsCheck, HarnessConfig,
    PreCheck, RemoteAttributeCheck, RemoteStateReader, StateAttributeCheck, Step, TestScenario,
};
use acctest_template::TestData;
use std::sync::Arc;

/// Scenario names in suite order
pub const SCENARIOS: &[&str] = &["basic", "update"];

/// Builds Batch Application scenarios against one control plane
#[derive(Clone)]
pub struct BatchScenarios {
    client: Arc<dyn ControlPlaneClient>,
    config: HarnessConfig,
    precheck: PreCheck,
}

impl std::fmt::Debug for BatchScenarios {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScenarios")
            .field("config", &self.config)
            .field("precheck", &self.precheck)
            .finish_non_exhaustive()
    }
}

impl BatchScenarios {
    /// Create builder
    #[must_use]
    pub fn new(client: Arc<dyn ControlPlaneClient>, config: HarnessConfig) -> Self {
        Self {
            client,
            config,
            precheck: PreCheck::default(),
        }
    }

    /// Precheck attached to every scenario
    #[must_use]
    pub fn with_precheck(mut self, precheck: PreCheck) -> Self {
        self.precheck = precheck;
        self
    }

    fn reader(&self) -> RemoteStateReader {
        RemoteStateReader::new(RESOURCE_TYPE, Arc::clone(&self.client))
    }

    fn existence(&self) -> Arc<ExistenceAssertion> {
        Arc::new(
            ExistenceAssertion::new(self.reader(), identity_keys())
                .with_retry(self.config.existence_retry),
        )
    }

    fn destruction(&self) -> Arc<DestructionAssertion> {
        Arc::new(DestructionAssertion::new(
            self.reader(),
            identity_keys(),
            self.config.destroy,
        ))
    }

    fn scenario(&self, name: &str) -> TestScenario {
        TestScenario::new(name)
            .with_precheck(self.precheck.clone())
            .with_destroy_check(self.destruction())
    }

    /// Create, assert existence, import
    #[must_use]
    pub fn basic(&self, data: &TestData) -> TestScenario {
        let address = data.address();
        self.scenario("basic")
            .step(
                Step::apply(template(data, ""))
                    .check(ExistsCheck::new(self.existence(), address.clone())),
            )
            .step(Step::import(address))
    }

    /// Create, then set `display_name` and assert it locally and remotely
    #[must_use]
    pub fn update(&self, data: &TestData) -> TestScenario {
        let address = data.address();
        let existence = self.existence();
        let display_name = display_name(data);

        self.scenario("update")
            .step(
                Step::apply(template(data, ""))
                    .check(ExistsCheck::new(Arc::clone(&existence), address.clone())),
            )
            .step(
                Step::apply(template(data, &format!("display_name = \"{display_name}\"")))
                    .check(ExistsCheck::new(Arc::clone(&existence), address.clone()))
                    .check(StateAttributeCheck::new(
                        address.clone(),
                        "display_name",
                        display_name.clone(),
                    ))
                    .check(RemoteAttributeCheck::new(
                        existence,
                        address,
                        "display_name",
                        display_name,
                    )),
            )
    }

    /// Scenario by name with its own randomized names
    #[must_use]
    pub fn by_name(&self, name: &str, seed: u64) -> Option<TestScenario> {
        let data = self.test_data(seed);
        match name {
            "basic" => Some(self.basic(&data)),
            "update" => Some(self.update(&data)),
            _ => None,
        }
    }

    /// Every scenario, each seeded differently so names never collide
    #[must_use]
    pub fn all(&self, seed: u64) -> Vec<TestScenario> {
        SCENARIOS
            .iter()
            .zip(0_u64..)
            .filter_map(|(name, offset)| self.by_name(name, seed.wrapping_add(offset)))
            .collect()
    }

    /// Test data for one scenario
    #[must_use]
    pub fn test_data(&self, seed: u64) -> TestData {
        TestData::from_seed(seed, RESOURCE_TYPE, LABEL, self.config.locations.clone())
    }
}
