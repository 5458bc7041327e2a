//! Testing utilities for the acctest workspace
//!
//! Shared fixtures for integration tests: a fast harness configuration, a
//! simulated cloud with two generic resource types, and a scripted API client.

#![allow(missing_docs)]

use acctest_core::{
    ApiError, AttributeMap, ControlPlaneClient, DestroyPolicy, HarnessConfig, IdentityKeys,
    RetryPolicy,
};
use acctest_sim::{FaultPlan, ResourceSchema, SimulatedCloud};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

pub const GROUP_TYPE: &str = "sim_group";
pub const ITEM_TYPE: &str = "sim_item";

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Defaults minus every delay
pub fn fast_config() -> HarnessConfig {
    HarnessConfig::new()
        .with_max_parallel(4)
        .with_cleanup_timeout(Duration::from_secs(30))
        .with_existence_retry(RetryPolicy::none())
        .with_destroy_policy(DestroyPolicy {
            confirmation_delay_ms: 0,
            ..DestroyPolicy::default()
        })
}

pub fn item_keys() -> IdentityKeys {
    IdentityKeys::named("name").with_group("group")
}

/// Cloud with `sim_group` and `sim_item` registered
pub fn sim_cloud(faults: FaultPlan) -> SimulatedCloud {
    let cloud = SimulatedCloud::with_faults(faults);
    cloud.register(ResourceSchema::new(
        GROUP_TYPE,
        "/groups/{name}",
        IdentityKeys::named("name"),
    ));
    cloud.register(
        ResourceSchema::new(ITEM_TYPE, "/groups/{group}/items/{name}", item_keys())
            .with_default("tier", "basic"),
    );
    cloud
}

/// A group and one item inside it; `extra` lands in the item block
pub fn item_config(group: &str, item: &str, extra: &str) -> String {
    format!(
        "resource \"{GROUP_TYPE}\" \"test\" {{\n  name = \"{group}\"\n}}\n\n\
         resource \"{ITEM_TYPE}\" \"test\" {{\n  name  = \"{item}\"\n  group = \"${{{GROUP_TYPE}.test.name}}\"\n  {extra}\n}}\n"
    )
}

pub fn attrs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> AttributeMap {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Client replaying scripted responses; the last one repeats forever
#[derive(Debug)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<AttributeMap, ApiError>>>,
    calls: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedClient {
    pub fn new(responses: impl IntoIterator<Item = Result<AttributeMap, ApiError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(parent, group, name)` of every call so far
    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ControlPlaneClient for ScriptedClient {
    async fn get(&self, parent: &str, group: &str, name: &str) -> Result<AttributeMap, ApiError> {
        self.calls
            .lock()
            .push((parent.to_string(), group.to_string(), name.to_string()));

        let mut responses = self.responses.lock();
        match responses.len() {
            0 => Err(ApiError::network("script exhausted")),
            1 => responses[0].clone(),
            _ => responses
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::network("script exhausted"))),
        }
    }
}
