//! Acctest Batch - Batch Application lifecycle scenarios
//!
//! The concrete resource type the harness verifies: a Batch Application,
//! identified by its name, its Batch account and its resource group.
//!
//! # Example
//!
//! ```rust,ignore
//! use acctest_batch::{schema, BatchScenarios};
//! use acctest_core::{CancellationToken, HarnessConfig, SuiteRunner};
//! use acctest_sim::{SimulatedCloud, SimulatedEngineFactory};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let cloud = SimulatedCloud::new();
//! schema::register(&cloud);
//! let scenarios = BatchScenarios::new(
//!     Arc::new(cloud.client(acctest_batch::RESOURCE_TYPE)),
//!     HarnessConfig::new(),
//! );
//! let suite = SuiteRunner::new(HarnessConfig::new(), Arc::new(SimulatedEngineFactory::new(cloud)));
//! let report = suite.run(scenarios.all(7), CancellationToken::new()).await;
//! println!("{}", report.generate_text());
//! # }
//! ```

#![warn(unreachable_pub)]

use acctest_core::IdentityKeys;

pub mod scenarios;
pub mod schema;
pub mod template;

pub use scenarios::{BatchScenarios, SCENARIOS};
pub use template::{display_name, template};

/// Resource type under test
pub const RESOURCE_TYPE: &str = "azurerm_batch_application";

/// Label of the resource under test in every scenario
pub const LABEL: &str = "test";

/// State attributes that identify a Batch Application
#[must_use]
pub fn identity_keys() -> IdentityKeys {
    IdentityKeys::named("name")
        .with_parent("account_name")
        .with_group("resource_group_name")
}
