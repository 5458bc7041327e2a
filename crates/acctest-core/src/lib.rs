//! Acctest Core - resource-lifecycle verification harness
//!
//! Verifies that infrastructure resources provisioned by a declarative engine
//! really exist after apply and really disappear after destroy:
//! - Reads live resources through a [`ControlPlaneClient`], classifying 404 as
//!   absence and everything else as transient
//! - Asserts existence after each step and absence after teardown
//! - Drives multi-step scenarios with guaranteed, bounded teardown
//! - Verifies that imported resources round-trip to an empty plan
//! - Runs suites concurrently with per-scenario engine workspaces
//!
//! # Example
//!
//! ```rust,ignore
//! use acctest_core::prelude::*;
//!
//! # async fn example(engine: std::sync::Arc<dyn ProvisioningEngine>) {
//! let scenario = TestScenario::new("basic").step(Step::apply("resource \"t\" \"a\" {}"));
//! let runner = ScenarioRunner::new(engine, HarnessConfig::new());
//! let result = runner.run(&scenario, &CancellationToken::new()).await;
//! assert!(result.passed());
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod assertions;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod reader;
pub mod result;
pub mod retry;
pub mod runner;
pub mod scenario;
pub mod suite;
pub mod types;

// Re-exports for convenience
pub use assertions::{
    Check, DestroyCheck, DestructionAssertion, ExistenceAssertion, ExistsCheck,
    RemoteAttributeCheck, StateAttributeCheck,
};
pub use client::ControlPlaneClient;
pub use config::{
    ConfigError, DestroyCheckMode, DestroyPolicy, HarnessConfig, LocationConfig,
    TransientOnDestroy,
};
pub use engine::{ChangeAction, EngineFactory, PlanSummary, PlannedChange, ProvisioningEngine};
pub use error::{ApiError, ApplyError, EngineError, FailureKind, HarnessError};
pub use reader::{RemoteLookupResult, RemoteStateReader};
pub use result::{Phase, ScenarioResult, StepDiagnostic, SuiteReport};
pub use retry::RetryPolicy;
pub use runner::{validate_transition, RunnerState, ScenarioRunner};
pub use scenario::{ImportStep, PreCheck, Step, StepKind, TestScenario};
pub use suite::SuiteRunner;
pub use types::{
    AttributeMap, IdentityKeys, ResourceAddress, ResourceIdentity, ResourceInstance, RunId,
    StateSnapshot,
};
pub use tokio_util::sync::CancellationToken;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for writing scenarios
    pub use crate::{
        CancellationToken, Check, ControlPlaneClient, DestructionAssertion, EngineFactory,
        ExistenceAssertion, ExistsCheck, HarnessConfig, HarnessError, IdentityKeys,
        ProvisioningEngine, RemoteStateReader, ResourceAddress, ScenarioResult, ScenarioRunner,
        StateSnapshot, Step, SuiteReport, SuiteRunner, TestScenario,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
