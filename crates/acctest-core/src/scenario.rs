//! Scenario model
//!
//! A [`TestScenario`] is an ordered list of [`Step`]s plus a precheck and an
//! optional destroy check. Steps either apply configuration or verify an
//! import of something an earlier step applied.

use crate::assertions::{Check, DestroyCheck};
use crate::error::HarnessError;
use crate::types::ResourceAddress;
use std::fmt;
use std::sync::Arc;

/// Import verification settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStep {
    /// Address to import by its recorded id
    pub address: ResourceAddress,
    /// Compare imported attributes with applied state
    pub verify: bool,
    /// Attribute keys skipped during verification
    pub ignore: Vec<String>,
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Apply the step's configuration
    Apply,
    /// Import-only: no apply, verify import round-trip
    Import(ImportStep),
}

/// One scenario step
#[derive(Debug, Clone)]
pub struct Step {
    /// Configuration text; empty on import steps means "last applied"
    pub config: String,
    /// Checks run after apply, in order
    pub checks: Vec<Arc<dyn Check>>,
    /// Step kind
    pub kind: StepKind,
}

impl Step {
    /// Apply step
    #[inline]
    #[must_use]
    pub fn apply(config: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            checks: Vec::new(),
            kind: StepKind::Apply,
        }
    }

    /// Import-verify step that ignores no attributes
    #[inline]
    #[must_use]
    pub fn import(address: ResourceAddress) -> Self {
        Self {
            config: String::new(),
            checks: Vec::new(),
            kind: StepKind::Import(ImportStep {
                address,
                verify: true,
                ignore: Vec::new(),
            }),
        }
    }

    /// Add a check
    #[inline]
    #[must_use]
    pub fn check(mut self, check: impl Check + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    /// Add a shared check
    #[inline]
    #[must_use]
    pub fn check_arc(mut self, check: Arc<dyn Check>) -> Self {
        self.checks.push(check);
        self
    }

    /// Ignore attributes during import verification; no-op on apply steps
    #[must_use]
    pub fn ignoring(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        if let StepKind::Import(import) = &mut self.kind {
            import.ignore.extend(keys.into_iter().map(Into::into));
        }
        self
    }

    /// Whether this is an import-only step
    #[inline]
    #[must_use]
    pub fn is_import(&self) -> bool {
        matches!(self.kind, StepKind::Import(_))
    }
}

/// Environment required before a scenario may touch the cloud
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreCheck {
    required_env: Vec<String>,
}

impl PreCheck {
    /// Require these variables to be set and non-empty
    #[must_use]
    pub fn env(vars: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required_env: vars.into_iter().map(Into::into).collect(),
        }
    }

    /// Evaluate against the process environment
    ///
    /// # Errors
    /// `HarnessError::PreCheckFailed` listing every missing variable.
    pub fn run(&self) -> Result<(), HarnessError> {
        self.run_with(|key| std::env::var(key).ok())
    }

    /// Evaluate against an arbitrary lookup
    ///
    /// # Errors
    /// `HarnessError::PreCheckFailed` listing every missing variable.
    pub fn run_with<F>(&self, lookup: F) -> Result<(), HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing: Vec<&str> = self
            .required_env
            .iter()
            .map(String::as_str)
            .filter(|key| lookup(key).map_or(true, |v| v.trim().is_empty()))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::PreCheckFailed(format!(
                "{} must be set for acceptance tests",
                missing.join(", ")
            )))
        }
    }
}

/// Ordered steps plus teardown verification
#[derive(Clone)]
pub struct TestScenario {
    /// Scenario name, unique within a suite
    pub name: String,
    /// Precondition evaluated before any step
    pub precheck: PreCheck,
    /// Steps in execution order
    pub steps: Vec<Step>,
    /// Verification run after teardown
    pub check_destroy: Option<Arc<dyn DestroyCheck>>,
}

impl fmt::Debug for TestScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestScenario")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .field("check_destroy", &self.check_destroy.is_some())
            .finish()
    }
}

impl TestScenario {
    /// Create scenario with no steps
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            precheck: PreCheck::default(),
            steps: Vec::new(),
            check_destroy: None,
        }
    }

    /// Append step
    #[inline]
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Set precheck
    #[inline]
    #[must_use]
    pub fn with_precheck(mut self, precheck: PreCheck) -> Self {
        self.precheck = precheck;
        self
    }

    /// Set destroy check
    #[inline]
    #[must_use]
    pub fn with_destroy_check(mut self, check: Arc<dyn DestroyCheck>) -> Self {
        self.check_destroy = Some(check);
        self
    }
}
