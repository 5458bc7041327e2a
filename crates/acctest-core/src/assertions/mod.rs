//! Post-apply and post-destroy assertions
//!
//! - [`ExistenceAssertion`] / [`DestructionAssertion`] wrap a reader
//! - [`Check`] is what a step runs after apply; checks run in order and the
//!   first failure halts the step
//! - [`DestroyCheck`] is what a scenario runs after teardown

mod destroyed;
mod exists;

pub use destroyed::DestructionAssertion;
pub use exists::ExistenceAssertion;

use crate::error::HarnessError;
use crate::types::{ResourceAddress, StateSnapshot};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Assertion evaluated after a step's apply
#[async_trait]
pub trait Check: Send + Sync + Debug {
    /// Evaluate against the state the apply produced
    async fn check(&self, state: &StateSnapshot) -> Result<(), HarnessError>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Assertion evaluated after teardown against the pre-destroy snapshot
#[async_trait]
pub trait DestroyCheck: Send + Sync + Debug {
    /// Evaluate against the snapshot taken before destroy
    async fn check_destroyed(&self, snapshot: &StateSnapshot) -> Result<(), HarnessError>;
}

#[async_trait]
impl DestroyCheck for DestructionAssertion {
    async fn check_destroyed(&self, snapshot: &StateSnapshot) -> Result<(), HarnessError> {
        self.assert_all_destroyed(snapshot, self.resource_type())
            .await
    }
}

/// Resource at `address` must exist remotely
#[derive(Debug, Clone)]
pub struct ExistsCheck {
    assertion: Arc<ExistenceAssertion>,
    address: ResourceAddress,
}

impl ExistsCheck {
    /// Create check
    #[inline]
    #[must_use]
    pub fn new(assertion: Arc<ExistenceAssertion>, address: ResourceAddress) -> Self {
        Self { assertion, address }
    }
}

#[async_trait]
impl Check for ExistsCheck {
    async fn check(&self, state: &StateSnapshot) -> Result<(), HarnessError> {
        self.assertion
            .assert_exists(state, &self.address)
            .await
            .map(|_| ())
    }

    fn describe(&self) -> String {
        format!("{} exists", self.address)
    }
}

/// Recorded state attribute must equal a value
#[derive(Debug, Clone)]
pub struct StateAttributeCheck {
    address: ResourceAddress,
    key: String,
    expected: String,
}

impl StateAttributeCheck {
    /// Create check
    #[inline]
    #[must_use]
    pub fn new(
        address: ResourceAddress,
        key: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            address,
            key: key.into(),
            expected: expected.into(),
        }
    }
}

#[async_trait]
impl Check for StateAttributeCheck {
    async fn check(&self, state: &StateSnapshot) -> Result<(), HarnessError> {
        let instance = state
            .get(&self.address)
            .ok_or_else(|| HarnessError::AddressUnresolved {
                address: self.address.clone(),
                reason: "not found in state".to_string(),
            })?;

        let actual = instance.attribute(&self.key);
        if actual == Some(self.expected.as_str()) {
            Ok(())
        } else {
            Err(HarnessError::AttributeMismatch {
                address: self.address.clone(),
                key: self.key.clone(),
                expected: self.expected.clone(),
                actual: actual.map(ToString::to_string),
            })
        }
    }

    fn describe(&self) -> String {
        format!("{}.{} == {:?}", self.address, self.key, self.expected)
    }
}

/// Live attribute returned by the reader must equal a value
#[derive(Debug, Clone)]
pub struct RemoteAttributeCheck {
    assertion: Arc<ExistenceAssertion>,
    address: ResourceAddress,
    key: String,
    expected: String,
}

impl RemoteAttributeCheck {
    /// Create check
    #[inline]
    #[must_use]
    pub fn new(
        assertion: Arc<ExistenceAssertion>,
        address: ResourceAddress,
        key: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            assertion,
            address,
            key: key.into(),
            expected: expected.into(),
        }
    }
}

#[async_trait]
impl Check for RemoteAttributeCheck {
    async fn check(&self, state: &StateSnapshot) -> Result<(), HarnessError> {
        let live = self.assertion.assert_exists(state, &self.address).await?;
        let actual = live.get(&self.key);
        if actual.map(String::as_str) == Some(self.expected.as_str()) {
            Ok(())
        } else {
            Err(HarnessError::AttributeMismatch {
                address: self.address.clone(),
                key: self.key.clone(),
                expected: self.expected.clone(),
                actual: actual.cloned(),
            })
        }
    }

    fn describe(&self) -> String {
        format!("remote {}.{} == {:?}", self.address, self.key, self.expected)
    }
}
