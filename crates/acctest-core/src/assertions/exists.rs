//! Existence Assertion
//!
//! Resolves an address to its identity from engine state and asks the reader
//! whether the resource exists. Resolution failures are never retried: they
//! mean the apply itself did not produce the resource.

use crate::error::HarnessError;
use crate::reader::{RemoteLookupResult, RemoteStateReader};
use crate::retry::RetryPolicy;
use crate::types::{AttributeMap, IdentityKeys, ResourceAddress, ResourceIdentity, StateSnapshot};

/// Fails when a resource recorded in state is absent remotely
#[derive(Debug, Clone)]
pub struct ExistenceAssertion {
    reader: RemoteStateReader,
    keys: IdentityKeys,
    retry: RetryPolicy,
}

impl ExistenceAssertion {
    /// Create assertion with a single-evaluation policy
    #[inline]
    #[must_use]
    pub fn new(reader: RemoteStateReader, keys: IdentityKeys) -> Self {
        Self {
            reader,
            keys,
            retry: RetryPolicy::none(),
        }
    }

    /// Retry not-found and transient results for eventual consistency
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve an address to its identity triple
    ///
    /// # Errors
    /// `HarnessError::AddressUnresolved` when the address is absent from state
    /// or an identity attribute is missing.
    pub fn resolve(
        &self,
        state: &StateSnapshot,
        address: &ResourceAddress,
    ) -> Result<ResourceIdentity, HarnessError> {
        let instance = state
            .get(address)
            .ok_or_else(|| HarnessError::AddressUnresolved {
                address: address.clone(),
                reason: "not found in state".to_string(),
            })?;

        self.keys
            .resolve(&instance.attributes)
            .map_err(|missing| HarnessError::AddressUnresolved {
                address: address.clone(),
                reason: format!("attribute {missing:?} missing or empty"),
            })
    }

    /// Assert the resource at `address` exists; returns its live attributes
    ///
    /// # Errors
    /// - `AddressUnresolved` if the address cannot be resolved from state
    /// - `ResourceNotFoundUnexpectedly` if the control plane reports 404
    /// - `TransientApiFailure` if the read itself failed
    pub async fn assert_exists(
        &self,
        state: &StateSnapshot,
        address: &ResourceAddress,
    ) -> Result<AttributeMap, HarnessError> {
        let identity = self.resolve(state, address)?;

        let (result, attempts) = self
            .retry
            .run(
                || self.reader.lookup_identity(&identity),
                |result| !result.is_found(),
            )
            .await;

        match result {
            RemoteLookupResult::Found(attributes) => {
                tracing::debug!(%address, attempts, "resource exists");
                Ok(attributes)
            }
            RemoteLookupResult::NotFound => Err(HarnessError::ResourceNotFoundUnexpectedly {
                address: address.clone(),
                identity,
            }),
            RemoteLookupResult::TransientError(cause) => Err(HarnessError::TransientApiFailure {
                address: address.clone(),
                identity,
                cause,
            }),
        }
    }
}
