//! Destruction Assertion
//!
//! Walks the pre-destroy snapshot (live state no longer lists destroyed
//! resources) and confirms every instance of the filtered type is gone.
//! Absence needs `absence_confirmations` consecutive not-found reads, so a
//! single stale 404 cannot pass the check.

use crate::config::{DestroyCheckMode, DestroyPolicy, TransientOnDestroy};
use crate::error::{ApiError, HarnessError};
use crate::reader::{RemoteLookupResult, RemoteStateReader};
use crate::types::{IdentityKeys, ResourceIdentity, ResourceInstance, StateSnapshot};

/// Per-instance verdict
#[derive(Debug)]
enum Verdict {
    Absent,
    Present,
    Unreadable(ApiError),
}

/// Fails when any instance of a type survives teardown
#[derive(Debug, Clone)]
pub struct DestructionAssertion {
    reader: RemoteStateReader,
    keys: IdentityKeys,
    policy: DestroyPolicy,
}

impl DestructionAssertion {
    /// Create assertion
    #[inline]
    #[must_use]
    pub fn new(reader: RemoteStateReader, keys: IdentityKeys, policy: DestroyPolicy) -> Self {
        Self {
            reader,
            keys,
            policy,
        }
    }

    /// Resource type served by the underlying reader
    #[inline]
    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.reader.resource_type()
    }

    /// Policy in force
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &DestroyPolicy {
        &self.policy
    }

    /// Assert every `resource_type` instance in `snapshot` is gone
    ///
    /// # Errors
    /// One error per failing instance, collapsed with
    /// [`HarnessError::from_failures`]; `StopAtFirst` mode returns after the
    /// first.
    pub async fn assert_all_destroyed(
        &self,
        snapshot: &StateSnapshot,
        resource_type: &str,
    ) -> Result<(), HarnessError> {
        let mut failures = Vec::new();

        for instance in snapshot.instances_of(resource_type) {
            if let Err(err) = self.check_instance(instance).await {
                tracing::error!(address = %instance.address, error = %err, "destroy check failed");
                failures.push(err);
                if self.policy.mode == DestroyCheckMode::StopAtFirst {
                    break;
                }
            }
        }

        match HarnessError::from_failures(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn check_instance(&self, instance: &ResourceInstance) -> Result<(), HarnessError> {
        let identity = self.keys.resolve(&instance.attributes).map_err(|missing| {
            HarnessError::AddressUnresolved {
                address: instance.address.clone(),
                reason: format!("attribute {missing:?} missing or empty in pre-destroy state"),
            }
        })?;

        match self.confirm_absent(&identity).await {
            Verdict::Absent => Ok(()),
            Verdict::Present => Err(HarnessError::ResourceStillPresentAfterDestroy {
                address: instance.address.clone(),
                identity,
            }),
            Verdict::Unreadable(cause) => Err(HarnessError::TransientApiFailure {
                address: instance.address.clone(),
                identity,
                cause,
            }),
        }
    }

    async fn confirm_absent(&self, identity: &ResourceIdentity) -> Verdict {
        let confirmations = self.policy.absence_confirmations.max(1);

        for read in 0..confirmations {
            if read > 0 {
                tokio::time::sleep(self.policy.confirmation_delay()).await;
            }

            match self.reader.lookup_identity(identity).await {
                RemoteLookupResult::NotFound => {}
                RemoteLookupResult::Found(_) => return Verdict::Present,
                RemoteLookupResult::TransientError(cause) => match self.policy.on_transient {
                    TransientOnDestroy::TreatAsAbsent => {
                        tracing::warn!(
                            %identity,
                            error = %cause,
                            "lookup failed during destroy check; treating as absent"
                        );
                    }
                    TransientOnDestroy::Fail => return Verdict::Unreadable(cause),
                },
            }
        }

        Verdict::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockControlPlaneClient;
    use crate::error::FailureKind;
    use crate::types::{AttributeMap, ResourceAddress};
    use mockall::predicate::eq;
    use std::sync::Arc;

    const TYPE: &str = "azurerm_batch_application";

    fn instance(label: &str, name: &str) -> ResourceInstance {
        let mut attrs = AttributeMap::new();
        attrs.insert("name".into(), name.into());
        attrs.insert("account_name".into(), "acct".into());
        attrs.insert("resource_group_name".into(), "rg".into());
        ResourceInstance::new(ResourceAddress::new(TYPE, label), format!("/id/{name}"), attrs)
    }

    fn snapshot() -> StateSnapshot {
        [
            instance("one", "app-1"),
            ResourceInstance::new(
                ResourceAddress::new("azurerm_resource_group", "test"),
                "/rg",
                AttributeMap::new(),
            ),
            instance("two", "app-2"),
        ]
        .into_iter()
        .collect()
    }

    fn policy(mode: DestroyCheckMode, on_transient: TransientOnDestroy) -> DestroyPolicy {
        DestroyPolicy {
            on_transient,
            mode,
            absence_confirmations: 1,
            confirmation_delay_ms: 0,
        }
    }

    fn assertion(mock: MockControlPlaneClient, policy: DestroyPolicy) -> DestructionAssertion {
        DestructionAssertion::new(
            RemoteStateReader::new(TYPE, Arc::new(mock)),
            IdentityKeys::named("name")
                .with_parent("account_name")
                .with_group("resource_group_name"),
            policy,
        )
    }

    #[tokio::test]
    async fn all_absent_passes_and_skips_other_types() {
        let mut mock = MockControlPlaneClient::new();
        mock.expect_get()
            .times(2)
            .returning(|_, _, _| Err(ApiError::not_found("gone")));

        let check = assertion(
            mock,
            policy(DestroyCheckMode::CheckAll, TransientOnDestroy::Fail),
        );
        assert!(check.assert_all_destroyed(&snapshot(), TYPE).await.is_ok());
    }

    #[tokio::test]
    async fn check_all_reports_every_survivor() {
        let mut mock = MockControlPlaneClient::new();
        mock.expect_get()
            .times(2)
            .returning(|_, _, _| Ok(AttributeMap::new()));

        let check = assertion(
            mock,
            policy(DestroyCheckMode::CheckAll, TransientOnDestroy::Fail),
        );
        let err = check
            .assert_all_destroyed(&snapshot(), TYPE)
            .await
            .unwrap_err();

        let failures = err.flatten();
        assert_eq!(failures.len(), 2);
        assert!(failures
            .iter()
            .all(|f| f.kind() == FailureKind::ResourceStillPresentAfterDestroy));
    }

    #[tokio::test]
    async fn stop_at_first_returns_single_failure() {
        let mut mock = MockControlPlaneClient::new();
        mock.expect_get()
            .with(eq("acct"), eq("rg"), eq("app-1"))
            .times(1)
            .returning(|_, _, _| Ok(AttributeMap::new()));

        let check = assertion(
            mock,
            policy(DestroyCheckMode::StopAtFirst, TransientOnDestroy::Fail),
        );
        let err = check
            .assert_all_destroyed(&snapshot(), TYPE)
            .await
            .unwrap_err();
        assert_eq!(err.flatten().len(), 1);
    }

    #[tokio::test]
    async fn transient_treated_as_absent_passes() {
        let mut mock = MockControlPlaneClient::new();
        mock.expect_get()
            .times(2)
            .returning(|_, _, _| Err(ApiError::with_status(429, "throttled")));

        let check = assertion(
            mock,
            policy(DestroyCheckMode::CheckAll, TransientOnDestroy::TreatAsAbsent),
        );
        assert!(check.assert_all_destroyed(&snapshot(), TYPE).await.is_ok());
    }

    #[tokio::test]
    async fn transient_fail_policy_propagates() {
        let mut mock = MockControlPlaneClient::new();
        mock.expect_get()
            .times(2)
            .returning(|_, _, _| Err(ApiError::with_status(429, "throttled")));

        let check = assertion(
            mock,
            policy(DestroyCheckMode::CheckAll, TransientOnDestroy::Fail),
        );
        let err = check
            .assert_all_destroyed(&snapshot(), TYPE)
            .await
            .unwrap_err();
        assert!(err
            .flatten()
            .iter()
            .all(|f| f.kind() == FailureKind::TransientApiFailure));
    }

    #[tokio::test]
    async fn stale_not_found_is_caught_by_confirmation_read() {
        let mut mock = MockControlPlaneClient::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(ApiError::not_found("stale")));
        mock.expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(AttributeMap::new()));

        let mut policy = policy(DestroyCheckMode::StopAtFirst, TransientOnDestroy::Fail);
        policy.absence_confirmations = 2;

        let check = assertion(mock, policy);
        let only_first: StateSnapshot = [instance("one", "app-1")].into_iter().collect();
        let err = check
            .assert_all_destroyed(&only_first, TYPE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::ResourceStillPresentAfterDestroy);
    }
}
