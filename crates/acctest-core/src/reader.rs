//! Remote State Reader
//!
//! One control-plane read per call, classified into found / not found /
//! transient. A raw API error is never mistaken for confirmed absence.

use crate::client::ControlPlaneClient;
use crate::error::ApiError;
use crate::types::{AttributeMap, ResourceIdentity};
use std::fmt;
use std::sync::Arc;

/// Outcome of a single remote lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteLookupResult {
    /// Resource exists; live attributes attached
    Found(AttributeMap),
    /// Control plane answered 404
    NotFound,
    /// The read failed for any other reason
    TransientError(ApiError),
}

impl RemoteLookupResult {
    /// Whether the resource was found
    #[inline]
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Whether the control plane confirmed absence
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Whether the read itself failed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientError(_))
    }
}

impl fmt::Display for RemoteLookupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(attrs) => write!(f, "found ({} attributes)", attrs.len()),
            Self::NotFound => write!(f, "not found"),
            Self::TransientError(err) => write!(f, "transient error: {err}"),
        }
    }
}

/// Reads one resource type from the control plane
#[derive(Clone)]
pub struct RemoteStateReader {
    resource_type: String,
    client: Arc<dyn ControlPlaneClient>,
}

impl fmt::Debug for RemoteStateReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStateReader")
            .field("resource_type", &self.resource_type)
            .finish_non_exhaustive()
    }
}

impl RemoteStateReader {
    /// Create a reader over an injected client
    #[inline]
    #[must_use]
    pub fn new(resource_type: impl Into<String>, client: Arc<dyn ControlPlaneClient>) -> Self {
        Self {
            resource_type: resource_type.into(),
            client,
        }
    }

    /// Resource type this reader serves
    #[inline]
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Look up a resource by its triple
    ///
    /// Inputs are not validated here; callers resolve them from state.
    pub async fn lookup(&self, parent: &str, group: &str, name: &str) -> RemoteLookupResult {
        let result = match self.client.get(parent, group, name).await {
            Ok(attributes) => RemoteLookupResult::Found(attributes),
            Err(err) if err.is_not_found() => RemoteLookupResult::NotFound,
            Err(err) => RemoteLookupResult::TransientError(err),
        };

        tracing::debug!(
            resource_type = %self.resource_type,
            name,
            parent,
            group,
            outcome = %result,
            "remote lookup"
        );

        result
    }

    /// Look up a resource by a resolved identity
    #[inline]
    pub async fn lookup_identity(&self, identity: &ResourceIdentity) -> RemoteLookupResult {
        self.lookup(&identity.parent, &identity.group, &identity.name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockControlPlaneClient;
    use mockall::predicate::eq;

    fn reader_with(mock: MockControlPlaneClient) -> RemoteStateReader {
        RemoteStateReader::new("azurerm_batch_application", Arc::new(mock))
    }

    #[tokio::test]
    async fn found_returns_attributes() {
        let mut mock = MockControlPlaneClient::new();
        mock.expect_get()
            .with(eq("acct"), eq("rg"), eq("app"))
            .times(1)
            .returning(|_, _, name| {
                let mut attrs = AttributeMap::new();
                attrs.insert("name".into(), name.to_string());
                Ok(attrs)
            });

        let result = reader_with(mock).lookup("acct", "rg", "app").await;
        match result {
            RemoteLookupResult::Found(attrs) => assert_eq!(attrs["name"], "app"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_404_is_not_found() {
        let mut mock = MockControlPlaneClient::new();
        mock.expect_get()
            .times(1)
            .returning(|_, _, _| Err(ApiError::not_found("ResourceNotFound")));

        let result = reader_with(mock).lookup("acct", "rg", "app").await;
        assert!(result.is_not_found());
    }

    #[tokio::test]
    async fn other_errors_are_transient_not_absence() {
        for err in [
            ApiError::with_status(429, "throttled"),
            ApiError::with_status(401, "unauthorized"),
            ApiError::network("connection reset"),
        ] {
            let mut mock = MockControlPlaneClient::new();
            let returned = err.clone();
            mock.expect_get()
                .times(1)
                .returning(move |_, _, _| Err(returned.clone()));

            let result = reader_with(mock).lookup("acct", "rg", "app").await;
            assert_eq!(result, RemoteLookupResult::TransientError(err));
        }
    }

    #[tokio::test]
    async fn lookup_never_retries() {
        let mut mock = MockControlPlaneClient::new();
        mock.expect_get()
            .times(1)
            .returning(|_, _, _| Err(ApiError::with_status(503, "unavailable")));

        let result = reader_with(mock)
            .lookup_identity(&ResourceIdentity::new("app", "acct", "rg"))
            .await;
        assert!(result.is_transient());
    }
}
