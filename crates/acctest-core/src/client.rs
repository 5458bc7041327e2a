//! Control-plane client seam
//!
//! The harness never reaches for an ambient, process-wide client. Callers
//! construct a client for the resource type under test and inject it into a
//! [`RemoteStateReader`](crate::reader::RemoteStateReader).

use crate::error::ApiError;
use crate::types::AttributeMap;
use async_trait::async_trait;

/// Read access to one resource type on the control plane
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Fetch a resource by its identity triple
    ///
    /// # Errors
    /// Returns `ApiError` with status 404 when the resource does not exist;
    /// any other error means the read itself failed.
    async fn get(&self, parent: &str, group: &str, name: &str) -> Result<AttributeMap, ApiError>;
}
