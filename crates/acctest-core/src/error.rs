//! Error types for the harness
//!
//! Provides error handling for:
//! - Control-plane reads (`ApiError`)
//! - Provisioning engine calls (`EngineError`, `ApplyError`)
//! - Scenario assertions and lifecycle failures (`HarnessError`)
//! - Failure classification for reports (`FailureKind`)

use crate::runner::RunnerState;
use crate::types::{ResourceAddress, ResourceIdentity, StateSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP status the control plane uses for an absent resource
pub const STATUS_NOT_FOUND: u16 = 404;

/// Error returned by a control-plane client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render_api_error(.status, .message))]
pub struct ApiError {
    /// HTTP status, if a response was received at all
    pub status: Option<u16>,
    /// Raw error message
    pub message: String,
}

fn render_api_error(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("status {code}: {message}"),
        None => format!("no response: {message}"),
    }
}

impl ApiError {
    /// Create an error with a response status
    #[inline]
    #[must_use]
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a "resource not found" error
    #[inline]
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(STATUS_NOT_FOUND, message)
    }

    /// Create an error for a request that never got a response
    #[inline]
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Whether the response was a 404
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == Some(STATUS_NOT_FOUND)
    }
}

/// Provisioning engine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Configuration text was rejected
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A resource operation failed on the backend
    #[error("{address}: {message}")]
    ResourceOperation {
        /// Resource the operation targeted
        address: ResourceAddress,
        /// Backend message
        message: String,
    },

    /// Import could not locate the remote object
    #[error("cannot import {address} from id {id:?}: {reason}")]
    ImportFailed {
        /// Import target
        address: ResourceAddress,
        /// Remote id used for the import
        id: String,
        /// Why the import failed
        reason: String,
    },

    /// Engine-internal failure
    #[error("engine failure: {0}")]
    Backend(String),
}

/// A failed apply, carrying whatever the engine managed to create
#[derive(Debug, Clone, thiserror::Error)]
#[error("apply failed: {cause}")]
pub struct ApplyError {
    /// Resources the engine recorded before failing; teardown destroys these
    pub partial_state: StateSnapshot,
    /// Underlying engine error
    #[source]
    pub cause: EngineError,
}

impl ApplyError {
    /// Create apply error
    #[inline]
    #[must_use]
    pub fn new(partial_state: StateSnapshot, cause: EngineError) -> Self {
        Self {
            partial_state,
            cause,
        }
    }
}

/// Failure classification used in diagnostics and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The engine rejected or failed to apply configuration
    ConfigurationApplyFailure,
    /// An address could not be resolved to an identity from state
    AddressUnresolved,
    /// A resource expected to exist was not found
    ResourceNotFoundUnexpectedly,
    /// A resource survived teardown
    ResourceStillPresentAfterDestroy,
    /// The control plane returned a non-404 error
    TransientApiFailure,
    /// Imported state differs from applied state or re-plans with changes
    ImportRoundTripMismatch,
    /// A state or remote attribute had an unexpected value
    AttributeMismatch,
    /// Re-planning an applied configuration produced changes
    NonEmptyPlanAfterApply,
    /// The engine failed to compute a plan
    PlanFailure,
    /// The engine failed to destroy
    DestroyFailure,
    /// Teardown did not finish within the cleanup bound
    CleanupTimedOut,
    /// Required environment was missing
    PreCheckFailed,
    /// The run was cancelled
    Cancelled,
    /// The scenario task panicked
    HarnessPanic,
}

impl FailureKind {
    /// Harness-level failures are reported apart from assertion failures
    #[inline]
    #[must_use]
    pub fn is_harness_level(&self) -> bool {
        matches!(
            self,
            Self::CleanupTimedOut | Self::Cancelled | Self::HarnessPanic
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Main harness error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum HarnessError {
    /// Apply failed
    #[error("applying configuration failed: {0}")]
    ConfigurationApplyFailure(#[source] EngineError),

    /// Address missing from state, or identity attributes missing
    #[error("{address} not resolvable from state: {reason}")]
    AddressUnresolved {
        /// Address that failed to resolve
        address: ResourceAddress,
        /// What was missing
        reason: String,
    },

    /// Existence check found nothing
    #[error("Bad: {address} {identity} does not exist")]
    ResourceNotFoundUnexpectedly {
        /// Address being checked
        address: ResourceAddress,
        /// Identity used for the lookup
        identity: ResourceIdentity,
    },

    /// Destroy check found a surviving resource
    #[error("Bad: {address} {identity} still exists after destroy")]
    ResourceStillPresentAfterDestroy {
        /// Address of the surviving resource
        address: ResourceAddress,
        /// Identity used for the lookup
        identity: ResourceIdentity,
    },

    /// Control plane returned an error other than not-found
    #[error("Bad: Get on {address} {identity}: {cause}")]
    TransientApiFailure {
        /// Address being checked
        address: ResourceAddress,
        /// Identity used for the lookup
        identity: ResourceIdentity,
        /// Raw client error
        cause: ApiError,
    },

    /// Import verification failed
    #[error("import of {address} did not round-trip: {detail}")]
    ImportRoundTripMismatch {
        /// Imported address
        address: ResourceAddress,
        /// Human-readable difference
        detail: String,
    },

    /// Attribute check failed
    #[error("{address}: attribute {key:?} expected {expected:?}, got {}", render_actual(.actual))]
    AttributeMismatch {
        /// Checked address
        address: ResourceAddress,
        /// Attribute key
        key: String,
        /// Expected value
        expected: String,
        /// Actual value, if present
        actual: Option<String>,
    },

    /// Idempotence check failed
    #[error("plan after apply was not empty: {}", render_changes(.changes))]
    NonEmptyPlanAfterApply {
        /// Rendered pending changes
        changes: Vec<String>,
    },

    /// Plan computation failed
    #[error("planning failed: {0}")]
    PlanFailure(#[source] EngineError),

    /// Destroy failed
    #[error("destroy failed: {0}")]
    DestroyFailure(#[source] EngineError),

    /// Destroy exceeded the cleanup bound
    #[error("cleanup did not finish within {timeout_secs}s; leaked: {}", render_addresses(.leaked))]
    CleanupTimedOut {
        /// Cleanup bound in seconds
        timeout_secs: u64,
        /// Addresses that may still exist
        leaked: Vec<ResourceAddress>,
    },

    /// Precondition not met
    #[error("precheck failed: {0}")]
    PreCheckFailed(String),

    /// Run cancelled
    #[error("scenario cancelled")]
    Cancelled,

    /// Scenario task panicked
    #[error("scenario panicked: {0}")]
    HarnessPanic(String),

    /// Runner attempted a transition the state machine forbids
    #[error("illegal runner transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: RunnerState,
        /// Requested state
        to: RunnerState,
    },

    /// Several independent failures (destroy check in `CheckAll` mode)
    #[error("{}", render_all(.0))]
    Aggregate(Vec<HarnessError>),
}

fn render_actual(actual: &Option<String>) -> String {
    actual
        .as_deref()
        .map_or_else(|| "<unset>".to_string(), |v| format!("{v:?}"))
}

fn render_changes(changes: &[String]) -> String {
    changes.join(", ")
}

fn render_addresses(addresses: &[ResourceAddress]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_all(errors: &[HarnessError]) -> String {
    let rendered = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} failures: {rendered}", errors.len())
}

impl HarnessError {
    /// Classification for reports
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ConfigurationApplyFailure(_) => FailureKind::ConfigurationApplyFailure,
            Self::AddressUnresolved { .. } => FailureKind::AddressUnresolved,
            Self::ResourceNotFoundUnexpectedly { .. } => FailureKind::ResourceNotFoundUnexpectedly,
            Self::ResourceStillPresentAfterDestroy { .. } => {
                FailureKind::ResourceStillPresentAfterDestroy
            }
            Self::TransientApiFailure { .. } => FailureKind::TransientApiFailure,
            Self::ImportRoundTripMismatch { .. } => FailureKind::ImportRoundTripMismatch,
            Self::AttributeMismatch { .. } => FailureKind::AttributeMismatch,
            Self::NonEmptyPlanAfterApply { .. } => FailureKind::NonEmptyPlanAfterApply,
            Self::PlanFailure(_) => FailureKind::PlanFailure,
            Self::DestroyFailure(_) => FailureKind::DestroyFailure,
            Self::CleanupTimedOut { .. } => FailureKind::CleanupTimedOut,
            Self::PreCheckFailed(_) => FailureKind::PreCheckFailed,
            Self::Cancelled => FailureKind::Cancelled,
            Self::HarnessPanic(_) | Self::IllegalTransition { .. } => FailureKind::HarnessPanic,
            Self::Aggregate(errors) => errors
                .first()
                .map_or(FailureKind::ResourceStillPresentAfterDestroy, Self::kind),
        }
    }

    /// Resource address involved, if any
    #[must_use]
    pub fn address(&self) -> Option<&ResourceAddress> {
        match self {
            Self::AddressUnresolved { address, .. }
            | Self::ResourceNotFoundUnexpectedly { address, .. }
            | Self::ResourceStillPresentAfterDestroy { address, .. }
            | Self::TransientApiFailure { address, .. }
            | Self::ImportRoundTripMismatch { address, .. }
            | Self::AttributeMismatch { address, .. } => Some(address),
            Self::ConfigurationApplyFailure(EngineError::ResourceOperation { address, .. })
            | Self::ConfigurationApplyFailure(EngineError::ImportFailed { address, .. })
            | Self::DestroyFailure(EngineError::ResourceOperation { address, .. }) => Some(address),
            _ => None,
        }
    }

    /// Split an aggregate into its parts; other errors yield themselves
    #[must_use]
    pub fn flatten(self) -> Vec<HarnessError> {
        match self {
            Self::Aggregate(errors) => errors.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }

    /// Collapse a list of failures into one error
    ///
    /// Returns `None` for an empty list.
    #[must_use]
    pub fn from_failures(mut failures: Vec<HarnessError>) -> Option<Self> {
        match failures.len() {
            0 => None,
            1 => failures.pop(),
            _ => Some(Self::Aggregate(failures)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> ResourceAddress {
        ResourceAddress::new("azurerm_batch_application", "test")
    }

    #[test]
    fn api_error_not_found_classification() {
        assert!(ApiError::not_found("gone").is_not_found());
        assert!(!ApiError::with_status(429, "throttled").is_not_found());
        assert!(!ApiError::network("connection reset").is_not_found());
    }

    #[test]
    fn api_error_display_includes_status() {
        assert_eq!(
            ApiError::with_status(503, "unavailable").to_string(),
            "status 503: unavailable"
        );
        assert_eq!(
            ApiError::network("reset").to_string(),
            "no response: reset"
        );
    }

    #[test]
    fn not_found_message_names_the_triple() {
        let err = HarnessError::ResourceNotFoundUnexpectedly {
            address: addr(),
            identity: ResourceIdentity::new("app", "acct", "rg"),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"app\""));
        assert!(msg.contains("\"acct\""));
        assert!(msg.contains("\"rg\""));
        assert_eq!(err.kind(), FailureKind::ResourceNotFoundUnexpectedly);
        assert_eq!(err.address(), Some(&addr()));
    }

    #[test]
    fn aggregate_flattens_and_classifies_by_first() {
        let a = HarnessError::ResourceStillPresentAfterDestroy {
            address: addr(),
            identity: ResourceIdentity::new("a", "acct", "rg"),
        };
        let b = HarnessError::TransientApiFailure {
            address: addr(),
            identity: ResourceIdentity::new("b", "acct", "rg"),
            cause: ApiError::with_status(500, "boom"),
        };
        let agg = HarnessError::from_failures(vec![a, b]).unwrap();
        assert_eq!(agg.kind(), FailureKind::ResourceStillPresentAfterDestroy);
        assert_eq!(agg.flatten().len(), 2);
    }

    #[test]
    fn from_failures_single_and_empty() {
        assert!(HarnessError::from_failures(vec![]).is_none());
        let single = HarnessError::from_failures(vec![HarnessError::Cancelled]).unwrap();
        assert!(matches!(single, HarnessError::Cancelled));
    }

    #[test]
    fn attribute_mismatch_renders_unset() {
        let err = HarnessError::AttributeMismatch {
            address: addr(),
            key: "display_name".into(),
            expected: "x".into(),
            actual: None,
        };
        assert!(err.to_string().contains("<unset>"));
    }

    #[test]
    fn harness_level_kinds() {
        assert!(FailureKind::CleanupTimedOut.is_harness_level());
        assert!(!FailureKind::ResourceNotFoundUnexpectedly.is_harness_level());
    }
}
