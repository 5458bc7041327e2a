//! Provisioning engine seam
//!
//! The plan/apply/diff algorithm is external. The harness only needs the four
//! operations below, plus a factory so every scenario gets its own workspace.

use crate::error::{ApplyError, EngineError};
use crate::types::{ResourceAddress, StateSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Planned action for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    /// Resource would be created
    Create,
    /// Resource would be updated in place; lists changed attribute keys
    Update(Vec<String>),
    /// Resource would be deleted
    Delete,
}

/// A single pending change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedChange {
    /// Affected resource
    pub address: ResourceAddress,
    /// What would happen
    pub action: ChangeAction,
}

impl fmt::Display for PlannedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            ChangeAction::Create => write!(f, "+ {}", self.address),
            ChangeAction::Update(keys) => write!(f, "~ {} ({})", self.address, keys.join(", ")),
            ChangeAction::Delete => write!(f, "- {}", self.address),
        }
    }
}

/// Result of planning a configuration against a state snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Pending changes in configuration order
    pub changes: Vec<PlannedChange>,
}

impl PlanSummary {
    /// Empty plan
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether applying would change anything
    #[inline]
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Rendered changes, one per entry
    #[must_use]
    pub fn render(&self) -> Vec<String> {
        self.changes.iter().map(ToString::to_string).collect()
    }
}

/// Provisioning engine bound to one scenario workspace
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Apply configuration text against live infrastructure
    ///
    /// # Errors
    /// `ApplyError` carries the partial state recorded before the failure so
    /// teardown can still destroy it.
    async fn apply(&self, config: &str) -> Result<StateSnapshot, ApplyError>;

    /// Destroy every resource in the snapshot
    async fn destroy(&self, state: &StateSnapshot) -> Result<(), EngineError>;

    /// Plan configuration against a snapshot without changing anything
    async fn plan(&self, config: &str, state: &StateSnapshot) -> Result<PlanSummary, EngineError>;

    /// Derive state for one address purely from the live resource `id`
    async fn import(&self, address: &ResourceAddress, id: &str)
        -> Result<StateSnapshot, EngineError>;
}

/// Hands out isolated engine workspaces, one per scenario
pub trait EngineFactory: Send + Sync {
    /// Create the workspace for a scenario
    fn workspace(&self, scenario: &str) -> Arc<dyn ProvisioningEngine>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_summary_rendering() {
        let plan = PlanSummary {
            changes: vec![
                PlannedChange {
                    address: ResourceAddress::new("t", "a"),
                    action: ChangeAction::Create,
                },
                PlannedChange {
                    address: ResourceAddress::new("t", "b"),
                    action: ChangeAction::Update(vec!["display_name".into()]),
                },
            ],
        };

        assert!(plan.has_changes());
        assert_eq!(plan.render(), vec!["+ t.a", "~ t.b (display_name)"]);
        assert!(!PlanSummary::empty().has_changes());
    }
}
