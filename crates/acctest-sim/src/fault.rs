//! Fault injection for the simulated cloud and engine

use acctest_core::ResourceAddress;
use std::collections::BTreeSet;
use std::time::Duration;

/// Faults the simulator injects
///
/// Counters are consumed as the matching reads happen; type sets apply for
/// the lifetime of the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Creates of these types report success but store nothing
    pub drop_creates: BTreeSet<String>,
    /// Deletes of these types report success but keep the resource
    pub leak_deletes: BTreeSet<String>,
    /// Reads of existing resources that report 404 (replication lag)
    pub lagging_reads: u32,
    /// Reads of leaked resources that report 404 before the truth shows
    pub stale_deleted_reads: u32,
    /// Reads that would report 404 but fail with 503 instead
    pub transient_absent_reads: u32,
    /// Apply fails when it reaches this address
    pub fail_apply: Option<ResourceAddress>,
    /// Destroy sleeps this long before deleting anything
    pub destroy_delay: Duration,
}

impl FaultPlan {
    /// No faults
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Silently drop creates of a type
    #[must_use]
    pub fn drop_creates(mut self, resource_type: impl Into<String>) -> Self {
        self.drop_creates.insert(resource_type.into());
        self
    }

    /// Silently leak deletes of a type
    #[must_use]
    pub fn leak_deletes(mut self, resource_type: impl Into<String>) -> Self {
        self.leak_deletes.insert(resource_type.into());
        self
    }

    /// Report 404 for the next `n` reads of existing resources
    #[must_use]
    pub fn lagging_reads(mut self, n: u32) -> Self {
        self.lagging_reads = n;
        self
    }

    /// Report 404 for the next `n` reads of leaked resources
    #[must_use]
    pub fn stale_deleted_reads(mut self, n: u32) -> Self {
        self.stale_deleted_reads = n;
        self
    }

    /// Turn the next `n` not-found reads into 503s
    #[must_use]
    pub fn transient_absent_reads(mut self, n: u32) -> Self {
        self.transient_absent_reads = n;
        self
    }

    /// Fail apply at an address
    #[must_use]
    pub fn fail_apply(mut self, address: ResourceAddress) -> Self {
        self.fail_apply = Some(address);
        self
    }

    /// Delay every destroy
    #[must_use]
    pub fn destroy_delay(mut self, delay: Duration) -> Self {
        self.destroy_delay = delay;
        self
    }

    /// Whether any fault is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Decrement a fault counter, reporting whether it fired
pub(crate) fn consume(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}
