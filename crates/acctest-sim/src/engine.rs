//! Simulated provisioning engine
//!
//! Applies the configuration subset against a [`SimulatedCloud`]. Blocks are
//! applied in dependency order; existing resources are updated in place
//! unless their id would change, in which case they are replaced. Plans
//! refresh against the cloud, so drift and vanished resources show up as
//! pending changes.

use crate::cloud::{CloudResource, SimulatedCloud};
use crate::parser::{self, ResourceDecl};
use acctest_core::{
    ApplyError, AttributeMap, ChangeAction, EngineError, EngineFactory, PlanSummary,
    PlannedChange, ProvisioningEngine, ResourceAddress, ResourceInstance, StateSnapshot,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Engine workspace bound to one scenario
#[derive(Debug)]
pub struct SimulatedEngine {
    workspace: String,
    cloud: SimulatedCloud,
    state: Mutex<StateSnapshot>,
}

impl SimulatedEngine {
    /// Create workspace
    #[must_use]
    pub fn new(workspace: impl Into<String>, cloud: SimulatedCloud) -> Self {
        Self {
            workspace: workspace.into(),
            cloud,
            state: Mutex::new(StateSnapshot::new()),
        }
    }

    /// Workspace name
    #[inline]
    #[must_use]
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// State recorded by the last apply or destroy
    #[must_use]
    pub fn state(&self) -> StateSnapshot {
        self.state.lock().clone()
    }

    fn record_failure(
        &self,
        next: StateSnapshot,
        previous: &StateSnapshot,
        cause: EngineError,
    ) -> ApplyError {
        let mut partial = next;
        for instance in previous.iter() {
            if partial.get(&instance.address).is_none() && self.cloud.exists(&instance.id) {
                partial.insert(instance.clone());
            }
        }
        tracing::warn!(workspace = %self.workspace, error = %cause, recorded = partial.len(), "apply failed");
        self.state.lock().clone_from(&partial);
        ApplyError::new(partial, cause)
    }

    fn converge(
        &self,
        existing: &ResourceInstance,
        desired: AttributeMap,
    ) -> Result<CloudResource, EngineError> {
        let address = &existing.address;
        let operation = |message: String| EngineError::ResourceOperation {
            address: address.clone(),
            message,
        };

        let desired_id = self
            .cloud
            .resolve_id(&address.resource_type, &desired)
            .map_err(operation)?;

        if desired_id != existing.id {
            tracing::info!(%address, "replacing");
            self.cloud.delete(&existing.id);
            return self
                .cloud
                .create(&address.resource_type, desired)
                .map_err(operation);
        }

        let live = self
            .cloud
            .get_by_id(&existing.id)
            .ok_or_else(|| operation("resource vanished during apply".to_string()))?;
        if changed_keys(&self.cloud, &live.resource_type, &desired, &live.attributes).is_empty() {
            return Ok(live);
        }

        tracing::info!(%address, "updating in place");
        self.cloud.update(&existing.id, desired).map_err(operation)
    }
}

/// Order declarations so every reference points backwards
fn dependency_order(decls: Vec<ResourceDecl>) -> Result<Vec<ResourceDecl>, EngineError> {
    for decl in &decls {
        if let Some(missing) = decl
            .dependencies()
            .find(|dep| !decls.iter().any(|d| &d.address == *dep))
        {
            return Err(EngineError::InvalidConfiguration(format!(
                "{} references undeclared resource {missing}",
                decl.address
            )));
        }
    }

    let mut pending = decls;
    let mut ordered: Vec<ResourceDecl> = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending.iter().position(|decl| {
            decl.dependencies()
                .all(|dep| ordered.iter().any(|d| &d.address == dep))
        });
        match ready {
            Some(index) => ordered.push(pending.remove(index)),
            None => {
                let cycle: Vec<String> = pending.iter().map(|d| d.address.to_string()).collect();
                return Err(EngineError::InvalidConfiguration(format!(
                    "dependency cycle between {}",
                    cycle.join(", ")
                )));
            }
        }
    }
    Ok(ordered)
}

fn parse_ordered(config: &str) -> Result<Vec<ResourceDecl>, EngineError> {
    let decls =
        parser::parse(config).map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?;
    dependency_order(decls)
}

/// Evaluate a declaration's attributes against recorded state
///
/// Unresolvable references are left out of the result and listed in the
/// second element.
fn evaluate(decl: &ResourceDecl, state: &StateSnapshot) -> (AttributeMap, Vec<String>) {
    let mut values = AttributeMap::new();
    let mut unknown = Vec::new();
    for (key, expr) in &decl.attributes {
        let value = expr.evaluate(|reference| {
            state
                .get(&reference.address)
                .and_then(|i| i.attribute(&reference.attribute))
                .map(ToString::to_string)
        });
        match value {
            Some(value) => {
                values.insert(key.clone(), value);
            }
            None => unknown.push(key.clone()),
        }
    }
    (values, unknown)
}

/// Keys whose desired value differs from the live one
///
/// Live attributes absent from the configuration count as changes unless the
/// service owns them.
fn changed_keys(
    cloud: &SimulatedCloud,
    resource_type: &str,
    desired: &AttributeMap,
    live: &AttributeMap,
) -> Vec<String> {
    let schema = cloud.schema(resource_type);
    let computed = |key: &str| schema.as_ref().map_or(key == "id", |s| s.is_computed(key));

    let mut keys: Vec<String> = desired
        .iter()
        .filter(|(key, value)| live.get(*key) != Some(*value))
        .filter(|(key, value)| !(value.is_empty() && !live.contains_key(*key)))
        .map(|(key, _)| key.clone())
        .collect();
    keys.extend(
        live.iter()
            .filter(|(key, value)| {
                !desired.contains_key(*key) && !computed(key.as_str()) && !value.is_empty()
            })
            .map(|(key, _)| key.clone()),
    );
    keys.sort();
    keys
}

#[async_trait]
impl ProvisioningEngine for SimulatedEngine {
    async fn apply(&self, config: &str) -> Result<StateSnapshot, ApplyError> {
        let previous = self.state();
        let decls = parse_ordered(config).map_err(|e| ApplyError::new(previous.clone(), e))?;
        let fail_at = self.cloud.faults().fail_apply;
        tracing::info!(workspace = %self.workspace, resources = decls.len(), "apply");

        let mut next = StateSnapshot::new();
        for decl in &decls {
            let address = &decl.address;
            if fail_at.as_ref() == Some(address) {
                let cause = EngineError::ResourceOperation {
                    address: address.clone(),
                    message: "simulated provider failure".to_string(),
                };
                return Err(self.record_failure(next, &previous, cause));
            }

            let (desired, unknown) = evaluate(decl, &next);
            if let Some(key) = unknown.first() {
                let cause = EngineError::InvalidConfiguration(format!(
                    "{address}.{key}: reference cannot be resolved"
                ));
                return Err(self.record_failure(next, &previous, cause));
            }

            let outcome = match previous.get(address) {
                Some(existing) if self.cloud.exists(&existing.id) => {
                    self.converge(existing, desired)
                }
                _ => self
                    .cloud
                    .create(&address.resource_type, desired)
                    .map_err(|message| EngineError::ResourceOperation {
                        address: address.clone(),
                        message,
                    }),
            };

            match outcome {
                Ok(record) => {
                    next.insert(ResourceInstance::new(
                        address.clone(),
                        record.id,
                        record.attributes,
                    ));
                }
                Err(cause) => return Err(self.record_failure(next, &previous, cause)),
            }
        }

        for orphan in previous.iter().rev() {
            if next.get(&orphan.address).is_none() {
                tracing::info!(address = %orphan.address, "deleting orphan");
                self.cloud.delete(&orphan.id);
            }
        }

        self.state.lock().clone_from(&next);
        Ok(next)
    }

    async fn destroy(&self, state: &StateSnapshot) -> Result<(), EngineError> {
        let delay = self.cloud.faults().destroy_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        tracing::info!(workspace = %self.workspace, resources = state.len(), "destroy");
        for instance in state.iter().rev() {
            if !self.cloud.delete(&instance.id) {
                tracing::debug!(address = %instance.address, "already gone");
            }
        }

        let mut recorded = self.state.lock();
        for instance in state.iter() {
            recorded.remove(&instance.address);
        }
        Ok(())
    }

    async fn plan(&self, config: &str, state: &StateSnapshot) -> Result<PlanSummary, EngineError> {
        let decls = parse_ordered(config)?;
        let mut changes = Vec::new();

        for decl in &decls {
            let live = state
                .get(&decl.address)
                .and_then(|instance| self.cloud.get_by_id(&instance.id));
            let action = match live {
                None => Some(ChangeAction::Create),
                Some(live) => {
                    let (desired, unknown) = evaluate(decl, state);
                    let mut keys =
                        changed_keys(&self.cloud, &live.resource_type, &desired, &live.attributes);
                    keys.retain(|k| !unknown.contains(k));
                    (!keys.is_empty()).then_some(ChangeAction::Update(keys))
                }
            };
            if let Some(action) = action {
                changes.push(PlannedChange {
                    address: decl.address.clone(),
                    action,
                });
            }
        }

        for instance in state.iter() {
            if !decls.iter().any(|d| d.address == instance.address) {
                changes.push(PlannedChange {
                    address: instance.address.clone(),
                    action: ChangeAction::Delete,
                });
            }
        }

        Ok(PlanSummary { changes })
    }

    async fn import(
        &self,
        address: &ResourceAddress,
        id: &str,
    ) -> Result<StateSnapshot, EngineError> {
        let failed = |reason: String| EngineError::ImportFailed {
            address: address.clone(),
            id: id.to_string(),
            reason,
        };

        let record = self
            .cloud
            .get_by_id(id)
            .ok_or_else(|| failed("cannot import non-existent remote object".to_string()))?;
        if record.resource_type != address.resource_type {
            return Err(failed(format!("id belongs to a {}", record.resource_type)));
        }

        Ok([ResourceInstance::new(address.clone(), record.id, record.attributes)]
            .into_iter()
            .collect())
    }
}

/// One workspace per scenario, all sharing one cloud
#[derive(Debug, Default)]
pub struct SimulatedEngineFactory {
    cloud: SimulatedCloud,
    workspaces: DashMap<String, Arc<SimulatedEngine>>,
}

impl SimulatedEngineFactory {
    /// Create factory over a cloud
    #[must_use]
    pub fn new(cloud: SimulatedCloud) -> Self {
        Self {
            cloud,
            workspaces: DashMap::new(),
        }
    }

    /// Shared cloud
    #[inline]
    #[must_use]
    pub fn cloud(&self) -> &SimulatedCloud {
        &self.cloud
    }

    /// Workspace handed out for a scenario, if any
    #[must_use]
    pub fn engine(&self, scenario: &str) -> Option<Arc<SimulatedEngine>> {
        self.workspaces.get(scenario).map(|e| Arc::clone(e.value()))
    }

    /// Number of workspaces handed out
    #[must_use]
    pub fn workspace_count(&self) -> usize {
        self.workspaces.len()
    }
}

impl EngineFactory for SimulatedEngineFactory {
    fn workspace(&self, scenario: &str) -> Arc<dyn ProvisioningEngine> {
        let engine: Arc<SimulatedEngine> = Arc::clone(
            self.workspaces
                .entry(scenario.to_string())
                .or_insert_with(|| Arc::new(SimulatedEngine::new(scenario, self.cloud.clone())))
                .value(),
        );
        engine
    }
}
