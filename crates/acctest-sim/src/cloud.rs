//! Simulated control plane
//!
//! An in-memory resource table keyed by resource id. Resource types must be
//! registered with a [`ResourceSchema`] that says how ids are built, which
//! attributes identify a resource and which attributes the service fills in.
//! Reads through [`SimulatedClient`] behave like the real API: 404 when the
//! resource is missing, 503 when a fault says so.

use crate::fault::{consume, FaultPlan};
use acctest_core::{ApiError, AttributeMap, ControlPlaneClient, IdentityKeys, ResourceIdentity};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const STATUS_CONFLICT: u16 = 409;
const STATUS_UNAVAILABLE: u16 = 503;

/// How the simulator treats one resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSchema {
    /// Resource type
    pub resource_type: String,
    /// Id template; `{attr}` placeholders are replaced with attribute values
    pub id_format: String,
    /// Identity attributes used by reads
    pub identity: IdentityKeys,
    /// Attributes the service fills in when not given
    pub defaults: AttributeMap,
}

impl ResourceSchema {
    /// Create schema
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        id_format: impl Into<String>,
        identity: IdentityKeys,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id_format: id_format.into(),
            identity,
            defaults: AttributeMap::new(),
        }
    }

    /// Service-side default for an attribute
    #[must_use]
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Whether the service, not the configuration, owns this attribute
    #[must_use]
    pub fn is_computed(&self, key: &str) -> bool {
        key == "id" || self.defaults.contains_key(key)
    }

    /// Render the id for a set of attributes
    ///
    /// # Errors
    /// The placeholder whose attribute is missing or empty.
    pub fn render_id(&self, attributes: &AttributeMap) -> Result<String, String> {
        let mut id = String::with_capacity(self.id_format.len());
        let mut rest = self.id_format.as_str();

        while let Some(start) = rest.find('{') {
            id.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after
                .find('}')
                .ok_or_else(|| format!("unclosed placeholder in {:?}", self.id_format))?;
            let key = &after[..end];
            match attributes.get(key) {
                Some(value) if !value.is_empty() => id.push_str(value),
                _ => return Err(format!("attribute {key:?} is required")),
            }
            rest = &after[end + 1..];
        }
        id.push_str(rest);
        Ok(id)
    }

    fn with_defaults(&self, mut attributes: AttributeMap) -> AttributeMap {
        for (key, value) in &self.defaults {
            attributes
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        attributes
    }
}

/// A stored resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudResource {
    /// Resource type
    pub resource_type: String,
    /// Resource id
    pub id: String,
    /// Attributes as the API returns them, including `id`
    pub attributes: AttributeMap,
}

#[derive(Debug, Default)]
struct CloudState {
    schemas: HashMap<String, ResourceSchema>,
    resources: IndexMap<String, CloudResource>,
    leaked: HashSet<String>,
    faults: FaultPlan,
    reads: u64,
}

impl CloudState {
    fn schema(&self, resource_type: &str) -> Result<&ResourceSchema, String> {
        self.schemas
            .get(resource_type)
            .ok_or_else(|| format!("resource type {resource_type:?} is not registered"))
    }
}

/// Shared in-memory control plane
#[derive(Debug, Clone, Default)]
pub struct SimulatedCloud {
    inner: Arc<Mutex<CloudState>>,
}

impl SimulatedCloud {
    /// Empty cloud with no faults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cloud with a fault plan
    #[must_use]
    pub fn with_faults(faults: FaultPlan) -> Self {
        let cloud = Self::new();
        cloud.set_faults(faults);
        cloud
    }

    /// Replace the fault plan
    pub fn set_faults(&self, faults: FaultPlan) {
        self.inner.lock().faults = faults;
    }

    /// Current fault plan, counters included
    #[must_use]
    pub fn faults(&self) -> FaultPlan {
        self.inner.lock().faults.clone()
    }

    /// Register a resource type
    pub fn register(&self, schema: ResourceSchema) {
        self.inner
            .lock()
            .schemas
            .insert(schema.resource_type.clone(), schema);
    }

    /// Schema for a type
    #[must_use]
    pub fn schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        self.inner.lock().schemas.get(resource_type).cloned()
    }

    /// Id the given attributes would produce
    ///
    /// # Errors
    /// Unknown type or a missing id attribute.
    pub fn resolve_id(
        &self,
        resource_type: &str,
        attributes: &AttributeMap,
    ) -> Result<String, String> {
        let state = self.inner.lock();
        let schema = state.schema(resource_type)?;
        schema.render_id(&schema.with_defaults(attributes.clone()))
    }

    /// Create a resource
    ///
    /// A dropped create returns the record it would have stored.
    ///
    /// # Errors
    /// Unknown type, missing identity attributes, or an id conflict.
    pub fn create(
        &self,
        resource_type: &str,
        attributes: AttributeMap,
    ) -> Result<CloudResource, String> {
        let mut state = self.inner.lock();
        let schema = state.schema(resource_type)?;
        let mut attributes = schema.with_defaults(attributes);
        schema
            .identity
            .resolve(&attributes)
            .map_err(|key| format!("attribute {key:?} is required"))?;
        let id = schema.render_id(&attributes)?;

        if state.resources.contains_key(&id) {
            return Err(format!(
                "a resource with the ID {id:?} already exists (status {STATUS_CONFLICT})"
            ));
        }

        attributes.insert("id".to_string(), id.clone());
        let record = CloudResource {
            resource_type: resource_type.to_string(),
            id: id.clone(),
            attributes,
        };

        if state.faults.drop_creates.contains(resource_type) {
            tracing::debug!(%id, "dropping create");
        } else {
            tracing::debug!(%id, "created");
            state.resources.insert(id, record.clone());
        }
        Ok(record)
    }

    /// Replace a resource's configurable attributes
    ///
    /// # Errors
    /// When the resource does not exist.
    pub fn update(&self, id: &str, attributes: AttributeMap) -> Result<CloudResource, String> {
        let mut state = self.inner.lock();
        let resource_type = state
            .resources
            .get(id)
            .map(|r| r.resource_type.clone())
            .ok_or_else(|| format!("resource {id:?} was not found"))?;
        let mut attributes = state.schema(&resource_type)?.with_defaults(attributes);
        attributes.insert("id".to_string(), id.to_string());

        let record = state
            .resources
            .get_mut(id)
            .ok_or_else(|| format!("resource {id:?} was not found"))?;
        record.attributes = attributes;
        tracing::debug!(%id, "updated");
        Ok(record.clone())
    }

    /// Delete a resource; returns whether it existed
    pub fn delete(&self, id: &str) -> bool {
        let mut state = self.inner.lock();
        let Some(resource_type) = state.resources.get(id).map(|r| r.resource_type.clone()) else {
            return false;
        };

        if state.faults.leak_deletes.contains(&resource_type) {
            tracing::debug!(%id, "leaking delete");
            state.leaked.insert(id.to_string());
        } else {
            tracing::debug!(%id, "deleted");
            state.resources.shift_remove(id);
        }
        true
    }

    /// Resource by id, bypassing faults
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<CloudResource> {
        self.inner.lock().resources.get(id).cloned()
    }

    /// Whether a resource id exists, bypassing faults
    #[must_use]
    pub fn exists(&self, id: &str) -> bool {
        self.inner.lock().resources.contains_key(id)
    }

    /// Every stored resource of a type
    #[must_use]
    pub fn resources_of(&self, resource_type: &str) -> Vec<CloudResource> {
        self.inner
            .lock()
            .resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .cloned()
            .collect()
    }

    /// Number of stored resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().resources.len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads served through clients so far
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.inner.lock().reads
    }

    /// API client for one resource type
    #[must_use]
    pub fn client(&self, resource_type: impl Into<String>) -> SimulatedClient {
        SimulatedClient {
            cloud: self.clone(),
            resource_type: resource_type.into(),
        }
    }

    fn read(&self, resource_type: &str, wanted: &ResourceIdentity) -> Result<AttributeMap, ApiError> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.reads += 1;

        let identity = state
            .schema(resource_type)
            .map_err(|message| ApiError::with_status(400, message))?
            .identity
            .clone();
        let found = state
            .resources
            .values()
            .find(|r| {
                r.resource_type == resource_type
                    && identity.resolve(&r.attributes).as_ref() == Ok(wanted)
            })
            .map(|r| (r.id.clone(), r.attributes.clone()));

        let not_found = || ApiError::not_found(format!("{resource_type} {wanted} was not found"));
        let faults = &mut state.faults;
        match found {
            Some((id, _)) if state.leaked.contains(&id) && consume(&mut faults.stale_deleted_reads) => {
                Err(not_found())
            }
            Some(_) if consume(&mut faults.lagging_reads) => Err(not_found()),
            Some((_, attributes)) => Ok(attributes),
            None if consume(&mut faults.transient_absent_reads) => Err(ApiError::with_status(
                STATUS_UNAVAILABLE,
                "service unavailable",
            )),
            None => Err(not_found()),
        }
    }
}

/// [`ControlPlaneClient`] backed by a [`SimulatedCloud`]
#[derive(Debug, Clone)]
pub struct SimulatedClient {
    cloud: SimulatedCloud,
    resource_type: String,
}

#[async_trait]
impl ControlPlaneClient for SimulatedClient {
    async fn get(&self, parent: &str, group: &str, name: &str) -> Result<AttributeMap, ApiError> {
        let wanted = ResourceIdentity::new(name, parent, group);
        self.cloud.read(&self.resource_type, &wanted)
    }
}
