//! Core types for the harness
//!
//! Defines the fundamental types shared by readers, assertions and the runner:
//! - Resource addresses (`type.label`) and identity triples
//! - Resource instances and state snapshots recorded by the engine
//! - Scenario and run identifiers

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Flat attribute map (`key -> value`), as recorded in state and returned by
/// the control plane.
pub type AttributeMap = BTreeMap<String, String>;

/// Unique run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Symbolic resource address: resource type plus configuration label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceAddress {
    /// Resource type, e.g. `azurerm_batch_application`
    pub resource_type: String,
    /// Symbolic name in configuration, e.g. `test`
    pub label: String,
}

impl ResourceAddress {
    /// Create new address
    #[inline]
    #[must_use]
    pub fn new(resource_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.label)
    }
}

/// Error parsing a `type.label` address
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource address {0:?}: expected `type.label`")]
pub struct AddressParseError(pub String);

impl FromStr for ResourceAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource_type, label) = s
            .split_once('.')
            .ok_or_else(|| AddressParseError(s.to_string()))?;
        if resource_type.is_empty() || label.is_empty() || label.contains('.') {
            return Err(AddressParseError(s.to_string()));
        }
        Ok(Self::new(resource_type, label))
    }
}

/// Concrete identifier triple of a remote resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    /// Logical name of the resource
    pub name: String,
    /// Parent resource name (account, server, ...); empty for top-level resources
    pub parent: String,
    /// Resource group or namespace; empty when the type has none
    pub group: String,
}

impl ResourceIdentity {
    /// Create new identity triple
    #[inline]
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        parent: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parent: parent.into(),
            group: group.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.name)?;
        if !self.parent.is_empty() {
            write!(f, " (Parent {:?}", self.parent)?;
            if !self.group.is_empty() {
                write!(f, " / Resource Group {:?}", self.group)?;
            }
            write!(f, ")")
        } else if !self.group.is_empty() {
            write!(f, " (Resource Group {:?})", self.group)
        } else {
            Ok(())
        }
    }
}

/// Which state attributes carry the identity triple for a resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityKeys {
    /// Attribute holding the logical name
    pub name: String,
    /// Attribute holding the parent name, if the type has a parent
    pub parent: Option<String>,
    /// Attribute holding the resource group, if the type lives in one
    pub group: Option<String>,
}

impl IdentityKeys {
    /// Keys for a type identified by name only
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            group: None,
        }
    }

    /// With parent attribute
    #[inline]
    #[must_use]
    pub fn with_parent(mut self, key: impl Into<String>) -> Self {
        self.parent = Some(key.into());
        self
    }

    /// With resource group attribute
    #[inline]
    #[must_use]
    pub fn with_group(mut self, key: impl Into<String>) -> Self {
        self.group = Some(key.into());
        self
    }

    /// Resolve the identity triple from recorded attributes
    ///
    /// # Errors
    /// Returns the name of the first required attribute that is missing or empty.
    pub fn resolve(&self, attributes: &AttributeMap) -> Result<ResourceIdentity, String> {
        let required = |key: &str| -> Result<String, String> {
            match attributes.get(key) {
                Some(value) if !value.is_empty() => Ok(value.clone()),
                _ => Err(key.to_string()),
            }
        };

        let name = required(&self.name)?;
        let parent = self.parent.as_deref().map(required).transpose()?;
        let group = self.group.as_deref().map(required).transpose()?;

        Ok(ResourceIdentity {
            name,
            parent: parent.unwrap_or_default(),
            group: group.unwrap_or_default(),
        })
    }
}

/// A resource instance as recorded by the provisioning engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInstance {
    /// Address in configuration
    pub address: ResourceAddress,
    /// Remote identifier assigned by the control plane
    pub id: String,
    /// Flat attributes
    pub attributes: AttributeMap,
}

impl ResourceInstance {
    /// Create new instance
    #[inline]
    #[must_use]
    pub fn new(address: ResourceAddress, id: impl Into<String>, attributes: AttributeMap) -> Self {
        Self {
            address,
            id: id.into(),
            attributes,
        }
    }

    /// Attribute lookup
    #[inline]
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Engine state after an apply, keyed by address in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    resources: IndexMap<String, ResourceInstance>,
}

impl StateSnapshot {
    /// Create empty snapshot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an instance, keeping its original position on replace
    pub fn insert(&mut self, instance: ResourceInstance) {
        self.resources.insert(instance.address.to_string(), instance);
    }

    /// Remove an instance
    pub fn remove(&mut self, address: &ResourceAddress) -> Option<ResourceInstance> {
        self.resources.shift_remove(&address.to_string())
    }

    /// Get instance by address
    #[inline]
    #[must_use]
    pub fn get(&self, address: &ResourceAddress) -> Option<&ResourceInstance> {
        self.resources.get(&address.to_string())
    }

    /// All instances in creation order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ResourceInstance> {
        self.resources.values()
    }

    /// All instances of one resource type, in creation order
    pub fn instances_of<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a ResourceInstance> + 'a {
        self.resources
            .values()
            .filter(move |r| r.address.resource_type == resource_type)
    }

    /// All addresses in creation order
    #[must_use]
    pub fn addresses(&self) -> Vec<ResourceAddress> {
        self.resources.values().map(|r| r.address.clone()).collect()
    }

    /// Number of instances
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the snapshot is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl FromIterator<ResourceInstance> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = ResourceInstance>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for instance in iter {
            snapshot.insert(instance);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn address_parse_and_display() {
        let addr: ResourceAddress = "azurerm_batch_application.test".parse().unwrap();
        assert_eq!(addr.resource_type, "azurerm_batch_application");
        assert_eq!(addr.label, "test");
        assert_eq!(addr.to_string(), "azurerm_batch_application.test");
    }

    #[test]
    fn address_parse_rejects_malformed() {
        assert!("no_dot".parse::<ResourceAddress>().is_err());
        assert!(".test".parse::<ResourceAddress>().is_err());
        assert!("type.".parse::<ResourceAddress>().is_err());
        assert!("a.b.c".parse::<ResourceAddress>().is_err());
    }

    #[test]
    fn identity_keys_resolve_triple() {
        let keys = IdentityKeys::named("name")
            .with_parent("account_name")
            .with_group("resource_group_name");
        let identity = keys
            .resolve(&attrs(&[
                ("name", "app"),
                ("account_name", "acct"),
                ("resource_group_name", "rg"),
            ]))
            .unwrap();

        assert_eq!(identity, ResourceIdentity::new("app", "acct", "rg"));
    }

    #[test]
    fn identity_keys_reject_empty_required_attribute() {
        let keys = IdentityKeys::named("name").with_parent("account_name");
        let err = keys
            .resolve(&attrs(&[("name", "app"), ("account_name", "")]))
            .unwrap_err();
        assert_eq!(err, "account_name");
    }

    #[test]
    fn identity_display_names_all_parts() {
        let identity = ResourceIdentity::new("app", "acct", "rg");
        assert_eq!(
            identity.to_string(),
            r#""app" (Parent "acct" / Resource Group "rg")"#
        );
        assert_eq!(ResourceIdentity::new("rg", "", "").to_string(), r#""rg""#);
    }

    #[test]
    fn snapshot_keeps_creation_order_and_filters_by_type() {
        let snapshot: StateSnapshot = [
            ResourceInstance::new(ResourceAddress::new("a", "one"), "1", AttributeMap::new()),
            ResourceInstance::new(ResourceAddress::new("b", "two"), "2", AttributeMap::new()),
            ResourceInstance::new(ResourceAddress::new("a", "three"), "3", AttributeMap::new()),
        ]
        .into_iter()
        .collect();

        let ids: Vec<_> = snapshot.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        let of_a: Vec<_> = snapshot.instances_of("a").map(|r| r.id.as_str()).collect();
        assert_eq!(of_a, vec!["1", "3"]);
    }
}
