//! Simulator schemas for the types the template declares

use crate::template::{BATCH_ACCOUNT, RESOURCE_GROUP, STORAGE_ACCOUNT};
use crate::{identity_keys, RESOURCE_TYPE};
use acctest_core::IdentityKeys;
use acctest_sim::{ResourceSchema, SimulatedCloud};

const SUBSCRIPTION: &str = "/subscriptions/00000000-0000-0000-0000-000000000000";

/// Schemas for resource group, storage account, batch account and application
#[must_use]
pub fn schemas() -> Vec<ResourceSchema> {
    let in_group = || IdentityKeys::named("name").with_group("resource_group_name");

    vec![
        ResourceSchema::new(
            RESOURCE_GROUP,
            format!("{SUBSCRIPTION}/resourceGroups/{{name}}"),
            IdentityKeys::named("name"),
        ),
        ResourceSchema::new(
            STORAGE_ACCOUNT,
            format!(
                "{SUBSCRIPTION}/resourceGroups/{{resource_group_name}}/providers/Microsoft.Storage/storageAccounts/{{name}}"
            ),
            in_group(),
        )
        .with_default("account_kind", "StorageV2"),
        ResourceSchema::new(
            BATCH_ACCOUNT,
            format!(
                "{SUBSCRIPTION}/resourceGroups/{{resource_group_name}}/providers/Microsoft.Batch/batchAccounts/{{name}}"
            ),
            in_group(),
        ),
        ResourceSchema::new(
            RESOURCE_TYPE,
            format!(
                "{SUBSCRIPTION}/resourceGroups/{{resource_group_name}}/providers/Microsoft.Batch/batchAccounts/{{account_name}}/applications/{{name}}"
            ),
            identity_keys(),
        )
        .with_default("allow_updates", "true")
        .with_default("default_version", ""),
    ]
}

/// Register every schema on a cloud
pub fn register(cloud: &SimulatedCloud) {
    for schema in schemas() {
        cloud.register(schema);
    }
}
