//! Batch Application configuration
//!
//! Resource group, storage account, batch account and the application under
//! test. The override block lands inside the application resource.

use crate::{LABEL, RESOURCE_TYPE};
use acctest_template::{ConfigBuilder, ResourceBlock, TestData};

/// Resource group type
pub const RESOURCE_GROUP: &str = "azurerm_resource_group";
/// Storage account type
pub const STORAGE_ACCOUNT: &str = "azurerm_storage_account";
/// Batch account type
pub const BATCH_ACCOUNT: &str = "azurerm_batch_account";

/// Render the configuration with `extra` appended to the application block
#[must_use]
pub fn template(data: &TestData, extra: &str) -> String {
    let group = ResourceBlock::new(RESOURCE_GROUP, LABEL)
        .attr("name", format!("acctestRG-{}", data.random_integer))
        .attr("location", &data.locations.primary);

    let storage = ResourceBlock::new(STORAGE_ACCOUNT, LABEL)
        .attr("name", format!("acctestsa{}", data.random_string))
        .reference("resource_group_name", group.address(), "name")
        .reference("location", group.address(), "location")
        .attr("account_tier", "Standard")
        .attr("account_replication_type", "LRS");

    let account = ResourceBlock::new(BATCH_ACCOUNT, LABEL)
        .attr("name", format!("acctestba{}", data.random_string))
        .reference("resource_group_name", group.address(), "name")
        .reference("location", group.address(), "location")
        .attr("pool_allocation_mode", "BatchService")
        .reference("storage_account_id", storage.address(), "id");

    let application = ResourceBlock::new(RESOURCE_TYPE, LABEL)
        .attr("name", format!("acctestbatchapp-{}", data.random_integer))
        .reference("resource_group_name", group.address(), "name")
        .reference("account_name", account.address(), "name")
        .raw(extra);

    ConfigBuilder::new()
        .block(group)
        .block(storage)
        .block(account)
        .block(application)
        .render()
}

/// Display name used by the update scenario
#[must_use]
pub fn display_name(data: &TestData) -> String {
    format!("TestAccDisplayName-{}", data.random_integer)
}
