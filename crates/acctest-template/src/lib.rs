//! Acctest Template - randomized test data and configuration text
//!
//! Pure functions only: no state and no I/O. A seed plus an override block
//! fully determines the rendered configuration.
//!
//! # Example
//!
//! ```rust
//! use acctest_core::LocationConfig;
//! use acctest_template::{ConfigBuilder, ResourceBlock, TestData};
//!
//! let data = TestData::from_seed(7, "azurerm_resource_group", "test", LocationConfig::default());
//! let config = ConfigBuilder::new()
//!     .block(
//!         ResourceBlock::new("azurerm_resource_group", "test")
//!             .attr("name", format!("acctestRG-{}", data.random_integer))
//!             .attr("location", &data.locations.primary),
//!     )
//!     .render();
//! assert!(config.starts_with("resource \"azurerm_resource_group\" \"test\" {"));
//! ```

#![warn(unreachable_pub)]

pub mod builder;
pub mod data;

pub use builder::{ConfigBuilder, ResourceBlock, Value};
pub use data::TestData;
