//! Configuration rendering
//!
//! Builds resource blocks in the declarative configuration language:
//!
//! ```text
//! resource "azurerm_resource_group" "test" {
//!   name     = "acctestRG-123456789012"
//!   location = "westeurope"
//! }
//! ```
//!
//! Attribute names are padded so `=` lines up, references render as
//! `"${type.label.attribute}"`, and a raw override block is appended
//! verbatim as the last lines of its resource.

use acctest_core::ResourceAddress;
use std::fmt::Write as _;

/// Attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Literal string
    Literal(String),
    /// Reference to another resource's attribute
    Reference {
        /// Referenced resource
        address: ResourceAddress,
        /// Attribute on that resource
        attribute: String,
    },
}

impl Value {
    fn render(&self) -> String {
        match self {
            Self::Literal(text) => format!("\"{}\"", escape(text)),
            Self::Reference { address, attribute } => format!("\"${{{address}.{attribute}}}\""),
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// One `resource "type" "label" { ... }` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBlock {
    address: ResourceAddress,
    attributes: Vec<(String, Value)>,
    raw: Option<String>,
}

impl ResourceBlock {
    /// Empty block
    #[must_use]
    pub fn new(resource_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            address: ResourceAddress::new(resource_type, label),
            attributes: Vec::new(),
            raw: None,
        }
    }

    /// Address of this block
    #[inline]
    #[must_use]
    pub fn address(&self) -> &ResourceAddress {
        &self.address
    }

    /// Literal attribute
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .push((key.into(), Value::Literal(value.into())));
        self
    }

    /// Attribute referencing `attribute` of another block
    #[must_use]
    pub fn reference(
        mut self,
        key: impl Into<String>,
        target: &ResourceAddress,
        attribute: impl Into<String>,
    ) -> Self {
        self.attributes.push((
            key.into(),
            Value::Reference {
                address: target.clone(),
                attribute: attribute.into(),
            },
        ));
        self
    }

    /// Raw text appended after the attributes; blank text is ignored
    #[must_use]
    pub fn raw(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.raw = (!text.trim().is_empty()).then_some(text);
        self
    }

    /// Render the block
    #[must_use]
    pub fn render(&self) -> String {
        let width = self
            .attributes
            .iter()
            .map(|(key, _)| key.len())
            .max()
            .unwrap_or(0);

        let mut out = format!(
            "resource \"{}\" \"{}\" {{\n",
            self.address.resource_type, self.address.label
        );
        for (key, value) in &self.attributes {
            let _ = writeln!(out, "  {key:<width$} = {}", value.render());
        }
        if let Some(raw) = &self.raw {
            let lines: Vec<&str> = raw
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.is_empty())
                .collect();
            let margin = lines
                .iter()
                .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
                .min()
                .unwrap_or(0);
            for line in lines {
                let _ = writeln!(out, "  {}", &line[margin..]);
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Ordered collection of resource blocks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigBuilder {
    blocks: Vec<ResourceBlock>,
}

impl ConfigBuilder {
    /// Empty configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block
    #[inline]
    #[must_use]
    pub fn block(mut self, block: ResourceBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// Blocks in declaration order
    #[inline]
    #[must_use]
    pub fn blocks(&self) -> &[ResourceBlock] {
        &self.blocks
    }

    /// Render all blocks separated by blank lines
    #[must_use]
    pub fn render(&self) -> String {
        self.blocks
            .iter()
            .map(ResourceBlock::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
