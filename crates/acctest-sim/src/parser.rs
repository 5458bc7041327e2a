//! Configuration subset parser
//!
//! Understands what the template builder emits and little else:
//!
//! ```text
//! # comment
//! resource "type" "label" {
//!   key = "literal with ${other_type.other_label.attribute}"
//!   key = other_type.other_label.attribute
//! }
//! ```

use acctest_core::ResourceAddress;
use indexmap::IndexMap;

/// Parse failure with 1-based line number
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// Line the error was detected on
    pub line: usize,
    /// What went wrong
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Reference to another resource's attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Referenced resource
    pub address: ResourceAddress,
    /// Attribute name
    pub attribute: String,
}

impl Reference {
    fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let (resource_type, label, attribute) = (parts.next()?, parts.next()?, parts.next()?);
        let valid = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        };
        if parts.next().is_some() || !valid(resource_type) || !valid(label) || !valid(attribute) {
            return None;
        }
        Some(Self {
            address: ResourceAddress::new(resource_type, label),
            attribute: attribute.to_string(),
        })
    }
}

/// Piece of an attribute expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text
    Text(String),
    /// Interpolated reference
    Ref(Reference),
}

/// Attribute expression: concatenation of segments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expr {
    /// Segments in order
    pub segments: Vec<Segment>,
}

impl Expr {
    /// References this expression depends on
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Ref(r) => Some(r),
            Segment::Text(_) => None,
        })
    }

    /// Evaluate, resolving references through `lookup`
    ///
    /// Returns `None` when any reference cannot be resolved.
    pub fn evaluate<F>(&self, mut lookup: F) -> Option<String>
    where
        F: FnMut(&Reference) -> Option<String>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Ref(reference) => out.push_str(&lookup(reference)?),
            }
        }
        Some(out)
    }
}

/// One declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDecl {
    /// Declared address
    pub address: ResourceAddress,
    /// Attributes in declaration order
    pub attributes: IndexMap<String, Expr>,
}

impl ResourceDecl {
    /// Addresses this declaration references
    pub fn dependencies(&self) -> impl Iterator<Item = &ResourceAddress> {
        self.attributes
            .values()
            .flat_map(Expr::references)
            .map(|r| &r.address)
    }
}

/// Parse configuration text into declarations
///
/// # Errors
/// `ParseError` for anything outside the supported subset, duplicate
/// addresses or attributes, and unterminated blocks.
pub fn parse(text: &str) -> Result<Vec<ResourceDecl>, ParseError> {
    let mut decls: Vec<ResourceDecl> = Vec::new();
    let mut open: Option<(usize, ResourceDecl)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        match open.take() {
            None => {
                let address = parse_header(line).ok_or_else(|| {
                    ParseError::new(line_no, format!("expected resource block, found {line:?}"))
                })?;
                if decls.iter().any(|d| d.address == address) {
                    return Err(ParseError::new(line_no, format!("duplicate resource {address}")));
                }
                open = Some((
                    line_no,
                    ResourceDecl {
                        address,
                        attributes: IndexMap::new(),
                    },
                ));
            }
            Some((_, decl)) if line == "}" => decls.push(decl),
            Some((start, mut decl)) => {
                let (key, expr) = parse_attribute(line_no, line)?;
                if decl.attributes.insert(key.clone(), expr).is_some() {
                    return Err(ParseError::new(
                        line_no,
                        format!("duplicate attribute {key:?} in {}", decl.address),
                    ));
                }
                open = Some((start, decl));
            }
        }
    }

    if let Some((start, decl)) = open {
        return Err(ParseError::new(
            start,
            format!("unterminated block for {}", decl.address),
        ));
    }
    Ok(decls)
}

fn parse_header(line: &str) -> Option<ResourceAddress> {
    let rest = line.strip_prefix("resource")?.trim_start();
    let rest = rest.strip_suffix('{')?.trim_end();
    let (resource_type, rest) = quoted_word(rest)?;
    let (label, rest) = quoted_word(rest.trim_start())?;
    (rest.trim().is_empty() && !resource_type.is_empty() && !label.is_empty())
        .then(|| ResourceAddress::new(resource_type, label))
}

fn quoted_word(text: &str) -> Option<(&str, &str)> {
    let inner = text.strip_prefix('"')?;
    let end = inner.find('"')?;
    Some((&inner[..end], &inner[end + 1..]))
}

fn parse_attribute(line_no: usize, line: &str) -> Result<(String, Expr), ParseError> {
    let (key, value) = line
        .split_once('=')
        .ok_or_else(|| ParseError::new(line_no, format!("expected `key = value`, found {line:?}")))?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ParseError::new(line_no, format!("invalid attribute name {key:?}")));
    }

    let value = value.trim();
    let expr = if value.starts_with('"') {
        parse_string(line_no, value)?
    } else {
        let reference = Reference::parse(value).ok_or_else(|| {
            ParseError::new(line_no, format!("expected string or reference, found {value:?}"))
        })?;
        Expr {
            segments: vec![Segment::Ref(reference)],
        }
    };
    Ok((key.to_string(), expr))
}

fn parse_string(line_no: usize, value: &str) -> Result<Expr, ParseError> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = value[1..].chars().peekable();

    loop {
        match chars.next() {
            None => return Err(ParseError::new(line_no, "unterminated string")),
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some('n') => text.push('\n'),
                Some(c @ ('"' | '\\' | '$')) => text.push(c),
                other => {
                    return Err(ParseError::new(
                        line_no,
                        format!("invalid escape {:?}", other.map(String::from).unwrap_or_default()),
                    ))
                }
            },
            Some('$') if chars.peek() == Some(&'{') => {
                chars.next();
                let inner: String = chars.by_ref().take_while(|c| *c != '}').collect();
                let reference = Reference::parse(&inner).ok_or_else(|| {
                    ParseError::new(line_no, format!("invalid interpolation ${{{inner}}}"))
                })?;
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Ref(reference));
            }
            Some(c) => text.push(c),
        }
    }

    let trailing: String = chars.collect();
    if !trailing.trim().is_empty() {
        return Err(ParseError::new(
            line_no,
            format!("unexpected text after string: {trailing:?}"),
        ));
    }
    if !text.is_empty() || segments.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(Expr { segments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const CONFIG: &str = r#"
# resource group
resource "azurerm_resource_group" "test" {
  name     = "acctestRG-1"
  location = "westeurope"
}

resource "azurerm_batch_account" "test" {
  name                = "acctestba${azurerm_resource_group.test.name}x"
  resource_group_name = azurerm_resource_group.test.name
}
"#;

    #[test]
    fn parses_blocks_and_references() {
        let decls = parse(CONFIG).unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].address.to_string(), "azurerm_resource_group.test");
        assert_eq!(
            decls[0].attributes.keys().collect::<Vec<_>>(),
            vec!["name", "location"]
        );

        let name = &decls[1].attributes["name"];
        assert_eq!(name.segments.len(), 3);
        let deps: Vec<String> = decls[1].dependencies().map(ToString::to_string).collect();
        assert_eq!(deps, vec!["azurerm_resource_group.test"; 2]);
    }

    #[test]
    fn evaluates_interpolation() {
        let decls = parse(CONFIG).unwrap();
        let value = decls[1].attributes["name"].evaluate(|r| {
            assert_eq!(r.attribute, "name");
            Some("RG".to_string())
        });
        assert_eq!(value.as_deref(), Some("acctestbaRGx"));
        assert_eq!(decls[1].attributes["name"].evaluate(|_| None), None);
    }

    #[test]
    fn empty_string_is_a_literal() {
        let decls = parse("resource \"t\" \"a\" {\n  x = \"\"\n}\n").unwrap();
        assert_eq!(decls[0].attributes["x"].evaluate(|_| None).as_deref(), Some(""));
    }

    #[test]
    fn rejects_unterminated_block() {
        let err = parse("resource \"t\" \"a\" {\n  x = \"1\"\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn rejects_duplicates() {
        let dup_attr = parse("resource \"t\" \"a\" {\n  x = \"1\"\n  x = \"2\"\n}\n").unwrap_err();
        assert_eq!(dup_attr.line, 3);

        let dup_block = parse("resource \"t\" \"a\" {\n}\nresource \"t\" \"a\" {\n}\n").unwrap_err();
        assert_eq!(dup_block.line, 3);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("variable \"x\" {}").is_err());
        assert!(parse("resource \"t\" \"a\" {\n  x = 12\n}").is_err());
        assert!(parse("resource \"t\" \"a\" {\n  x = \"${bad}\"\n}").is_err());
        assert!(parse("resource \"t\" \"a\" {\n  x = \"open\n}").is_err());
    }

    proptest! {
        #[test]
        fn literal_values_survive(value in "[a-zA-Z0-9 _-]{0,24}") {
            let text = format!("resource \"t\" \"a\" {{\n  x = \"{value}\"\n}}\n");
            let decls = parse(&text).unwrap();
            prop_assert_eq!(decls[0].attributes["x"].evaluate(|_| None), Some(value));
        }
    }
}
