//! XPath queries over the XML rendering of a property list.
//!
//! Documents are parsed with `sxd-document` and queried with `sxd-xpath`
//! (XPath 1.0). Results are flattened into [`PathValue`]: a match on a single
//! value node gives its text, other node-sets keep each node's name and text.
//!
//! ```
//! use descriptor::xpath::{parse_document, PathValue, XPath};
//!
//! let package = parse_document("<plist><dict><key>A</key><true/></dict></plist>").unwrap();
//! let query = XPath::compile("name(/plist/dict/key[text()='A']/following-sibling::*[1])").unwrap();
//! assert_eq!(query.evaluate(&package).unwrap(), PathValue::Text("true".to_string()));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use sxd_document::dom::ChildOfElement;
use sxd_document::Package;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Factory, Value};

use crate::error::{DescriptorError, Result};

/// A node matched by a path query that is not a plain value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedNode {
    pub name: String,
    pub text: String,
}

/// Outcome of a path query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PathValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Nodes(Vec<MatchedNode>),
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValue::Text(text) => f.write_str(text),
            PathValue::Number(n) => f.write_str(&format_number(*n)),
            PathValue::Boolean(b) => write!(f, "{}", b),
            PathValue::Nodes(nodes) => {
                let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
                write!(f, "[{}]", names.join(", "))
            }
        }
    }
}

/// Parse XML text into a queryable document.
///
/// The document type declaration `plutil` writes is dropped first; it carries
/// nothing a path query can see.
pub fn parse_document(text: &str) -> std::result::Result<Package, String> {
    sxd_document::parser::parse(&strip_doctype(text)).map_err(|e| format!("invalid XML: {:?}", e))
}

fn strip_doctype(text: &str) -> String {
    let Some(start) = text.find("<!DOCTYPE") else {
        return text.to_string();
    };

    let mut depth = 0usize;
    for (offset, c) in text[start..].char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '>' if depth == 0 => {
                let end = start + offset + 1;
                return format!("{}{}", &text[..start], &text[end..]);
            }
            _ => {}
        }
    }
    text.to_string()
}

/// A path query checked for syntax errors when it is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    source: String,
}

impl XPath {
    pub fn compile(source: &str) -> Result<Self> {
        let invalid =
            |msg: String| DescriptorError::Configuration(format!("invalid path query '{}': {}", source, msg));

        if source.trim().is_empty() {
            return Err(invalid("empty expression".to_string()));
        }
        if let Err(e) = Factory::new().build(source) {
            return Err(invalid(format!("{:?}", e)));
        }

        Ok(Self {
            source: source.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against `package` with the document root as context node.
    pub fn evaluate(&self, package: &Package) -> Result<PathValue> {
        let document = package.as_document();
        let value = sxd_xpath::evaluate_xpath(&document, &self.source).map_err(|e| {
            DescriptorError::Configuration(format!(
                "path query '{}' cannot be evaluated: {:?}",
                self.source, e
            ))
        })?;

        Ok(match value {
            Value::Nodeset(nodes) => {
                let nodes = nodes.document_order();
                match nodes.as_slice() {
                    [node] if is_value_node(node) => PathValue::Text(node.string_value()),
                    _ => PathValue::Nodes(
                        nodes
                            .iter()
                            .map(|node| MatchedNode {
                                name: node_name(node),
                                text: node.string_value(),
                            })
                            .collect(),
                    ),
                }
            }
            Value::String(text) => PathValue::Text(text),
            Value::Number(n) => PathValue::Number(n),
            Value::Boolean(b) => PathValue::Boolean(b),
        })
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Text and attribute nodes, and elements holding nothing but text.
fn is_value_node(node: &Node<'_>) -> bool {
    match node {
        Node::Text(_) | Node::Attribute(_) => true,
        Node::Element(element) => element
            .children()
            .iter()
            .all(|child| matches!(child, ChildOfElement::Text(_))),
        _ => false,
    }
}

fn node_name(node: &Node<'_>) -> String {
    node.expanded_name()
        .map(|name| name.local_part().to_string())
        .unwrap_or_default()
}

/// Render a number the way XPath's `string()` does: integral values have no
/// fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
