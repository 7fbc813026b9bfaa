//! The node stream: one atomic step of a serialized object graph.
//!
//! A well-formed stream opens with its namespace declarations, then balances
//! every `StartObject`/`GetObject` with an `EndObject` and every
//! `StartMember` with an `EndMember`. `Value` and `GetObject` only occur
//! directly inside a member.
//!
//! ```text
//! NamespaceDeclaration(x = http://schemas.microsoft.com/winfx/2006/xaml)
//! StartObject(x:Int32)
//!   StartMember(x:_Initialization)
//!     Value("1")
//!   EndMember
//! EndObject
//! ```
//!
//! `StartOfStream`, `EndOfStream`, `EndOfAttributes` and `LineInfo` are
//! internal sentinels; [`Node::node_type`] reports them as
//! [`NodeType::None`].

use crate::schema::{XamlMember, XamlType};
use crate::value::Value;
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;

/// A prefix-to-namespace mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamespaceDeclaration {
    pub namespace: String,
    pub prefix: String,
}

impl NamespaceDeclaration {
    pub fn new(namespace: &str, prefix: &str) -> Self {
        NamespaceDeclaration {
            namespace: namespace.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

/// Position in source markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LineInfo {
    pub line: usize,
    pub column: usize,
}

/// The externally visible kind of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeType {
    None,
    StartObject,
    GetObject,
    EndObject,
    StartMember,
    EndMember,
    Value,
    NamespaceDeclaration,
}

/// One step of the stream.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Node {
    NamespaceDeclaration(NamespaceDeclaration),
    StartObject(XamlType),
    /// Use the existing instance held by the enclosing member.
    GetObject,
    EndObject,
    StartMember(XamlMember),
    EndMember,
    Value(Value),
    StartOfStream,
    EndOfStream,
    EndOfAttributes,
    LineInfo(LineInfo),
}

impl Node {
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::NamespaceDeclaration(_) => NodeType::NamespaceDeclaration,
            Node::StartObject(_) => NodeType::StartObject,
            Node::GetObject => NodeType::GetObject,
            Node::EndObject => NodeType::EndObject,
            Node::StartMember(_) => NodeType::StartMember,
            Node::EndMember => NodeType::EndMember,
            Node::Value(_) => NodeType::Value,
            Node::StartOfStream | Node::EndOfStream | Node::EndOfAttributes | Node::LineInfo(_) => {
                NodeType::None
            }
        }
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Node::EndOfStream)
    }

    #[must_use]
    pub fn xaml_type(&self) -> Option<&XamlType> {
        match self {
            Node::StartObject(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn member(&self) -> Option<&XamlMember> {
        match self {
            Node::StartMember(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Node::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&NamespaceDeclaration> {
        match self {
            Node::NamespaceDeclaration(ns) => Some(ns),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::NamespaceDeclaration(ns) => {
                write!(f, "NamespaceDeclaration({} = {})", ns.prefix, ns.namespace)
            }
            Node::StartObject(t) => write!(f, "StartObject({:?})", t),
            Node::GetObject => write!(f, "GetObject"),
            Node::EndObject => write!(f, "EndObject"),
            Node::StartMember(m) => write!(f, "StartMember({:?})", m),
            Node::EndMember => write!(f, "EndMember"),
            Node::Value(v) => write!(f, "Value({})", v),
            Node::StartOfStream => write!(f, "StartOfStream"),
            Node::EndOfStream => write!(f, "EndOfStream"),
            Node::EndOfAttributes => write!(f, "EndOfAttributes"),
            Node::LineInfo(li) => write!(f, "LineInfo({}, {})", li.line, li.column),
        }
    }
}

/// Renders a node sequence one node per line, indented by nesting depth.
///
/// # Examples
///
/// ```rust
/// use xaml_stream::{format_nodes, Node, Value};
///
/// let text = format_nodes(&[Node::Value(Value::from("a"))]);
/// assert_eq!(text, "Value(\"a\")\n");
/// ```
#[must_use]
pub fn format_nodes(nodes: &[Node]) -> String {
    let mut out = String::with_capacity(nodes.len() * 24);
    let mut depth = 0usize;
    for node in nodes {
        if matches!(node, Node::EndObject | Node::EndMember) {
            depth = depth.saturating_sub(1);
        }
        let _ = writeln!(out, "{:indent$}{}", "", node, indent = depth * 2);
        if matches!(
            node,
            Node::StartObject(_) | Node::GetObject | Node::StartMember(_)
        ) {
            depth += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Directive, SchemaContext};

    #[test]
    fn test_internal_nodes_have_no_type() {
        assert_eq!(Node::EndOfStream.node_type(), NodeType::None);
        assert_eq!(
            Node::LineInfo(LineInfo { line: 1, column: 2 }).node_type(),
            NodeType::None
        );
        assert_eq!(Node::GetObject.node_type(), NodeType::GetObject);
    }

    #[test]
    fn test_format_nodes_indents() {
        let schema = SchemaContext::new();
        let nodes = vec![
            Node::StartObject(schema.xaml_type("Int32").unwrap()),
            Node::StartMember(XamlMember::directive(Directive::Initialization)),
            Node::Value(Value::from("1")),
            Node::EndMember,
            Node::EndObject,
        ];
        let text = format_nodes(&nodes);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[1], "  StartMember(x:_Initialization)");
        assert_eq!(lines[2], "    Value(\"1\")");
        assert_eq!(lines[4], "EndObject");
    }
}
