//! Reading an object graph as a node stream.
//!
//! [`ObjectReader`] walks a live object graph and yields the nodes a markup
//! writer needs to reproduce it:
//!
//! - **Text conversion**: values with a value serializer or type converter
//!   collapse to a single `Value` node
//! - **Attributable members**: markup extensions whose members are all
//!   inline are ordered so they fit on one attribute
//! - **Shared objects**: repeated objects become `x:Reference` to a
//!   generated `__ReferenceID{n}` name
//! - **Hoisted namespaces**: every declaration precedes the first object
//!
//! ## Usage
//!
//! ```rust
//! use xaml_stream::{DynRuntime, NodeType, ObjectReader, SchemaContext, Value};
//!
//! let schema = SchemaContext::new();
//! let runtime = DynRuntime::new();
//! let mut reader = ObjectReader::new(&Value::from(1), &schema, &runtime).unwrap();
//!
//! assert!(reader.read().unwrap());
//! assert_eq!(reader.node_type(), NodeType::NamespaceDeclaration);
//! assert!(reader.read().unwrap());
//! assert_eq!(reader.node_type(), NodeType::StartObject);
//! assert_eq!(reader.instance(), Some(&Value::from(1)));
//! ```

use crate::build::build_tree;
use crate::context::SerializerContext;
use crate::error::{Error, Result};
use crate::markup::{Markup, MarkupArena, RecordId};
use crate::node::{Node, NodeType};
use crate::options::ObjectReaderSettings;
use crate::runtime::XamlRuntime;
use crate::schema::SchemaContext;
use crate::value::Value;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReaderState {
    Reading,
    Eof,
    Closed,
}

/// Pull reader over an object graph.
///
/// The graph is analyzed up front, so every error the graph can produce is
/// reported by the constructor. Reading itself only fails after
/// [`close`](ObjectReader::close).
pub struct ObjectReader {
    arena: MarkupArena,
    stack: Vec<Markup>,
    current: Node,
    current_record: Option<RecordId>,
    state: ReaderState,
}

impl ObjectReader {
    pub fn new(root: &Value, schema: &SchemaContext, runtime: &dyn XamlRuntime) -> Result<Self> {
        Self::with_settings(root, schema, runtime, &ObjectReaderSettings::default())
    }

    pub fn with_settings(
        root: &Value,
        schema: &SchemaContext,
        runtime: &dyn XamlRuntime,
        settings: &ObjectReaderSettings,
    ) -> Result<Self> {
        let ctx = SerializerContext::new(schema, runtime, settings);
        let tree = build_tree(ctx, root)?;

        let mut stack = Vec::with_capacity(tree.namespaces.len() + 1);
        stack.push(tree.root);
        stack.extend(tree.namespaces.into_iter().rev().map(Markup::Namespace));
        Ok(ObjectReader {
            arena: tree.arena,
            stack,
            current: Node::StartOfStream,
            current_record: None,
            state: ReaderState::Reading,
        })
    }

    /// Advances to the next node. Returns `false` once the stream is
    /// exhausted, and keeps returning `false` afterwards.
    pub fn read(&mut self) -> Result<bool> {
        match self.state {
            ReaderState::Closed => return Err(Error::ReaderClosed),
            ReaderState::Eof => return Ok(false),
            ReaderState::Reading => {}
        }
        while let Some(markup) = self.stack.pop() {
            let expansion = self.arena.decompose(markup);
            self.stack.extend(expansion.children.into_iter().rev());
            if let Some(node) = expansion.node {
                trace!(node = %node, "read");
                self.current = node;
                self.current_record = expansion.record;
                return Ok(true);
            }
        }
        self.current = Node::EndOfStream;
        self.current_record = None;
        self.state = ReaderState::Eof;
        Ok(false)
    }

    /// The current node. `StartOfStream` before the first read.
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.current
    }

    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.current.node_type()
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.state != ReaderState::Reading
    }

    /// The object behind the current `StartObject`.
    #[must_use]
    pub fn instance(&self) -> Option<&Value> {
        match (&self.current, self.current_record) {
            (Node::StartObject(_), Some(id)) => Some(&self.arena.get(id).source),
            _ => None,
        }
    }

    /// Releases the tree. Further reads fail with [`Error::ReaderClosed`].
    pub fn close(&mut self) {
        self.stack.clear();
        self.arena = MarkupArena::default();
        self.current = Node::EndOfStream;
        self.current_record = None;
        self.state = ReaderState::Closed;
    }
}

impl Iterator for ObjectReader {
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ReaderState::Closed {
            return None;
        }
        match self.read() {
            Ok(true) => Some(Ok(self.current.clone())),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
