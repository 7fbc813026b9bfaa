//! # xaml_stream
//!
//! Turns a live object graph into a XAML node stream, and a node stream back
//! into objects.
//!
//! ## What is a node stream?
//!
//! A XAML document is a tree of objects and members. A node stream is that
//! tree flattened into atomic steps: `StartObject`, `StartMember`, `Value`,
//! `EndMember`, `EndObject`, plus `NamespaceDeclaration`s up front and
//! `GetObject` for members whose existing value is filled in place. A markup
//! writer turns the stream into text without needing any knowledge of the
//! objects behind it.
//!
//! ## Key Features
//!
//! - **Schema-driven**: types, members, converters and visibility come from a
//!   [`SchemaContext`]; objects are accessed through a [`XamlRuntime`]
//! - **Text conversion**: value serializers, type converters, markup
//!   extensions and deferring loaders, in a fixed precedence
//! - **Shared objects**: repeated and cyclic references become `x:Reference`
//!   to generated names, scoped per name scope
//! - **Deterministic**: the same graph and schema always produce the same
//!   stream
//!
//! ## Quick Start
//!
//! ```rust
//! use xaml_stream::{
//!     dyn_object, to_node_string, DynRuntime, MemberBuilder, SchemaContext, TypeBuilder,
//!     XamlTypeName,
//! };
//!
//! let mut schema = SchemaContext::new();
//! schema.register(
//!     TypeBuilder::new("urn:app", "IntList")
//!         .collection()
//!         .item_type(XamlTypeName::xaml("Int32"))
//!         .member(MemberBuilder::new("Capacity", XamlTypeName::xaml("Int32")))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let list = dyn_object!("urn:app", "IntList", { "Capacity": 4 }, [1, 2]);
//! let text = to_node_string(&list, &schema, &DynRuntime::new()).unwrap();
//! assert!(text.starts_with("NamespaceDeclaration(x = "));
//! assert!(text.contains("StartMember(Capacity)"));
//! assert!(text.contains("StartMember(x:_Items)"));
//! ```
//!
//! ### Pulling nodes one at a time
//!
//! ```rust
//! use xaml_stream::{DynRuntime, Node, ObjectReader, SchemaContext, Value};
//!
//! let schema = SchemaContext::new();
//! let runtime = DynRuntime::new();
//! let mut reader = ObjectReader::new(&Value::from("hi"), &schema, &runtime).unwrap();
//!
//! let mut values = Vec::new();
//! while reader.read().unwrap() {
//!     if let Node::Value(v) = reader.node() {
//!         values.push(v.clone());
//!     }
//! }
//! assert_eq!(values, vec![Value::from("hi")]);
//! ```
//!
//! ### Round trip
//!
//! ```rust
//! use xaml_stream::{from_nodes, to_nodes, DynRuntime, SchemaContext, Value};
//!
//! let schema = SchemaContext::new();
//! let runtime = DynRuntime::new();
//! let nodes = to_nodes(&Value::from(2.5), &schema, &runtime).unwrap();
//! assert_eq!(from_nodes(nodes, &schema, &runtime).unwrap(), Value::from(2.5));
//! ```
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]: `debug` for conversion fallbacks and
//! structural decisions, `warn` for lossy output, `trace` for every node read
//! or written. Install any subscriber to see them.

mod build;
pub mod builtins;
mod context;
pub mod convert;
pub mod de;
pub mod dynamic;
pub mod error;
pub mod macros;
pub mod map;
mod markup;
pub mod node;
pub mod options;
pub mod order;
mod references;
pub mod runtime;
pub mod schema;
pub mod ser;
pub mod value;

pub use builtins::{PrimitiveConverter, PrimitiveKind};
pub use convert::{
    ConvertError, ConvertResult, DeferringLoader, DescriptorMember, InstanceDescriptor,
    NameService, NoNames, TypeConverter, ValueSerializer, XmlSerializer,
};
pub use de::ObjectWriter;
pub use dynamic::{DynObject, DynRuntime};
pub use error::{Error, Result};
pub use map::MemberMap;
pub use node::{format_nodes, LineInfo, NamespaceDeclaration, Node, NodeType};
pub use options::{ObjectReaderSettings, ObjectWriterSettings};
pub use order::PartialOrder;
pub use runtime::{AttachedValue, XamlRuntime};
pub use schema::{
    CollectionKind, ConstructorInfo, Directive, MemberBuilder, MemberKind, ParameterInfo,
    SchemaContext, SerializationVisibility, TypeBuilder, Visibility, XamlMember, XamlType,
    XamlTypeName, XAML_NAMESPACE, XAML_PREFIX,
};
pub use ser::ObjectReader;
pub use value::{Instance, ObjectId, Value};

/// Reads the whole node stream for `root`.
///
/// # Examples
///
/// ```rust
/// use xaml_stream::{to_nodes, DynRuntime, Node, SchemaContext, Value};
///
/// let schema = SchemaContext::new();
/// let nodes = to_nodes(&Value::Null, &schema, &DynRuntime::new()).unwrap();
/// assert!(matches!(nodes.last(), Some(Node::EndObject)));
/// ```
///
/// # Errors
///
/// Returns an error if the graph cannot be represented: an invisible type,
/// a type that cannot round-trip, duplicate names, and so on. No nodes are
/// produced in that case.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_nodes(root: &Value, schema: &SchemaContext, runtime: &dyn XamlRuntime) -> Result<Vec<Node>> {
    to_nodes_with_settings(root, schema, runtime, &ObjectReaderSettings::default())
}

/// Reads the whole node stream for `root` with custom settings.
///
/// # Errors
///
/// Same as [`to_nodes`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_nodes_with_settings(
    root: &Value,
    schema: &SchemaContext,
    runtime: &dyn XamlRuntime,
    settings: &ObjectReaderSettings,
) -> Result<Vec<Node>> {
    ObjectReader::with_settings(root, schema, runtime, settings)?.collect()
}

/// Reads the node stream for `root` as an indented dump, one node per line.
///
/// # Errors
///
/// Same as [`to_nodes`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_node_string(
    root: &Value,
    schema: &SchemaContext,
    runtime: &dyn XamlRuntime,
) -> Result<String> {
    Ok(format_nodes(&to_nodes(root, schema, runtime)?))
}

/// Writes a whole node stream and returns the root object.
///
/// # Errors
///
/// Returns an error for malformed streams, unknown members, failed text
/// conversions and references to names that are never defined.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_nodes<I>(nodes: I, schema: &SchemaContext, runtime: &dyn XamlRuntime) -> Result<Value>
where
    I: IntoIterator<Item = Node>,
{
    from_nodes_with_settings(nodes, schema, runtime, ObjectWriterSettings::default())
}

/// Writes a whole node stream with custom settings.
///
/// # Errors
///
/// Same as [`from_nodes`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_nodes_with_settings<I>(
    nodes: I,
    schema: &SchemaContext,
    runtime: &dyn XamlRuntime,
    settings: ObjectWriterSettings,
) -> Result<Value>
where
    I: IntoIterator<Item = Node>,
{
    let mut writer = ObjectWriter::with_settings(schema, runtime, settings);
    for node in nodes {
        writer.write_node(node)?;
    }
    writer.result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_schema() -> SchemaContext {
        let mut schema = SchemaContext::new();
        schema.register(
            TypeBuilder::new("urn:app", "IntList")
                .collection()
                .item_type(XamlTypeName::xaml("Int32"))
                .member(MemberBuilder::new("Capacity", XamlTypeName::xaml("Int32")))
                .build()
                .unwrap(),
        );
        schema
    }

    #[test]
    fn test_round_trip_collection() {
        let schema = list_schema();
        let runtime = DynRuntime::new();
        let list = dyn_object!("urn:app", "IntList", { "Capacity": 3 }, [1, 2, 3]);

        let nodes = to_nodes(&list, &schema, &runtime).unwrap();
        let back = from_nodes(nodes, &schema, &runtime).unwrap();
        let object = back.as_instance().unwrap().downcast_ref::<DynObject>().unwrap();
        assert_eq!(object.get("Capacity"), Some(Value::Int32(3)));
        assert_eq!(object.items(), vec![Value::from(1), Value::from(2), Value::from(3)]);
    }

    #[test]
    fn test_stream_is_deterministic() {
        let schema = list_schema();
        let runtime = DynRuntime::new();
        let list = dyn_object!("urn:app", "IntList", { "Capacity": 2 }, [5, 6]);
        let first = to_node_string(&list, &schema, &runtime).unwrap();
        let second = to_node_string(&list, &schema, &runtime).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unregistered_type_fails() {
        let schema = SchemaContext::new();
        let runtime = DynRuntime::new();
        let value = dyn_object!("urn:app", "Missing");
        assert!(matches!(
            to_nodes(&value, &schema, &runtime),
            Err(Error::UnknownType(_))
        ));
    }
}
