//! Runtime access to live objects.
//!
//! The serializer never touches host objects directly. Everything it needs
//! (reading members, enumerating items, creating instances when loading) goes
//! through a [`XamlRuntime`]. [`DynRuntime`](crate::DynRuntime) is a complete
//! table-driven implementation over [`DynObject`](crate::DynObject).

use crate::error::Result;
use crate::schema::{XamlMember, XamlType, XamlTypeName};
use crate::value::{Instance, Value};

/// An attached property value stored on an instance.
#[derive(Clone, Debug, PartialEq)]
pub struct AttachedValue {
    pub declaring_type: XamlTypeName,
    pub name: String,
    pub value: Value,
}

impl AttachedValue {
    pub fn new(declaring_type: XamlTypeName, name: &str, value: impl Into<Value>) -> Self {
        AttachedValue {
            declaring_type,
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Runtime capability over host objects.
///
/// Errors returned from these methods are never treated as "try the next
/// conversion path"; they abort the run.
pub trait XamlRuntime {
    /// The registered type of `instance`.
    fn type_of(&self, instance: &Instance) -> Result<XamlTypeName>;

    fn get_value(&self, instance: &Instance, member: &XamlMember) -> Result<Value>;

    fn set_value(&self, instance: &Instance, member: &XamlMember, value: Value) -> Result<()>;

    /// Items of a collection or array, in order.
    fn items(&self, instance: &Instance) -> Result<Vec<Value>>;

    /// Entries of a dictionary, in order.
    fn entries(&self, instance: &Instance) -> Result<Vec<(Value, Value)>>;

    fn add(&self, collection: &Instance, item: Value) -> Result<()>;

    fn add_entry(&self, dictionary: &Instance, key: Value, value: Value) -> Result<()>;

    fn attached_properties(&self, instance: &Instance) -> Result<Vec<AttachedValue>>;

    fn set_attached(&self, instance: &Instance, member: &XamlMember, value: Value) -> Result<()>;

    /// A per-member `ShouldSerialize` predicate; `None` defers to the
    /// default-value policy.
    fn should_serialize(&self, _instance: &Instance, _member: &XamlMember) -> Option<bool> {
        None
    }

    /// Creates an instance through the default constructor (no arguments) or
    /// the constructor whose arity matches `arguments`.
    fn create_instance(&self, xaml_type: &XamlType, arguments: Vec<Value>) -> Result<Value>;

    fn invoke_factory(
        &self,
        xaml_type: &XamlType,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Value>;
}
