//! A table-driven object model and the runtime that drives it.
//!
//! [`DynObject`] stores its members in a [`MemberMap`] plus ordered items,
//! dictionary entries and attached values, all behind interior mutability so
//! a shared [`Instance`] can be filled in by the writer. [`DynRuntime`]
//! implements [`XamlRuntime`] over it.
//!
//! ```rust
//! use xaml_stream::{DynObject, DynRuntime, XamlRuntime, XamlTypeName};
//!
//! let list = DynObject::new(XamlTypeName::new("urn:app", "IntList"))
//!     .with_member("Capacity", 4)
//!     .with_items([1, 2, 3]);
//! let value = list.into_value();
//!
//! let runtime = DynRuntime::new();
//! let instance = value.as_instance().unwrap();
//! assert_eq!(runtime.items(instance).unwrap().len(), 3);
//! ```

use crate::error::{Error, Result};
use crate::map::MemberMap;
use crate::runtime::{AttachedValue, XamlRuntime};
use crate::schema::{XamlMember, XamlType, XamlTypeName};
use crate::value::{Instance, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// An object described entirely by data.
pub struct DynObject {
    type_name: XamlTypeName,
    members: RefCell<MemberMap>,
    items: RefCell<Vec<Value>>,
    entries: RefCell<Vec<(Value, Value)>>,
    attached: RefCell<Vec<AttachedValue>>,
}

impl DynObject {
    pub fn new(type_name: XamlTypeName) -> Self {
        DynObject {
            type_name,
            members: RefCell::new(MemberMap::new()),
            items: RefCell::new(Vec::new()),
            entries: RefCell::new(Vec::new()),
            attached: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &XamlTypeName {
        &self.type_name
    }

    #[must_use]
    pub fn with_member(self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    #[must_use]
    pub fn with_items<I, V>(self, items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.items
            .borrow_mut()
            .extend(items.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_entry(self, key: impl Into<Value>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_attached(self, attached: AttachedValue) -> Self {
        self.attach(attached);
        self
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        self.members
            .borrow_mut()
            .insert(name.to_string(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.members.borrow().get(name).cloned()
    }

    pub fn push(&self, item: impl Into<Value>) {
        self.items.borrow_mut().push(item.into());
    }

    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) {
        self.entries.borrow_mut().push((key.into(), value.into()));
    }

    /// Sets an attached value, replacing one with the same owner and name.
    pub fn attach(&self, attached: AttachedValue) {
        let mut list = self.attached.borrow_mut();
        match list
            .iter_mut()
            .find(|a| a.declaring_type == attached.declaring_type && a.name == attached.name)
        {
            Some(slot) => slot.value = attached.value,
            None => list.push(attached),
        }
    }

    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.entries.borrow().clone()
    }

    #[must_use]
    pub fn attached(&self) -> Vec<AttachedValue> {
        self.attached.borrow().clone()
    }

    #[must_use]
    pub fn members(&self) -> MemberMap {
        self.members.borrow().clone()
    }

    /// Wraps the object in a fresh identity.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(Instance::new(self))
    }
}

impl fmt::Debug for DynObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynObject")
            .field("type_name", &self.type_name)
            .field("members", &self.members.borrow())
            .field("items", &self.items.borrow().len())
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}

type Factory = Box<dyn Fn(Vec<Value>) -> Result<Value>>;
type Predicate = Box<dyn Fn(&DynObject) -> bool>;

/// [`XamlRuntime`] over [`DynObject`] instances.
///
/// Constructors map arguments onto the members annotated with the matching
/// constructor parameter. Factory methods and `ShouldSerialize` predicates
/// are registered as closures.
#[derive(Default)]
pub struct DynRuntime {
    factories: HashMap<(XamlTypeName, String), Factory>,
    predicates: HashMap<(XamlTypeName, String), Predicate>,
}

impl DynRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `method` as a factory on `owner`.
    #[must_use]
    pub fn with_factory<F>(mut self, owner: XamlTypeName, method: &str, factory: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value> + 'static,
    {
        self.factories
            .insert((owner, method.to_string()), Box::new(factory));
        self
    }

    /// Registers a `ShouldSerialize` predicate for one member of `owner`.
    #[must_use]
    pub fn with_should_serialize<F>(mut self, owner: XamlTypeName, member: &str, predicate: F) -> Self
    where
        F: Fn(&DynObject) -> bool + 'static,
    {
        self.predicates
            .insert((owner, member.to_string()), Box::new(predicate));
        self
    }

    fn object<'i>(&self, instance: &'i Instance) -> Result<&'i DynObject> {
        instance
            .downcast_ref::<DynObject>()
            .ok_or_else(|| Error::runtime(format!("{:?} is not a DynObject", instance)))
    }
}

impl XamlRuntime for DynRuntime {
    fn type_of(&self, instance: &Instance) -> Result<XamlTypeName> {
        Ok(self.object(instance)?.type_name.clone())
    }

    fn get_value(&self, instance: &Instance, member: &XamlMember) -> Result<Value> {
        let object = self.object(instance)?;
        Ok(object
            .get(member.name())
            .or_else(|| member.default_value().cloned())
            .unwrap_or_default())
    }

    fn set_value(&self, instance: &Instance, member: &XamlMember, value: Value) -> Result<()> {
        self.object(instance)?.set(member.name(), value);
        Ok(())
    }

    fn items(&self, instance: &Instance) -> Result<Vec<Value>> {
        Ok(self.object(instance)?.items())
    }

    fn entries(&self, instance: &Instance) -> Result<Vec<(Value, Value)>> {
        Ok(self.object(instance)?.entries())
    }

    fn add(&self, collection: &Instance, item: Value) -> Result<()> {
        self.object(collection)?.push(item);
        Ok(())
    }

    fn add_entry(&self, dictionary: &Instance, key: Value, value: Value) -> Result<()> {
        self.object(dictionary)?.insert(key, value);
        Ok(())
    }

    fn attached_properties(&self, instance: &Instance) -> Result<Vec<AttachedValue>> {
        // Only dynamic objects carry attached storage.
        Ok(instance
            .downcast_ref::<DynObject>()
            .map(DynObject::attached)
            .unwrap_or_default())
    }

    fn set_attached(&self, instance: &Instance, member: &XamlMember, value: Value) -> Result<()> {
        self.object(instance)?.attach(AttachedValue {
            declaring_type: member.declaring_type().clone(),
            name: member.name().to_string(),
            value,
        });
        Ok(())
    }

    fn should_serialize(&self, instance: &Instance, member: &XamlMember) -> Option<bool> {
        let object = instance.downcast_ref::<DynObject>()?;
        let predicate = self
            .predicates
            .get(&(object.type_name.clone(), member.name().to_string()))?;
        Some(predicate(object))
    }

    fn create_instance(&self, xaml_type: &XamlType, arguments: Vec<Value>) -> Result<Value> {
        let object = DynObject::new(xaml_type.type_name().clone());
        if arguments.is_empty() {
            return Ok(object.into_value());
        }

        let constructor = xaml_type
            .constructors()
            .iter()
            .find(|c| c.parameters.len() == arguments.len())
            .ok_or_else(|| Error::NoMatchingConstructor {
                type_name: xaml_type.type_name().clone(),
            })?;
        for (parameter, argument) in constructor.parameters.iter().zip(arguments) {
            let member = xaml_type
                .members()
                .iter()
                .find(|m| m.constructor_argument() == Some(parameter.name.as_str()))
                .ok_or_else(|| Error::unknown_member(xaml_type.type_name(), &parameter.name))?;
            object.set(member.name(), argument);
        }
        Ok(object.into_value())
    }

    fn invoke_factory(
        &self,
        xaml_type: &XamlType,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        let factory = self
            .factories
            .get(&(xaml_type.type_name().clone(), method.to_string()))
            .ok_or_else(|| {
                Error::runtime(format!(
                    "no factory method '{}' registered on {}",
                    method,
                    xaml_type.type_name()
                ))
            })?;
        factory(arguments)
    }
}
