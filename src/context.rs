//! State shared by one object-reader run.
//!
//! [`SerializerContext`] owns the markup arena, the reference tables and the
//! namespace map while the tree is built, and decides how each value is
//! encoded. It also serves as the [`NameService`] handed to converters.
//!
//! Conversion precedence for a value, first match wins:
//!
//! 1. already recorded in the reference table: an `x:Reference`
//! 2. a deferring loader: its sub-stream, spliced in as-is
//! 3. a value serializer (when a type converter is also present): text
//! 4. a type converter producing a markup extension: that extension
//! 5. a type value: `x:Type`
//! 6. a type converter that round-trips through text: text
//! 7. a string: the string
//! 8. anything else: full member enumeration

use crate::convert::{ConvertError, NameService, TypeConverter, ValueSerializer};
use crate::error::{Error, Result};
use crate::markup::{MarkupArena, RecordId};
use crate::node::{NamespaceDeclaration, Node};
use crate::options::ObjectReaderSettings;
use crate::references::{Checkpoint, ReferenceTables, TableId};
use crate::runtime::XamlRuntime;
use crate::schema::{SchemaContext, Visibility, XamlMember, XamlType, XamlTypeName, XAML_NAMESPACE};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::debug;

/// How a value will be written.
pub(crate) enum Conversion {
    Reference(RecordId),
    Deferred(Vec<Node>),
    Text(String),
    MarkupExtension(Value),
    TypeValue(XamlTypeName),
    Object,
}

/// A name scope whose members are built after the first pass.
pub(crate) struct PendingScope {
    pub(crate) record: RecordId,
    pub(crate) table: TableId,
    pub(crate) value: Value,
    pub(crate) xaml_type: XamlType,
}

/// Undo marker for a speculative build step.
pub(crate) struct Attempt {
    tables: Checkpoint,
    scopes: usize,
    names: usize,
}

pub(crate) struct SerializerContext<'a> {
    pub(crate) schema: &'a SchemaContext,
    pub(crate) runtime: &'a dyn XamlRuntime,
    pub(crate) settings: &'a ObjectReaderSettings,
    pub(crate) arena: MarkupArena,
    pub(crate) tables: ReferenceTables,
    pub(crate) current_table: TableId,
    pub(crate) pending_scopes: VecDeque<PendingScope>,
    namespaces: IndexMap<String, String>,
    next_reference_id: usize,
    is_root: bool,
    /// Previous `(name, needs_name)` of records touched by naming.
    name_journal: Vec<(RecordId, Option<String>, bool)>,
}

impl<'a> SerializerContext<'a> {
    pub(crate) fn new(
        schema: &'a SchemaContext,
        runtime: &'a dyn XamlRuntime,
        settings: &'a ObjectReaderSettings,
    ) -> Self {
        let tables = ReferenceTables::new();
        let current_table = tables.root();
        SerializerContext {
            schema,
            runtime,
            settings,
            arena: MarkupArena::default(),
            tables,
            current_table,
            pending_scopes: VecDeque::new(),
            namespaces: IndexMap::new(),
            next_reference_id: 0,
            is_root: true,
            name_journal: Vec::new(),
        }
    }

    pub(crate) fn is_root(&self) -> bool {
        self.is_root
    }

    /// Runs `f` for a value nested below the current object.
    pub(crate) fn descend<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let was_root = std::mem::replace(&mut self.is_root, false);
        let result = f(self);
        self.is_root = was_root;
        result
    }

    fn allocate_name(&mut self) -> String {
        let name = format!("__ReferenceID{}", self.next_reference_id);
        self.next_reference_id += 1;
        name
    }

    pub(crate) fn set_name_state(&mut self, id: RecordId, name: Option<String>, needs_name: bool) {
        let record = self.arena.get_mut(id);
        self.name_journal
            .push((id, record.name.clone(), record.needs_name));
        record.name = name;
        record.needs_name = needs_name;
    }

    /// Marks `id` as the target of a reference; the name is assigned once
    /// the whole tree is known.
    pub(crate) fn request_name(&mut self, id: RecordId) {
        let name = self.arena.get(id).name.clone();
        self.set_name_state(id, name, true);
    }

    /// Gives every referenced record a name.
    pub(crate) fn assign_reference_names(&mut self) {
        let ids: Vec<RecordId> = self.arena.ids().collect();
        for id in ids {
            let record = self.arena.get(id);
            if record.needs_name && record.name.is_none() {
                let name = self.allocate_name();
                debug!(name = %name, "assigned reference name");
                self.arena.get_mut(id).name = Some(name);
            }
        }
    }

    pub(crate) fn begin_attempt(&self) -> Attempt {
        Attempt {
            tables: self.tables.checkpoint(),
            scopes: self.pending_scopes.len(),
            names: self.name_journal.len(),
        }
    }

    pub(crate) fn rollback(&mut self, attempt: Attempt) {
        self.tables.rollback(attempt.tables);
        self.pending_scopes.truncate(attempt.scopes);
        while self.name_journal.len() > attempt.names {
            if let Some((id, name, needs_name)) = self.name_journal.pop() {
                let record = self.arena.get_mut(id);
                record.name = name;
                record.needs_name = needs_name;
            }
        }
    }

    /// Maps the root object's namespace to the empty prefix.
    pub(crate) fn reserve_default_prefix(&mut self, namespace: &str) {
        if namespace != XAML_NAMESPACE && !self.namespaces.contains_key(namespace) {
            self.namespaces
                .insert(namespace.to_string(), String::new());
        }
    }

    /// The prefix for `namespace`, allocating one on first use.
    pub(crate) fn find_prefix(&mut self, namespace: &str) -> String {
        if let Some(prefix) = self.namespaces.get(namespace) {
            return prefix.clone();
        }
        let base = match self.schema.preferred_prefix(namespace) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => "ns".to_string(),
        };
        let taken = |candidate: &str, map: &IndexMap<String, String>| {
            map.values().any(|p| p == candidate)
        };
        let mut prefix = base.clone();
        let mut suffix = 1;
        while taken(&prefix, &self.namespaces) {
            prefix = format!("{}{}", base, suffix);
            suffix += 1;
        }
        self.namespaces
            .insert(namespace.to_string(), prefix.clone());
        prefix
    }

    /// `prefix:Name`, or just `Name` under the empty prefix.
    pub(crate) fn prefixed_name(&mut self, name: &XamlTypeName) -> String {
        let prefix = self.find_prefix(&name.namespace);
        if prefix.is_empty() {
            name.name.clone()
        } else {
            format!("{}:{}", prefix, name.name)
        }
    }

    /// All declarations, in descending prefix order.
    pub(crate) fn namespace_declarations(&self) -> Vec<NamespaceDeclaration> {
        let mut decls: Vec<NamespaceDeclaration> = self
            .namespaces
            .iter()
            .map(|(ns, prefix)| NamespaceDeclaration::new(ns, prefix))
            .collect();
        decls.sort_by(|a, b| b.prefix.cmp(&a.prefix));
        decls
    }

    fn in_local_assembly(&self, xaml_type: &XamlType) -> bool {
        match (xaml_type.assembly(), self.settings.local_assembly.as_deref()) {
            (Some(own), Some(local)) => own == local,
            _ => false,
        }
    }

    pub(crate) fn type_visible(&self, xaml_type: &XamlType) -> bool {
        xaml_type.is_public() || self.in_local_assembly(xaml_type)
    }

    pub(crate) fn accessor_visible(&self, visibility: Visibility, owner: &XamlType) -> bool {
        match visibility {
            Visibility::Public => true,
            Visibility::Internal => self.in_local_assembly(owner),
            Visibility::Protected => self.is_root && self.settings.allow_protected_members_on_root,
            Visibility::Private => false,
        }
    }

    pub(crate) fn is_writable(&self, member: &XamlMember, owner: &XamlType) -> bool {
        member
            .setter()
            .map_or(false, |v| self.accessor_visible(v, owner))
    }

    /// Applies the conversion precedence to `value`.
    pub(crate) fn convert(
        &mut self,
        value: &Value,
        member: Option<&XamlMember>,
        xaml_type: &XamlType,
    ) -> Result<Conversion> {
        if let Some(id) = value.identity() {
            if let Some(record) = self.tables.find(self.current_table, id) {
                debug!(type_name = %xaml_type.type_name(), "writing shared object as reference");
                return Ok(Conversion::Reference(record));
            }
        }

        let loader = member
            .and_then(XamlMember::deferring_loader)
            .or_else(|| xaml_type.deferring_loader())
            .cloned();
        if let Some(loader) = loader {
            match loader.save(value, self) {
                Ok(nodes) => return Ok(Conversion::Deferred(nodes)),
                Err(err) => {
                    recover::<()>(err, "deferring loader")?;
                }
            }
        }

        let converter = member
            .and_then(XamlMember::type_converter)
            .or_else(|| xaml_type.type_converter())
            .cloned();
        let serializer = member
            .and_then(XamlMember::value_serializer)
            .or_else(|| xaml_type.value_serializer())
            .cloned();

        if let (Some(serializer), Some(_)) = (&serializer, &converter) {
            if let Some(text) = self.try_value_serialize(serializer, value)? {
                return Ok(Conversion::Text(text));
            }
        }
        if let Some(converter) = &converter {
            match converter.to_markup_extension(value) {
                Ok(Some(extension)) => {
                    debug!(type_name = %xaml_type.type_name(), "converted to markup extension");
                    return Ok(Conversion::MarkupExtension(extension));
                }
                Ok(None) => {}
                Err(err) => {
                    recover::<()>(err, "markup extension conversion")?;
                }
            }
        }
        if let Value::Type(name) = value {
            return Ok(Conversion::TypeValue(name.clone()));
        }
        if let Some(converter) = &converter {
            if let Some(text) = self.try_type_convert(converter, value)? {
                return Ok(Conversion::Text(text));
            }
        }
        if let Value::String(text) = value {
            return Ok(Conversion::Text(text.clone()));
        }
        Ok(Conversion::Object)
    }

    fn try_value_serialize(
        &mut self,
        serializer: &Rc<dyn ValueSerializer>,
        value: &Value,
    ) -> Result<Option<String>> {
        if !serializer.can_convert_to_string(value, self) {
            return Ok(None);
        }
        match serializer.convert_to_string(value, self) {
            Ok(text) if serializer.can_convert_from_string(&text) => Ok(Some(text)),
            Ok(_) => Ok(None),
            Err(err) => recover(err, "value serializer"),
        }
    }

    fn try_type_convert(
        &mut self,
        converter: &Rc<dyn TypeConverter>,
        value: &Value,
    ) -> Result<Option<String>> {
        if !converter.can_convert_to_string(value) || !converter.can_convert_from_string() {
            return Ok(None);
        }
        match converter.convert_to_string(value, self) {
            Ok(text) => Ok(Some(text)),
            Err(err) => recover(err, "type converter"),
        }
    }
}

/// Critical faults abort; recoverable ones mean "try the next path".
pub(crate) fn recover<T>(err: ConvertError, path: &str) -> Result<Option<T>> {
    if err.is_critical() {
        return Err(Error::conversion(err));
    }
    debug!(path, error = %err, "conversion path declined");
    Ok(None)
}

impl SerializerContext<'_> {
    /// The non-empty string held by the value's runtime-name member.
    fn runtime_name(&self, value: &Value) -> Option<String> {
        let instance = value.as_instance()?;
        let xaml_type = self.schema.type_of(value, self.runtime).ok()?;
        let member = xaml_type.member(xaml_type.runtime_name_property()?)?;
        match self.runtime.get_value(instance, member) {
            Ok(Value::String(name)) if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

impl NameService for SerializerContext<'_> {
    fn reference_name(&mut self, value: &Value) -> Option<String> {
        let id = value.identity()?;
        if let Some(record) = self.tables.find(self.current_table, id) {
            let name = match self.arena.get(record).name.clone() {
                Some(name) => name,
                None => self
                    .runtime_name(value)
                    .unwrap_or_else(|| self.allocate_name()),
            };
            self.set_name_state(record, Some(name.clone()), true);
            return Some(name);
        }
        if let Some(name) = self.tables.find_in_pending(self.current_table, id) {
            return Some(name.to_string());
        }
        let name = self
            .runtime_name(value)
            .unwrap_or_else(|| self.allocate_name());
        debug!(name = %name, "name requested before object was visited");
        self.tables
            .add_to_pending(self.current_table, id, name.clone());
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::DynRuntime;
    use crate::markup::ObjectRecord;
    use crate::value::Instance;

    #[test]
    fn test_prefix_collisions_get_numeric_suffix() {
        let mut schema = SchemaContext::new();
        schema.set_preferred_prefix("urn:a", "c");
        schema.set_preferred_prefix("urn:b", "c");
        let runtime = DynRuntime::new();
        let settings = ObjectReaderSettings::default();
        let mut ctx = SerializerContext::new(&schema, &runtime, &settings);

        assert_eq!(ctx.find_prefix("urn:a"), "c");
        assert_eq!(ctx.find_prefix("urn:b"), "c1");
        assert_eq!(ctx.find_prefix("urn:unknown"), "ns");
        assert_eq!(ctx.find_prefix("urn:a"), "c");
    }

    #[test]
    fn test_declarations_sort_descending() {
        let schema = SchemaContext::new();
        let runtime = DynRuntime::new();
        let settings = ObjectReaderSettings::default();
        let mut ctx = SerializerContext::new(&schema, &runtime, &settings);
        ctx.reserve_default_prefix("urn:root");
        ctx.find_prefix(XAML_NAMESPACE);
        ctx.find_prefix("urn:other");

        let prefixes: Vec<_> = ctx
            .namespace_declarations()
            .into_iter()
            .map(|d| d.prefix)
            .collect();
        assert_eq!(prefixes, ["x", "ns", ""]);
    }

    #[test]
    fn test_reference_name_is_stable_and_pending() {
        let schema = SchemaContext::new();
        let runtime = DynRuntime::new();
        let settings = ObjectReaderSettings::default();
        let mut ctx = SerializerContext::new(&schema, &runtime, &settings);
        let value = Value::Object(Instance::new(5u32));

        let first = ctx.reference_name(&value).unwrap();
        assert_eq!(first, "__ReferenceID0");
        assert_eq!(ctx.reference_name(&value).unwrap(), first);
        assert_eq!(ctx.reference_name(&Value::from(1)), None);
    }

    #[test]
    fn test_rollback_restores_name_state() {
        let schema = SchemaContext::new();
        let runtime = DynRuntime::new();
        let settings = ObjectReaderSettings::default();
        let mut ctx = SerializerContext::new(&schema, &runtime, &settings);
        let null = schema.xaml_type("Null").unwrap();
        let id = ctx.arena.alloc(ObjectRecord::start(null, Value::Null));

        let attempt = ctx.begin_attempt();
        ctx.request_name(id);
        assert!(ctx.arena.get(id).needs_name);
        ctx.rollback(attempt);
        assert!(!ctx.arena.get(id).needs_name);
    }
}
