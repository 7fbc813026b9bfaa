//! Builds the markup tree for an object graph.
//!
//! The walk runs once, eagerly, before the reader emits its first node:
//!
//! 1. the root and everything reachable from it outside nested name scopes
//! 2. each deferred name scope, in discovery order, with its own table layer
//! 3. reference names, then the per-scope duplicate-name check
//! 4. every namespace the tree needs, so declarations can be hoisted

use crate::context::{recover, Conversion, PendingScope, SerializerContext};
use crate::convert::{DescriptorMember, InstanceDescriptor};
use crate::error::{Error, Result};
use crate::markup::{can_unwrap_item, Markup, MarkupArena, MemberRecord, ObjectRecord, RecordId};
use crate::node::{NamespaceDeclaration, Node};
use crate::schema::{
    CollectionKind, Directive, MemberKind, SerializationVisibility, XamlMember, XamlType,
    XamlTypeName,
};
use crate::value::{Instance, Value};
use indexmap::IndexSet;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A fully built tree, ready for traversal.
pub(crate) struct MarkupTree {
    pub(crate) arena: MarkupArena,
    pub(crate) root: Markup,
    pub(crate) namespaces: Vec<NamespaceDeclaration>,
}

/// Builds the tree for `root`, consuming the context.
pub(crate) fn build_tree(mut ctx: SerializerContext<'_>, root: &Value) -> Result<MarkupTree> {
    if let Ok(root_type) = ctx.schema.type_of(root, ctx.runtime) {
        ctx.reserve_default_prefix(root_type.namespace());
    }
    let root_markup = ctx.object_markup(root)?;
    ctx.resume_pending_scopes()?;
    ctx.finalize_names();
    ctx.check_duplicate_names(&root_markup)?;
    ctx.collect_namespaces(&root_markup);

    let namespaces = ctx.namespace_declarations();
    debug!(
        records = ctx.arena.len(),
        namespaces = namespaces.len(),
        "markup tree built"
    );
    Ok(MarkupTree {
        arena: ctx.arena,
        root: root_markup,
        namespaces,
    })
}

enum ConstructionKind {
    Default,
    Arguments,
    Factory,
}

/// Members that tell a loader how to create the object.
struct Construction {
    members: Vec<MemberRecord>,
    /// Properties already supplied as constructor arguments.
    consumed: Vec<String>,
    /// The arguments alone rebuild the object.
    complete: bool,
    kind: ConstructionKind,
}

impl Construction {
    fn default_constructor() -> Self {
        Construction {
            members: Vec::new(),
            consumed: Vec::new(),
            complete: false,
            kind: ConstructionKind::Default,
        }
    }
}

struct ConstructorMatch {
    members: Vec<XamlMember>,
    values: Vec<Value>,
}

fn directive(directive: Directive) -> XamlMember {
    XamlMember::directive(directive)
}

impl SerializerContext<'_> {
    /// Markup for a value written as an object: the root, a collection item
    /// or a constructor argument.
    pub(crate) fn object_markup(&mut self, value: &Value) -> Result<Markup> {
        if value.is_null() {
            return Ok(Markup::Object(self.null_record()?));
        }
        let xaml_type = self.schema.type_of(value, self.runtime)?;
        let markup = match self.convert(value, None, &xaml_type)? {
            Conversion::Reference(target) => Markup::Object(self.reference_record(target)?),
            Conversion::Deferred(nodes) => Markup::Template(nodes),
            Conversion::Text(text) => {
                self.check_no_attached(value, "type-converted value")?;
                self.check_visible(&xaml_type)?;
                let mut record = ObjectRecord::start(xaml_type, value.clone());
                record
                    .members
                    .push(MemberRecord::atomic(directive(Directive::Initialization), text));
                Markup::Object(self.arena.alloc(record))
            }
            Conversion::MarkupExtension(extension) => {
                let extension_type = self.schema.type_of(&extension, self.runtime)?;
                Markup::Object(self.general_record(&extension, &extension_type)?)
            }
            Conversion::TypeValue(name) => Markup::Object(self.type_record(&name, value)?),
            Conversion::Object => Markup::Object(self.general_record(value, &xaml_type)?),
        };
        Ok(markup)
    }

    /// Markup for a value held by `member`.
    pub(crate) fn member_child(&mut self, value: &Value, member: &XamlMember) -> Result<Markup> {
        if value.is_null() {
            return Ok(Markup::Object(self.null_record()?));
        }
        let xaml_type = self.schema.type_of(value, self.runtime)?;
        if let Some(serializer) = xaml_type.xml_serializer() {
            let xml = match serializer.write_xml(value) {
                Ok(xml) => Some(xml),
                Err(err) => recover(err, "xml serializer")?,
            };
            if let Some(xml) = xml {
                return Ok(Markup::Object(self.xdata_record(value, xml)?));
            }
        }
        let markup = match self.convert(value, Some(member), &xaml_type)? {
            Conversion::Reference(target) => Markup::Object(self.reference_record(target)?),
            Conversion::Deferred(nodes) => Markup::Template(nodes),
            Conversion::Text(text) => {
                self.check_no_attached(value, "type-converted value")?;
                Markup::Value(Value::String(text))
            }
            Conversion::MarkupExtension(extension) => {
                let extension_type = self.schema.type_of(&extension, self.runtime)?;
                Markup::Object(self.general_record(&extension, &extension_type)?)
            }
            Conversion::TypeValue(name) => Markup::Object(self.type_record(&name, value)?),
            Conversion::Object => Markup::Object(self.general_record(value, &xaml_type)?),
        };
        Ok(markup)
    }

    fn check_visible(&self, xaml_type: &XamlType) -> Result<()> {
        if self.type_visible(xaml_type) {
            Ok(())
        } else {
            Err(Error::TypeNotVisible(xaml_type.type_name().clone()))
        }
    }

    /// Attached properties need an element of their own to live on.
    fn check_no_attached(&self, value: &Value, position: &str) -> Result<()> {
        let Some(instance) = value.as_instance() else {
            return Ok(());
        };
        match self.runtime.attached_properties(instance)?.first() {
            Some(first) => Err(Error::attached_conflict(
                &format!("{}.{}", first.declaring_type.name, first.name),
                position,
            )),
            None => Ok(()),
        }
    }

    fn null_record(&mut self) -> Result<RecordId> {
        let null = self.schema.xaml_type("Null")?;
        Ok(self.arena.alloc(ObjectRecord::start(null, Value::Null)))
    }

    fn type_record(&mut self, name: &XamlTypeName, source: &Value) -> Result<RecordId> {
        let type_extension = self.schema.xaml_type("Type")?;
        let text = self.prefixed_name(name);
        let mut record = ObjectRecord::start(type_extension, source.clone());
        record
            .members
            .push(MemberRecord::atomic(directive(Directive::PositionalParameters), text));
        Ok(self.arena.alloc(record))
    }

    fn xdata_record(&mut self, value: &Value, xml: String) -> Result<RecordId> {
        let xdata = self.schema.xaml_type("XData")?;
        let text_member = xdata
            .member("Text")
            .cloned()
            .ok_or_else(|| Error::unknown_member(xdata.type_name(), "Text"))?;
        let mut record = ObjectRecord::start(xdata, value.clone());
        record.members.push(MemberRecord::atomic(text_member, xml));
        Ok(self.arena.alloc(record))
    }

    fn reference_record(&mut self, target: RecordId) -> Result<RecordId> {
        self.request_name(target);
        let reference = self.schema.xaml_type("Reference")?;
        let mut record = ObjectRecord::start(reference, Value::Null);
        record.reference_to = Some(target);
        Ok(self.arena.alloc(record))
    }

    /// The general object path: construction, properties, items and
    /// attached properties.
    fn general_record(&mut self, value: &Value, xaml_type: &XamlType) -> Result<RecordId> {
        self.check_visible(xaml_type)?;
        if xaml_type.collection_kind() == CollectionKind::Array {
            return self.array_record(value, xaml_type);
        }

        let id = self
            .arena
            .alloc(ObjectRecord::start(xaml_type.clone(), value.clone()));
        if let Some(object) = value.identity() {
            self.tables.add(self.current_table, object, id);
            let pending = self
                .tables
                .find_in_pending(self.current_table, object)
                .map(str::to_string);
            if let Some(name) = pending {
                debug!(name = %name, "applying name requested by a converter");
                self.set_name_state(id, Some(name), true);
            }
        }

        if xaml_type.is_name_scope() && !self.is_root() {
            let table = self.tables.push_scope(self.current_table);
            self.pending_scopes.push_back(PendingScope {
                record: id,
                table,
                value: value.clone(),
                xaml_type: xaml_type.clone(),
            });
            return Ok(id);
        }
        self.add_record_members(id, value, xaml_type)?;
        Ok(id)
    }

    fn array_record(&mut self, value: &Value, array_type: &XamlType) -> Result<RecordId> {
        if array_type.array_rank() > 1 {
            return Err(Error::MultiDimensionalArray(array_type.type_name().clone()));
        }
        let extension = self.schema.xaml_type("Array")?;
        let type_member = extension
            .member("Type")
            .cloned()
            .ok_or_else(|| Error::unknown_member(extension.type_name(), "Type"))?;

        let id = self
            .arena
            .alloc(ObjectRecord::start(extension, value.clone()));
        if let Some(object) = value.identity() {
            self.tables.add(self.current_table, object, id);
        }

        let item_type = array_type
            .item_type()
            .cloned()
            .unwrap_or_else(|| XamlTypeName::xaml("Object"));
        let type_text = self.prefixed_name(&item_type);
        let mut members = vec![MemberRecord::atomic(type_member, type_text)];
        if let Some(instance) = value.as_instance() {
            let items = self.runtime.items(instance)?;
            if !items.is_empty() {
                let children = self.arguments(&items)?;
                members.push(MemberRecord::new(directive(Directive::Items), children));
            }
        }
        self.arena.get_mut(id).members = members;
        Ok(id)
    }

    fn add_record_members(&mut self, id: RecordId, value: &Value, xaml_type: &XamlType) -> Result<()> {
        let Some(instance) = value.as_instance().cloned() else {
            return Ok(());
        };

        let construction = self.construction_members(&instance, value, xaml_type)?;
        if matches!(construction.kind, ConstructionKind::Default) && !xaml_type.is_constructible() {
            return Err(Error::TypeCannotRoundtrip(xaml_type.type_name().clone()));
        }

        let mut members = construction.members;
        let only_name = construction.complete && !xaml_type.has_items();
        members.extend(self.property_members(
            id,
            &instance,
            xaml_type,
            &construction.consumed,
            only_name,
        )?);
        if xaml_type.has_items() {
            if let Some(items) = self.items_member(value, xaml_type)? {
                members.push(items);
            }
        }
        members.extend(self.attached_members(&instance)?);
        self.arena.get_mut(id).members.extend(members);
        Ok(())
    }

    fn construction_members(
        &mut self,
        instance: &Instance,
        value: &Value,
        xaml_type: &XamlType,
    ) -> Result<Construction> {
        if xaml_type.is_constructible() {
            return Ok(Construction::default_constructor());
        }

        if xaml_type.is_markup_extension() {
            let matched = self.match_constructor(instance, xaml_type)?;
            if let Some(m) = &matched {
                if let Some(children) = self.positional(&m.values, &m.members)? {
                    return Ok(self.from_match(
                        xaml_type,
                        m,
                        directive(Directive::PositionalParameters),
                        children,
                    ));
                }
            }
            if let Some(descriptor) = self.instance_descriptor(value, xaml_type)? {
                return self.from_descriptor(xaml_type, descriptor, true);
            }
            if let Some(m) = matched {
                let children = self.arguments(&m.values)?;
                return Ok(self.from_match(xaml_type, &m, directive(Directive::Arguments), children));
            }
            return no_constructor(xaml_type);
        }

        if let Some(descriptor) = self.instance_descriptor(value, xaml_type)? {
            return self.from_descriptor(xaml_type, descriptor, false);
        }
        if let Some(m) = self.match_constructor(instance, xaml_type)? {
            let children = self.arguments(&m.values)?;
            return Ok(self.from_match(xaml_type, &m, directive(Directive::Arguments), children));
        }
        no_constructor(xaml_type)
    }

    /// The widest constructor whose every parameter is backed by a property
    /// annotated with that parameter's name and type.
    fn match_constructor(
        &self,
        instance: &Instance,
        xaml_type: &XamlType,
    ) -> Result<Option<ConstructorMatch>> {
        let mut best: Option<Vec<XamlMember>> = None;
        for constructor in xaml_type.constructors() {
            let matched: Option<Vec<XamlMember>> = constructor
                .parameters
                .iter()
                .map(|parameter| {
                    xaml_type
                        .members()
                        .iter()
                        .find(|m| {
                            m.kind() == MemberKind::Property
                                && m.constructor_argument() == Some(parameter.name.as_str())
                                && m.member_type() == &parameter.parameter_type
                        })
                        .cloned()
                })
                .collect();
            if let Some(members) = matched {
                if best.as_ref().map_or(true, |b| members.len() > b.len()) {
                    best = Some(members);
                }
            }
        }

        let Some(members) = best.filter(|m| !m.is_empty()) else {
            return Ok(None);
        };
        let values = members
            .iter()
            .map(|m| self.runtime.get_value(instance, m))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(ConstructorMatch { members, values }))
    }

    fn instance_descriptor(
        &self,
        value: &Value,
        xaml_type: &XamlType,
    ) -> Result<Option<InstanceDescriptor>> {
        let Some(converter) = xaml_type.type_converter() else {
            return Ok(None);
        };
        match converter.instance_descriptor(value) {
            Ok(descriptor) => Ok(descriptor),
            Err(err) => recover(err, "instance descriptor"),
        }
    }

    /// Tries to write `values` inline. Rolls back and returns `None` when any
    /// of them needs an element of its own.
    fn positional(
        &mut self,
        values: &[Value],
        members: &[XamlMember],
    ) -> Result<Option<Vec<Markup>>> {
        if values.is_empty() {
            return Ok(None);
        }
        let attempt = self.begin_attempt();
        let mut children = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            let member = members
                .get(index)
                .cloned()
                .unwrap_or_else(|| directive(Directive::PositionalParameters));
            let child = self.descend(|ctx| ctx.member_child(value, &member))?;
            let inline = match &child {
                Markup::Value(_) => true,
                Markup::Object(id) => self.arena.is_attributable(*id),
                _ => false,
            };
            if !inline {
                debug!(index, "positional parameter needs an element, using arguments");
                self.rollback(attempt);
                return Ok(None);
            }
            children.push(child);
        }
        Ok(Some(children))
    }

    fn arguments(&mut self, values: &[Value]) -> Result<Vec<Markup>> {
        values
            .iter()
            .map(|value| self.descend(|ctx| ctx.object_markup(value)))
            .collect()
    }

    fn from_match(
        &self,
        xaml_type: &XamlType,
        matched: &ConstructorMatch,
        member: XamlMember,
        children: Vec<Markup>,
    ) -> Construction {
        let consumed: Vec<String> = matched
            .members
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        let complete = xaml_type
            .members()
            .iter()
            .filter(|m| self.is_serializable_property(m, xaml_type))
            .all(|m| consumed.iter().any(|c| c == m.name()));
        Construction {
            members: vec![MemberRecord::new(member, children)],
            consumed,
            complete,
            kind: ConstructionKind::Arguments,
        }
    }

    fn from_descriptor(
        &mut self,
        xaml_type: &XamlType,
        descriptor: InstanceDescriptor,
        allow_positional: bool,
    ) -> Result<Construction> {
        let InstanceDescriptor {
            member,
            arguments,
            is_complete,
        } = descriptor;
        let mut members = Vec::new();
        let kind = match &member {
            DescriptorMember::Constructor { .. } => {
                let positional = if allow_positional {
                    self.positional(&arguments, &[])?
                } else {
                    None
                };
                match positional {
                    Some(children) => members.push(MemberRecord::new(
                        directive(Directive::PositionalParameters),
                        children,
                    )),
                    None if !arguments.is_empty() => {
                        let children = self.arguments(&arguments)?;
                        members.push(MemberRecord::new(directive(Directive::Arguments), children));
                    }
                    None => {}
                }
                ConstructionKind::Arguments
            }
            DescriptorMember::Method {
                declaring_type,
                name,
                ..
            } => {
                let text = if declaring_type == xaml_type.type_name() {
                    name.clone()
                } else {
                    format!("{}.{}", self.prefixed_name(declaring_type), name)
                };
                let mut factory = MemberRecord::atomic(directive(Directive::FactoryMethod), text);
                factory.is_factory_method = true;
                members.push(factory);
                if !arguments.is_empty() {
                    let children = self.arguments(&arguments)?;
                    members.push(MemberRecord::new(directive(Directive::Arguments), children));
                }
                ConstructionKind::Factory
            }
            other => {
                return Err(Error::InvalidInstanceDescriptor {
                    type_name: xaml_type.type_name().clone(),
                    kind: other.kind_name().to_string(),
                })
            }
        };
        debug!(type_name = %xaml_type.type_name(), kind = member.kind_name(), "using instance descriptor");
        Ok(Construction {
            members,
            consumed: Vec::new(),
            complete: is_complete,
            kind,
        })
    }

    fn is_serializable_property(&self, member: &XamlMember, owner: &XamlType) -> bool {
        member.kind() == MemberKind::Property
            && member.serialization_visibility() != SerializationVisibility::Hidden
            && self.accessor_visible(member.getter(), owner)
    }

    fn property_members(
        &mut self,
        id: RecordId,
        instance: &Instance,
        xaml_type: &XamlType,
        consumed: &[String],
        only_name: bool,
    ) -> Result<Vec<MemberRecord>> {
        let mut out = Vec::new();
        for member in xaml_type.members() {
            if member.kind() != MemberKind::Property {
                continue;
            }
            let is_name = xaml_type.runtime_name_property() == Some(member.name());
            if consumed.iter().any(|c| c == member.name()) {
                if is_name {
                    let value = self.runtime.get_value(instance, member)?;
                    self.capture_name(id, xaml_type, member, &value)?;
                }
                continue;
            }
            if !self.is_serializable_property(member, xaml_type) || (only_name && !is_name) {
                continue;
            }

            let value = self.runtime.get_value(instance, member)?;
            if is_name {
                if let Some(name) = self.capture_name(id, xaml_type, member, &value)? {
                    out.push(MemberRecord::atomic(member.clone(), name));
                }
                continue;
            }
            if !self.should_serialize(instance, member, &value, xaml_type)? {
                continue;
            }
            if let Some(record) = self.member_record(member, &value, xaml_type)? {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Records the runtime name of `id`. The object's own name replaces any
    /// name generated for it earlier.
    fn capture_name(
        &mut self,
        id: RecordId,
        xaml_type: &XamlType,
        member: &XamlMember,
        value: &Value,
    ) -> Result<Option<String>> {
        let text = match value {
            Value::Null => return Ok(None),
            Value::String(s) if s.is_empty() => return Ok(None),
            Value::String(s) => s.clone(),
            _ => {
                return Err(Error::NonStringName {
                    type_name: xaml_type.type_name().clone(),
                    member: member.name().to_string(),
                })
            }
        };
        let record = self.arena.get(id);
        if record.name.as_deref() != Some(text.as_str()) {
            if let Some(previous) = &record.name {
                warn!(previous = %previous, name = %text, "runtime name replaces a generated name");
            }
            let needs_name = record.needs_name;
            self.set_name_state(id, Some(text.clone()), needs_name);
        }
        self.arena.get_mut(id).name_written = true;
        Ok(Some(text))
    }

    fn should_serialize(
        &self,
        instance: &Instance,
        member: &XamlMember,
        value: &Value,
        owner: &XamlType,
    ) -> Result<bool> {
        if !self.is_writable(member, owner) {
            let allowed = match member.serialization_visibility() {
                SerializationVisibility::Content => true,
                _ => {
                    !self.settings.require_explicit_content_visibility
                        && self.legacy_visible(member, value)?
                }
            };
            if !allowed {
                return Ok(false);
            }
        }
        if let Some(answer) = self.runtime.should_serialize(instance, member) {
            return Ok(answer);
        }
        Ok(member.default_value().map_or(true, |default| default != value))
    }

    /// Read-only collections, dictionaries and XML data are visible without
    /// a content annotation.
    fn legacy_visible(&self, member: &XamlMember, value: &Value) -> Result<bool> {
        let declared = self.schema.get_type(member.member_type());
        let actual = if value.is_null() {
            None
        } else {
            Some(self.schema.type_of(value, self.runtime)?)
        };
        Ok(declared.iter().chain(actual.iter()).any(|t| {
            matches!(
                t.collection_kind(),
                CollectionKind::Collection | CollectionKind::Dictionary
            ) || t.xml_serializer().is_some()
        }))
    }

    fn member_record(
        &mut self,
        member: &XamlMember,
        value: &Value,
        owner: &XamlType,
    ) -> Result<Option<MemberRecord>> {
        let is_content = owner.content_property() == Some(member.name());
        if value.is_object() && !self.is_writable(member, owner) {
            let value_type = self.schema.type_of(value, self.runtime)?;
            if matches!(
                value_type.collection_kind(),
                CollectionKind::Collection | CollectionKind::Dictionary
            ) {
                let Some(items) = self.descend(|ctx| ctx.items_member(value, &value_type))? else {
                    return Ok(None);
                };
                let mut record = ObjectRecord::get(value.clone());
                record.members.push(items);
                let id = self.arena.alloc(record);
                return Ok(Some(
                    MemberRecord::new(member.clone(), vec![Markup::Object(id)]).content(is_content),
                ));
            }
        }
        let child = self.descend(|ctx| ctx.member_child(value, member))?;
        Ok(Some(
            MemberRecord::new(member.clone(), vec![child]).content(is_content),
        ))
    }

    fn items_member(&mut self, value: &Value, xaml_type: &XamlType) -> Result<Option<MemberRecord>> {
        let Some(instance) = value.as_instance() else {
            return Ok(None);
        };
        let children = match xaml_type.collection_kind() {
            CollectionKind::Collection | CollectionKind::Array => {
                let items = self.runtime.items(instance)?;
                self.collection_items(&items, xaml_type)?
            }
            CollectionKind::Dictionary => {
                let entries = self.runtime.entries(instance)?;
                self.dictionary_items(&entries)?
            }
            CollectionKind::None => return Ok(None),
        };
        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(MemberRecord::new(directive(Directive::Items), children)))
    }

    fn collection_items(&mut self, items: &[Value], collection: &XamlType) -> Result<Vec<Markup>> {
        let count = items.len();
        let significant = collection.is_whitespace_significant_collection();
        let mut children = Vec::with_capacity(count);
        let mut previous_unwrapped = false;
        for (index, item) in items.iter().enumerate() {
            let markup = self.descend(|ctx| ctx.object_markup(item))?;
            let unwrapped = match &markup {
                Markup::Object(id) => self.wrapped_text(*id, collection).filter(|text| {
                    can_unwrap_item(
                        text,
                        significant,
                        index == 0,
                        index + 1 == count,
                        previous_unwrapped,
                    )
                }),
                _ => None,
            };
            previous_unwrapped = unwrapped.is_some();
            let Some(text) = unwrapped else {
                children.push(markup);
                continue;
            };
            // The wrapper is not written, so it cannot be a reference target.
            if let Markup::Object(id) = &markup {
                if let Some(object) = self.arena.get(*id).source.identity() {
                    self.tables.remove(self.current_table, object);
                }
            }
            children.push(Markup::Value(Value::String(text)));
        }
        Ok(children)
    }

    /// The string inside a content-wrapper item whose only member is its
    /// content property.
    fn wrapped_text(&self, id: RecordId, collection: &XamlType) -> Option<String> {
        let record = self.arena.get(id);
        let item_type = record.xaml_type()?;
        if !collection.content_wrappers().contains(item_type.type_name())
            || record.name.is_some()
            || record.needs_name
        {
            return None;
        }
        let content = item_type.content_property()?;
        match record.members.as_slice() {
            [only] if only.member.name() == content && !only.member.is_directive() => {
                match only.children.as_slice() {
                    [Markup::Value(Value::String(text))] => Some(text.clone()),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn dictionary_items(&mut self, entries: &[(Value, Value)]) -> Result<Vec<Markup>> {
        let mut children = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let markup = self.descend(|ctx| ctx.object_markup(value))?;
            if !self.should_omit_key(key, value)? {
                let Markup::Object(id) = &markup else {
                    return Err(Error::DeferredDictionaryKey);
                };
                let key_child = self.descend(|ctx| ctx.key_child(key))?;
                self.arena
                    .get_mut(*id)
                    .members
                    .push(MemberRecord::new(directive(Directive::Key), vec![key_child]));
            }
            children.push(markup);
        }
        Ok(children)
    }

    /// The key can be recovered from the value's dictionary-key property.
    fn should_omit_key(&self, key: &Value, value: &Value) -> Result<bool> {
        let Some(instance) = value.as_instance() else {
            return Ok(false);
        };
        let value_type = self.schema.type_of(value, self.runtime)?;
        let Some(property) = value_type
            .dictionary_key_property()
            .and_then(|p| value_type.member(p))
        else {
            return Ok(false);
        };
        Ok(self.runtime.get_value(instance, property)? == *key)
    }

    fn key_child(&mut self, key: &Value) -> Result<Markup> {
        self.check_no_attached(key, "dictionary key")?;
        self.member_child(key, &directive(Directive::Key))
    }

    fn attached_members(&mut self, instance: &Instance) -> Result<Vec<MemberRecord>> {
        let mut out = Vec::new();
        for attached in self.runtime.attached_properties(instance)? {
            if let Some(owner) = self.schema.get_type(&attached.declaring_type) {
                if !self.type_visible(&owner) {
                    debug!(owner = %attached.declaring_type, "skipping attached property of invisible type");
                    continue;
                }
            }
            let member = match self
                .schema
                .attachable_member(&attached.declaring_type, &attached.name)
            {
                Some(member) => member,
                None => {
                    warn!(
                        owner = %attached.declaring_type,
                        member = %attached.name,
                        "attached property is not declared in the schema"
                    );
                    XamlMember::unknown_attachable(&attached.declaring_type, &attached.name)
                }
            };
            let child = self.descend(|ctx| ctx.member_child(&attached.value, &member))?;
            out.push(MemberRecord::new(member, vec![child]));
        }
        Ok(out)
    }

    /// Builds the members of every deferred name scope, each under its own
    /// table layer. Scopes found along the way are queued behind.
    pub(crate) fn resume_pending_scopes(&mut self) -> Result<()> {
        while let Some(scope) = self.pending_scopes.pop_front() {
            let outer = std::mem::replace(&mut self.current_table, scope.table);
            let result = self.descend(|ctx| {
                ctx.add_record_members(scope.record, &scope.value, &scope.xaml_type)
            });
            self.current_table = outer;
            result?;
        }
        Ok(())
    }

    /// Names referenced records and fills in `x:Reference` targets.
    pub(crate) fn finalize_names(&mut self) {
        self.assign_reference_names();
        let ids: Vec<RecordId> = self.arena.ids().collect();
        for id in ids {
            let record = self.arena.get(id);
            if let Some(target) = record.reference_to {
                let name = self.arena.get(target).name.clone().unwrap_or_default();
                self.arena
                    .get_mut(id)
                    .members
                    .push(MemberRecord::atomic(directive(Directive::PositionalParameters), name));
                continue;
            }
            if !record.needs_name || record.name_written {
                continue;
            }
            let Some(name) = record.name.clone() else {
                continue;
            };
            let member = record
                .xaml_type()
                .and_then(|t| t.runtime_name_property().and_then(|p| t.member(p)))
                .cloned()
                .unwrap_or_else(|| directive(Directive::Name));
            let record = self.arena.get_mut(id);
            record.members.push(MemberRecord::atomic(member, name));
            record.name_written = true;
        }
    }

    /// Fails when two distinct records share a name within one scope.
    pub(crate) fn check_duplicate_names(&self, root: &Markup) -> Result<()> {
        let mut scopes: Vec<HashMap<String, RecordId>> = vec![HashMap::new()];
        self.check_names_in(root, &mut scopes)
    }

    fn check_names_in(
        &self,
        markup: &Markup,
        scopes: &mut Vec<HashMap<String, RecordId>>,
    ) -> Result<()> {
        let Markup::Object(id) = markup else {
            return Ok(());
        };
        let record = self.arena.get(*id);
        if let (Some(name), Some(scope)) = (&record.name, scopes.last_mut()) {
            match scope.get(name) {
                Some(other) if other != id => return Err(Error::duplicate_name(name)),
                Some(_) => {}
                None => {
                    scope.insert(name.clone(), *id);
                }
            }
        }

        let opens_scope = record.xaml_type().map_or(false, XamlType::is_name_scope);
        if opens_scope {
            scopes.push(HashMap::new());
        }
        for member in &record.members {
            for child in &member.children {
                self.check_names_in(child, scopes)?;
            }
        }
        if opens_scope {
            scopes.pop();
        }
        Ok(())
    }

    /// Allocates a prefix for every namespace the tree writes.
    pub(crate) fn collect_namespaces(&mut self, root: &Markup) {
        let mut found = IndexSet::new();
        self.namespaces_in(root, &mut found);
        for namespace in found {
            self.find_prefix(&namespace);
        }
    }

    fn namespaces_in(&self, markup: &Markup, found: &mut IndexSet<String>) {
        match markup {
            Markup::Object(id) => {
                let record = self.arena.get(*id);
                if let Some(xaml_type) = record.xaml_type() {
                    found.insert(xaml_type.namespace().to_string());
                }
                for member in &record.members {
                    if let Some(namespace) = member.member.namespace() {
                        found.insert(namespace.to_string());
                    }
                    for child in &member.children {
                        self.namespaces_in(child, found);
                    }
                }
            }
            Markup::Template(nodes) => {
                for node in nodes {
                    match node {
                        Node::StartObject(t) => {
                            found.insert(t.namespace().to_string());
                        }
                        Node::StartMember(m) => {
                            if let Some(namespace) = m.namespace() {
                                found.insert(namespace.to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

fn no_constructor(xaml_type: &XamlType) -> Result<Construction> {
    if xaml_type
        .members()
        .iter()
        .any(|m| m.constructor_argument().is_some())
    {
        return Err(Error::NoMatchingConstructor {
            type_name: xaml_type.type_name().clone(),
        });
    }
    Ok(Construction::default_constructor())
}
