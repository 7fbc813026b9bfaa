//! Writing a node stream back into an object graph.
//!
//! [`ObjectWriter`] is the push counterpart of the
//! [`ObjectReader`](crate::ObjectReader): feed it nodes one at a time and
//! take the root with [`ObjectWriter::result`].
//!
//! ## Overview
//!
//! - **Deferred creation**: an object is created at its `EndObject`, or
//!   earlier when its items or an existing member value are needed, so
//!   construction directives can arrive in any member order
//! - **Text values**: converted through the member's converter, then the
//!   member type's
//! - **Forward references**: `x:Reference` to a name defined later in the
//!   stream is patched in once the stream ends
//!
//! ## Usage
//!
//! ```rust
//! use xaml_stream::{from_nodes, to_nodes, DynRuntime, SchemaContext, Value};
//!
//! let schema = SchemaContext::new();
//! let runtime = DynRuntime::new();
//! let nodes = to_nodes(&Value::from(42), &schema, &runtime).unwrap();
//! let value = from_nodes(nodes, &schema, &runtime).unwrap();
//! assert_eq!(value, Value::from(42));
//! ```

use crate::convert::DeferringLoader;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::options::ObjectWriterSettings;
use crate::runtime::XamlRuntime;
use crate::schema::{
    CollectionKind, Directive, MemberKind, SchemaContext, XamlMember, XamlType, XamlTypeName,
};
use crate::value::{Instance, Value};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ObjectKind {
    Regular,
    Existing,
    Null,
    TypeExtension,
    Reference,
    Array,
    XData,
}

impl ObjectKind {
    fn of(xaml_type: &XamlType) -> Self {
        if !xaml_type.type_name().is_xaml() {
            return ObjectKind::Regular;
        }
        match xaml_type.name() {
            "Null" => ObjectKind::Null,
            "Type" => ObjectKind::TypeExtension,
            "Reference" => ObjectKind::Reference,
            "Array" => ObjectKind::Array,
            "XData" => ObjectKind::XData,
            _ => ObjectKind::Regular,
        }
    }
}

/// A finished value on its way into a member.
#[derive(Clone, Debug)]
struct Child {
    value: Value,
    key: Option<Value>,
    /// Name of a referenced object not yet defined.
    forward: Option<String>,
    /// The member already holds this value.
    existing: bool,
    /// Came from a bare `Value` node.
    bare: bool,
}

impl Child {
    fn value(value: Value) -> Self {
        Child {
            value,
            key: None,
            forward: None,
            existing: false,
            bare: false,
        }
    }
}

struct ObjectFrame {
    kind: ObjectKind,
    xaml_type: Option<XamlType>,
    instance: Option<Value>,
    init_text: Option<String>,
    arguments: Vec<Value>,
    factory: Option<String>,
    /// Property sets waiting for the instance.
    pending: Vec<(XamlMember, Child)>,
    key: Option<Value>,
    name: Option<String>,
    text: Option<String>,
    items: Vec<Child>,
    /// Scope the object's own name lives in.
    scope: usize,
    /// Scope for names below the object.
    inner_scope: usize,
    parent_member: Option<XamlMember>,
}

impl ObjectFrame {
    fn new(kind: ObjectKind, xaml_type: Option<XamlType>, scope: usize) -> Self {
        ObjectFrame {
            kind,
            xaml_type,
            instance: None,
            init_text: None,
            arguments: Vec::new(),
            factory: None,
            pending: Vec::new(),
            key: None,
            name: None,
            text: None,
            items: Vec::new(),
            scope,
            inner_scope: scope,
            parent_member: None,
        }
    }
}

enum Frame {
    Object(ObjectFrame),
    Member {
        member: XamlMember,
        children: Vec<Child>,
    },
    /// Collects a member's nodes for a deferring loader, or drops them.
    Capture {
        member: XamlMember,
        loader: Option<Rc<dyn DeferringLoader>>,
        nodes: Vec<Node>,
        depth: usize,
    },
}

enum FixupTarget {
    Member(XamlMember),
    Item { key: Option<Value> },
}

struct Fixup {
    scope: usize,
    owner: Value,
    target: FixupTarget,
    name: String,
}

struct Scope {
    parent: Option<usize>,
    names: HashMap<String, Value>,
}

/// Everything the writer reads but never restructures.
struct WriterEnv<'a> {
    schema: &'a SchemaContext,
    runtime: &'a dyn XamlRuntime,
    settings: ObjectWriterSettings,
    prefixes: HashMap<String, String>,
}

/// Push writer that turns a node stream into live objects.
pub struct ObjectWriter<'a> {
    env: WriterEnv<'a>,
    frames: Vec<Frame>,
    scopes: Vec<Scope>,
    fixups: Vec<Fixup>,
    result: Option<Value>,
}

impl<'a> ObjectWriter<'a> {
    pub fn new(schema: &'a SchemaContext, runtime: &'a dyn XamlRuntime) -> Self {
        Self::with_settings(schema, runtime, ObjectWriterSettings::default())
    }

    pub fn with_settings(
        schema: &'a SchemaContext,
        runtime: &'a dyn XamlRuntime,
        settings: ObjectWriterSettings,
    ) -> Self {
        ObjectWriter {
            env: WriterEnv {
                schema,
                runtime,
                settings,
                prefixes: HashMap::new(),
            },
            frames: Vec::new(),
            scopes: vec![Scope {
                parent: None,
                names: HashMap::new(),
            }],
            fixups: Vec::new(),
            result: None,
        }
    }

    pub fn write_node(&mut self, node: Node) -> Result<()> {
        trace!(node = %node, "write");
        if self.capture(&node)? {
            return Ok(());
        }
        match node {
            Node::NamespaceDeclaration(ns) => {
                self.env.prefixes.insert(ns.prefix, ns.namespace);
                Ok(())
            }
            Node::StartObject(xaml_type) => self.start_object(xaml_type),
            Node::GetObject => self.get_object(),
            Node::EndObject => self.end_object(),
            Node::StartMember(member) => self.start_member(member),
            Node::EndMember => self.end_member(),
            Node::Value(value) => self.value(value),
            Node::StartOfStream | Node::EndOfStream | Node::EndOfAttributes | Node::LineInfo(_) => {
                Ok(())
            }
        }
    }

    /// Finishes the stream: patches forward references and returns the root.
    pub fn result(mut self) -> Result<Value> {
        if !self.frames.is_empty() {
            return Err(Error::malformed("stream ended inside an open object or member"));
        }
        for fixup in std::mem::take(&mut self.fixups) {
            let target = lookup(&self.scopes, fixup.scope, &fixup.name)
                .ok_or_else(|| Error::UnresolvedReference(fixup.name.clone()))?;
            debug!(name = %fixup.name, "resolving forward reference");
            match fixup.target {
                FixupTarget::Member(member) => self.env.assign(&fixup.owner, &member, target)?,
                FixupTarget::Item { key } => {
                    let owner_type = self.env.schema.type_of(&fixup.owner, self.env.runtime)?;
                    self.env.add_resolved(&fixup.owner, &owner_type, key, target)?;
                }
            }
        }
        self.result
            .ok_or_else(|| Error::malformed("stream contains no root object"))
    }

    fn capture(&mut self, node: &Node) -> Result<bool> {
        let Some(Frame::Capture { nodes, depth, .. }) = self.frames.last_mut() else {
            return Ok(false);
        };
        match node {
            Node::StartObject(_) | Node::GetObject | Node::StartMember(_) => *depth += 1,
            Node::EndObject => *depth = depth.saturating_sub(1),
            Node::EndMember if *depth == 0 => {
                self.finish_capture()?;
                return Ok(true);
            }
            Node::EndMember => *depth -= 1,
            _ => {}
        }
        nodes.push(node.clone());
        Ok(true)
    }

    fn finish_capture(&mut self) -> Result<()> {
        let Some(Frame::Capture {
            member,
            loader,
            nodes,
            ..
        }) = self.frames.pop()
        else {
            return Err(Error::malformed("no captured member to close"));
        };
        let Some(loader) = loader else {
            debug!(member = %member.display_name(), "skipped unknown member");
            return Ok(());
        };
        let value = loader.load(nodes).map_err(Error::conversion)?;
        self.apply_member(member, vec![Child::value(value)])
    }

    fn current_scope(&self) -> usize {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| match frame {
                Frame::Object(object) => Some(object.inner_scope),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// The member an object node is about to fill, or `None` at the root.
    fn enclosing_member(&self) -> Result<Option<XamlMember>> {
        match self.frames.last() {
            None if self.result.is_none() => Ok(None),
            None => Err(Error::malformed("more than one root object")),
            Some(Frame::Member { member, .. }) => Ok(Some(member.clone())),
            Some(_) => Err(Error::malformed("object node outside of a member")),
        }
    }

    fn start_object(&mut self, xaml_type: XamlType) -> Result<()> {
        let parent_member = self.enclosing_member()?;
        if !self.env.type_visible(&xaml_type) {
            return Err(Error::TypeNotVisible(xaml_type.type_name().clone()));
        }
        let scope = self.current_scope();
        let mut frame = ObjectFrame::new(ObjectKind::of(&xaml_type), Some(xaml_type.clone()), scope);
        if xaml_type.is_name_scope() && parent_member.is_some() {
            self.scopes.push(Scope {
                parent: Some(scope),
                names: HashMap::new(),
            });
            frame.inner_scope = self.scopes.len() - 1;
        }
        frame.parent_member = parent_member;
        self.frames.push(Frame::Object(frame));
        Ok(())
    }

    fn get_object(&mut self) -> Result<()> {
        let Some(member) = self.enclosing_member()? else {
            return Err(Error::malformed("GetObject at the root"));
        };
        let owner_index = self
            .frames
            .len()
            .checked_sub(2)
            .ok_or_else(|| Error::malformed("GetObject without an owner"))?;
        let owner = self.instantiate_at(owner_index)?;
        let value = self.env.runtime.get_value(owner.as_instance_or_err()?, &member)?;
        let xaml_type = self.env.schema.type_of(&value, self.env.runtime).ok();

        let scope = self.current_scope();
        let mut frame = ObjectFrame::new(ObjectKind::Existing, xaml_type, scope);
        frame.instance = Some(value);
        frame.parent_member = Some(member);
        self.frames.push(Frame::Object(frame));
        Ok(())
    }

    fn start_member(&mut self, member: XamlMember) -> Result<()> {
        let Some(Frame::Object(frame)) = self.frames.last() else {
            return Err(Error::malformed("member outside of an object"));
        };

        if !member.is_directive() && !member.is_attachable() {
            if let Some(owner) = &frame.xaml_type {
                if owner.member(member.name()).is_none() {
                    if !self.env.settings.ignore_unknown_members {
                        return Err(Error::unknown_member(owner.type_name(), member.name()));
                    }
                    warn!(owner = %owner.type_name(), member = member.name(), "ignoring unknown member");
                    self.frames.push(Frame::Capture {
                        member,
                        loader: None,
                        nodes: Vec::new(),
                        depth: 0,
                    });
                    return Ok(());
                }
            }
        }

        if !member.is_directive() {
            let loader = member.deferring_loader().cloned().or_else(|| {
                self.env
                    .schema
                    .get_type(member.member_type())
                    .and_then(|t| t.deferring_loader().cloned())
            });
            if let Some(loader) = loader {
                self.frames.push(Frame::Capture {
                    member,
                    loader: Some(loader),
                    nodes: Vec::new(),
                    depth: 0,
                });
                return Ok(());
            }
        }

        if member.is_directive_of(Directive::Items) && frame.kind == ObjectKind::Regular {
            let index = self.frames.len() - 1;
            self.instantiate_at(index)?;
        }
        self.frames.push(Frame::Member {
            member,
            children: Vec::new(),
        });
        Ok(())
    }

    fn value(&mut self, value: Value) -> Result<()> {
        let Some(Frame::Member { children, .. }) = self.frames.last_mut() else {
            return Err(Error::malformed("value outside of a member"));
        };
        let mut child = Child::value(value);
        child.bare = true;
        children.push(child);
        Ok(())
    }

    fn end_member(&mut self) -> Result<()> {
        let Some(Frame::Member { member, children }) = self.frames.pop() else {
            return Err(Error::malformed("EndMember without a matching StartMember"));
        };
        self.apply_member(member, children)
    }

    fn apply_member(&mut self, member: XamlMember, children: Vec<Child>) -> Result<()> {
        let index = self
            .frames
            .len()
            .checked_sub(1)
            .ok_or_else(|| Error::malformed("member outside of an object"))?;
        let Some(Frame::Object(frame)) = self.frames.get_mut(index) else {
            return Err(Error::malformed("member outside of an object"));
        };

        match frame.kind {
            ObjectKind::Null => return Ok(()),
            ObjectKind::TypeExtension | ObjectKind::Reference | ObjectKind::XData => {
                frame.text = first_text(&children);
                return Ok(());
            }
            ObjectKind::Array => {
                if member.is_directive_of(Directive::Items) {
                    frame.items.extend(children);
                } else {
                    frame.text = first_text(&children);
                }
                return Ok(());
            }
            ObjectKind::Regular | ObjectKind::Existing => {}
        }

        if let MemberKind::Directive(directive) = member.kind() {
            match directive {
                Directive::Initialization => frame.init_text = first_text(&children),
                Directive::PositionalParameters | Directive::Arguments => {
                    frame.arguments = children.into_iter().map(|c| c.value).collect();
                }
                Directive::FactoryMethod => frame.factory = first_text(&children),
                Directive::Key => frame.key = children.into_iter().next().map(|c| c.value),
                Directive::Name => frame.name = first_text(&children),
                Directive::Items => {
                    let collection = self.instantiate_at(index)?;
                    let collection_type = self.env.schema.type_of(&collection, self.env.runtime)?;
                    let scope = self.current_scope();
                    for child in children {
                        self.env.add_item(
                            &collection,
                            &collection_type,
                            child,
                            scope,
                            &mut self.fixups,
                        )?;
                    }
                }
            }
            return Ok(());
        }

        let Some(child) = children.into_iter().next() else {
            return Ok(());
        };
        if child.existing {
            return Ok(());
        }
        let is_name = frame
            .xaml_type
            .as_ref()
            .and_then(XamlType::runtime_name_property)
            == Some(member.name());
        if is_name {
            frame.name = child.value.as_str().map(str::to_string);
        }
        match &frame.instance {
            Some(owner) => {
                let owner = owner.clone();
                let scope = frame.scope;
                self.env.assign_child(&owner, &member, child, scope, &mut self.fixups)
            }
            None => {
                frame.pending.push((member, child));
                Ok(())
            }
        }
    }

    /// Creates the object of the frame at `index` if it does not exist yet.
    fn instantiate_at(&mut self, index: usize) -> Result<Value> {
        let ObjectWriter {
            env, frames, fixups, ..
        } = self;
        match frames.get_mut(index) {
            Some(Frame::Object(frame)) => env.instantiate(frame, fixups),
            _ => Err(Error::malformed("expected an object frame")),
        }
    }

    fn end_object(&mut self) -> Result<()> {
        let Some(Frame::Object(mut frame)) = self.frames.pop() else {
            return Err(Error::malformed("EndObject without a matching StartObject"));
        };

        let mut child = match frame.kind {
            ObjectKind::Null => Child::value(Value::Null),
            ObjectKind::TypeExtension => {
                let text = frame.text.take().unwrap_or_default();
                Child::value(Value::Type(self.env.resolve_type_name(&text)?))
            }
            ObjectKind::Reference => {
                let name = frame
                    .text
                    .take()
                    .ok_or_else(|| Error::malformed("x:Reference without a name"))?;
                match lookup(&self.scopes, frame.scope, &name) {
                    Some(target) => Child::value(target),
                    None => {
                        debug!(name = %name, "forward reference");
                        let mut child = Child::value(Value::Null);
                        child.forward = Some(name);
                        child
                    }
                }
            }
            ObjectKind::Array => {
                let value = self.env.build_array(&mut frame, &mut self.fixups)?;
                Child::value(value)
            }
            ObjectKind::XData => {
                let text = frame.text.take().unwrap_or_default();
                Child::value(self.env.read_xml(frame.parent_member.as_ref(), &text)?)
            }
            ObjectKind::Existing => {
                let mut child = Child::value(frame.instance.take().unwrap_or_default());
                child.existing = true;
                child
            }
            ObjectKind::Regular => {
                let value = self.env.instantiate(&mut frame, &mut self.fixups)?;
                Child::value(value)
            }
        };
        if let Some(name) = frame.name.take() {
            if let Some(scope) = self.scopes.get_mut(frame.scope) {
                scope.names.insert(name, child.value.clone());
            }
        }
        child.key = frame.key.take();

        match self.frames.last_mut() {
            None => {
                if child.forward.is_some() {
                    return Err(Error::malformed("root object is an unresolved reference"));
                }
                self.result = Some(child.value);
            }
            Some(Frame::Member { children, .. }) => children.push(child),
            Some(_) => return Err(Error::malformed("object closed outside of a member")),
        }
        Ok(())
    }
}

fn first_text(children: &[Child]) -> Option<String> {
    children.first().map(|c| match &c.value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Members of these types take text as is.
fn is_text_type(name: &XamlTypeName) -> bool {
    name.is_xaml() && matches!(name.name.as_str(), "String" | "Object")
}

fn lookup(scopes: &[Scope], scope: usize, name: &str) -> Option<Value> {
    let mut current = Some(scope);
    while let Some(index) = current {
        let scope = scopes.get(index)?;
        if let Some(value) = scope.names.get(name) {
            return Some(value.clone());
        }
        current = scope.parent;
    }
    None
}

trait AsInstance {
    fn as_instance_or_err(&self) -> Result<&Instance>;
}

impl AsInstance for Value {
    fn as_instance_or_err(&self) -> Result<&Instance> {
        self.as_instance()
            .ok_or_else(|| Error::runtime(format!("{} has no members", self.kind_name())))
    }
}

impl WriterEnv<'_> {
    fn type_visible(&self, xaml_type: &XamlType) -> bool {
        xaml_type.is_public()
            || (xaml_type.assembly().is_some()
                && xaml_type.assembly() == self.settings.local_assembly.as_deref())
    }

    fn instantiate(&self, frame: &mut ObjectFrame, fixups: &mut Vec<Fixup>) -> Result<Value> {
        if let Some(instance) = &frame.instance {
            return Ok(instance.clone());
        }
        let xaml_type = frame
            .xaml_type
            .clone()
            .ok_or_else(|| Error::malformed("object without a type"))?;

        let value = if let Some(text) = frame.init_text.take() {
            self.from_text(&xaml_type, &text)?
        } else if let Some(factory) = frame.factory.take() {
            let arguments = std::mem::take(&mut frame.arguments);
            let (owner, method) = match factory.rsplit_once('.') {
                Some((owner, method)) => {
                    let owner = self.schema.require_type(&self.resolve_type_name(owner)?)?;
                    (owner, method.to_string())
                }
                None => (xaml_type.clone(), factory),
            };
            self.runtime.invoke_factory(&owner, &method, arguments)?
        } else {
            let arguments = self.coerce_arguments(&xaml_type, std::mem::take(&mut frame.arguments))?;
            self.runtime.create_instance(&xaml_type, arguments)?
        };
        frame.instance = Some(value.clone());

        for (member, child) in std::mem::take(&mut frame.pending) {
            self.assign_child(&value, &member, child, frame.scope, fixups)?;
        }
        Ok(value)
    }

    /// Converts constructor arguments given as text to their parameter types.
    fn coerce_arguments(&self, xaml_type: &XamlType, arguments: Vec<Value>) -> Result<Vec<Value>> {
        let Some(constructor) = xaml_type
            .constructors()
            .iter()
            .find(|c| c.parameters.len() == arguments.len())
        else {
            return Ok(arguments);
        };
        constructor
            .parameters
            .iter()
            .zip(arguments)
            .map(|(parameter, argument)| {
                let target = self
                    .schema
                    .get_type(&parameter.parameter_type)
                    .filter(|t| !is_text_type(t.type_name()));
                let converted = match (argument.as_str(), target) {
                    (Some(text), Some(target)) => Some(self.from_text(&target, text)?),
                    _ => None,
                };
                Ok(converted.unwrap_or(argument))
            })
            .collect()
    }

    fn from_text(&self, xaml_type: &XamlType, text: &str) -> Result<Value> {
        if let Some(serializer) = xaml_type.value_serializer() {
            if serializer.can_convert_from_string(text) {
                return serializer.convert_from_string(text).map_err(Error::conversion);
            }
        }
        if let Some(converter) = xaml_type.type_converter() {
            if converter.can_convert_from_string() {
                return converter.convert_from_string(text).map_err(Error::conversion);
            }
        }
        if xaml_type.type_name() == &XamlTypeName::xaml("String") {
            return Ok(Value::String(text.to_string()));
        }
        Err(Error::Conversion(format!(
            "no conversion from text to {}",
            xaml_type.type_name()
        )))
    }

    /// Text for a member goes through the member's converters, then the
    /// member type's. Text with no converter stays text.
    fn convert_text(&self, member: &XamlMember, text: &str) -> Result<Value> {
        if let Some(serializer) = member.value_serializer() {
            if serializer.can_convert_from_string(text) {
                return serializer.convert_from_string(text).map_err(Error::conversion);
            }
        }
        if let Some(converter) = member.type_converter() {
            if converter.can_convert_from_string() {
                return converter.convert_from_string(text).map_err(Error::conversion);
            }
        }
        match self.schema.get_type(member.member_type()) {
            Some(member_type) if !is_text_type(member_type.type_name()) => {
                self.from_text(&member_type, text)
            }
            _ => Ok(Value::String(text.to_string())),
        }
    }

    fn assign_child(
        &self,
        owner: &Value,
        member: &XamlMember,
        child: Child,
        scope: usize,
        fixups: &mut Vec<Fixup>,
    ) -> Result<()> {
        if let Some(name) = child.forward {
            fixups.push(Fixup {
                scope,
                owner: owner.clone(),
                target: FixupTarget::Member(member.clone()),
                name,
            });
            return Ok(());
        }
        let value = match (&child.value, child.bare) {
            (Value::String(text), true) => self.convert_text(member, text)?,
            _ => child.value,
        };
        self.assign(owner, member, value)
    }

    fn assign(&self, owner: &Value, member: &XamlMember, value: Value) -> Result<()> {
        let instance = owner.as_instance_or_err()?;
        if member.is_attachable() {
            self.runtime.set_attached(instance, member, value)
        } else {
            self.runtime.set_value(instance, member, value)
        }
    }

    fn add_item(
        &self,
        collection: &Value,
        collection_type: &XamlType,
        child: Child,
        scope: usize,
        fixups: &mut Vec<Fixup>,
    ) -> Result<()> {
        if child.existing {
            return Ok(());
        }
        if let Some(name) = child.forward {
            warn!(name = %name, "forward reference in a collection is appended at the end");
            fixups.push(Fixup {
                scope,
                owner: collection.clone(),
                target: FixupTarget::Item { key: child.key },
                name,
            });
            return Ok(());
        }
        let value = match (&child.value, child.bare) {
            (Value::String(text), true) => self.wrap_text(collection_type, text)?,
            _ => child.value,
        };
        self.add_resolved(collection, collection_type, child.key, value)
    }

    fn add_resolved(
        &self,
        collection: &Value,
        collection_type: &XamlType,
        key: Option<Value>,
        value: Value,
    ) -> Result<()> {
        let instance = collection.as_instance_or_err()?;
        match collection_type.collection_kind() {
            CollectionKind::Dictionary => {
                let key = match key {
                    Some(key) => key,
                    None => self.implicit_key(&value)?,
                };
                self.runtime.add_entry(instance, key, value)
            }
            _ => self.runtime.add(instance, value),
        }
    }

    /// The key a dictionary value carries in its dictionary-key property.
    fn implicit_key(&self, value: &Value) -> Result<Value> {
        let value_type = self.schema.type_of(value, self.runtime)?;
        let property = value_type
            .dictionary_key_property()
            .and_then(|p| value_type.member(p))
            .ok_or_else(|| Error::malformed("dictionary entry without a key"))?;
        self.runtime.get_value(value.as_instance_or_err()?, property)
    }

    /// Puts bare text back into the collection's first content wrapper.
    fn wrap_text(&self, collection_type: &XamlType, text: &str) -> Result<Value> {
        let Some(wrapper_name) = collection_type.content_wrappers().first() else {
            return Ok(Value::String(text.to_string()));
        };
        let wrapper = self.schema.require_type(wrapper_name)?;
        let content = wrapper
            .content_property()
            .and_then(|p| wrapper.member(p))
            .ok_or_else(|| Error::unknown_member(wrapper.type_name(), "content"))?;
        let value = self.runtime.create_instance(&wrapper, Vec::new())?;
        self.assign(&value, content, Value::String(text.to_string()))?;
        Ok(value)
    }

    fn build_array(&self, frame: &mut ObjectFrame, fixups: &mut Vec<Fixup>) -> Result<Value> {
        let text = frame
            .text
            .take()
            .ok_or_else(|| Error::malformed("x:Array without a Type"))?;
        let item_type = self.resolve_type_name(&text)?;
        let array_type = self
            .schema
            .array_type(&item_type)
            .ok_or(Error::UnknownType(item_type))?;
        let array = self.runtime.create_instance(&array_type, Vec::new())?;
        for item in std::mem::take(&mut frame.items) {
            self.add_item(&array, &array_type, item, frame.scope, fixups)?;
        }
        Ok(array)
    }

    fn read_xml(&self, member: Option<&XamlMember>, xml: &str) -> Result<Value> {
        let serializer = member
            .and_then(|m| self.schema.get_type(m.member_type()))
            .and_then(|t| t.xml_serializer().cloned());
        match serializer {
            Some(serializer) => serializer.read_xml(xml).map_err(Error::conversion),
            None => {
                warn!("x:XData in a member without an XML serializer, keeping the text");
                Ok(Value::String(xml.to_string()))
            }
        }
    }

    /// Resolves `prefix:Name` against the declarations seen so far.
    fn resolve_type_name(&self, text: &str) -> Result<XamlTypeName> {
        let (prefix, name) = text.split_once(':').unwrap_or(("", text));
        let namespace = self
            .prefixes
            .get(prefix)
            .ok_or_else(|| Error::malformed(&format!("undeclared prefix '{}'", prefix)))?;
        Ok(XamlTypeName::new(namespace, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::{DynObject, DynRuntime};
    use crate::from_nodes;
    use crate::node::NamespaceDeclaration;
    use crate::schema::{MemberBuilder, TypeBuilder, XAML_NAMESPACE};

    fn schema() -> SchemaContext {
        let mut schema = SchemaContext::new();
        schema.register(
            TypeBuilder::new("urn:app", "Box")
                .member(MemberBuilder::new("Width", XamlTypeName::xaml("Int32")))
                .member(MemberBuilder::new("Child", XamlTypeName::xaml("Object")))
                .build()
                .unwrap(),
        );
        schema
    }

    #[test]
    fn test_text_member_is_converted() {
        let schema = schema();
        let runtime = DynRuntime::new();
        let box_type = schema.require_type(&XamlTypeName::new("urn:app", "Box")).unwrap();
        let width = box_type.member("Width").unwrap().clone();

        let value = from_nodes(
            vec![
                Node::StartObject(box_type),
                Node::StartMember(width),
                Node::Value(Value::from("12")),
                Node::EndMember,
                Node::EndObject,
            ],
            &schema,
            &runtime,
        )
        .unwrap();
        let object = value.as_instance().unwrap().downcast_ref::<DynObject>().unwrap();
        assert_eq!(object.get("Width"), Some(Value::Int32(12)));
    }

    #[test]
    fn test_unknown_member_fails_unless_ignored() {
        let mut other = SchemaContext::new();
        other.register(
            TypeBuilder::new("urn:app", "Box")
                .member(MemberBuilder::new("Depth", XamlTypeName::xaml("Int32")))
                .build()
                .unwrap(),
        );
        let depth = other
            .require_type(&XamlTypeName::new("urn:app", "Box"))
            .unwrap()
            .member("Depth")
            .unwrap()
            .clone();
        let schema = schema();
        let box_type = schema.require_type(&XamlTypeName::new("urn:app", "Box")).unwrap();
        let runtime = DynRuntime::new();
        let nodes = vec![
            Node::StartObject(box_type),
            Node::StartMember(depth),
            Node::Value(Value::from("3")),
            Node::EndMember,
            Node::EndObject,
        ];

        let strict = from_nodes(nodes.clone(), &schema, &runtime);
        assert!(matches!(strict, Err(Error::UnknownMember { .. })));

        let mut writer = ObjectWriter::with_settings(
            &schema,
            &runtime,
            ObjectWriterSettings::new().with_ignore_unknown_members(true),
        );
        for node in nodes {
            writer.write_node(node).unwrap();
        }
        assert!(writer.result().is_ok());
    }

    #[test]
    fn test_forward_reference_is_patched() {
        let schema = schema();
        let runtime = DynRuntime::new();
        let box_type = schema.require_type(&XamlTypeName::new("urn:app", "Box")).unwrap();
        let child = box_type.member("Child").unwrap().clone();
        let reference = schema.xaml_type("Reference").unwrap();

        let value = from_nodes(
            vec![
                Node::NamespaceDeclaration(NamespaceDeclaration::new(XAML_NAMESPACE, "x")),
                Node::StartObject(box_type),
                Node::StartMember(child),
                Node::StartObject(reference),
                Node::StartMember(XamlMember::directive(Directive::PositionalParameters)),
                Node::Value(Value::from("self")),
                Node::EndMember,
                Node::EndObject,
                Node::EndMember,
                Node::StartMember(XamlMember::directive(Directive::Name)),
                Node::Value(Value::from("self")),
                Node::EndMember,
                Node::EndObject,
            ],
            &schema,
            &runtime,
        )
        .unwrap();
        let object = value.as_instance().unwrap().downcast_ref::<DynObject>().unwrap();
        assert_eq!(object.get("Child"), Some(value.clone()));
    }

    #[test]
    fn test_unbalanced_stream_is_malformed() {
        let schema = schema();
        let runtime = DynRuntime::new();
        let mut writer = ObjectWriter::new(&schema, &runtime);
        assert!(matches!(
            writer.write_node(Node::EndMember),
            Err(Error::MalformedStream(_))
        ));

        let box_type = schema.require_type(&XamlTypeName::new("urn:app", "Box")).unwrap();
        let mut writer = ObjectWriter::new(&schema, &runtime);
        writer.write_node(Node::StartObject(box_type)).unwrap();
        assert!(matches!(writer.result(), Err(Error::MalformedStream(_))));
    }

    #[test]
    fn test_unresolved_reference() {
        let schema = schema();
        let runtime = DynRuntime::new();
        let box_type = schema.require_type(&XamlTypeName::new("urn:app", "Box")).unwrap();
        let child = box_type.member("Child").unwrap().clone();
        let reference = schema.xaml_type("Reference").unwrap();
        let result = from_nodes(
            vec![
                Node::StartObject(box_type),
                Node::StartMember(child),
                Node::StartObject(reference),
                Node::StartMember(XamlMember::directive(Directive::PositionalParameters)),
                Node::Value(Value::from("missing")),
                Node::EndMember,
                Node::EndObject,
                Node::EndMember,
                Node::EndObject,
            ],
            &schema,
            &runtime,
        );
        assert!(matches!(result, Err(Error::UnresolvedReference(name)) if name == "missing"));
    }
}
