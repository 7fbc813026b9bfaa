//! The intermediate markup tree.
//!
//! The reader builds the whole tree before emitting anything. Object records
//! live in a [`MarkupArena`] and are referenced by [`RecordId`], which lets a
//! record be registered in the reference table before its members exist and
//! lets later passes (name assignment, scope resumption) patch it in place.
//!
//! Records decompose lazily: popping an object yields its start node and
//! pushes its sorted members followed by an end marker.

use crate::node::{NamespaceDeclaration, Node};
use crate::order::PartialOrder;
use crate::schema::{Directive, XamlMember, XamlType};
use crate::value::Value;
use std::cell::Cell;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RecordId(usize);

impl RecordId {
    pub(crate) const fn new(index: usize) -> Self {
        RecordId(index)
    }
}

/// Node an object record opens with.
#[derive(Clone, Debug)]
pub(crate) enum ObjectNode {
    Start(XamlType),
    Get,
}

pub(crate) struct ObjectRecord {
    pub(crate) node: ObjectNode,
    /// The live object, kept for identity and `instance()` only.
    pub(crate) source: Value,
    pub(crate) members: Vec<MemberRecord>,
    pub(crate) name: Option<String>,
    /// A member already carries `name`.
    pub(crate) name_written: bool,
    /// Something refers to this record by name.
    pub(crate) needs_name: bool,
    /// Set on `x:Reference` records.
    pub(crate) reference_to: Option<RecordId>,
    attributable: Cell<Option<bool>>,
}

impl ObjectRecord {
    pub(crate) fn start(xaml_type: XamlType, source: Value) -> Self {
        ObjectRecord {
            node: ObjectNode::Start(xaml_type),
            source,
            members: Vec::new(),
            name: None,
            name_written: false,
            needs_name: false,
            reference_to: None,
            attributable: Cell::new(None),
        }
    }

    /// A `GetObject` record filling an existing instance.
    pub(crate) fn get(source: Value) -> Self {
        ObjectRecord {
            node: ObjectNode::Get,
            source,
            members: Vec::new(),
            name: None,
            name_written: false,
            needs_name: false,
            reference_to: None,
            attributable: Cell::new(None),
        }
    }

    pub(crate) fn xaml_type(&self) -> Option<&XamlType> {
        match &self.node {
            ObjectNode::Start(t) => Some(t),
            ObjectNode::Get => None,
        }
    }
}

pub(crate) struct MemberRecord {
    pub(crate) member: XamlMember,
    pub(crate) children: Vec<Markup>,
    pub(crate) is_content: bool,
    pub(crate) is_factory_method: bool,
}

impl MemberRecord {
    pub(crate) fn new(member: XamlMember, children: Vec<Markup>) -> Self {
        MemberRecord {
            member,
            children,
            is_content: false,
            is_factory_method: false,
        }
    }

    /// A member holding a single text value.
    pub(crate) fn atomic(member: XamlMember, text: impl Into<String>) -> Self {
        MemberRecord::new(member, vec![Markup::Value(Value::String(text.into()))])
    }

    pub(crate) fn content(mut self, is_content: bool) -> Self {
        self.is_content = is_content;
        self
    }

    fn is_atomic(&self) -> bool {
        matches!(self.children.as_slice(), [Markup::Value(_)])
    }
}

/// One entry of the traversal stack.
pub(crate) enum Markup {
    Object(RecordId),
    Member(MemberRecord),
    Value(Value),
    Namespace(NamespaceDeclaration),
    /// A sub-stream produced by a deferring loader.
    Template(Vec<Node>),
    Node(Node),
    EndObject,
    EndMember,
}

/// Result of decomposing one stack entry.
pub(crate) struct Expansion {
    pub(crate) node: Option<Node>,
    pub(crate) record: Option<RecordId>,
    /// Entries to visit next, in forward order.
    pub(crate) children: Vec<Markup>,
}

struct MemberTraits {
    positional: bool,
    factory: bool,
    attributable: bool,
    atomic: bool,
    directive: bool,
    initialization: bool,
    arguments: bool,
    content: bool,
    name: String,
}

#[derive(Default)]
pub(crate) struct MarkupArena {
    records: Vec<ObjectRecord>,
}

impl MarkupArena {
    pub(crate) fn alloc(&mut self, record: ObjectRecord) -> RecordId {
        self.records.push(record);
        RecordId(self.records.len() - 1)
    }

    pub(crate) fn get(&self, id: RecordId) -> &ObjectRecord {
        &self.records[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: RecordId) -> &mut ObjectRecord {
        &mut self.records[id.0]
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = RecordId> {
        (0..self.records.len()).map(RecordId)
    }

    /// Whether the record can be written inline as a markup extension.
    pub(crate) fn is_attributable(&self, id: RecordId) -> bool {
        let record = self.get(id);
        if let Some(cached) = record.attributable.get() {
            return cached;
        }
        match &record.node {
            ObjectNode::Start(t) if t.is_markup_extension() => {
                record.members.iter().all(|m| self.member_is_attributable(m))
            }
            _ => false,
        }
    }

    fn member_is_attributable(&self, member: &MemberRecord) -> bool {
        if member.member.is_directive_of(Directive::Items) || member.children.is_empty() {
            return false;
        }
        if !member.member.is_directive_of(Directive::PositionalParameters) && member.children.len() != 1 {
            return false;
        }
        member.children.iter().all(|child| match child {
            Markup::Value(_) => true,
            Markup::Object(id) => self.is_attributable(*id),
            _ => false,
        })
    }

    fn traits(&self, member: &MemberRecord) -> MemberTraits {
        let m = &member.member;
        MemberTraits {
            positional: m.is_directive_of(Directive::PositionalParameters),
            factory: member.is_factory_method || m.is_directive_of(Directive::FactoryMethod),
            attributable: matches!(member.children.as_slice(), [Markup::Object(id)] if self.is_attributable(*id)),
            atomic: member.is_atomic(),
            directive: m.is_directive(),
            initialization: m.is_directive_of(Directive::Initialization),
            arguments: m.is_directive_of(Directive::Arguments),
            content: member.is_content || m.is_directive_of(Directive::Items),
            name: m.display_name(),
        }
    }

    /// Sorts members for output, then applies `DependsOn` constraints.
    fn sort_members(&self, members: Vec<MemberRecord>, attributable: bool) -> Vec<MemberRecord> {
        let mut keyed: Vec<(MemberTraits, MemberRecord)> =
            members.into_iter().map(|m| (self.traits(&m), m)).collect();
        keyed.sort_by(|(a, _), (b, _)| {
            if attributable {
                compare_attributable(a, b)
            } else {
                compare_element(a, b)
            }
        });
        apply_depends_on(keyed)
    }

    /// Expands one stack entry into its node and the entries that follow it.
    pub(crate) fn decompose(&mut self, markup: Markup) -> Expansion {
        match markup {
            Markup::Object(id) => {
                let attributable = self.is_attributable(id);
                self.records[id.0].attributable.set(Some(attributable));

                let members = std::mem::take(&mut self.records[id.0].members);
                let mut children: Vec<Markup> = self
                    .sort_members(members, attributable)
                    .into_iter()
                    .map(Markup::Member)
                    .collect();
                children.push(Markup::EndObject);

                let node = match &self.records[id.0].node {
                    ObjectNode::Start(t) => Node::StartObject(t.clone()),
                    ObjectNode::Get => Node::GetObject,
                };
                Expansion {
                    node: Some(node),
                    record: Some(id),
                    children,
                }
            }
            Markup::Member(member) => {
                let mut children = member.children;
                children.push(Markup::EndMember);
                Expansion {
                    node: Some(Node::StartMember(member.member)),
                    record: None,
                    children,
                }
            }
            Markup::Template(nodes) => Expansion {
                node: None,
                record: None,
                children: nodes.into_iter().map(Markup::Node).collect(),
            },
            Markup::Value(value) => Expansion::leaf(Node::Value(value)),
            Markup::Namespace(ns) => Expansion::leaf(Node::NamespaceDeclaration(ns)),
            Markup::Node(node) => Expansion::leaf(node),
            Markup::EndObject => Expansion::leaf(Node::EndObject),
            Markup::EndMember => Expansion::leaf(Node::EndMember),
        }
    }
}

impl Expansion {
    fn leaf(node: Node) -> Self {
        Expansion {
            node: Some(node),
            record: None,
            children: Vec::new(),
        }
    }
}

fn first(a: bool, b: bool) -> Ordering {
    // `true` sorts before `false`.
    b.cmp(&a)
}

fn compare_attributable(a: &MemberTraits, b: &MemberTraits) -> Ordering {
    first(a.positional, b.positional)
        .then(first(a.factory, b.factory))
        .then(first(a.attributable, b.attributable))
        .then(first(a.atomic, b.atomic))
        .then(first(a.directive, b.directive))
        .then_with(|| a.name.cmp(&b.name))
}

fn compare_element(a: &MemberTraits, b: &MemberTraits) -> Ordering {
    first(a.factory, b.factory)
        .then(a.content.cmp(&b.content))
        .then(first(a.attributable, b.attributable))
        .then(first(
            a.atomic && !a.initialization,
            b.atomic && !b.initialization,
        ))
        .then(first(a.atomic, b.atomic))
        .then(first(a.initialization, b.initialization))
        .then(first(a.arguments, b.arguments))
        .then(first(a.directive, b.directive))
        .then_with(|| a.name.cmp(&b.name))
}

/// Moves each dependent member right after the last member it depends on,
/// provided that keeps inline members ahead of element members. Otherwise
/// the dependent goes to the end.
fn apply_depends_on(keyed: Vec<(MemberTraits, MemberRecord)>) -> Vec<MemberRecord> {
    let present: Vec<String> = keyed.iter().map(|(t, _)| t.name.clone()).collect();
    let is_dependent = |record: &MemberRecord| {
        record
            .member
            .depends_on()
            .iter()
            .any(|dep| present.contains(dep))
    };
    if !keyed.iter().any(|(_, m)| is_dependent(m)) {
        return keyed.into_iter().map(|(_, m)| m).collect();
    }

    let mut ordered = Vec::with_capacity(keyed.len());
    let mut resolver = PartialOrder::new();
    for (traits, record) in keyed {
        if is_dependent(&record) {
            for dep in record.member.depends_on() {
                resolver.set_order(dep.clone(), traits.name.clone());
            }
            resolver.add(traits.name.clone(), (traits, record));
        } else {
            ordered.push((traits, record));
        }
    }

    for (_, (traits, record)) in resolver.into_ordered() {
        let anchor = ordered
            .iter()
            .rposition(|(t, _)| record.member.depends_on().contains(&t.name));
        let inline = |t: &MemberTraits| t.atomic || t.attributable;
        let slot = anchor.filter(|&index| {
            let anchor_inline = inline(&ordered[index].0);
            let next_inline = ordered.get(index + 1).map(|(t, _)| inline(t));
            if inline(&traits) {
                anchor_inline
            } else {
                !anchor_inline || next_inline != Some(true)
            }
        });
        match slot {
            Some(index) => ordered.insert(index + 1, (traits, record)),
            None => ordered.push((traits, record)),
        }
    }
    ordered.into_iter().map(|(_, m)| m).collect()
}

/// Whitespace that would not survive re-parsing as-is.
pub(crate) fn has_significant_whitespace(text: &str) -> bool {
    text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
        || has_consecutive_whitespace(text)
        || has_non_space_whitespace(text)
}

fn has_consecutive_whitespace(text: &str) -> bool {
    let mut previous = false;
    for c in text.chars() {
        let current = c.is_whitespace();
        if current && previous {
            return true;
        }
        previous = current;
    }
    false
}

fn has_non_space_whitespace(text: &str) -> bool {
    text.chars().any(|c| c.is_whitespace() && c != ' ')
}

/// Decides whether a wrapped string item may be written as a bare value.
pub(crate) fn can_unwrap_item(
    text: &str,
    whitespace_significant: bool,
    is_first: bool,
    is_last: bool,
    previous_unwrapped: bool,
) -> bool {
    if !whitespace_significant {
        return !has_significant_whitespace(text);
    }
    !has_consecutive_whitespace(text)
        && !has_non_space_whitespace(text)
        && (!text.ends_with(' ') || !is_last)
        && (!text.starts_with(' ') || !is_first)
        && !previous_unwrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MemberBuilder, SchemaContext, TypeBuilder, XamlTypeName};

    fn names(members: &[MemberRecord]) -> Vec<String> {
        members.iter().map(|m| m.member.display_name()).collect()
    }

    fn button() -> XamlType {
        TypeBuilder::new("urn:t", "Button")
            .member(MemberBuilder::new("Content", XamlTypeName::xaml("Object")))
            .member(MemberBuilder::new("Width", XamlTypeName::xaml("Double")))
            .member(MemberBuilder::new("Height", XamlTypeName::xaml("Double")))
            .member(MemberBuilder::new("Amount", XamlTypeName::xaml("Double")).depends_on("Maximum"))
            .member(MemberBuilder::new("Maximum", XamlTypeName::xaml("Double")))
            .content_property("Content")
            .build()
            .unwrap()
    }

    #[test]
    fn test_element_order_puts_content_last() {
        let t = button();
        let arena = MarkupArena::default();
        let members = vec![
            MemberRecord::new(t.members()[0].clone(), vec![Markup::Value("x".into()), Markup::Value("y".into())])
                .content(true),
            MemberRecord::atomic(t.members()[1].clone(), "10"),
            MemberRecord::atomic(XamlMember::directive(Directive::Name), "b1"),
            MemberRecord::atomic(t.members()[2].clone(), "20"),
        ];
        let sorted = arena.sort_members(members, false);
        assert_eq!(names(&sorted), ["Name", "Height", "Width", "Content"]);
    }

    #[test]
    fn test_attributable_order_puts_positional_first() {
        let schema = SchemaContext::new();
        let reference = schema.xaml_type("Reference").unwrap();
        let arena = MarkupArena::default();
        let members = vec![
            MemberRecord::atomic(XamlMember::directive(Directive::Key), "k"),
            MemberRecord::atomic(reference.members()[0].clone(), "a"),
            MemberRecord::atomic(XamlMember::directive(Directive::PositionalParameters), "p"),
        ];
        let sorted = arena.sort_members(members, true);
        assert_eq!(names(&sorted), ["_PositionalParameters", "Key", "Name"]);
    }

    #[test]
    fn test_depends_on_places_dependent_after_dependency() {
        let t = button();
        let arena = MarkupArena::default();
        let members = vec![
            MemberRecord::atomic(t.members()[3].clone(), "5"),
            MemberRecord::atomic(t.members()[4].clone(), "10"),
            MemberRecord::atomic(t.members()[1].clone(), "1"),
        ];
        let sorted = arena.sort_members(members, false);
        assert_eq!(names(&sorted), ["Maximum", "Amount", "Width"]);
    }

    #[test]
    fn test_null_record_is_attributable() {
        let schema = SchemaContext::new();
        let mut arena = MarkupArena::default();
        let id = arena.alloc(ObjectRecord::start(schema.xaml_type("Null").unwrap(), Value::Null));
        assert!(arena.is_attributable(id));

        let list = arena.alloc(ObjectRecord::get(Value::Null));
        assert!(!arena.is_attributable(list));
    }

    #[test]
    fn test_whitespace_significance() {
        assert!(!has_significant_whitespace("hello world"));
        assert!(has_significant_whitespace(" hello"));
        assert!(has_significant_whitespace("a  b"));
        assert!(has_significant_whitespace("a\tb"));
    }

    #[test]
    fn test_unwrap_rules_for_significant_collections() {
        assert!(!can_unwrap_item(" a", true, true, false, false));
        assert!(can_unwrap_item(" a", true, false, false, false));
        assert!(!can_unwrap_item("a ", true, false, true, false));
        assert!(!can_unwrap_item("a", true, false, false, true));
        assert!(!can_unwrap_item("a  b", true, false, false, false));
        assert!(can_unwrap_item("a b", false, true, true, true));
        assert!(!can_unwrap_item(" a", false, false, false, false));
    }

    #[test]
    fn test_plain_words_alternate_in_significant_collections() {
        let mut previous = false;
        let unwrapped: Vec<bool> = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(index, text)| {
                previous = can_unwrap_item(text, true, index == 0, index == 3, previous);
                previous
            })
            .collect();
        assert_eq!(unwrapped, [true, false, true, false]);
    }
}
