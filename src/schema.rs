//! Metadata describing types and members.
//!
//! The serializer treats this module as a read-only oracle. A
//! [`SchemaContext`] is an explicit registration table: hosts describe their
//! types with [`TypeBuilder`] and [`MemberBuilder`] and register them once.
//! The language-namespace builtins (`x:Int32`, `x:Null`, `x:Reference`, ...)
//! are always present.
//!
//! ## Examples
//!
//! ```rust
//! use xaml_stream::{MemberBuilder, SchemaContext, TypeBuilder, XamlTypeName};
//!
//! let mut schema = SchemaContext::new();
//! schema.set_preferred_prefix("urn:shapes", "s");
//! schema
//!     .register(
//!         TypeBuilder::new("urn:shapes", "Circle")
//!             .member(MemberBuilder::new("Radius", XamlTypeName::xaml("Double")))
//!             .build()
//!             .unwrap(),
//!     );
//!
//! let circle = schema.get_type(&XamlTypeName::new("urn:shapes", "Circle")).unwrap();
//! assert!(circle.member("Radius").is_some());
//! assert_eq!(schema.preferred_prefix("urn:shapes"), Some("s"));
//! ```

use crate::convert::{DeferringLoader, TypeConverter, ValueSerializer, XmlSerializer};
use crate::error::{Error, Result};
use crate::runtime::XamlRuntime;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::rc::Rc;

/// The XAML language namespace.
pub const XAML_NAMESPACE: &str = "http://schemas.microsoft.com/winfx/2006/xaml";

/// Preferred prefix of [`XAML_NAMESPACE`].
pub const XAML_PREFIX: &str = "x";

/// Namespace-qualified type name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct XamlTypeName {
    pub namespace: String,
    pub name: String,
}

impl XamlTypeName {
    pub fn new(namespace: &str, name: &str) -> Self {
        XamlTypeName {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// A name in the XAML language namespace.
    pub fn xaml(name: &str) -> Self {
        XamlTypeName::new(XAML_NAMESPACE, name)
    }

    #[must_use]
    pub fn is_xaml(&self) -> bool {
        self.namespace == XAML_NAMESPACE
    }
}

impl fmt::Display for XamlTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.name)
    }
}

/// How a type stores its items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CollectionKind {
    #[default]
    None,
    Collection,
    Dictionary,
    Array,
}

/// Accessibility of a type member accessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Internal,
    Protected,
    Private,
}

/// Designer serialization visibility of a member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SerializationVisibility {
    #[default]
    Visible,
    Hidden,
    /// Serialize the contents of a read-only member.
    Content,
}

/// A named, typed constructor or method parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: String,
    pub parameter_type: XamlTypeName,
}

impl ParameterInfo {
    pub fn new(name: &str, parameter_type: XamlTypeName) -> Self {
        ParameterInfo {
            name: name.to_string(),
            parameter_type,
        }
    }
}

/// A non-default constructor signature.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ConstructorInfo {
    pub parameters: Vec<ParameterInfo>,
}

impl ConstructorInfo {
    pub fn new(parameters: Vec<ParameterInfo>) -> Self {
        ConstructorInfo { parameters }
    }
}

/// Language directives, produced on demand by [`XamlMember::directive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Directive {
    Name,
    Key,
    Arguments,
    FactoryMethod,
    Initialization,
    Items,
    PositionalParameters,
}

impl Directive {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Directive::Name => "Name",
            Directive::Key => "Key",
            Directive::Arguments => "Arguments",
            Directive::FactoryMethod => "FactoryMethod",
            Directive::Initialization => "_Initialization",
            Directive::Items => "_Items",
            Directive::PositionalParameters => "_PositionalParameters",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            Directive::Name,
            Directive::Key,
            Directive::Arguments,
            Directive::FactoryMethod,
            Directive::Initialization,
            Directive::Items,
            Directive::PositionalParameters,
        ]
        .into_iter()
        .find(|d| d.name() == name)
    }
}

/// What kind of member a [`XamlMember`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Property,
    Attachable,
    Directive(Directive),
}

struct MemberInfo {
    name: String,
    kind: MemberKind,
    declaring_type: XamlTypeName,
    member_type: XamlTypeName,
    getter: Visibility,
    setter: Option<Visibility>,
    serialization_visibility: SerializationVisibility,
    default_value: Option<Value>,
    type_converter: Option<Rc<dyn TypeConverter>>,
    value_serializer: Option<Rc<dyn ValueSerializer>>,
    deferring_loader: Option<Rc<dyn DeferringLoader>>,
    depends_on: Vec<String>,
    constructor_argument: Option<String>,
}

/// Descriptor of a property, attachable property or directive.
///
/// Cheap to clone; equality compares kind, declaring type and name.
#[derive(Clone)]
pub struct XamlMember(Rc<MemberInfo>);

impl XamlMember {
    /// The descriptor for a language directive.
    pub fn directive(directive: Directive) -> Self {
        XamlMember(Rc::new(MemberInfo {
            name: directive.name().to_string(),
            kind: MemberKind::Directive(directive),
            declaring_type: XamlTypeName::xaml(directive.name()),
            member_type: XamlTypeName::xaml("Object"),
            getter: Visibility::Public,
            setter: Some(Visibility::Public),
            serialization_visibility: SerializationVisibility::Visible,
            default_value: None,
            type_converter: None,
            value_serializer: None,
            deferring_loader: None,
            depends_on: Vec::new(),
            constructor_argument: None,
        }))
    }

    /// A placeholder for an attachable member the schema does not know.
    pub fn unknown_attachable(declaring_type: &XamlTypeName, name: &str) -> Self {
        MemberBuilder::new(name, XamlTypeName::xaml("Object"))
            .attachable()
            .into_member(declaring_type)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn kind(&self) -> MemberKind {
        self.0.kind
    }

    #[must_use]
    pub fn declaring_type(&self) -> &XamlTypeName {
        &self.0.declaring_type
    }

    #[must_use]
    pub fn member_type(&self) -> &XamlTypeName {
        &self.0.member_type
    }

    #[must_use]
    pub fn getter(&self) -> Visibility {
        self.0.getter
    }

    #[must_use]
    pub fn setter(&self) -> Option<Visibility> {
        self.0.setter
    }

    #[must_use]
    pub fn serialization_visibility(&self) -> SerializationVisibility {
        self.0.serialization_visibility
    }

    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.0.default_value.as_ref()
    }

    #[must_use]
    pub fn type_converter(&self) -> Option<&Rc<dyn TypeConverter>> {
        self.0.type_converter.as_ref()
    }

    #[must_use]
    pub fn value_serializer(&self) -> Option<&Rc<dyn ValueSerializer>> {
        self.0.value_serializer.as_ref()
    }

    #[must_use]
    pub fn deferring_loader(&self) -> Option<&Rc<dyn DeferringLoader>> {
        self.0.deferring_loader.as_ref()
    }

    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        &self.0.depends_on
    }

    #[must_use]
    pub fn constructor_argument(&self) -> Option<&str> {
        self.0.constructor_argument.as_deref()
    }

    #[must_use]
    pub fn is_directive(&self) -> bool {
        matches!(self.0.kind, MemberKind::Directive(_))
    }

    #[must_use]
    pub fn is_attachable(&self) -> bool {
        self.0.kind == MemberKind::Attachable
    }

    #[must_use]
    pub fn is_directive_of(&self, directive: Directive) -> bool {
        self.0.kind == MemberKind::Directive(directive)
    }

    /// Name used for sorting and diagnostics; attachable members are
    /// qualified with their owner (`Grid.Row`).
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.0.kind {
            MemberKind::Attachable => format!("{}.{}", self.0.declaring_type.name, self.0.name),
            _ => self.0.name.clone(),
        }
    }

    /// Namespace a prefix must be declared for when this member is written.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        match self.0.kind {
            MemberKind::Property => None,
            MemberKind::Attachable => Some(&self.0.declaring_type.namespace),
            MemberKind::Directive(_) => Some(XAML_NAMESPACE),
        }
    }
}

impl PartialEq for XamlMember {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind == other.0.kind
            && self.0.name == other.0.name
            && (self.is_directive() || self.0.declaring_type == other.0.declaring_type)
    }
}

impl fmt::Debug for XamlMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.kind {
            MemberKind::Directive(_) => write!(f, "x:{}", self.0.name),
            _ => write!(f, "{}", self.display_name()),
        }
    }
}

impl Serialize for XamlMember {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:?}", self))
    }
}

/// Builds a [`XamlMember`] for a [`TypeBuilder`].
pub struct MemberBuilder {
    name: String,
    kind: MemberKind,
    member_type: XamlTypeName,
    getter: Visibility,
    setter: Option<Visibility>,
    serialization_visibility: SerializationVisibility,
    default_value: Option<Value>,
    type_converter: Option<Rc<dyn TypeConverter>>,
    value_serializer: Option<Rc<dyn ValueSerializer>>,
    deferring_loader: Option<Rc<dyn DeferringLoader>>,
    depends_on: Vec<String>,
    constructor_argument: Option<String>,
}

impl MemberBuilder {
    /// A public, read-write property.
    pub fn new(name: &str, member_type: XamlTypeName) -> Self {
        MemberBuilder {
            name: name.to_string(),
            kind: MemberKind::Property,
            member_type,
            getter: Visibility::Public,
            setter: Some(Visibility::Public),
            serialization_visibility: SerializationVisibility::Visible,
            default_value: None,
            type_converter: None,
            value_serializer: None,
            deferring_loader: None,
            depends_on: Vec::new(),
            constructor_argument: None,
        }
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.setter = None;
        self
    }

    #[must_use]
    pub fn attachable(mut self) -> Self {
        self.kind = MemberKind::Attachable;
        self
    }

    #[must_use]
    pub fn getter(mut self, visibility: Visibility) -> Self {
        self.getter = visibility;
        self
    }

    #[must_use]
    pub fn setter(mut self, visibility: Visibility) -> Self {
        self.setter = Some(visibility);
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.serialization_visibility = SerializationVisibility::Hidden;
        self
    }

    #[must_use]
    pub fn content(mut self) -> Self {
        self.serialization_visibility = SerializationVisibility::Content;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn type_converter(mut self, converter: Rc<dyn TypeConverter>) -> Self {
        self.type_converter = Some(converter);
        self
    }

    #[must_use]
    pub fn value_serializer(mut self, serializer: Rc<dyn ValueSerializer>) -> Self {
        self.value_serializer = Some(serializer);
        self
    }

    #[must_use]
    pub fn deferring_loader(mut self, loader: Rc<dyn DeferringLoader>) -> Self {
        self.deferring_loader = Some(loader);
        self
    }

    #[must_use]
    pub fn depends_on(mut self, member: &str) -> Self {
        self.depends_on.push(member.to_string());
        self
    }

    #[must_use]
    pub fn constructor_argument(mut self, parameter: &str) -> Self {
        self.constructor_argument = Some(parameter.to_string());
        self
    }

    fn into_member(self, declaring_type: &XamlTypeName) -> XamlMember {
        XamlMember(Rc::new(MemberInfo {
            name: self.name,
            kind: self.kind,
            declaring_type: declaring_type.clone(),
            member_type: self.member_type,
            getter: self.getter,
            setter: self.setter,
            serialization_visibility: self.serialization_visibility,
            default_value: self.default_value,
            type_converter: self.type_converter,
            value_serializer: self.value_serializer,
            deferring_loader: self.deferring_loader,
            depends_on: self.depends_on,
            constructor_argument: self.constructor_argument,
        }))
    }
}

struct TypeInfo {
    name: XamlTypeName,
    assembly: Option<String>,
    is_public: bool,
    is_constructible: bool,
    is_markup_extension: bool,
    is_name_scope: bool,
    is_whitespace_significant_collection: bool,
    collection_kind: CollectionKind,
    array_rank: usize,
    item_type: Option<XamlTypeName>,
    content_property: Option<String>,
    content_wrappers: Vec<XamlTypeName>,
    runtime_name_property: Option<String>,
    dictionary_key_property: Option<String>,
    constructors: Vec<ConstructorInfo>,
    members: Vec<XamlMember>,
    type_converter: Option<Rc<dyn TypeConverter>>,
    value_serializer: Option<Rc<dyn ValueSerializer>>,
    deferring_loader: Option<Rc<dyn DeferringLoader>>,
    xml_serializer: Option<Rc<dyn XmlSerializer>>,
}

/// Descriptor of a type.
///
/// Cheap to clone; equality compares the qualified name.
#[derive(Clone)]
pub struct XamlType(Rc<TypeInfo>);

impl XamlType {
    #[must_use]
    pub fn type_name(&self) -> &XamlTypeName {
        &self.0.name
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name.name
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.0.name.namespace
    }

    #[must_use]
    pub fn assembly(&self) -> Option<&str> {
        self.0.assembly.as_deref()
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.0.is_public
    }

    /// Whether the type has a default constructor.
    #[must_use]
    pub fn is_constructible(&self) -> bool {
        self.0.is_constructible
    }

    #[must_use]
    pub fn is_markup_extension(&self) -> bool {
        self.0.is_markup_extension
    }

    #[must_use]
    pub fn is_name_scope(&self) -> bool {
        self.0.is_name_scope
    }

    #[must_use]
    pub fn is_whitespace_significant_collection(&self) -> bool {
        self.0.is_whitespace_significant_collection
    }

    #[must_use]
    pub fn collection_kind(&self) -> CollectionKind {
        self.0.collection_kind
    }

    /// Collections, dictionaries and arrays always need their items emitted.
    #[must_use]
    pub fn has_items(&self) -> bool {
        self.0.collection_kind != CollectionKind::None
    }

    #[must_use]
    pub fn array_rank(&self) -> usize {
        self.0.array_rank
    }

    #[must_use]
    pub fn item_type(&self) -> Option<&XamlTypeName> {
        self.0.item_type.as_ref()
    }

    #[must_use]
    pub fn content_property(&self) -> Option<&str> {
        self.0.content_property.as_deref()
    }

    #[must_use]
    pub fn content_wrappers(&self) -> &[XamlTypeName] {
        &self.0.content_wrappers
    }

    #[must_use]
    pub fn runtime_name_property(&self) -> Option<&str> {
        self.0.runtime_name_property.as_deref()
    }

    #[must_use]
    pub fn dictionary_key_property(&self) -> Option<&str> {
        self.0.dictionary_key_property.as_deref()
    }

    #[must_use]
    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.0.constructors
    }

    /// All members, including read-only and hidden ones.
    #[must_use]
    pub fn members(&self) -> &[XamlMember] {
        &self.0.members
    }

    #[must_use]
    pub fn member(&self, name: &str) -> Option<&XamlMember> {
        self.0
            .members
            .iter()
            .find(|m| m.name() == name && m.kind() == MemberKind::Property)
    }

    #[must_use]
    pub fn attachable_member(&self, name: &str) -> Option<&XamlMember> {
        self.0
            .members
            .iter()
            .find(|m| m.name() == name && m.is_attachable())
    }

    #[must_use]
    pub fn type_converter(&self) -> Option<&Rc<dyn TypeConverter>> {
        self.0.type_converter.as_ref()
    }

    #[must_use]
    pub fn value_serializer(&self) -> Option<&Rc<dyn ValueSerializer>> {
        self.0.value_serializer.as_ref()
    }

    #[must_use]
    pub fn deferring_loader(&self) -> Option<&Rc<dyn DeferringLoader>> {
        self.0.deferring_loader.as_ref()
    }

    #[must_use]
    pub fn xml_serializer(&self) -> Option<&Rc<dyn XmlSerializer>> {
        self.0.xml_serializer.as_ref()
    }
}

impl PartialEq for XamlType {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl fmt::Debug for XamlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

impl Serialize for XamlType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.name.serialize(serializer)
    }
}

/// Describes a type for registration in a [`SchemaContext`].
pub struct TypeBuilder {
    info: TypeInfo,
    members: Vec<MemberBuilder>,
}

impl TypeBuilder {
    /// A public, default-constructible type with no members.
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeBuilder {
            info: TypeInfo {
                name: XamlTypeName::new(namespace, name),
                assembly: None,
                is_public: true,
                is_constructible: true,
                is_markup_extension: false,
                is_name_scope: false,
                is_whitespace_significant_collection: false,
                collection_kind: CollectionKind::None,
                array_rank: 0,
                item_type: None,
                content_property: None,
                content_wrappers: Vec::new(),
                runtime_name_property: None,
                dictionary_key_property: None,
                constructors: Vec::new(),
                members: Vec::new(),
                type_converter: None,
                value_serializer: None,
                deferring_loader: None,
                xml_serializer: None,
            },
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn assembly(mut self, assembly: &str) -> Self {
        self.info.assembly = Some(assembly.to_string());
        self
    }

    /// Marks the type internal to its assembly.
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.info.is_public = false;
        self
    }

    /// Removes the default constructor.
    #[must_use]
    pub fn no_default_constructor(mut self) -> Self {
        self.info.is_constructible = false;
        self
    }

    #[must_use]
    pub fn constructor(mut self, parameters: Vec<ParameterInfo>) -> Self {
        self.info.constructors.push(ConstructorInfo::new(parameters));
        self
    }

    #[must_use]
    pub fn markup_extension(mut self) -> Self {
        self.info.is_markup_extension = true;
        self
    }

    #[must_use]
    pub fn name_scope(mut self) -> Self {
        self.info.is_name_scope = true;
        self
    }

    #[must_use]
    pub fn collection(mut self) -> Self {
        self.info.collection_kind = CollectionKind::Collection;
        self
    }

    #[must_use]
    pub fn dictionary(mut self) -> Self {
        self.info.collection_kind = CollectionKind::Dictionary;
        self
    }

    #[must_use]
    pub fn array(mut self, item_type: XamlTypeName, rank: usize) -> Self {
        self.info.collection_kind = CollectionKind::Array;
        self.info.item_type = Some(item_type);
        self.info.array_rank = rank;
        self
    }

    #[must_use]
    pub fn item_type(mut self, item_type: XamlTypeName) -> Self {
        self.info.item_type = Some(item_type);
        self
    }

    #[must_use]
    pub fn whitespace_significant(mut self) -> Self {
        self.info.is_whitespace_significant_collection = true;
        self
    }

    #[must_use]
    pub fn content_property(mut self, member: &str) -> Self {
        self.info.content_property = Some(member.to_string());
        self
    }

    #[must_use]
    pub fn content_wrapper(mut self, wrapper: XamlTypeName) -> Self {
        self.info.content_wrappers.push(wrapper);
        self
    }

    #[must_use]
    pub fn runtime_name_property(mut self, member: &str) -> Self {
        self.info.runtime_name_property = Some(member.to_string());
        self
    }

    #[must_use]
    pub fn dictionary_key_property(mut self, member: &str) -> Self {
        self.info.dictionary_key_property = Some(member.to_string());
        self
    }

    #[must_use]
    pub fn member(mut self, member: MemberBuilder) -> Self {
        self.members.push(member);
        self
    }

    #[must_use]
    pub fn type_converter(mut self, converter: Rc<dyn TypeConverter>) -> Self {
        self.info.type_converter = Some(converter);
        self
    }

    #[must_use]
    pub fn value_serializer(mut self, serializer: Rc<dyn ValueSerializer>) -> Self {
        self.info.value_serializer = Some(serializer);
        self
    }

    #[must_use]
    pub fn deferring_loader(mut self, loader: Rc<dyn DeferringLoader>) -> Self {
        self.info.deferring_loader = Some(loader);
        self
    }

    #[must_use]
    pub fn xml_serializer(mut self, serializer: Rc<dyn XmlSerializer>) -> Self {
        self.info.xml_serializer = Some(serializer);
        self
    }

    /// Validates the declarations and produces the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchema`] when a special-purpose property names
    /// no member, or a constructor-argument annotation is empty or names no
    /// constructor parameter.
    pub fn build(self) -> Result<XamlType> {
        let xaml_type = self.build_unchecked();
        validate(&xaml_type)?;
        Ok(xaml_type)
    }

    pub(crate) fn build_unchecked(self) -> XamlType {
        let TypeBuilder { mut info, members } = self;
        let owner = info.name.clone();
        info.members = members
            .into_iter()
            .map(|m| m.into_member(&owner))
            .collect();
        XamlType(Rc::new(info))
    }
}

fn validate(xaml_type: &XamlType) -> Result<()> {
    let owner = xaml_type.type_name();
    for (label, property) in [
        ("content property", xaml_type.content_property()),
        ("runtime name property", xaml_type.runtime_name_property()),
        ("dictionary key property", xaml_type.dictionary_key_property()),
    ] {
        if let Some(name) = property {
            if xaml_type.member(name).is_none() {
                return Err(Error::invalid_schema(
                    owner,
                    name,
                    &format!("{} names no member", label),
                ));
            }
        }
    }

    for member in xaml_type.members() {
        let Some(parameter) = member.constructor_argument() else {
            continue;
        };
        if parameter.is_empty() {
            return Err(Error::invalid_schema(
                owner,
                member.name(),
                "constructor argument annotation requires a parameter name",
            ));
        }
        let known = xaml_type
            .constructors()
            .iter()
            .flat_map(|c| c.parameters.iter())
            .any(|p| p.name == parameter);
        if !known {
            return Err(Error::invalid_schema(
                owner,
                member.name(),
                &format!("constructor argument '{}' names no parameter", parameter),
            ));
        }
    }
    Ok(())
}

/// Registration table of every type the serializer can describe.
pub struct SchemaContext {
    types: IndexMap<XamlTypeName, XamlType>,
    prefixes: IndexMap<String, String>,
}

impl SchemaContext {
    /// A context holding only the language builtins.
    pub fn new() -> Self {
        let mut ctx = SchemaContext {
            types: IndexMap::new(),
            prefixes: IndexMap::new(),
        };
        ctx.set_preferred_prefix(XAML_NAMESPACE, XAML_PREFIX);
        crate::builtins::register_builtins(&mut ctx);
        ctx
    }

    /// Registers (or replaces) a type.
    pub fn register(&mut self, xaml_type: XamlType) -> &mut Self {
        self.types.insert(xaml_type.type_name().clone(), xaml_type);
        self
    }

    pub fn set_preferred_prefix(&mut self, namespace: &str, prefix: &str) -> &mut Self {
        self.prefixes
            .insert(namespace.to_string(), prefix.to_string());
        self
    }

    #[must_use]
    pub fn preferred_prefix(&self, namespace: &str) -> Option<&str> {
        self.prefixes.get(namespace).map(String::as_str)
    }

    #[must_use]
    pub fn get_type(&self, name: &XamlTypeName) -> Option<XamlType> {
        self.types.get(name).cloned()
    }

    /// Looks up a type, failing with [`Error::UnknownType`].
    pub fn require_type(&self, name: &XamlTypeName) -> Result<XamlType> {
        self.get_type(name)
            .ok_or_else(|| Error::UnknownType(name.clone()))
    }

    /// A builtin from the language namespace.
    pub fn xaml_type(&self, name: &str) -> Result<XamlType> {
        self.require_type(&XamlTypeName::xaml(name))
    }

    /// The attachable member `name` declared on `declaring_type`.
    #[must_use]
    pub fn attachable_member(
        &self,
        declaring_type: &XamlTypeName,
        name: &str,
    ) -> Option<XamlMember> {
        self.types
            .get(declaring_type)
            .and_then(|t| t.attachable_member(name))
            .cloned()
    }

    /// The registered single-rank array type whose items are `item_type`.
    #[must_use]
    pub fn array_type(&self, item_type: &XamlTypeName) -> Option<XamlType> {
        self.types
            .values()
            .find(|t| {
                t.collection_kind() == CollectionKind::Array
                    && t.array_rank() == 1
                    && t.item_type() == Some(item_type)
            })
            .cloned()
    }

    /// The type of a value: builtins for primitives, the runtime's answer
    /// for objects.
    pub fn type_of(&self, value: &Value, runtime: &dyn XamlRuntime) -> Result<XamlType> {
        let builtin = match value {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Char(_) => "Char",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::DateTime(_) => "DateTime",
            Value::BigInt(_) => "BigInteger",
            Value::Type(_) => "Type",
            Value::Object(instance) => {
                let name = runtime.type_of(instance)?;
                return self.require_type(&name);
            }
        };
        self.xaml_type(builtin)
    }
}

impl Default for SchemaContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_dangling_content_property() {
        let err = TypeBuilder::new("urn:t", "Panel")
            .content_property("Children")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidSchema { ref member, .. } if member == "Children"));
    }

    #[test]
    fn test_build_rejects_unknown_constructor_parameter() {
        let err = TypeBuilder::new("urn:t", "Point")
            .constructor(vec![ParameterInfo::new("x", XamlTypeName::xaml("Int32"))])
            .member(MemberBuilder::new("Y", XamlTypeName::xaml("Int32")).constructor_argument("y"))
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("'y'"));
    }

    #[test]
    fn test_directives_compare_by_name() {
        assert_eq!(
            XamlMember::directive(Directive::Key),
            XamlMember::directive(Directive::Key)
        );
        assert_ne!(
            XamlMember::directive(Directive::Key),
            XamlMember::directive(Directive::Name)
        );
        assert_eq!(Directive::from_name("_Items"), Some(Directive::Items));
    }

    #[test]
    fn test_attachable_lookup_ignores_plain_properties() {
        let mut schema = SchemaContext::new();
        schema.register(
            TypeBuilder::new("urn:t", "Grid")
                .member(MemberBuilder::new("Row", XamlTypeName::xaml("Int32")).attachable())
                .member(MemberBuilder::new("Width", XamlTypeName::xaml("Double")))
                .build()
                .unwrap(),
        );
        let grid = XamlTypeName::new("urn:t", "Grid");
        let row = schema.attachable_member(&grid, "Row").unwrap();
        assert_eq!(row.display_name(), "Grid.Row");
        assert_eq!(row.namespace(), Some("urn:t"));
        assert!(schema.attachable_member(&grid, "Width").is_none());
    }

    #[test]
    fn test_builtins_are_registered() {
        let schema = SchemaContext::new();
        let int32 = schema.xaml_type("Int32").unwrap();
        assert!(int32.type_converter().is_some());
        assert!(int32.value_serializer().is_some());
        assert!(schema.xaml_type("Reference").unwrap().is_markup_extension());
    }
}
