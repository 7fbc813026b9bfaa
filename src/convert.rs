//! Conversion capabilities attached to types and members.
//!
//! The serializer picks among several encodings for each value. The hooks it
//! consults are expressed as traits so a schema can attach them to a
//! [`XamlType`](crate::XamlType) or [`XamlMember`](crate::XamlMember):
//!
//! - [`ValueSerializer`]: string-specialized conversion, preferred when present
//! - [`TypeConverter`]: general conversion to/from strings, markup extensions
//!   and [`InstanceDescriptor`]s
//! - [`DeferringLoader`]: hands a value off as an independent node sub-stream
//! - [`XmlSerializer`]: writes the value as an XML blob for `x:XData`
//!
//! Converters report failure through [`ConvertError`]. A recoverable failure
//! means "this path does not apply, try the next one"; a critical failure
//! aborts the whole run.

use crate::node::Node;
use crate::schema::{ParameterInfo, XamlTypeName};
use crate::value::Value;
use thiserror::Error;

/// Failure reported by a converter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    /// Unrecoverable fault; propagates to the caller immediately.
    #[error("critical conversion fault: {0}")]
    Critical(String),

    /// This conversion path failed; the next strategy is attempted.
    #[error("conversion failed: {0}")]
    Recoverable(String),
}

impl ConvertError {
    pub fn critical<T: std::fmt::Display>(msg: T) -> Self {
        ConvertError::Critical(msg.to_string())
    }

    pub fn recoverable<T: std::fmt::Display>(msg: T) -> Self {
        ConvertError::Recoverable(msg.to_string())
    }

    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, ConvertError::Critical(_))
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            ConvertError::Critical(msg) | ConvertError::Recoverable(msg) => msg,
        }
    }
}

/// Result of a converter call.
pub type ConvertResult<T> = std::result::Result<T, ConvertError>;

/// Hands out markup names for objects.
///
/// The serializer passes itself to converters through this trait so that a
/// converter can emit a `{x:Reference name}` for an object it has not seen
/// yet. The returned name is allocated on first request and stays stable.
pub trait NameService {
    /// Returns the markup name of `value`, allocating one if needed.
    ///
    /// Returns `None` for values without identity (primitives, strings).
    fn reference_name(&mut self, value: &Value) -> Option<String>;
}

/// A naming service that never hands out names.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNames;

impl NameService for NoNames {
    fn reference_name(&mut self, _value: &Value) -> Option<String> {
        None
    }
}

/// String-specialized conversion.
pub trait ValueSerializer {
    fn can_convert_to_string(&self, value: &Value, names: &mut dyn NameService) -> bool;

    fn convert_to_string(&self, value: &Value, names: &mut dyn NameService)
        -> ConvertResult<String>;

    fn can_convert_from_string(&self, text: &str) -> bool;

    fn convert_from_string(&self, text: &str) -> ConvertResult<Value>;
}

/// How a value can be rebuilt: a constructor or method plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDescriptor {
    pub member: DescriptorMember,
    pub arguments: Vec<Value>,
    /// When set, the arguments alone rebuild the value and member enumeration
    /// is skipped.
    pub is_complete: bool,
}

impl InstanceDescriptor {
    pub fn new(member: DescriptorMember, arguments: Vec<Value>) -> Self {
        InstanceDescriptor {
            member,
            arguments,
            is_complete: true,
        }
    }

    #[must_use]
    pub fn incomplete(mut self) -> Self {
        self.is_complete = false;
        self
    }
}

/// The member an [`InstanceDescriptor`] points at.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorMember {
    Constructor {
        parameters: Vec<ParameterInfo>,
    },
    Method {
        declaring_type: XamlTypeName,
        name: String,
        parameters: Vec<ParameterInfo>,
    },
    Field {
        declaring_type: XamlTypeName,
        name: String,
    },
    Property {
        declaring_type: XamlTypeName,
        name: String,
    },
}

impl DescriptorMember {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            DescriptorMember::Constructor { .. } => "constructor",
            DescriptorMember::Method { .. } => "method",
            DescriptorMember::Field { .. } => "field",
            DescriptorMember::Property { .. } => "property",
        }
    }
}

/// General-purpose conversion attached to a type or member.
///
/// Every method has a conservative default so implementors only override the
/// directions they support.
pub trait TypeConverter {
    fn can_convert_to_string(&self, _value: &Value) -> bool {
        false
    }

    fn convert_to_string(
        &self,
        value: &Value,
        _names: &mut dyn NameService,
    ) -> ConvertResult<String> {
        Err(ConvertError::recoverable(format!(
            "cannot convert {} to string",
            value.kind_name()
        )))
    }

    fn can_convert_from_string(&self) -> bool {
        false
    }

    fn convert_from_string(&self, text: &str) -> ConvertResult<Value> {
        Err(ConvertError::recoverable(format!(
            "cannot convert '{}' from string",
            text
        )))
    }

    /// Produces a markup-extension object that stands in for `value`.
    fn to_markup_extension(&self, _value: &Value) -> ConvertResult<Option<Value>> {
        Ok(None)
    }

    /// Describes how to reconstruct `value` through a constructor or method.
    fn instance_descriptor(&self, _value: &Value) -> ConvertResult<Option<InstanceDescriptor>> {
        Ok(None)
    }
}

/// Defers a value to its own, independently produced node sub-stream.
pub trait DeferringLoader {
    fn save(&self, value: &Value, names: &mut dyn NameService) -> ConvertResult<Vec<Node>>;

    fn load(&self, nodes: Vec<Node>) -> ConvertResult<Value>;
}

/// Writes and reads a value as an XML text blob.
pub trait XmlSerializer {
    fn write_xml(&self, value: &Value) -> ConvertResult<String>;

    fn read_xml(&self, xml: &str) -> ConvertResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Opaque;

    impl TypeConverter for Opaque {}

    #[test]
    fn test_default_converter_declines_everything() {
        let conv = Opaque;
        let value = Value::from(3);
        assert!(!conv.can_convert_to_string(&value));
        assert!(!conv.can_convert_from_string());
        assert!(conv.to_markup_extension(&value).unwrap().is_none());
        assert!(conv.instance_descriptor(&value).unwrap().is_none());

        let err = conv.convert_to_string(&value, &mut NoNames).unwrap_err();
        assert!(!err.is_critical());
    }

    #[test]
    fn test_descriptor_defaults_to_complete() {
        let desc = InstanceDescriptor::new(
            DescriptorMember::Constructor { parameters: vec![] },
            vec![],
        );
        assert!(desc.is_complete);
        assert!(!desc.incomplete().is_complete);
    }
}
