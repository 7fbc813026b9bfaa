//! Error types for object-graph serialization and node-stream loading.
//!
//! Every failure that can abort a run is a variant of [`Error`]. The tree
//! built by the [`ObjectReader`](crate::ObjectReader) must be fully valid
//! before the first node is emitted, so construction-time errors surface
//! from the constructor and no partial stream is ever produced.
//!
//! ## Error Categories
//!
//! - **Construction errors**: invisible types, types that cannot round-trip,
//!   missing constructors, multi-dimensional arrays, bad instance descriptors,
//!   duplicate names, non-string runtime names, attached-property conflicts,
//!   keyed dictionary values written by a deferring loader
//! - **Conversion errors**: critical converter faults (recoverable ones never
//!   reach the caller, see [`ConvertError`](crate::ConvertError))
//! - **Consumer misuse**: reading from a closed reader, malformed schema
//!   metadata, malformed node streams handed to the writer
//!
//! ## Examples
//!
//! ```rust
//! use xaml_stream::{Error, XamlTypeName};
//!
//! let err = Error::duplicate_name("button1");
//! assert!(err.to_string().contains("button1"));
//!
//! let err = Error::TypeCannotRoundtrip(XamlTypeName::new("urn:app", "Widget"));
//! assert!(err.to_string().contains("Widget"));
//! ```

use crate::convert::ConvertError;
use crate::schema::XamlTypeName;
use std::fmt;
use thiserror::Error;

/// Represents all possible errors raised while reading an object graph into
/// nodes or writing nodes back into an object graph.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The type is neither public nor declared in the local assembly.
    #[error("type '{0}' is not visible from the local assembly")]
    TypeNotVisible(XamlTypeName),

    /// The type has no usable construction path.
    #[error("type '{0}' cannot round-trip through markup: it is not constructible and has no factory method")]
    TypeCannotRoundtrip(XamlTypeName),

    /// Constructor-argument members exist but no constructor matches them.
    #[error("no constructor of '{type_name}' matches its constructor-argument members")]
    NoMatchingConstructor { type_name: XamlTypeName },

    /// Arrays of rank greater than one are not representable.
    #[error("multi-dimensional array type '{0}' is not supported")]
    MultiDimensionalArray(XamlTypeName),

    /// An instance descriptor named a member that is neither constructor nor method.
    #[error("instance descriptor for '{type_name}' references an unsupported member kind '{kind}'")]
    InvalidInstanceDescriptor { type_name: XamlTypeName, kind: String },

    /// Two distinct objects share a name inside one name scope.
    #[error("name '{name}' is used by more than one object in the same name scope")]
    DuplicateName { name: String },

    /// The runtime-name member held something other than a string.
    #[error("runtime name member '{member}' on '{type_name}' must hold a string")]
    NonStringName { type_name: XamlTypeName, member: String },

    /// An attached property sits on a value that has no element of its own.
    #[error("attached property '{member}' cannot be written on a {position}")]
    AttachedPropertyConflict { member: String, position: String },

    /// A dictionary value written by a deferring loader has no element to
    /// carry its key.
    #[error("dictionary value written by a deferring loader cannot carry its x:Key")]
    DeferredDictionaryKey,

    /// Custom metadata is malformed.
    #[error("invalid schema metadata on member '{member}' of '{declaring_type}': {msg}")]
    InvalidSchema {
        declaring_type: XamlTypeName,
        member: String,
        msg: String,
    },

    /// A critical converter fault.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// The schema has no registration for the type.
    #[error("unknown type '{0}'")]
    UnknownType(XamlTypeName),

    /// The type has no member of that name.
    #[error("unknown member '{member}' on '{type_name}'")]
    UnknownMember {
        type_name: XamlTypeName,
        member: String,
    },

    /// `read` was called after `close`.
    #[error("the object reader has been closed")]
    ReaderClosed,

    /// The runtime capability failed to get, set or create a value.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The node sequence handed to the writer is not well formed.
    #[error("malformed node stream: {0}")]
    MalformedStream(String),

    /// A reference name was never defined in any enclosing name scope.
    #[error("unresolved reference '{0}'")]
    UnresolvedReference(String),

    /// Custom error
    #[error("Error: {0}")]
    Custom(String),
}

impl Error {
    /// Creates a duplicate-name error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use xaml_stream::Error;
    ///
    /// let err = Error::duplicate_name("root");
    /// assert!(matches!(err, Error::DuplicateName { .. }));
    /// ```
    pub fn duplicate_name(name: &str) -> Self {
        Error::DuplicateName {
            name: name.to_string(),
        }
    }

    /// Creates an invalid-schema error for a member of `declaring_type`.
    pub fn invalid_schema(declaring_type: &XamlTypeName, member: &str, msg: &str) -> Self {
        Error::InvalidSchema {
            declaring_type: declaring_type.clone(),
            member: member.to_string(),
            msg: msg.to_string(),
        }
    }

    /// Creates an unknown-member error.
    pub fn unknown_member(type_name: &XamlTypeName, member: &str) -> Self {
        Error::UnknownMember {
            type_name: type_name.clone(),
            member: member.to_string(),
        }
    }

    /// Creates an attached-property conflict error.
    pub fn attached_conflict(member: &str, position: &str) -> Self {
        Error::AttachedPropertyConflict {
            member: member.to_string(),
            position: position.to_string(),
        }
    }

    /// Creates a malformed-stream error.
    pub fn malformed(msg: &str) -> Self {
        Error::MalformedStream(msg.to_string())
    }

    /// Creates a runtime error.
    pub fn runtime<T: fmt::Display>(msg: T) -> Self {
        Error::Runtime(msg.to_string())
    }

    /// Creates a conversion error from a converter failure.
    ///
    /// Loading has no fallback path, so any failure ends the run there. The
    /// reader only calls this for critical faults.
    pub fn conversion(err: ConvertError) -> Self {
        Error::Conversion(err.message().to_string())
    }

    /// Creates a custom error with a display message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use xaml_stream::Error;
    ///
    /// let err = Error::custom("something went wrong");
    /// assert!(err.to_string().contains("something went wrong"));
    /// ```
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}


pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_error_keeps_message() {
        let err = Error::conversion(ConvertError::critical("stack exhausted"));
        assert_eq!(err.to_string(), "conversion failed: stack exhausted");
    }

    #[test]
    fn test_invalid_schema_names_member_and_type() {
        let owner = XamlTypeName::new("urn:app", "Panel");
        let err = Error::invalid_schema(&owner, "Children", "bad arity");
        let text = err.to_string();
        assert!(text.contains("Children"));
        assert!(text.contains("Panel"));
    }
}
