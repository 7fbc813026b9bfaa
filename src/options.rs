//! Configuration for reading object graphs and writing them back.
//!
//! - [`ObjectReaderSettings`]: visibility boundary and member policy for the
//!   [`ObjectReader`](crate::ObjectReader)
//! - [`ObjectWriterSettings`]: visibility boundary and unknown-member policy
//!   for the [`ObjectWriter`](crate::ObjectWriter)
//!
//! ## Examples
//!
//! ```rust
//! use xaml_stream::ObjectReaderSettings;
//!
//! let settings = ObjectReaderSettings::new()
//!     .with_local_assembly("App")
//!     .with_protected_members_on_root(true);
//! assert_eq!(settings.local_assembly.as_deref(), Some("App"));
//! ```

/// Settings for the object reader.
///
/// # Examples
///
/// ```rust
/// use xaml_stream::ObjectReaderSettings;
///
/// let strict = ObjectReaderSettings::new().with_explicit_content_visibility(true);
/// assert!(strict.require_explicit_content_visibility);
/// assert!(!strict.allow_protected_members_on_root);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectReaderSettings {
    /// Assembly whose internal types and members are visible.
    pub local_assembly: Option<String>,
    /// Read protected members of the root object.
    pub allow_protected_members_on_root: bool,
    /// Serialize read-only members only when marked as content, turning off
    /// the legacy rule for collections, dictionaries and XML data.
    pub require_explicit_content_visibility: bool,
}

impl ObjectReaderSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_local_assembly(mut self, assembly: &str) -> Self {
        self.local_assembly = Some(assembly.to_string());
        self
    }

    #[must_use]
    pub fn with_protected_members_on_root(mut self, allow: bool) -> Self {
        self.allow_protected_members_on_root = allow;
        self
    }

    #[must_use]
    pub fn with_explicit_content_visibility(mut self, require: bool) -> Self {
        self.require_explicit_content_visibility = require;
        self
    }
}

/// Settings for the object writer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectWriterSettings {
    /// Assembly whose internal types may be instantiated.
    pub local_assembly: Option<String>,
    /// Skip members the target type does not declare instead of failing.
    pub ignore_unknown_members: bool,
}

impl ObjectWriterSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_local_assembly(mut self, assembly: &str) -> Self {
        self.local_assembly = Some(assembly.to_string());
        self
    }

    #[must_use]
    pub fn with_ignore_unknown_members(mut self, ignore: bool) -> Self {
        self.ignore_unknown_members = ignore;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_permissive_for_legacy_members() {
        let settings = ObjectReaderSettings::default();
        assert!(settings.local_assembly.is_none());
        assert!(!settings.require_explicit_content_visibility);
    }

    #[test]
    fn test_writer_builder() {
        let settings = ObjectWriterSettings::new()
            .with_local_assembly("Core")
            .with_ignore_unknown_members(true);
        assert_eq!(settings.local_assembly.as_deref(), Some("Core"));
        assert!(settings.ignore_unknown_members);
    }
}
