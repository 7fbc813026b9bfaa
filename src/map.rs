//! Ordered member storage for dynamic objects.
//!
//! [`MemberMap`] wraps an [`IndexMap`] so member values keep the order in
//! which they were set. The serializer sorts members itself, but a stable
//! storage order keeps runtime enumeration (attached properties, diagnostics)
//! deterministic.
//!
//! ## Examples
//!
//! ```rust
//! use xaml_stream::{MemberMap, Value};
//!
//! let mut map = MemberMap::new();
//! map.insert("Width".to_string(), Value::from(10.0));
//! map.insert("Height".to_string(), Value::from(20.0));
//!
//! let keys: Vec<_> = map.keys().cloned().collect();
//! assert_eq!(keys, vec!["Width", "Height"]);
//! ```

use crate::value::Value;
use indexmap::IndexMap;

/// An insertion-ordered map of member names to values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemberMap(IndexMap<String, Value>);

impl MemberMap {
    #[must_use]
    pub fn new() -> Self {
        MemberMap(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        MemberMap(IndexMap::with_capacity(capacity))
    }

    /// Inserts a value, returning the previous one for that member.
    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.0.insert(key, value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Removes a member, keeping the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, String, Value> {
        self.0.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, String, Value> {
        self.0.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl IntoIterator for MemberMap {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, Value)> for MemberMap {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        MemberMap(IndexMap::from_iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_keeps_order() {
        let mut map: MemberMap = [("a", 1), ("b", 2), ("c", 3)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect();
        assert_eq!(map.remove("b"), Some(Value::Int32(2)));
        let keys: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "c"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut map = MemberMap::new();
        map.insert("x".to_string(), Value::from(1));
        map.insert("y".to_string(), Value::from(2));
        assert!(map.insert("x".to_string(), Value::from(3)).is_some());
        assert_eq!(map.iter().next(), Some((&"x".to_string(), &Value::Int32(3))));
    }
}
