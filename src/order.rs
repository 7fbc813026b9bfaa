//! Stable partial-order resolution.
//!
//! [`PartialOrder`] keeps entries in insertion order and lets callers add
//! "must come after" constraints between keys. Enumeration performs a
//! depth-first post-order walk from each unvisited entry, so every entry
//! follows all of its transitive predecessors while unconstrained entries
//! keep their relative insertion order.
//!
//! A constraint may name a key that never receives a value; such placeholder
//! entries take part in ordering but are skipped in the output. Cycles are
//! not reported: an entry already on the walk is treated as visited, which
//! drops the constraint of the back-edge.

use indexmap::IndexMap;
use std::hash::Hash;

struct Entry<V> {
    value: Option<V>,
    predecessors: Vec<usize>,
}

/// Entries keyed by `K` with ordering constraints between them.
pub struct PartialOrder<K, V> {
    entries: IndexMap<K, Entry<V>>,
}

impl<K: Hash + Eq + Clone, V> PartialOrder<K, V> {
    #[must_use]
    pub fn new() -> Self {
        PartialOrder {
            entries: IndexMap::new(),
        }
    }

    /// Adds or replaces the value for `key`.
    pub fn add(&mut self, key: K, value: V) {
        let slot = self.slot(key);
        self.entries[slot].value = Some(value);
    }

    /// Requires `successor` to be enumerated after `predecessor`.
    pub fn set_order(&mut self, predecessor: K, successor: K) {
        let pred = self.slot(predecessor);
        let succ = self.slot(successor);
        let preds = &mut self.entries[succ].predecessors;
        if !preds.contains(&pred) {
            preds.push(pred);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.value.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&mut self, key: K) -> usize {
        let entry = self.entries.entry(key);
        let index = entry.index();
        entry.or_insert_with(|| Entry {
            value: None,
            predecessors: Vec::new(),
        });
        index
    }

    /// Consumes the resolver, yielding values in resolved order.
    pub fn into_ordered(self) -> Vec<(K, V)> {
        let count = self.entries.len();
        let mut visited = vec![false; count];
        let mut order = Vec::with_capacity(count);
        for start in 0..count {
            if visited[start] {
                continue;
            }
            // Iterative post-order: (index, next predecessor to look at).
            let mut stack = vec![(start, 0usize)];
            visited[start] = true;
            while let Some(&mut (index, ref mut cursor)) = stack.last_mut() {
                let preds = &self.entries[index].predecessors;
                if let Some(&pred) = preds.get(*cursor) {
                    *cursor += 1;
                    if !visited[pred] {
                        visited[pred] = true;
                        stack.push((pred, 0));
                    }
                } else {
                    order.push(index);
                    stack.pop();
                }
            }
        }

        let mut slots: Vec<Option<(K, Entry<V>)>> = self.entries.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .filter_map(|(key, entry)| entry.value.map(|v| (key, v)))
            .collect()
    }
}

impl<K: Hash + Eq + Clone, V> Default for PartialOrder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(order: PartialOrder<&'static str, ()>) -> Vec<&'static str> {
        order.into_ordered().into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_unconstrained_keeps_insertion_order() {
        let mut order = PartialOrder::new();
        for k in ["c", "a", "b"] {
            order.add(k, ());
        }
        assert_eq!(keys(order), ["c", "a", "b"]);
    }

    #[test]
    fn test_successor_follows_transitive_predecessors() {
        let mut order = PartialOrder::new();
        for k in ["Value", "Minimum", "Maximum"] {
            order.add(k, ());
        }
        order.set_order("Maximum", "Value");
        order.set_order("Minimum", "Maximum");
        assert_eq!(keys(order), ["Minimum", "Maximum", "Value"]);
    }

    #[test]
    fn test_placeholders_are_skipped() {
        let mut order = PartialOrder::new();
        order.add("b", ());
        order.set_order("missing", "b");
        assert_eq!(order.len(), 1);
        assert_eq!(keys(order), ["b"]);
    }

    #[test]
    fn test_cycle_does_not_hang() {
        let mut order = PartialOrder::new();
        order.add("a", ());
        order.add("b", ());
        order.set_order("a", "b");
        order.set_order("b", "a");
        let result = keys(order);
        assert_eq!(result.len(), 2);
    }
}
