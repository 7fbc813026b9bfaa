//! Identity tables for shared and cyclic objects.
//!
//! Each name scope owns one table layer chained to its parent. An object is
//! added to the current layer before its members are visited, so meeting it
//! again (a cycle or a shared reference) finds the existing record instead of
//! recursing. Keys are [`ObjectId`]s, never value equality.
//!
//! Every change is journaled. A positional-parameter attempt takes a
//! [`Checkpoint`] first and rolls back if the attempt is abandoned, so the
//! fallback never points at records that are not part of the tree.

use crate::markup::RecordId;
use crate::value::ObjectId;
use std::collections::HashMap;

/// Index of a table layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TableId(usize);

#[derive(Default)]
struct Table {
    parent: Option<TableId>,
    objects: HashMap<ObjectId, RecordId>,
    pending_names: HashMap<ObjectId, String>,
}

enum JournalEntry {
    Object(TableId, ObjectId),
    Removed(TableId, ObjectId, RecordId),
    PendingName(TableId, ObjectId),
}

/// Position in the journal to roll back to.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Checkpoint(usize);

pub(crate) struct ReferenceTables {
    tables: Vec<Table>,
    journal: Vec<JournalEntry>,
}

impl ReferenceTables {
    pub(crate) fn new() -> Self {
        ReferenceTables {
            tables: vec![Table::default()],
            journal: Vec::new(),
        }
    }

    pub(crate) fn root(&self) -> TableId {
        TableId(0)
    }

    /// Opens a child layer for a nested name scope.
    pub(crate) fn push_scope(&mut self, parent: TableId) -> TableId {
        self.tables.push(Table {
            parent: Some(parent),
            ..Table::default()
        });
        TableId(self.tables.len() - 1)
    }

    pub(crate) fn add(&mut self, table: TableId, object: ObjectId, record: RecordId) {
        if self.tables[table.0].objects.insert(object, record).is_none() {
            self.journal.push(JournalEntry::Object(table, object));
        }
    }

    /// Forgets `object` in `table` only. Used when its record will not be
    /// written, so later occurrences are built again.
    pub(crate) fn remove(&mut self, table: TableId, object: ObjectId) {
        if let Some(record) = self.tables[table.0].objects.remove(&object) {
            self.journal.push(JournalEntry::Removed(table, object, record));
        }
    }

    /// Looks `object` up in `table` and then each enclosing layer.
    pub(crate) fn find(&self, table: TableId, object: ObjectId) -> Option<RecordId> {
        let mut current = Some(table);
        while let Some(id) = current {
            let layer = &self.tables[id.0];
            if let Some(record) = layer.objects.get(&object) {
                return Some(*record);
            }
            current = layer.parent;
        }
        None
    }

    /// Records a name handed out before the object had a record. Not
    /// inherited by child layers.
    pub(crate) fn add_to_pending(&mut self, table: TableId, object: ObjectId, name: String) {
        if self.tables[table.0]
            .pending_names
            .insert(object, name)
            .is_none()
        {
            self.journal.push(JournalEntry::PendingName(table, object));
        }
    }

    pub(crate) fn find_in_pending(&self, table: TableId, object: ObjectId) -> Option<&str> {
        self.tables[table.0]
            .pending_names
            .get(&object)
            .map(String::as_str)
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    /// Undoes every change made since `checkpoint`.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            match self.journal.pop() {
                Some(JournalEntry::Object(table, object)) => {
                    self.tables[table.0].objects.remove(&object);
                }
                Some(JournalEntry::Removed(table, object, record)) => {
                    self.tables[table.0].objects.insert(object, record);
                }
                Some(JournalEntry::PendingName(table, object)) => {
                    self.tables[table.0].pending_names.remove(&object);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Instance;

    #[test]
    fn test_find_walks_parent_chain() {
        let mut tables = ReferenceTables::new();
        let root = tables.root();
        let child = tables.push_scope(root);
        let outer = Instance::new(1u8);
        let inner = Instance::new(2u8);
        tables.add(root, outer.id(), RecordId::new(0));
        tables.add(child, inner.id(), RecordId::new(1));

        assert_eq!(tables.find(child, outer.id()), Some(RecordId::new(0)));
        assert_eq!(tables.find(root, inner.id()), None);
    }

    #[test]
    fn test_pending_names_are_not_inherited() {
        let mut tables = ReferenceTables::new();
        let root = tables.root();
        let child = tables.push_scope(root);
        let obj = Instance::new(());
        tables.add_to_pending(root, obj.id(), "__ReferenceID0".to_string());

        assert_eq!(tables.find_in_pending(root, obj.id()), Some("__ReferenceID0"));
        assert_eq!(tables.find_in_pending(child, obj.id()), None);
    }

    #[test]
    fn test_rollback_removes_later_entries() {
        let mut tables = ReferenceTables::new();
        let root = tables.root();
        let kept = Instance::new(1u8);
        let dropped = Instance::new(2u8);
        tables.add(root, kept.id(), RecordId::new(0));

        let mark = tables.checkpoint();
        tables.add(root, dropped.id(), RecordId::new(1));
        tables.add_to_pending(root, dropped.id(), "n".to_string());
        tables.rollback(mark);

        assert!(tables.find(root, kept.id()).is_some());
        assert!(tables.find(root, dropped.id()).is_none());
        assert!(tables.find_in_pending(root, dropped.id()).is_none());
    }

    #[test]
    fn test_remove_is_undone_by_rollback() {
        let mut tables = ReferenceTables::new();
        let root = tables.root();
        let child = tables.push_scope(root);
        let obj = Instance::new(7u8);
        tables.add(child, obj.id(), RecordId::new(3));

        let mark = tables.checkpoint();
        tables.remove(child, obj.id());
        assert_eq!(tables.find(child, obj.id()), None);

        tables.rollback(mark);
        assert_eq!(tables.find(child, obj.id()), Some(RecordId::new(3)));
    }
}
