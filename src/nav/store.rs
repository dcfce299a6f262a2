use std::collections::HashMap;

use super::row::Row;
use crate::error::NavError;

/// Stable handle to a row. Survives insertions and removals around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

/// Listing-level data recorded on the expanded container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingMeta {
    pub index_name: String,
    pub filtered: bool,
}

/// Result of a successful [`TreeStore::expand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expanded {
    /// Position of the container.
    pub index: usize,
    pub inserted: usize,
    /// Ids of a previous child block that the new listing replaced.
    pub replaced: Vec<RowId>,
}

/// Arena of rows plus their pre-order flattening.
#[derive(Debug, Default)]
pub struct TreeStore {
    rows: HashMap<RowId, Row>,
    order: Vec<RowId>,
    next_id: u64,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Replace the whole tree with a root listing.
    pub fn set_root(&mut self, rows: Vec<Row>) {
        self.rows.clear();
        self.order.clear();
        let ids = self.alloc(rows);
        self.order = ids;
    }

    pub fn id_at(&self, index: usize) -> Option<RowId> {
        self.order.get(index).copied()
    }

    pub fn row_at(&self, index: usize) -> Option<&Row> {
        self.id_at(index).and_then(|id| self.rows.get(&id))
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: RowId) -> Option<&mut Row> {
        self.rows.get_mut(&id)
    }

    /// Current position of `id` in the flattened order.
    pub fn position(&self, id: RowId) -> Option<usize> {
        self.order.iter().position(|&o| o == id)
    }

    pub fn find_by_path(&self, path: &str) -> Option<usize> {
        self.order
            .iter()
            .position(|id| self.rows.get(id).is_some_and(|r| r.path == path))
    }

    /// Rows in display order.
    pub fn iter(&self) -> impl Iterator<Item = (RowId, &Row)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.rows.get(id).map(|r| (*id, r)))
    }

    pub fn levels(&self) -> Vec<usize> {
        self.iter().map(|(_, r)| r.level).collect()
    }

    /// First index after `index` whose level is at or above its own.
    pub fn next_index(&self, index: usize) -> usize {
        subtree_end(&self.levels(), index)
    }

    /// Put `rows` under the container at `dir_path`, replacing whatever
    /// children it had.
    pub fn expand(
        &mut self,
        dir_path: &str,
        rows: Vec<Row>,
        meta: ListingMeta,
    ) -> Result<Expanded, NavError> {
        let index = self
            .find_by_path(dir_path)
            .filter(|&i| self.row_at(i).is_some_and(Row::is_container))
            .ok_or_else(|| NavError::NotFound(dir_path.to_string()))?;
        let end = self.next_index(index);
        let inserted = rows.len();
        let new_ids = self.alloc(rows);
        let replaced: Vec<RowId> = self.order.splice(index + 1..end, new_ids).collect();
        for id in &replaced {
            self.rows.remove(id);
        }
        if let Some(row) = self.id_at(index).and_then(|id| self.rows.get_mut(&id)) {
            row.expanded = true;
            row.index_name = Some(meta.index_name).filter(|s| !s.is_empty());
            row.filtered = meta.filtered;
        }
        Ok(Expanded {
            index,
            inserted,
            replaced,
        })
    }

    /// Drop the descendants of the row at `index` and mark it collapsed.
    pub fn collapse(&mut self, index: usize) -> Vec<RowId> {
        if index >= self.order.len() {
            return Vec::new();
        }
        let end = self.next_index(index);
        let removed: Vec<RowId> = self.order.drain(index + 1..end).collect();
        for id in &removed {
            self.rows.remove(id);
        }
        if let Some(row) = self.id_at(index).and_then(|id| self.rows.get_mut(&id)) {
            row.expanded = false;
        }
        removed
    }

    /// Delete a row along with any descendants. Returns the removed row.
    pub fn remove(&mut self, id: RowId) -> Option<Row> {
        let index = self.position(id)?;
        self.collapse(index);
        self.order.remove(index);
        self.rows.remove(&id)
    }

    /// Other rows denoting the same item as `id`.
    pub fn aliases_of(&self, id: RowId) -> Vec<RowId> {
        let Some(row) = self.rows.get(&id) else {
            return Vec::new();
        };
        self.iter()
            .filter(|(other_id, other)| *other_id != id && other.is_alias_of(row))
            .map(|(other_id, _)| other_id)
            .collect()
    }

    /// Set the in-flight flag on the container at `path`.
    pub fn set_pending(&mut self, path: &str, pending: bool) -> bool {
        match self.find_by_path(path).and_then(|i| self.id_at(i)) {
            Some(id) => {
                if let Some(row) = self.rows.get_mut(&id) {
                    row.pending = pending;
                }
                true
            }
            None => false,
        }
    }

    fn alloc(&mut self, rows: Vec<Row>) -> Vec<RowId> {
        rows.into_iter()
            .map(|row| {
                let id = RowId(self.next_id);
                self.next_id += 1;
                self.rows.insert(id, row);
                id
            })
            .collect()
    }
}

/// End of the subtree rooted at `index` in a pre-order level sequence.
pub fn subtree_end(levels: &[usize], index: usize) -> usize {
    let Some(&level) = levels.get(index) else {
        return levels.len();
    };
    levels
        .iter()
        .enumerate()
        .skip(index + 1)
        .find(|&(_, &l)| l <= level)
        .map(|(i, _)| i)
        .unwrap_or(levels.len())
}
