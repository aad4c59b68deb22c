//! In-memory store adapter.

use crate::error::Result;
use crate::store::SubscriptionStore;
use crate::types::{Column, ColumnValues, SubscriptionId};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// A [`SubscriptionStore`] backed by a plain map.
///
/// Identities are assigned monotonically starting at 1. Useful as the test
/// double and for embedders that want cache semantics without durability.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

struct Inner {
    rows: BTreeMap<i64, ColumnValues>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Snapshot of one stored row.
    pub fn row(&self, id: SubscriptionId) -> Option<ColumnValues> {
        self.inner.lock().rows.get(&id.0).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.inner.lock().rows.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionStore for MemoryStore {
    fn query_all(&self) -> Result<Vec<ColumnValues>> {
        Ok(self.inner.lock().rows.values().cloned().collect())
    }

    fn insert(&self, values: &ColumnValues) -> Result<SubscriptionId> {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let mut row = values.clone();
        row.put(Column::SubId, id);
        inner.rows.insert(id, row);
        Ok(SubscriptionId(id))
    }

    fn update_by_id(&self, id: SubscriptionId, values: &ColumnValues) -> Result<usize> {
        match self.inner.lock().rows.get_mut(&id.0) {
            Some(row) => {
                row.merge(values);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnValue;

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let mut values = ColumnValues::new();
        values.put(Column::IccId, "89440001");

        let first = store.insert(&values).unwrap();
        let second = store.insert(&values).unwrap();
        assert_eq!(first, SubscriptionId(1));
        assert_eq!(second, SubscriptionId(2));
        assert_eq!(store.row_count(), 2);
    }

    #[test]
    fn test_inserted_row_carries_its_key() {
        let store = MemoryStore::new();
        let mut values = ColumnValues::new();
        values.put(Column::IccId, "89440001");

        let id = store.insert(&values).unwrap();
        let row = store.row(id).unwrap();
        assert_eq!(row.get(Column::SubId), Some(&ColumnValue::Integer(id.0)));
    }

    #[test]
    fn test_update_merges_delta() {
        let store = MemoryStore::new();
        let mut values = ColumnValues::new();
        values.put(Column::IccId, "89440001");
        values.put(Column::DisplayName, "old");
        let id = store.insert(&values).unwrap();

        let mut delta = ColumnValues::new();
        delta.put(Column::DisplayName, "new");
        assert_eq!(store.update_by_id(id, &delta).unwrap(), 1);

        let row = store.row(id).unwrap();
        assert_eq!(row.get(Column::DisplayName), Some(&ColumnValue::from("new")));
        assert_eq!(row.get(Column::IccId), Some(&ColumnValue::from("89440001")));
    }

    #[test]
    fn test_update_missing_row_matches_nothing() {
        let store = MemoryStore::new();
        let delta = ColumnValues::new();
        assert_eq!(store.update_by_id(SubscriptionId(9), &delta).unwrap(), 0);
    }

    #[test]
    fn test_query_all_returns_every_row() {
        let store = MemoryStore::new();
        let mut values = ColumnValues::new();
        values.put(Column::IccId, "89440001");
        store.insert(&values).unwrap();
        values.put(Column::IccId, "89440002");
        store.insert(&values).unwrap();

        assert_eq!(store.query_all().unwrap().len(), 2);
    }
}
