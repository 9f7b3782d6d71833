//! The record store: an index-keyed, order-preserving
//! in-memory collection of records, backed by `BTreeMap` so ascending
//! iteration for write is free rather than requiring a sort pass.

use crate::error::{LineKvError, Result};
use crate::record::Record;
use std::collections::BTreeMap;

/// A mapping from 0-based line index to `Record`. Indices need not be
/// contiguous -- holes (blank input lines) are legal and simply absent from
/// the map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: BTreeMap<u64, Record>,
}

impl RecordStore {
    pub fn new() -> Self {
        RecordStore::default()
    }

    /// Insert a record at `index`. Fails without mutating the store if the
    /// index is already occupied.
    pub fn insert(&mut self, index: u64, record: Record) -> Result<()> {
        if self.records.contains_key(&index) {
            return Err(LineKvError::DuplicateIndex(index));
        }
        self.records.insert(index, record);
        Ok(())
    }

    pub fn get(&self, index: u64) -> Option<&Record> {
        self.records.get(&index)
    }

    pub fn get_mut(&mut self, index: u64) -> Option<&mut Record> {
        self.records.get_mut(&index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate in ascending line-index order -- the order records are
    /// written back out in.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Record)> {
        self.records.iter().map(|(&index, record)| (index, record))
    }

    pub fn indices(&self) -> impl Iterator<Item = u64> + '_ {
        self.records.keys().copied()
    }
}

impl FromIterator<(u64, Record)> for RecordStore {
    fn from_iter<T: IntoIterator<Item = (u64, Record)>>(iter: T) -> Self {
        RecordStore {
            records: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn duplicate_index_is_rejected_without_mutation() {
        let mut store = RecordStore::new();
        let mut record = Record::new();
        record.insert("id", Value::I32(1)).unwrap();
        store.insert(0, record.clone()).unwrap();

        let mut other = Record::new();
        other.insert("id", Value::I32(2)).unwrap();
        let err = store.insert(0, other).unwrap_err();
        assert_eq!(err.kind_code(), "DuplicateIndex");
        assert_eq!(store.get(0), Some(&record));
    }

    #[test]
    fn holes_are_skipped_by_iteration() {
        let mut store = RecordStore::new();
        store.insert(0, Record::new()).unwrap();
        store.insert(2, Record::new()).unwrap();
        let indices: Vec<u64> = store.indices().collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn iteration_is_ascending_regardless_of_insertion_order() {
        let mut store = RecordStore::new();
        store.insert(5, Record::new()).unwrap();
        store.insert(1, Record::new()).unwrap();
        store.insert(3, Record::new()).unwrap();
        let indices: Vec<u64> = store.iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 3, 5]);
    }
}
