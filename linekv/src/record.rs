//! `Record`: an ordered key/value mapping, one per line on the wire.

use crate::error::{LineKvError, Result};
use crate::value::{validate_key, Key, ScalarKind, Value};
use indexmap::IndexMap;

/// An ordered mapping from `Key` to `Value`. Field order is insertion order;
/// the parser preserves input order, and serialization walks fields in that
/// same order. `IndexMap` gives us this for free.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<Key, Value>,
}

impl Record {
    pub fn new() -> Self {
        Record {
            fields: IndexMap::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Record {
            fields: IndexMap::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Insert a field, validating the key and rejecting duplicates. Does not
    /// mutate the record on failure.
    pub fn insert(&mut self, key: &str, value: Value) -> Result<()> {
        validate_key(key, 0)?;
        if self.fields.contains_key(key) {
            return Err(LineKvError::DuplicateKey(key.to_string()));
        }
        self.fields.insert(Key::from(key), value);
        Ok(())
    }

    /// Raw, untyped lookup. Returns `None` for a missing key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Mutable counterpart to `get`, needed by callers that must unpack or
    /// pack a `RawBlob` in place.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Typed lookup: `None` when the key is missing, `Err(KindMismatch)`
    /// when it exists but holds a different kind/shape, `Some` otherwise.
    pub fn get_as(&self, key: &str, kind: ScalarKind, is_array: bool) -> Result<Option<&Value>> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(value) if value.kind() == kind && value.is_array() == is_array => Ok(Some(value)),
            Some(value) => Err(LineKvError::KindMismatch {
                expected: if is_array {
                    format!("array of {}", kind.name())
                } else {
                    kind.name().to_string()
                },
                found: value.shape_name(),
            }),
        }
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Key, Value> {
        self.fields.iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a Key, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl FromIterator<(Key, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (Key, Value)>>(iter: T) -> Self {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ArrayData;

    #[test]
    fn duplicate_key_insertion_is_rejected_without_mutation() {
        let mut record = Record::new();
        record.insert("id", Value::I32(1)).unwrap();
        let err = record.insert("id", Value::I32(2)).unwrap_err();
        assert_eq!(err.kind_code(), "DuplicateKey");
        assert_eq!(record.get("id"), Some(&Value::I32(1)));
    }

    #[test]
    fn typed_lookup_reports_kind_mismatch() {
        let mut record = Record::new();
        record.insert("id", Value::I32(1)).unwrap();
        assert!(record.get_as("id", ScalarKind::I32, false).unwrap().is_some());
        let err = record.get_as("id", ScalarKind::Str, false).unwrap_err();
        assert_eq!(err.kind_code(), "KindMismatch");
    }

    #[test]
    fn empty_record_has_no_fields() {
        let record = Record::new();
        assert!(record.is_empty());
        assert_eq!(record.iter().count(), 0);
    }

    #[test]
    fn preserves_insertion_order() {
        let mut record = Record::new();
        record.insert("b", Value::I32(2)).unwrap();
        record.insert("a", Value::I32(1)).unwrap();
        let keys: Vec<&str> = record.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn array_field_roundtrips_kind() {
        let mut record = Record::new();
        record
            .insert("xs", Value::Array(ArrayData::I32(vec![1, 2, 3])))
            .unwrap();
        let found = record.get_as("xs", ScalarKind::I32, true).unwrap().unwrap();
        assert_eq!(found, &Value::Array(ArrayData::I32(vec![1, 2, 3])));
    }
}
