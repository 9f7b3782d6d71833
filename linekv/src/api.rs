//! The public surface: the two in-memory operations and the
//! four file operations, plus re-exports of the two process-wide config
//! knobs. Everything below is a thin wrapper -- the real work lives in
//! `parser`, `serializer`, and `pipeline`; this module exists so callers
//! have one place to import from.

use crate::config::PipelineOptions;
use crate::error::Result;
use crate::pipeline;
use crate::record::Record;
use crate::store::RecordStore;
use std::path::Path;

pub use crate::config::{
    eager_unpack_raw, parallel_method_threshold, set_eager_unpack_raw, set_parallel_method_threshold,
};

/// Parse a single line into a `Record`.
pub fn parse_line(line: &str) -> Result<Record> {
    crate::parser::parse_line_str(line)
}

/// Serialize a single `Record` to its one-line wire form.
pub fn serialize_record(record: &Record) -> String {
    crate::serializer::serialize_record(record)
}

/// Read a file into a `RecordStore`, choosing the whole-file or chunked
/// read strategy automatically based on file size.
pub fn deserialize_auto<P: AsRef<Path>>(path: P) -> Result<RecordStore> {
    pipeline::deserialize_auto(path, &PipelineOptions::default())
}

/// Read a file into a `RecordStore`, choosing the whole-file or chunked
/// read strategy automatically based on file size, with explicit pipeline
/// tuning.
pub fn deserialize_auto_with(path: impl AsRef<Path>, options: &PipelineOptions) -> Result<RecordStore> {
    pipeline::deserialize_auto(path, options)
}

/// Read a file using the chunked strategy unconditionally. `chunk_size`
/// falls back to the default line-count-per-chunk when `None`.
pub fn deserialize_chunked<P: AsRef<Path>>(path: P, chunk_size: Option<usize>) -> Result<RecordStore> {
    pipeline::deserialize_chunked(path, chunk_size, &PipelineOptions::default())
}

/// Read a file using the chunked strategy unconditionally, with explicit
/// pipeline tuning.
pub fn deserialize_chunked_with(
    path: impl AsRef<Path>,
    chunk_size: Option<usize>,
    options: &PipelineOptions,
) -> Result<RecordStore> {
    pipeline::deserialize_chunked(path, chunk_size, options)
}

/// Write a `RecordStore` to a file, choosing a write strategy automatically
/// based on record count.
pub fn serialize_auto<P: AsRef<Path>>(store: &RecordStore, path: P) -> Result<()> {
    pipeline::serialize_auto(store, path, &PipelineOptions::default())
}

/// Write a `RecordStore` to a file, choosing a write strategy automatically
/// based on record count, with explicit pipeline tuning.
pub fn serialize_auto_with(store: &RecordStore, path: impl AsRef<Path>, options: &PipelineOptions) -> Result<()> {
    pipeline::serialize_auto(store, path, options)
}

/// Write a `RecordStore` to a file using the chunked strategy
/// unconditionally. `chunk_size` falls back to a size computed from the
/// record count when `None`.
pub fn serialize_chunked<P: AsRef<Path>>(
    store: &RecordStore,
    path: P,
    chunk_size: Option<usize>,
) -> Result<()> {
    pipeline::serialize_chunked(store, path, chunk_size, &PipelineOptions::default())
}

/// Write a `RecordStore` to a file using the chunked strategy
/// unconditionally, with explicit pipeline tuning.
pub fn serialize_chunked_with(
    store: &RecordStore,
    path: impl AsRef<Path>,
    chunk_size: Option<usize>,
    options: &PipelineOptions,
) -> Result<()> {
    pipeline::serialize_chunked(store, path, chunk_size, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn in_memory_round_trip() {
        let mut record = Record::new();
        record.insert("id", Value::I32(7)).unwrap();
        record.insert("name", Value::Str("ok".to_string())).unwrap();
        let line = serialize_record(&record);
        let parsed = parse_line(&line).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn file_round_trip_via_default_auto_strategies() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("linekv_api_roundtrip_{}.lkv", std::process::id()));

        let mut store = RecordStore::new();
        for i in 0..10u64 {
            let mut record = Record::new();
            record.insert("n", Value::U64(i)).unwrap();
            store.insert(i, record).unwrap();
        }

        serialize_auto(&store, &path).unwrap();
        let reloaded = deserialize_auto(&path).unwrap();
        assert_eq!(reloaded.len(), store.len());

        std::fs::remove_file(&path).ok();
    }
}
