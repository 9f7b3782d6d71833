//! The file pipeline: parallel read-parse and
//! serialize-write, with strategy selection driven by input size.
//!
//! Four strategies live here, one pair per direction:
//!
//! - Read: whole-file (read the file into one buffer, split and parse lines
//!   in parallel, commit single-threaded) and chunked (stream fixed-size
//!   batches of lines through the same parallel-parse-then-commit shape, to
//!   bound peak memory on files too large to hold at once).
//! - Write: ordered-fanout (serialize the whole snapshot into a same-sized
//!   buffer in parallel, then write it out in one pass -- cheapest when the
//!   buffer comfortably fits in memory), chunked (the same idea applied
//!   chunk-by-chunk, so peak memory is bounded instead of `O(record count)`),
//!   and pipelined (a producer pool races ahead on position order and an
//!   order-aware buffer drains them to the writer in strict sequence,
//!   overlapping serialization with I/O without ever holding the whole
//!   output in memory at once).
//!
//! Every worker pool here is built on `std::thread::scope`: workers compute
//! into purely local state and the only shared-state mutation (inserting
//! into a `RecordStore`, writing to a file) happens on a single thread
//! after they have all rejoined.

use crate::config::PipelineOptions;
use crate::error::{LineKvError, Result};
use crate::parser;
use crate::record::Record;
use crate::serializer::serialize_record;
use crate::store::RecordStore;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Read an entire file and build a `RecordStore` from it, choosing between
/// the whole-file and chunked read strategies by file size.
pub fn deserialize_auto<P: AsRef<Path>>(path: P, options: &PipelineOptions) -> Result<RecordStore> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)?;
    if metadata.len() >= options.whole_file_read_threshold_bytes {
        log::debug!(
            target: "linekv::pipeline",
            "{:?} is {} bytes, at or above the {}-byte threshold: using the chunked read strategy",
            path, metadata.len(), options.whole_file_read_threshold_bytes
        );
        read_chunked(path, options.read_chunk_lines, options.resolved_parallelism())
    } else {
        log::debug!(
            target: "linekv::pipeline",
            "{:?} is {} bytes: using the whole-file read strategy",
            path, metadata.len()
        );
        read_whole_file(path, options.resolved_parallelism())
    }
}

/// Read a file using the chunked strategy unconditionally, with an explicit
/// chunk size (falling back to `options.read_chunk_lines` when `None`).
pub fn deserialize_chunked<P: AsRef<Path>>(
    path: P,
    chunk_size: Option<usize>,
    options: &PipelineOptions,
) -> Result<RecordStore> {
    let chunk_size = chunk_size.unwrap_or(options.read_chunk_lines);
    read_chunked(path.as_ref(), chunk_size, options.resolved_parallelism())
}

/// Write a `RecordStore` to a file, choosing a write strategy by record
/// count: chunked above `options.chunked_write_threshold`, pipelined for
/// mid-sized inputs, and plain ordered-fanout when there are too few
/// records to justify the bookkeeping of either.
pub fn serialize_auto<P: AsRef<Path>>(
    store: &RecordStore,
    path: P,
    options: &PipelineOptions,
) -> Result<()> {
    let snapshot = snapshot_records(store);
    let parallelism = options.resolved_parallelism();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    if snapshot.len() >= options.chunked_write_threshold {
        let chunk_size = options.write_chunk_size(snapshot.len());
        log::debug!(
            target: "linekv::pipeline",
            "writing {} records in chunks of {}", snapshot.len(), chunk_size
        );
        write_chunked(&snapshot, &mut writer, chunk_size, parallelism)?;
    } else if snapshot.len() <= small_fanout_ceiling(parallelism) {
        log::debug!(
            target: "linekv::pipeline",
            "writing {} records with plain ordered fan-out", snapshot.len()
        );
        write_ordered_fanout(&snapshot, &mut writer, parallelism)?;
    } else {
        log::debug!(
            target: "linekv::pipeline",
            "writing {} records with the pipelined strategy", snapshot.len()
        );
        write_pipelined(&snapshot, &mut writer, parallelism)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a `RecordStore` to a file using the chunked strategy
/// unconditionally, with an explicit chunk size (falling back to a size
/// computed from the record count when `None`).
pub fn serialize_chunked<P: AsRef<Path>>(
    store: &RecordStore,
    path: P,
    chunk_size: Option<usize>,
    options: &PipelineOptions,
) -> Result<()> {
    let snapshot = snapshot_records(store);
    let parallelism = options.resolved_parallelism();
    let chunk_size = chunk_size.unwrap_or_else(|| options.write_chunk_size(snapshot.len()));
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_chunked(&snapshot, &mut writer, chunk_size, parallelism)?;
    writer.flush()?;
    Ok(())
}

/// Below this many records, the fixed cost of spinning up a channel and a
/// producer pool outweighs any overlap it could buy -- plain fan-out wins.
fn small_fanout_ceiling(parallelism: usize) -> usize {
    parallelism.max(1) * 2
}

fn snapshot_records(store: &RecordStore) -> Vec<(u64, Record)> {
    store.iter().map(|(index, record)| (index, record.clone())).collect()
}

// ---------------------------------------------------------------------
// Read strategies
// ---------------------------------------------------------------------

fn read_whole_file(path: &Path, parallelism: usize) -> Result<RecordStore> {
    let bytes = std::fs::read(path)?;
    let lines = split_lines(&bytes);
    let parsed = parse_lines_parallel(&lines, 0, parallelism)?;
    let mut store = RecordStore::new();
    for (index, record) in parsed {
        store.insert(index, record)?;
    }
    Ok(store)
}

fn read_chunked(path: &Path, chunk_size: usize, parallelism: usize) -> Result<RecordStore> {
    let chunk_size = chunk_size.max(1);
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut store = RecordStore::new();
    let mut buffer: Vec<String> = Vec::with_capacity(chunk_size);
    let mut base_index: u64 = 0;
    let mut raw_line = String::new();

    loop {
        raw_line.clear();
        let bytes_read = reader.read_line(&mut raw_line)?;
        if bytes_read == 0 {
            break;
        }
        if raw_line.ends_with('\n') {
            raw_line.pop();
            if raw_line.ends_with('\r') {
                raw_line.pop();
            }
        }
        buffer.push(std::mem::take(&mut raw_line));

        if buffer.len() >= chunk_size {
            log::trace!(target: "linekv::pipeline", "committing chunk at base index {}", base_index);
            commit_chunk(&mut store, &buffer, base_index, parallelism)?;
            base_index += buffer.len() as u64;
            buffer.clear();
        }
    }
    if !buffer.is_empty() {
        log::trace!(target: "linekv::pipeline", "committing final partial chunk at base index {}", base_index);
        commit_chunk(&mut store, &buffer, base_index, parallelism)?;
    }
    Ok(store)
}

fn commit_chunk(
    store: &mut RecordStore,
    buffer: &[String],
    base_index: u64,
    parallelism: usize,
) -> Result<()> {
    let byte_lines: Vec<&[u8]> = buffer.iter().map(|line| line.as_bytes()).collect();
    let parsed = parse_lines_parallel(&byte_lines, base_index, parallelism)?;
    for (index, record) in parsed {
        store.insert(index, record)?;
    }
    Ok(())
}

/// Split `buf` on `\n`, stripping a preceding `\r` from each line. A final
/// segment with no trailing terminator is kept; the segment after a
/// trailing terminator (which would be empty) is not emitted, so a
/// newline-terminated file and its un-terminated twin parse to the same
/// line count.
fn split_lines(buf: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    for pos in memchr::memchr_iter(b'\n', buf) {
        let mut end = pos;
        if end > start && buf[end - 1] == b'\r' {
            end -= 1;
        }
        lines.push(&buf[start..end]);
        start = pos + 1;
    }
    if start < buf.len() {
        lines.push(&buf[start..]);
    }
    lines
}

/// Parse `lines` across `parallelism` worker threads, each handling a
/// contiguous range and producing `(absolute index, Record)` pairs for its
/// non-blank lines. Blank lines are holes: they are never parsed or
/// inserted. The first error encountered (by chunk order, not necessarily
/// wall-clock order) fails the whole call.
fn parse_lines_parallel(
    lines: &[&[u8]],
    base_index: u64,
    parallelism: usize,
) -> Result<Vec<(u64, Record)>> {
    if lines.is_empty() {
        return Ok(Vec::new());
    }
    let parallelism = parallelism.max(1);
    let chunk_len = (lines.len() + parallelism - 1) / parallelism;

    let results: Vec<Result<Vec<(u64, Record)>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = lines
            .chunks(chunk_len.max(1))
            .enumerate()
            .map(|(chunk_idx, chunk)| {
                let start = base_index + (chunk_idx * chunk_len) as u64;
                scope.spawn(move || -> Result<Vec<(u64, Record)>> {
                    let mut out = Vec::with_capacity(chunk.len());
                    for (offset, line) in chunk.iter().enumerate() {
                        if line.is_empty() {
                            continue;
                        }
                        let record = parser::parse_line(line)?;
                        out.push((start + offset as u64, record));
                    }
                    Ok(out)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(LineKvError::WorkerPanic)))
            .collect()
    });

    let mut combined = Vec::with_capacity(lines.len());
    for chunk_result in results {
        combined.extend(chunk_result?);
    }
    Ok(combined)
}

// ---------------------------------------------------------------------
// Write strategies
// ---------------------------------------------------------------------

/// Serialize the whole snapshot into an equal-length buffer in parallel
/// (each worker owns a disjoint mutable sub-slice via `chunks_mut`, so no
/// unsafe code or locking is needed), then write it out sequentially.
fn write_ordered_fanout<W: Write>(
    snapshot: &[(u64, Record)],
    writer: &mut W,
    parallelism: usize,
) -> Result<()> {
    if snapshot.is_empty() {
        return Ok(());
    }
    let mut lines: Vec<String> = vec![String::new(); snapshot.len()];
    let chunk_len = ((snapshot.len() + parallelism.max(1) - 1) / parallelism.max(1)).max(1);

    std::thread::scope(|scope| {
        let handles: Vec<_> = snapshot
            .chunks(chunk_len)
            .zip(lines.chunks_mut(chunk_len))
            .map(|(src, dst)| {
                scope.spawn(move || {
                    for (slot, (_, record)) in dst.iter_mut().zip(src.iter()) {
                        *slot = serialize_record(record);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().map_err(|_| LineKvError::WorkerPanic)?;
        }
        Ok::<(), LineKvError>(())
    })?;

    for line in &lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Serialize and write the snapshot chunk by chunk: each chunk is
/// fanned-out in parallel and written before the next chunk is
/// serialized, bounding peak memory to one chunk's worth of lines instead
/// of the whole output.
fn write_chunked<W: Write>(
    snapshot: &[(u64, Record)],
    writer: &mut W,
    chunk_size: usize,
    parallelism: usize,
) -> Result<()> {
    for chunk in snapshot.chunks(chunk_size.max(1)) {
        write_ordered_fanout(chunk, writer, parallelism)?;
    }
    Ok(())
}

/// A producer pool claims snapshot positions off a shared counter,
/// serializes them, and sends `(position, line)` pairs to a single
/// consumer. The consumer buffers out-of-order arrivals in a `BTreeMap`
/// and drains it in strict ascending position order, blocking on
/// `receiver.recv` whenever the next required position hasn't arrived
/// yet. Every position is produced exactly once, so the drain always
/// terminates.
fn write_pipelined<W: Write>(
    snapshot: &[(u64, Record)],
    writer: &mut W,
    parallelism: usize,
) -> Result<()> {
    let total = snapshot.len();
    if total == 0 {
        return Ok(());
    }
    let parallelism = parallelism.max(1);
    let (sender, receiver) = crossbeam_channel::bounded::<(usize, String)>(parallelism * 4);
    let next_index = AtomicUsize::new(0);

    std::thread::scope(|scope| -> Result<()> {
        for _ in 0..parallelism {
            let worker_sender = sender.clone();
            let next_index = &next_index;
            scope.spawn(move || loop {
                let i = next_index.fetch_add(1, Ordering::SeqCst);
                if i >= total {
                    break;
                }
                let line = serialize_record(&snapshot[i].1);
                if worker_sender.send((i, line)).is_err() {
                    break;
                }
            });
        }
        drop(sender);

        let mut pending = std::collections::BTreeMap::new();
        let mut next_needed = 0usize;
        for (position, line) in receiver.iter() {
            pending.insert(position, line);
            while let Some(ready) = pending.remove(&next_needed) {
                writer.write_all(ready.as_bytes())?;
                writer.write_all(b"\n")?;
                next_needed += 1;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn store_with(n: u64) -> RecordStore {
        let mut store = RecordStore::new();
        for i in 0..n {
            let mut record = Record::new();
            record.insert("id", Value::U64(i)).unwrap();
            store.insert(i, record).unwrap();
        }
        store
    }

    #[test]
    fn split_lines_handles_lf_crlf_and_missing_terminator() {
        assert_eq!(split_lines(b""), Vec::<&[u8]>::new());
        assert_eq!(split_lines(b"a\nb\n"), vec![b"a".as_ref(), b"b".as_ref()]);
        assert_eq!(split_lines(b"a\nb"), vec![b"a".as_ref(), b"b".as_ref()]);
        assert_eq!(split_lines(b"a\r\nb\r\n"), vec![b"a".as_ref(), b"b".as_ref()]);
        assert_eq!(split_lines(b"\n"), vec![b"".as_ref()]);
    }

    #[test]
    fn whole_file_round_trip_preserves_order_and_holes() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("linekv_pipeline_test_{}.lkv", std::process::id()));
        std::fs::write(&path, b"id=i:0\n\nid=i:2\n").unwrap();

        let options = PipelineOptions::default();
        let store = read_whole_file(&path, options.resolved_parallelism()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.indices().collect::<Vec<_>>(), vec![0, 2]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn ordered_fanout_and_pipelined_agree_on_output() {
        let store = store_with(37);
        let snapshot = snapshot_records(&store);

        let mut fanout_buf = Vec::new();
        write_ordered_fanout(&snapshot, &mut fanout_buf, 4).unwrap();

        let mut pipelined_buf = Vec::new();
        write_pipelined(&snapshot, &mut pipelined_buf, 4).unwrap();

        assert_eq!(fanout_buf, pipelined_buf);
    }

    #[test]
    fn chunked_write_matches_ordered_fanout() {
        let store = store_with(50);
        let snapshot = snapshot_records(&store);

        let mut chunked_buf = Vec::new();
        write_chunked(&snapshot, &mut chunked_buf, 7, 3).unwrap();

        let mut fanout_buf = Vec::new();
        write_ordered_fanout(&snapshot, &mut fanout_buf, 3).unwrap();

        assert_eq!(chunked_buf, fanout_buf);
    }

    #[test]
    fn serialize_then_deserialize_round_trips_a_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("linekv_pipeline_roundtrip_{}.lkv", std::process::id()));
        let store = store_with(25);
        let options = PipelineOptions::default();

        serialize_auto(&store, &path, &options).unwrap();
        let reloaded = deserialize_auto(&path, &options).unwrap();

        assert_eq!(reloaded.len(), store.len());
        for index in store.indices() {
            assert_eq!(reloaded.get(index), store.get(index));
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn chunked_read_matches_whole_file_read() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("linekv_pipeline_chunked_{}.lkv", std::process::id()));
        let store = store_with(30);
        let options = PipelineOptions::default();
        serialize_auto(&store, &path, &options).unwrap();

        let whole = read_whole_file(&path, 4).unwrap();
        let chunked = read_chunked(&path, 6, 4).unwrap();
        assert_eq!(whole.indices().collect::<Vec<_>>(), chunked.indices().collect::<Vec<_>>());
        for index in whole.indices() {
            assert_eq!(whole.get(index), chunked.get(index));
        }

        std::fs::remove_file(&path).ok();
    }
}
