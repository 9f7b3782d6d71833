//! Process-wide tunables.
//!
//! Two process-wide settings (`eager_unpack_raw` and
//! `parallel_method_threshold`); both are read at call time and have no
//! teardown. We hold them as atomics behind a `Lazy` static rather than as
//! bare `static mut`s -- a global mutable singleton accessed through
//! unsynchronized statics is a porting hazard under parallel test
//! execution, where tests can observe each other's writes in any order.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const DEFAULT_PARALLEL_METHOD_THRESHOLD: usize = 2000;

struct GlobalConfig {
    eager_unpack_raw: AtomicBool,
    parallel_method_threshold: AtomicUsize,
}

static GLOBAL: Lazy<GlobalConfig> = Lazy::new(|| GlobalConfig {
    eager_unpack_raw: AtomicBool::new(false),
    parallel_method_threshold: AtomicUsize::new(DEFAULT_PARALLEL_METHOD_THRESHOLD),
});

/// Whether `r`-kind values should be Z85-decoded eagerly while parsing.
pub fn eager_unpack_raw() -> bool {
    GLOBAL.eager_unpack_raw.load(Ordering::Relaxed)
}

/// Set the eager-unpack-on-parse flag. Affects all subsequent parses in the
/// process, not just those made through a particular `RecordStore`.
pub fn set_eager_unpack_raw(value: bool) {
    GLOBAL.eager_unpack_raw.store(value, Ordering::Relaxed);
}

/// The record-count boundary below which the write path prefers the
/// pipelined strategy over the chunked one.
pub fn parallel_method_threshold() -> usize {
    GLOBAL.parallel_method_threshold.load(Ordering::Relaxed)
}

pub fn set_parallel_method_threshold(value: usize) {
    GLOBAL
        .parallel_method_threshold
        .store(value, Ordering::Relaxed);
}

/// Calibration constants and strategy thresholds that should stay tunable
/// rather than hard-coded -- unlike the two official config knobs above
/// they are not process-wide state, just defaults that callers can
/// override per call by constructing their own `PipelineOptions`.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Files at or above this size (bytes) use the chunked read strategy
    /// instead of reading the whole file into memory.
    pub whole_file_read_threshold_bytes: u64,
    /// Number of lines accumulated per chunk in the chunked read strategy.
    pub read_chunk_lines: usize,
    /// Record counts at or above this use the chunked write strategy.
    pub chunked_write_threshold: usize,
    /// Degree of parallelism; `None` means "use the number of available
    /// hardware threads".
    pub parallelism: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            whole_file_read_threshold_bytes: 500 * 1024 * 1024,
            read_chunk_lines: 10_000,
            chunked_write_threshold: parallel_method_threshold(),
            parallelism: None,
        }
    }
}

impl PipelineOptions {
    pub fn resolved_parallelism(&self) -> usize {
        self.parallelism
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
    }

    /// The chunk size used by the chunked write strategy:
    /// `max(500, min(2000, count / max(parallelism*4, 50)))`.
    pub fn write_chunk_size(&self, record_count: usize) -> usize {
        let parallelism = self.resolved_parallelism();
        let divisor = (parallelism * 4).max(50);
        let target = record_count / divisor;
        target.clamp(500, 2000)
    }
}
