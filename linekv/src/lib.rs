//! A line-oriented, typed key/value serialization codec.
//!
//! Each line on the wire is an ordered list of `key=tag:payload` fields
//! (`parser`/`serializer`), collected across a whole file into an
//! index-keyed `RecordStore` via a parallel read or write pipeline that
//! picks a strategy by input size (`pipeline`). `api` re-exports the six
//! operations and two config knobs callers need; everything else is
//! implementation detail reachable only through those.

pub mod api;
pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod serializer;
pub mod store;
pub mod value;
mod z85;

pub use error::{LineKvError, Result};
pub use record::Record;
pub use store::RecordStore;
pub use value::{ArrayData, RawBlob, ScalarKind, Value};

pub use api::{
    deserialize_auto, deserialize_auto_with, deserialize_chunked, deserialize_chunked_with,
    eager_unpack_raw, parallel_method_threshold, parse_line, serialize_auto, serialize_auto_with,
    serialize_chunked, serialize_chunked_with, serialize_record, set_eager_unpack_raw,
    set_parallel_method_threshold,
};
pub use config::PipelineOptions;
