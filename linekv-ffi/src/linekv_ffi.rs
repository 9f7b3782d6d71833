use linekv::{LineKvError, Record, RecordStore, Value};

#[cxx::bridge(namespace = "linekv")]
mod ffi {
    extern "Rust" {
        type RecordStoreHandle;

        fn enable_logger();

        fn load_auto(path: &str) -> Result<Box<RecordStoreHandle>>;
        fn load_chunked(path: &str, chunk_size: usize) -> Result<Box<RecordStoreHandle>>;

        fn save_auto(&self, path: &str) -> Result<()>;
        fn save_chunked(&self, path: &str, chunk_size: usize) -> Result<()>;

        fn record_count(&self) -> usize;
        fn indices(&self) -> Vec<u64>;

        fn get_i64(&self, index: u64, key: &str) -> Result<i64>;
        fn get_f64(&self, index: u64, key: &str) -> Result<f64>;
        fn get_bool(&self, index: u64, key: &str) -> Result<bool>;
        fn get_string(&self, index: u64, key: &str) -> Result<String>;
        fn get_raw(&mut self, index: u64, key: &str) -> Result<Vec<u8>>;

        fn parse_and_insert(&mut self, index: u64, line: &str) -> Result<()>;
        fn serialize_index(&self, index: u64) -> Result<String>;
    }
}

/// Opaque wrapper around `RecordStore`, the only shape `cxx` needs to carry
/// across the boundary: a thin handle with accessor methods, not a
/// reimplementation of the format's type vocabulary. Only int/float/bool/
/// string and a raw byte vector cross the boundary; arrays do not.
pub struct RecordStoreHandle(RecordStore);

pub fn enable_logger() {
    env_logger::builder()
        .filter(None, log::LevelFilter::Info)
        .init()
}

pub fn load_auto(path: &str) -> Result<Box<RecordStoreHandle>, LineKvError> {
    Ok(Box::new(RecordStoreHandle(linekv::deserialize_auto(path)?)))
}

pub fn load_chunked(path: &str, chunk_size: usize) -> Result<Box<RecordStoreHandle>, LineKvError> {
    let chunk_size = if chunk_size == 0 { None } else { Some(chunk_size) };
    Ok(Box::new(RecordStoreHandle(linekv::deserialize_chunked(
        path, chunk_size,
    )?)))
}

fn field<'a>(record: &'a Record, key: &str) -> Result<&'a Value, LineKvError> {
    record.get(key).ok_or_else(|| LineKvError::InvalidFormat {
        pos: 0,
        reason: format!("no field named {:?}", key),
    })
}

fn record_at(store: &RecordStore, index: u64) -> Result<&Record, LineKvError> {
    store.get(index).ok_or_else(|| LineKvError::InvalidFormat {
        pos: 0,
        reason: format!("no record at index {}", index),
    })
}

impl RecordStoreHandle {
    pub fn save_auto(&self, path: &str) -> Result<(), LineKvError> {
        linekv::serialize_auto(&self.0, path)
    }

    pub fn save_chunked(&self, path: &str, chunk_size: usize) -> Result<(), LineKvError> {
        let chunk_size = if chunk_size == 0 { None } else { Some(chunk_size) };
        linekv::serialize_chunked(&self.0, path, chunk_size)
    }

    pub fn record_count(&self) -> usize {
        self.0.len()
    }

    pub fn indices(&self) -> Vec<u64> {
        self.0.indices().collect()
    }

    /// Widen any signed or unsigned integer scalar to `i64`. `u64` values
    /// above `i64::MAX` wrap, matching `cxx`'s lack of a native `u64` width
    /// wider than what C++ `int64_t` can hold without a dedicated unsigned
    /// binding.
    pub fn get_i64(&self, index: u64, key: &str) -> Result<i64, LineKvError> {
        let value = field(record_at(&self.0, index)?, key)?;
        match value {
            Value::U8(v) => Ok(*v as i64),
            Value::I16(v) => Ok(*v as i64),
            Value::I32(v) => Ok(*v as i64),
            Value::U32(v) => Ok(*v as i64),
            Value::I64(v) => Ok(*v),
            Value::U64(v) => Ok(*v as i64),
            other => Err(kind_error("an integer scalar", other)),
        }
    }

    pub fn get_f64(&self, index: u64, key: &str) -> Result<f64, LineKvError> {
        let value = field(record_at(&self.0, index)?, key)?;
        match value {
            Value::F32(v) => Ok(*v as f64),
            Value::F64(v) => Ok(*v),
            other => Err(kind_error("a float scalar", other)),
        }
    }

    pub fn get_bool(&self, index: u64, key: &str) -> Result<bool, LineKvError> {
        let value = field(record_at(&self.0, index)?, key)?;
        match value {
            Value::Bool(v) => Ok(*v),
            other => Err(kind_error("b(bool)", other)),
        }
    }

    pub fn get_string(&self, index: u64, key: &str) -> Result<String, LineKvError> {
        let value = field(record_at(&self.0, index)?, key)?;
        match value {
            Value::Str(v) => Ok(v.clone()),
            other => Err(kind_error("s(string)", other)),
        }
    }

    pub fn get_raw(&mut self, index: u64, key: &str) -> Result<Vec<u8>, LineKvError> {
        let record = self
            .0
            .get_mut(index)
            .ok_or_else(|| LineKvError::InvalidFormat {
                pos: 0,
                reason: format!("no record at index {}", index),
            })?;
        let value = record.get_mut(key).ok_or_else(|| LineKvError::InvalidFormat {
            pos: 0,
            reason: format!("no field named {:?}", key),
        })?;
        match value {
            Value::Raw(blob) => Ok(blob.as_bytes()?.to_vec()),
            other => Err(kind_error("r(raw)", other)),
        }
    }

    pub fn parse_and_insert(&mut self, index: u64, line: &str) -> Result<(), LineKvError> {
        let record = linekv::parse_line(line)?;
        self.0.insert(index, record)
    }

    pub fn serialize_index(&self, index: u64) -> Result<String, LineKvError> {
        Ok(linekv::serialize_record(record_at(&self.0, index)?))
    }
}

fn kind_error(expected: &str, found: &Value) -> LineKvError {
    LineKvError::KindMismatch {
        expected: expected.to_string(),
        found: found.shape_name(),
    }
}
