//! The value model: the closed `ScalarKind` enumeration, the
//! `Value` tagged union built on top of it, key validation, and the
//! `RawBlob` packed/unpacked duality.

use crate::error::{LineKvError, Result};
use crate::z85;
use smallstr::SmallString;

/// Keys are short identifiers in the common case, so we intern them in a
/// small inline buffer rather than always heap-allocating.
pub type Key = SmallString<[u8; 16]>;

/// One of the eleven scalar kinds, each with a single-character wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    U8,
    I16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
    Str,
    Raw,
}

impl ScalarKind {
    pub fn tag(self) -> char {
        use ScalarKind::*;
        match self {
            U8 => 'e',
            I16 => 't',
            I32 => 'i',
            U32 => 'u',
            I64 => 'l',
            U64 => 'g',
            F32 => 'f',
            F64 => 'd',
            Bool => 'b',
            Str => 's',
            Raw => 'r',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        use ScalarKind::*;
        Some(match tag {
            'e' => U8,
            't' => I16,
            'i' => I32,
            'u' => U32,
            'l' => I64,
            'g' => U64,
            'f' => F32,
            'd' => F64,
            'b' => Bool,
            's' => Str,
            'r' => Raw,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use ScalarKind::*;
        match self {
            U8 => "e(u8)",
            I16 => "t(i16)",
            I32 => "i(i32)",
            U32 => "u(u32)",
            I64 => "l(i64)",
            U64 => "g(u64)",
            F32 => "f(f32)",
            F64 => "d(f64)",
            Bool => "b(bool)",
            Str => "s(string)",
            Raw => "r(raw)",
        }
    }
}

/// A binary payload that, at rest, holds either raw bytes or its Z85-encoded
/// text form -- never both as ground truth simultaneously. Modelled as a
/// three-way tagged variant rather than two nullable fields, per the design
/// note: that keeps "exactly one populated" an invariant of the type rather
/// than something callers have to maintain by convention.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBlob {
    Empty,
    Packed(String),
    Unpacked(Vec<u8>),
}

impl RawBlob {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            RawBlob::Empty
        } else {
            RawBlob::Unpacked(bytes)
        }
    }

    pub fn from_encoded(text: String) -> Self {
        if text.is_empty() {
            RawBlob::Empty
        } else {
            RawBlob::Packed(text)
        }
    }

    /// Move bytes -> text. No-op if already packed or empty.
    pub fn pack(&mut self) {
        if let RawBlob::Unpacked(bytes) = self {
            let text = z85::encode(bytes);
            *self = RawBlob::Packed(text);
        }
    }

    /// Move text -> bytes. No-op if already unpacked or empty. Fails if the
    /// stored text isn't valid Z85.
    pub fn unpack(&mut self) -> Result<()> {
        if let RawBlob::Packed(text) = self {
            let bytes = z85::decode(text)?;
            *self = RawBlob::Unpacked(bytes);
        }
        Ok(())
    }

    pub fn as_bytes(&mut self) -> Result<&[u8]> {
        self.unpack()?;
        Ok(match self {
            RawBlob::Unpacked(bytes) => bytes.as_slice(),
            RawBlob::Empty => &[],
            RawBlob::Packed(_) => unreachable!("unpack() always clears Packed"),
        })
    }

    pub fn as_encoded(&mut self) -> &str {
        self.pack();
        match self {
            RawBlob::Packed(text) => text.as_str(),
            RawBlob::Empty => "",
            RawBlob::Unpacked(_) => unreachable!("pack() always clears Unpacked"),
        }
    }
}

/// A homogeneous sequence of one scalar kind. Kept as a tagged union of
/// packed `Vec<T>`s rather than `Vec<Value>` so elements never carry a
/// redundant per-element kind tag in memory. There is deliberately no `Raw`
/// variant: arrays of `r` are not representable.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl ArrayData {
    pub fn kind(&self) -> ScalarKind {
        use ArrayData::*;
        match self {
            U8(_) => ScalarKind::U8,
            I16(_) => ScalarKind::I16,
            I32(_) => ScalarKind::I32,
            U32(_) => ScalarKind::U32,
            I64(_) => ScalarKind::I64,
            U64(_) => ScalarKind::U64,
            F32(_) => ScalarKind::F32,
            F64(_) => ScalarKind::F64,
            Bool(_) => ScalarKind::Bool,
            Str(_) => ScalarKind::Str,
        }
    }

    pub fn len(&self) -> usize {
        use ArrayData::*;
        match self {
            U8(v) => v.len(),
            I16(v) => v.len(),
            I32(v) => v.len(),
            U32(v) => v.len(),
            I64(v) => v.len(),
            U64(v) => v.len(),
            F32(v) => v.len(),
            F64(v) => v.len(),
            Bool(v) => v.len(),
            Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn empty_of(kind: ScalarKind) -> Result<Self> {
        use ScalarKind::*;
        Ok(match kind {
            U8 => ArrayData::U8(Vec::new()),
            I16 => ArrayData::I16(Vec::new()),
            I32 => ArrayData::I32(Vec::new()),
            U32 => ArrayData::U32(Vec::new()),
            I64 => ArrayData::I64(Vec::new()),
            U64 => ArrayData::U64(Vec::new()),
            F32 => ArrayData::F32(Vec::new()),
            F64 => ArrayData::F64(Vec::new()),
            Bool => ArrayData::Bool(Vec::new()),
            Str => ArrayData::Str(Vec::new()),
            Raw => {
                return Err(LineKvError::KindMismatch {
                    expected: "a scalar-array-capable kind".to_string(),
                    found: "r(raw)".to_string(),
                })
            }
        })
    }
}

/// The tagged union at the heart of the format: either a single scalar or a
/// homogeneous array of one scalar kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    I16(i16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
    Raw(RawBlob),
    Array(ArrayData),
}

impl Value {
    /// The element kind: for scalars, their own kind; for arrays, the
    /// declared element kind.
    pub fn kind(&self) -> ScalarKind {
        use Value::*;
        match self {
            U8(_) => ScalarKind::U8,
            I16(_) => ScalarKind::I16,
            I32(_) => ScalarKind::I32,
            U32(_) => ScalarKind::U32,
            I64(_) => ScalarKind::I64,
            U64(_) => ScalarKind::U64,
            F32(_) => ScalarKind::F32,
            F64(_) => ScalarKind::F64,
            Bool(_) => ScalarKind::Bool,
            Str(_) => ScalarKind::Str,
            Raw(_) => ScalarKind::Raw,
            Array(a) => a.kind(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// A human-readable shape descriptor used in `KindMismatch` errors, e.g.
    /// `"i32"` or `"array of i32"`.
    pub fn shape_name(&self) -> String {
        if self.is_array() {
            format!("array of {}", self.kind().name())
        } else {
            self.kind().name().to_string()
        }
    }
}

/// Validate a key against the 64-character whitelist `[A-Za-z0-9_-]`,
/// non-empty. Runs in `O(len(key))`.
pub fn validate_key(key: &str, pos: usize) -> Result<()> {
    if key.is_empty() {
        return Err(LineKvError::InvalidKey {
            key: key.to_string(),
            pos,
        });
    }
    for &b in key.as_bytes() {
        if !is_key_byte(b) {
            return Err(LineKvError::InvalidKey {
                key: key.to_string(),
                pos,
            });
        }
    }
    Ok(())
}

#[inline]
pub(crate) const fn is_key_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_roundtrips_through_scalar_kind() {
        for tag in ['e', 't', 'i', 'u', 'l', 'g', 'f', 'd', 'b', 's', 'r'] {
            let kind = ScalarKind::from_tag(tag).unwrap();
            assert_eq!(kind.tag(), tag);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(ScalarKind::from_tag('x').is_none());
    }

    #[test]
    fn key_whitelist_rejects_bad_bytes() {
        assert!(validate_key("good_key-1", 0).is_ok());
        assert!(validate_key("bad key", 0).is_err());
        assert!(validate_key("", 0).is_err());
        assert!(validate_key("has.dot", 0).is_err());
    }

    #[test]
    fn raw_blob_transitions_are_idempotent() {
        let mut blob = RawBlob::from_bytes(vec![1, 2, 3, 4, 5]);
        blob.pack();
        let encoded_once = blob.clone();
        blob.pack();
        assert_eq!(blob, encoded_once);

        blob.unpack().unwrap();
        let decoded_once = blob.clone();
        blob.unpack().unwrap();
        assert_eq!(blob, decoded_once);
        assert_eq!(blob, RawBlob::Unpacked(vec![1, 2, 3, 4, 5]));
    }

    #[test]
    fn raw_array_is_a_kind_error() {
        assert!(ArrayData::empty_of(ScalarKind::Raw).is_err());
    }
}
