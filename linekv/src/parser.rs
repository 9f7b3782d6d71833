//! The line parser: a hand-rolled, allocation-minimising
//! cursor over a byte slice. Small free functions take a slice and return
//! `(value, bytes_consumed)` rather than reaching for a parser-combinator
//! crate -- the grammar here is small and fixed, so a combinator library
//! would add a dependency without buying back anything a plain cursor
//! doesn't already give us.

use crate::error::{LineKvError, Result};
use crate::record::Record;
use crate::value::{validate_key, ArrayData, RawBlob, ScalarKind, Value};

/// Parse one line (no trailing newline) into a `Record`.
pub fn parse_line(input: &[u8]) -> Result<Record> {
    let mut record = Record::new();
    if input.is_empty() {
        return Ok(record);
    }

    let mut pos = 0usize;
    loop {
        let (key, value, consumed) = parse_field(&input[pos..], pos)?;
        record.insert(&key, value)?;
        pos += consumed;

        if pos < input.len() && input[pos] == b',' {
            pos += 1;
            if pos >= input.len() {
                break; // trailing comma tolerated
            }
            continue;
        }
        break;
    }
    Ok(record)
}

/// Convenience wrapper for `&str` input.
pub fn parse_line_str(input: &str) -> Result<Record> {
    parse_line(input.as_bytes())
}

fn parse_field(buf: &[u8], base_pos: usize) -> Result<(String, Value, usize)> {
    let eq_idx = buf.iter().position(|&b| b == b'=').ok_or_else(|| {
        LineKvError::InvalidFormat {
            pos: base_pos,
            reason: "missing '=' separating key from value".to_string(),
        }
    })?;

    let key_bytes = &buf[..eq_idx];
    let key = std::str::from_utf8(key_bytes).map_err(|_| LineKvError::InvalidKey {
        key: String::from_utf8_lossy(key_bytes).into_owned(),
        pos: base_pos,
    })?;
    validate_key(key, base_pos)?;

    let after_eq = eq_idx + 1;
    if after_eq + 1 >= buf.len() {
        return Err(LineKvError::InvalidFormat {
            pos: base_pos + after_eq,
            reason: "missing type tag".to_string(),
        });
    }
    let tag = buf[after_eq] as char;
    if buf[after_eq + 1] != b':' {
        return Err(LineKvError::InvalidFormat {
            pos: base_pos + after_eq + 1,
            reason: "expected ':' after type tag".to_string(),
        });
    }
    let kind = ScalarKind::from_tag(tag).ok_or(LineKvError::UnknownType {
        tag,
        pos: base_pos + after_eq,
    })?;

    let payload_start = after_eq + 2;
    let payload = &buf[payload_start..];
    let (value, consumed) = if payload.first() == Some(&b'[') {
        parse_array(payload, base_pos + payload_start, kind)?
    } else {
        parse_scalar_value(payload, base_pos + payload_start, kind)?
    };

    Ok((key.to_string(), value, payload_start + consumed))
}

fn parse_scalar_value(buf: &[u8], pos: usize, kind: ScalarKind) -> Result<(Value, usize)> {
    use ScalarKind::*;
    Ok(match kind {
        U8 => {
            let (v, c) = parse_numeric::<u8>(buf, pos, 'e')?;
            (Value::U8(v), c)
        }
        I16 => {
            let (v, c) = parse_numeric::<i16>(buf, pos, 't')?;
            (Value::I16(v), c)
        }
        I32 => {
            let (v, c) = parse_numeric::<i32>(buf, pos, 'i')?;
            (Value::I32(v), c)
        }
        U32 => {
            let (v, c) = parse_numeric::<u32>(buf, pos, 'u')?;
            (Value::U32(v), c)
        }
        I64 => {
            let (v, c) = parse_numeric::<i64>(buf, pos, 'l')?;
            (Value::I64(v), c)
        }
        U64 => {
            let (v, c) = parse_numeric::<u64>(buf, pos, 'g')?;
            (Value::U64(v), c)
        }
        F32 => {
            let (v, c) = parse_numeric::<f32>(buf, pos, 'f')?;
            (Value::F32(v), c)
        }
        F64 => {
            let (v, c) = parse_numeric::<f64>(buf, pos, 'd')?;
            (Value::F64(v), c)
        }
        Bool => {
            let (v, c) = parse_bool(buf, pos)?;
            (Value::Bool(v), c)
        }
        Str => {
            let (v, c) = parse_quoted_string(buf, pos)?;
            (Value::Str(v), c)
        }
        Raw => {
            let (v, c) = parse_quoted_raw(buf, pos)?;
            (Value::Raw(v), c)
        }
    })
}

fn parse_array(buf: &[u8], pos: usize, elem_kind: ScalarKind) -> Result<(Value, usize)> {
    debug_assert_eq!(buf.first(), Some(&b'['));
    let close = find_matching_bracket(buf).ok_or(LineKvError::InvalidFormat {
        pos,
        reason: "unmatched '['".to_string(),
    })?;
    let inner = &buf[1..close];
    let data = parse_array_elements(inner, pos + 1, elem_kind)?;
    Ok((Value::Array(data), close + 1))
}

fn parse_array_elements(buf: &[u8], base_pos: usize, elem_kind: ScalarKind) -> Result<ArrayData> {
    use ScalarKind::*;

    macro_rules! collect {
        ($parse_one:expr) => {{
            let mut items = Vec::new();
            if !buf.is_empty() {
                let mut pos = 0usize;
                loop {
                    let (item, consumed) = ($parse_one)(&buf[pos..], base_pos + pos)?;
                    items.push(item);
                    pos += consumed;
                    if pos < buf.len() && buf[pos] == b',' {
                        pos += 1;
                        continue;
                    }
                    break;
                }
            }
            items
        }};
    }

    Ok(match elem_kind {
        U8 => ArrayData::U8(collect!(|b, p| parse_numeric::<u8>(b, p, 'e'))),
        I16 => ArrayData::I16(collect!(|b, p| parse_numeric::<i16>(b, p, 't'))),
        I32 => ArrayData::I32(collect!(|b, p| parse_numeric::<i32>(b, p, 'i'))),
        U32 => ArrayData::U32(collect!(|b, p| parse_numeric::<u32>(b, p, 'u'))),
        I64 => ArrayData::I64(collect!(|b, p| parse_numeric::<i64>(b, p, 'l'))),
        U64 => ArrayData::U64(collect!(|b, p| parse_numeric::<u64>(b, p, 'g'))),
        F32 => ArrayData::F32(collect!(|b, p| parse_numeric::<f32>(b, p, 'f'))),
        F64 => ArrayData::F64(collect!(|b, p| parse_numeric::<f64>(b, p, 'd'))),
        Bool => ArrayData::Bool(collect!(|b, p| parse_bool(b, p))),
        Str => ArrayData::Str(collect!(|b, p| parse_quoted_string(b, p))),
        Raw => {
            return Err(LineKvError::KindMismatch {
                expected: "an array-capable kind".to_string(),
                found: "r(raw)".to_string(),
            })
        }
    })
}

fn parse_numeric<T: std::str::FromStr>(buf: &[u8], pos: usize, tag: char) -> Result<(T, usize)> {
    let end = buf
        .iter()
        .position(|&b| matches!(b, b',' | b']' | b'\r' | b'\n'))
        .unwrap_or(buf.len());
    let lexeme = std::str::from_utf8(&buf[..end]).map_err(|_| LineKvError::NumericParse {
        tag,
        lexeme: String::from_utf8_lossy(&buf[..end]).into_owned(),
        pos,
    })?;
    let value = lexeme.parse::<T>().map_err(|_| LineKvError::NumericParse {
        tag,
        lexeme: lexeme.to_string(),
        pos,
    })?;
    Ok((value, end))
}

fn parse_bool(buf: &[u8], pos: usize) -> Result<(bool, usize)> {
    let b = *buf.first().ok_or(LineKvError::InvalidFormat {
        pos,
        reason: "missing boolean value".to_string(),
    })?;
    Ok((b != b'0', 1))
}

fn parse_quoted_string(buf: &[u8], pos: usize) -> Result<(String, usize)> {
    if buf.first() != Some(&b'"') {
        return Err(LineKvError::InvalidFormat {
            pos,
            reason: "expected opening quote".to_string(),
        });
    }
    let content = &buf[1..];
    let close = find_closing_quote(content).ok_or(LineKvError::InvalidFormat {
        pos,
        reason: "unterminated quoted string".to_string(),
    })?;
    let lexeme = &content[..close];
    let value = if lexeme.contains(&b'\\') {
        unescape_string(lexeme, pos)?
    } else {
        std::str::from_utf8(lexeme)
            .map_err(|_| LineKvError::InvalidFormat {
                pos,
                reason: "invalid utf-8 in string literal".to_string(),
            })?
            .to_string()
    };
    Ok((value, 1 + close + 1))
}

fn parse_quoted_raw(buf: &[u8], pos: usize) -> Result<(RawBlob, usize)> {
    if buf.first() != Some(&b'"') {
        return Err(LineKvError::InvalidFormat {
            pos,
            reason: "expected opening quote".to_string(),
        });
    }
    let content = &buf[1..];
    let close = find_closing_quote(content).ok_or(LineKvError::InvalidFormat {
        pos,
        reason: "unterminated raw literal".to_string(),
    })?;
    let lexeme = std::str::from_utf8(&content[..close]).map_err(|_| LineKvError::InvalidFormat {
        pos,
        reason: "invalid utf-8 in raw literal".to_string(),
    })?;

    let mut blob = RawBlob::from_encoded(lexeme.to_string());
    if crate::config::eager_unpack_raw() {
        blob.unpack()?;
    }
    Ok((blob, 1 + close + 1))
}

/// Find the next `"` not preceded by a single `\`, scanning from the start
/// of `buf` (the content just past an opening quote). Deliberately the
/// literal one-byte lookback the spec describes, not a proper run-length
/// parity check of consecutive backslashes.
fn find_closing_quote(buf: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'"' && (i == 0 || buf[i - 1] != b'\\') {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Find the index (within `buf`, where `buf[0] == '['`) of the matching
/// `]`, tracking bracket depth but ignoring brackets while inside a quoted
/// region.
fn find_matching_bracket(buf: &[u8]) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_quote = false;
    for (i, &b) in buf.iter().enumerate() {
        if in_quote {
            if b == b'"' && (i == 0 || buf[i - 1] != b'\\') {
                in_quote = false;
            }
            continue;
        }
        match b {
            b'"' => in_quote = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Two-byte escape expansion table: unknown `\x` escapes degrade silently
/// to the literal escaped byte -- a deliberate lenient decoder, not a bug.
fn unescape_string(lexeme: &[u8], pos: usize) -> Result<String> {
    let mut scratch = Scratch::new();
    let mut i = 0;
    while i < lexeme.len() {
        let b = lexeme[i];
        if b == b'\\' && i + 1 < lexeme.len() {
            let escaped = lexeme[i + 1];
            let decoded = match escaped {
                b'"' => b'"',
                b'\\' => b'\\',
                b'n' => b'\n',
                b'r' => b'\r',
                b't' => b'\t',
                b'b' => 0x08,
                b'f' => 0x0C,
                b'/' => b'/',
                other => other,
            };
            scratch.push(decoded);
            i += 2;
        } else {
            scratch.push(b);
            i += 1;
        }
    }
    scratch.into_string(pos)
}

/// A stack-resident scratch buffer that spills to the heap past ~1 KiB, so
/// the common case of a short escaped string doesn't allocate. Parallel
/// parse workers each get their own `Scratch` on their own stack, so there's
/// no contention to design around -- just the allocation itself.
enum Scratch {
    Stack { buf: [u8; 1024], len: usize },
    Heap(Vec<u8>),
}

impl Scratch {
    fn new() -> Self {
        Scratch::Stack {
            buf: [0u8; 1024],
            len: 0,
        }
    }

    fn push(&mut self, b: u8) {
        match self {
            Scratch::Stack { buf, len } if *len < buf.len() => {
                buf[*len] = b;
                *len += 1;
            }
            Scratch::Stack { buf, len } => {
                let mut heap = Vec::with_capacity(buf.len() * 2);
                heap.extend_from_slice(&buf[..*len]);
                heap.push(b);
                *self = Scratch::Heap(heap);
            }
            Scratch::Heap(v) => v.push(b),
        }
    }

    fn into_string(self, pos: usize) -> Result<String> {
        let bytes = match self {
            Scratch::Stack { buf, len } => buf[..len].to_vec(),
            Scratch::Heap(v) => v,
        };
        String::from_utf8(bytes).map_err(|_| LineKvError::InvalidFormat {
            pos,
            reason: "invalid utf-8 after escape expansion".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ArrayData;

    #[test]
    fn empty_input_is_empty_record() {
        let record = parse_line(b"").unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn mixed_scalars_seed_scenario() {
        let record =
            parse_line_str(r#"id=i:42,name=s:"test",price=f:99.99,active=b:1"#).unwrap();
        assert_eq!(record.get("id"), Some(&Value::I32(42)));
        assert_eq!(record.get("name"), Some(&Value::Str("test".to_string())));
        assert_eq!(record.get("price"), Some(&Value::F32(99.99)));
        assert_eq!(record.get("active"), Some(&Value::Bool(true)));
    }

    #[test]
    fn arrays_seed_scenario() {
        let record =
            parse_line_str(r#"numbers=i:[1,2,3,4,5],names=s:["Alice","Bob","Charlie"]"#).unwrap();
        assert_eq!(
            record.get("numbers"),
            Some(&Value::Array(ArrayData::I32(vec![1, 2, 3, 4, 5])))
        );
        assert_eq!(
            record.get("names"),
            Some(&Value::Array(ArrayData::Str(vec![
                "Alice".to_string(),
                "Bob".to_string(),
                "Charlie".to_string()
            ])))
        );
    }

    #[test]
    fn empty_array_roundtrips_for_every_tag() {
        for tag in ['e', 't', 'i', 'u', 'l', 'g', 'f', 'd', 'b', 's'] {
            let line = format!("xs={}:[]", tag);
            let record = parse_line_str(&line).unwrap();
            assert!(record.get("xs").unwrap().is_array());
        }
    }

    #[test]
    fn escaped_string_seed_scenario() {
        let line = "msg=s:\"Hello \\\"World\\\"\\nNew line\\tTab\\\\Backslash\"";
        let record = parse_line_str(line).unwrap();
        assert_eq!(
            record.get("msg"),
            Some(&Value::Str(
                "Hello \"World\"\nNew line\tTab\\Backslash".to_string()
            ))
        );
    }

    #[test]
    fn unknown_escape_degrades_to_literal_byte() {
        let record = parse_line_str(r#"msg=s:"a\qb""#).unwrap();
        assert_eq!(record.get("msg"), Some(&Value::Str("aqb".to_string())));
    }

    #[test]
    fn trailing_comma_is_tolerated() {
        let record = parse_line_str("a=i:1,b=i:2,").unwrap();
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn bracket_inside_quoted_array_element_is_ignored_by_scanner() {
        let record = parse_line_str(r#"xs=s:["a[b]c","d"]"#).unwrap();
        assert_eq!(
            record.get("xs"),
            Some(&Value::Array(ArrayData::Str(vec![
                "a[b]c".to_string(),
                "d".to_string()
            ])))
        );
    }

    #[test]
    fn unmatched_bracket_is_a_format_error() {
        let err = parse_line_str("xs=i:[1,2,3").unwrap_err();
        assert_eq!(err.kind_code(), "InvalidFormat");
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = parse_line_str("x=q:1").unwrap_err();
        assert_eq!(err.kind_code(), "UnknownType");
    }

    #[test]
    fn bad_key_is_rejected() {
        let err = parse_line_str("bad key=i:1").unwrap_err();
        assert_eq!(err.kind_code(), "InvalidKey");
    }

    #[test]
    fn numeric_overflow_is_a_parse_error() {
        let err = parse_line_str("x=e:256").unwrap_err();
        assert_eq!(err.kind_code(), "NumericParse");
    }

    #[test]
    fn raw_blob_parses_and_defaults_to_packed() {
        // Pin the precondition explicitly rather than relying on process
        // startup defaults, since this flag is process-wide and other
        // tests in this binary may have already flipped it.
        crate::config::set_eager_unpack_raw(false);
        let line = r#"blob=r:"00000001""#;
        let record = parse_line_str(line).unwrap();
        match record.get("blob").unwrap() {
            Value::Raw(RawBlob::Packed(text)) => assert_eq!(text, "00000001"),
            other => panic!("expected packed raw blob, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_key_in_one_line_is_rejected() {
        let err = parse_line_str("a=i:1,a=i:2").unwrap_err();
        assert_eq!(err.kind_code(), "DuplicateKey");
    }
}
