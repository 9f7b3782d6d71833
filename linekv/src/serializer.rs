//! The line serializer: the symmetric counterpart to
//! `parser` -- for every value the parser can produce, this module emits
//! bytes that parse back to an equal value.

use crate::record::Record;
use crate::value::{ArrayData, RawBlob, Value};

/// Serialize a record to its one-line wire form (no trailing newline).
pub fn serialize_record(record: &Record) -> String {
    let mut out = String::new();
    let mut first = true;
    for (key, value) in record.iter() {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(key.as_str());
        out.push('=');
        out.push(value.kind().tag());
        out.push(':');
        serialize_payload(value, &mut out);
    }
    out
}

fn serialize_payload(value: &Value, out: &mut String) {
    match value {
        Value::U8(v) => out.push_str(&v.to_string()),
        Value::I16(v) => out.push_str(&v.to_string()),
        Value::I32(v) => out.push_str(&v.to_string()),
        Value::U32(v) => out.push_str(&v.to_string()),
        Value::I64(v) => out.push_str(&v.to_string()),
        Value::U64(v) => out.push_str(&v.to_string()),
        Value::F32(v) => out.push_str(&format_f32(*v)),
        Value::F64(v) => out.push_str(&format_f64(*v)),
        Value::Bool(v) => out.push(if *v { '1' } else { '0' }),
        Value::Str(s) => escape_into(s, out),
        Value::Raw(blob) => serialize_raw(blob, out),
        Value::Array(data) => serialize_array(data, out),
    }
}

fn serialize_raw(blob: &RawBlob, out: &mut String) {
    // Pack a local copy rather than requiring `&mut Record` just to
    // serialize -- packing only changes representation, never the logical
    // value, so serializing from a throwaway clone is observably identical.
    let mut packed = blob.clone();
    packed.pack();
    let text = match &packed {
        RawBlob::Packed(text) => text.as_str(),
        RawBlob::Empty => "",
        RawBlob::Unpacked(_) => unreachable!("pack() always clears Unpacked"),
    };
    out.push('"');
    out.push_str(text);
    out.push('"');
}

fn serialize_array(data: &ArrayData, out: &mut String) {
    out.push('[');
    macro_rules! join {
        ($items:expr, $fmt:expr) => {{
            let mut first = true;
            for item in $items {
                if !first {
                    out.push(',');
                }
                first = false;
                ($fmt)(item, out);
            }
        }};
    }

    match data {
        ArrayData::U8(v) => join!(v, |x: &u8, out: &mut String| out.push_str(&x.to_string())),
        ArrayData::I16(v) => join!(v, |x: &i16, out: &mut String| out.push_str(&x.to_string())),
        ArrayData::I32(v) => join!(v, |x: &i32, out: &mut String| out.push_str(&x.to_string())),
        ArrayData::U32(v) => join!(v, |x: &u32, out: &mut String| out.push_str(&x.to_string())),
        ArrayData::I64(v) => join!(v, |x: &i64, out: &mut String| out.push_str(&x.to_string())),
        ArrayData::U64(v) => join!(v, |x: &u64, out: &mut String| out.push_str(&x.to_string())),
        ArrayData::F32(v) => join!(v, |x: &f32, out: &mut String| out.push_str(&format_f32(*x))),
        ArrayData::F64(v) => join!(v, |x: &f64, out: &mut String| out.push_str(&format_f64(*x))),
        ArrayData::Bool(v) => join!(v, |x: &bool, out: &mut String| out
            .push(if *x { '1' } else { '0' })),
        ArrayData::Str(v) => join!(v, |x: &String, out: &mut String| escape_into(x, out)),
    }
    out.push(']');
}

fn format_f32(v: f32) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v.is_sign_positive() {
            "inf".to_string()
        } else {
            "-inf".to_string()
        }
    } else {
        let mut buf = ryu::Buffer::new();
        buf.format(v).to_string()
    }
}

fn format_f64(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v.is_sign_positive() {
            "inf".to_string()
        } else {
            "-inf".to_string()
        }
    } else {
        let mut buf = ryu::Buffer::new();
        buf.format(v).to_string()
    }
}

/// Escape a string body and wrap it in quotes.
fn escape_into(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line_str;
    use crate::value::ScalarKind;

    fn record_with(fields: Vec<(&str, Value)>) -> Record {
        let mut record = Record::new();
        for (k, v) in fields {
            record.insert(k, v).unwrap();
        }
        record
    }

    #[test]
    fn mixed_scalars_seed_scenario() {
        let record = record_with(vec![
            ("id", Value::I32(42)),
            ("name", Value::Str("test".to_string())),
            ("price", Value::F32(99.99)),
            ("active", Value::Bool(true)),
        ]);
        let line = serialize_record(&record);
        assert_eq!(
            line,
            r#"id=i:42,name=s:"test",price=f:99.99,active=b:1"#
        );
    }

    #[test]
    fn empty_record_serializes_to_empty_string() {
        assert_eq!(serialize_record(&Record::new()), "");
    }

    #[test]
    fn escaped_string_round_trips_through_parser() {
        let record = record_with(vec![(
            "msg",
            Value::Str("Hello \"World\"\nNew line\tTab\\Backslash".to_string()),
        )]);
        let line = serialize_record(&record);
        assert!(line.contains("\\\""));
        assert!(line.contains("\\n"));
        assert!(line.contains("\\t"));
        assert!(line.contains("\\\\"));
        let parsed = parse_line_str(&line).unwrap();
        assert_eq!(parsed.get("msg"), record.get("msg"));
    }

    #[test]
    fn control_byte_uses_u_escape() {
        let record = record_with(vec![("x", Value::Str("\u{1}".to_string()))]);
        let line = serialize_record(&record);
        assert!(line.contains("\\u0001"));
        let parsed = parse_line_str(&line).unwrap();
        assert_eq!(parsed.get("x"), record.get("x"));
    }

    #[test]
    fn array_round_trips() {
        let record = record_with(vec![(
            "xs",
            Value::Array(crate::value::ArrayData::I32(vec![1, 2, 3])),
        )]);
        let line = serialize_record(&record);
        assert!(line.contains("xs=i:[1,2,3]"));
        let parsed = parse_line_str(&line).unwrap();
        assert_eq!(
            parsed.get_as("xs", ScalarKind::I32, true).unwrap(),
            record.get("xs")
        );
    }

    #[test]
    fn raw_blob_round_trips() {
        let bytes = vec![0u8, 1, 2, 3, 0xFF, 0xFE, 0xFD];
        let record = record_with(vec![(
            "blob",
            Value::Raw(crate::value::RawBlob::from_bytes(bytes.clone())),
        )]);
        let line = serialize_record(&record);
        let parsed = parse_line_str(&line).unwrap();
        match parsed.get("blob").unwrap().clone() {
            Value::Raw(mut blob) => assert_eq!(blob.as_bytes().unwrap(), bytes.as_slice()),
            other => panic!("expected raw blob, got {:?}", other),
        }
    }
}
