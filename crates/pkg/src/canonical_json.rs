//! # Canonical JSON
//!
//! Deterministic JSON encoding used for indexes, locks, sidecars, sources,
//! and trust stores:
//!
//! - UTF-8
//! - no insignificant whitespace
//! - lexicographically sorted object keys
//!
//! Readers must tolerate an optional trailing newline. The encoder is
//! written by hand because default serializers do not guarantee the byte
//! format.

use serde::Serialize;
use serde_json::Value;

use crate::{PkgError, PkgResult};

/// Encode a JSON value canonically.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

/// Serialize any value and encode it canonically.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> PkgResult<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    Ok(canonical_json_bytes(&value))
}

/// Parse a canonical (or canonical-plus-newline) JSON document.
pub fn from_canonical_bytes(bytes: &[u8]) -> PkgResult<Value> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| PkgError::Format("document is not valid UTF-8".to_string()))?;
    Ok(serde_json::from_str(text.trim_end_matches('\n'))?)
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key);
                out.push(b':');
                write_value(out, &map[*key]);
            }
            out.push(b'}');
        }
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            // Non-ASCII stays raw UTF-8.
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_whitespace_free() {
        let value = json!({"b": 1, "a": {"z": true, "m": [1, 2]}});
        let bytes = canonical_json_bytes(&value);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":{"m":[1,2],"z":true},"b":1}"#
        );
    }

    #[test]
    fn non_ascii_stays_raw_utf8() {
        let value = json!({"name": "Łukasz"});
        let bytes = canonical_json_bytes(&value);
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"name":"Łukasz"}"#);
    }

    #[test]
    fn decode_of_encode_round_trips() {
        let value = json!({"pkg": {"version": "0.1.0", "deps": ["a", "b"], "n": 42}});
        let bytes = canonical_json_bytes(&value);
        let decoded = from_canonical_bytes(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn encode_is_a_fixed_point_on_its_output() {
        let value = json!({"x": [1, {"b": 2, "a": 3}], "y": "s"});
        let once = canonical_json_bytes(&value);
        let decoded = from_canonical_bytes(&once).unwrap();
        let twice = canonical_json_bytes(&decoded);
        assert_eq!(once, twice);
    }

    #[test]
    fn trailing_newline_is_tolerated() {
        let mut bytes = canonical_json_bytes(&json!({"a": 1}));
        bytes.push(b'\n');
        assert_eq!(from_canonical_bytes(&bytes).unwrap(), json!({"a": 1}));
    }

    fn arb_json(depth: u32) -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            "[a-zA-Z0-9_ąęś]{0,12}".prop_map(serde_json::Value::from),
        ];
        leaf.prop_recursive(depth, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
                prop::collection::btree_map("[a-z_]{1,6}", inner, 0..4).prop_map(|m| {
                    serde_json::Value::Object(m.into_iter().collect())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonical_round_trip_holds_for_arbitrary_documents(value in arb_json(3)) {
            let bytes = canonical_json_bytes(&value);
            let decoded = from_canonical_bytes(&bytes).unwrap();
            prop_assert_eq!(&decoded, &value);
            prop_assert_eq!(canonical_json_bytes(&decoded), bytes);
        }
    }
}
