//! Canonical JSON encoding.
//!
//! Transaction identifiers and signing messages are hashes over this
//! encoding, so it must be byte-exact across implementations: object keys
//! sorted lexicographically by code point, no insignificant whitespace,
//! UTF-8 output with escapes only where JSON requires them.

use serde_json::Value;

use crate::error::TesseraError;

/// Serialize a JSON value to its canonical string form.
///
/// Floats are rejected outright: no field that influences a transaction id
/// carries one, and admitting them would make the encoding ambiguous.
pub fn to_canonical_string(value: &Value) -> Result<String, TesseraError> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut String) -> Result<(), TesseraError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            if n.is_f64() {
                return Err(TesseraError::Serialization(
                    "floats have no canonical form".into(),
                ));
            }
            out.push_str(&n.to_string());
        }
        Value::String(s) => push_escaped(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_escaped(key, out);
                out.push(':');
                write_value(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn push_escaped(s: &str, out: &mut String) {
    out.push_str(&serde_json::to_string(s).expect("string serialization is infallible"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_whitespace_dropped() {
        let value = json!({"b": 1, "a": {"z": null, "y": [1, 2]}});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"a":{"y":[1,2],"z":null},"b":1}"#
        );
    }

    #[test]
    fn unicode_is_emitted_raw() {
        let value = json!({"k": "snow\u{2603}man"});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            "{\"k\":\"snow\u{2603}man\"}"
        );
    }

    #[test]
    fn idempotent_under_parse_and_reserialize() {
        let value = json!({"m": {"c": 3, "a": [true, false, null], "b": "x"}});
        let first = to_canonical_string(&value).unwrap();
        let reparsed: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(to_canonical_string(&reparsed).unwrap(), first);
    }

    #[test]
    fn floats_are_rejected() {
        assert!(to_canonical_string(&json!({"x": 1.5})).is_err());
    }
}
