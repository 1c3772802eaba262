//! Canonical JSON encoding for deterministic commitments.
//!
//! The canonical form is a strict JSON profile:
//! - Object keys sorted lexicographically by UTF-8 code units
//! - No whitespace between tokens
//! - Arrays preserve order
//! - Integer-only numbers (floats and non-finite values are rejected)
//! - Minimal string escaping; input text is taken verbatim as UTF-8,
//!   no Unicode normalization
//!
//! The canonical encoding is critical: it ensures that the same credential
//! payload produces identical bytes (and thus identical commitment hashes)
//! regardless of how the value was assembled.

use std::fmt::Write as _;

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::crypto::Sha256Hash;

/// Maximum nesting depth accepted by the canonicalizer.
pub const MAX_DEPTH: usize = 64;

/// Errors raised when a value falls outside the canonical JSON subset.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonicalError {
    /// Floats (including NaN and infinities) have no canonical form.
    #[error("non-serializable: floating-point numbers are outside the canonical subset")]
    FloatNotAllowed,

    /// Numbers must fit in the signed 64-bit range.
    #[error("non-serializable: number {0} is outside the signed 64-bit range")]
    NumberOutOfRange(String),

    /// Nesting deeper than [`MAX_DEPTH`] is rejected.
    #[error("non-serializable: nesting exceeds {MAX_DEPTH} levels")]
    MaxDepthExceeded,
}

/// Produce the canonical byte string of a JSON value.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    canonical_string(value).map(String::into_bytes)
}

/// Produce the canonical text form of a JSON value.
pub fn canonical_string(value: &Value) -> Result<String, CanonicalError> {
    validate(value, 0)?;
    let mut out = String::new();
    emit_value(value, &mut out);
    Ok(out)
}

/// SHA-256 over the canonical byte string.
pub fn canonical_hash(value: &Value) -> Result<Sha256Hash, CanonicalError> {
    Ok(Sha256Hash::hash(&canonical_bytes(value)?))
}

/// Check whether a JSON text is already in canonical form.
pub fn is_canonical(input: &str) -> bool {
    serde_json::from_str::<Value>(input)
        .ok()
        .and_then(|v| canonical_string(&v).ok())
        .is_some_and(|canonical| canonical == input)
}

/// Reject values outside the canonical subset before emitting anything.
fn validate(value: &Value, depth: usize) -> Result<(), CanonicalError> {
    if depth > MAX_DEPTH {
        return Err(CanonicalError::MaxDepthExceeded);
    }

    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => validate_number(n),
        Value::Array(items) => {
            for item in items {
                validate(item, depth + 1)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for v in map.values() {
                validate(v, depth + 1)?;
            }
            Ok(())
        }
    }
}

fn validate_number(n: &Number) -> Result<(), CanonicalError> {
    if n.is_i64() {
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        if u > i64::MAX as u64 {
            return Err(CanonicalError::NumberOutOfRange(u.to_string()));
        }
        return Ok(());
    }
    Err(CanonicalError::FloatNotAllowed)
}

fn emit_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => emit_number(n, out),
        Value::String(s) => emit_string(s, out),
        Value::Array(items) => emit_array(items, out),
        Value::Object(map) => emit_object(map, out),
    }
}

/// Integers in minimal decimal form. Validation guarantees the i64/u64 fit.
fn emit_number(n: &Number, out: &mut String) {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
    }
}

/// Minimal escaping: only `"`, `\`, and control characters U+0000..U+001F.
/// Short escapes where JSON defines them, `\uXXXX` otherwise.
fn emit_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if ('\u{0000}'..='\u{001F}').contains(&c) => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn emit_array(items: &[Value], out: &mut String) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        emit_value(item, out);
    }
    out.push(']');
}

/// Keys sorted by byte comparison, which for UTF-8 text equals code-unit order.
fn emit_object(map: &Map<String, Value>, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        emit_string(key, out);
        out.push(':');
        emit_value(&map[*key], out);
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted() {
        let v = json!({"z": 1, "a": 2, "m": 3});
        assert_eq!(canonical_string(&v).unwrap(), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_nested_objects_sorted() {
        let v = json!({"outer": {"z": 1, "a": 2}});
        assert_eq!(canonical_string(&v).unwrap(), r#"{"outer":{"a":2,"z":1}}"#);
    }

    #[test]
    fn test_arrays_preserve_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonical_string(&v).unwrap(), "[3,1,2]");
    }

    #[test]
    fn test_primitives() {
        assert_eq!(canonical_string(&json!(null)).unwrap(), "null");
        assert_eq!(canonical_string(&json!(true)).unwrap(), "true");
        assert_eq!(canonical_string(&json!(false)).unwrap(), "false");
        assert_eq!(canonical_string(&json!(42)).unwrap(), "42");
        assert_eq!(canonical_string(&json!(-42)).unwrap(), "-42");
        assert_eq!(canonical_string(&json!("hi")).unwrap(), r#""hi""#);
    }

    #[test]
    fn test_reject_float() {
        let v = json!({"x": 1.5});
        assert_eq!(canonical_string(&v), Err(CanonicalError::FloatNotAllowed));
    }

    #[test]
    fn test_reject_u64_above_i64_max() {
        let v = json!({"x": u64::MAX});
        assert!(matches!(
            canonical_string(&v),
            Err(CanonicalError::NumberOutOfRange(_))
        ));
    }

    #[test]
    fn test_reject_excessive_depth() {
        let mut v = json!(0);
        for _ in 0..(MAX_DEPTH + 2) {
            v = json!([v]);
        }
        assert_eq!(canonical_string(&v), Err(CanonicalError::MaxDepthExceeded));
    }

    #[test]
    fn test_escaping() {
        let v = json!({"text": "line1\nline2\ttab \"q\" \\ \u{0001}"});
        assert_eq!(
            canonical_string(&v).unwrap(),
            "{\"text\":\"line1\\nline2\\ttab \\\"q\\\" \\\\ \\u0001\"}"
        );
    }

    #[test]
    fn test_unicode_verbatim() {
        // e + combining acute is NOT normalized to e-acute
        let decomposed = "e\u{0301}";
        let v = json!({ "k": decomposed });
        let canonical = canonical_string(&v).unwrap();
        assert!(canonical.contains(decomposed));
    }

    #[test]
    fn test_hash_permutation_invariant() {
        let a = json!({"c": 3, "a": 1, "b": [1, {"y": 2, "x": 3}]});
        let b = json!({"a": 1, "b": [1, {"x": 3, "y": 2}], "c": 3});
        assert_eq!(canonical_hash(&a).unwrap(), canonical_hash(&b).unwrap());
    }

    #[test]
    fn test_is_canonical() {
        assert!(is_canonical(r#"{"a":1,"b":2}"#));
        assert!(!is_canonical(r#"{"b":2,"a":1}"#));
        assert!(!is_canonical(r#"{ "a": 1 }"#));
        assert!(!is_canonical("not json"));
    }

    #[test]
    fn test_roundtrip_stability() {
        let v = json!({"nested": {"b": 2, "a": 1}, "list": [1, 2, 3], "s": "text"});
        let once = canonical_string(&v).unwrap();
        let reparsed: Value = serde_json::from_str(&once).unwrap();
        let twice = canonical_string(&reparsed).unwrap();
        assert_eq!(once, twice);
        assert_eq!(
            canonical_hash(&v).unwrap(),
            canonical_hash(&reparsed).unwrap()
        );
    }
}
