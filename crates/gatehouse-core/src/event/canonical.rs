//! Canonical JSON serialization.
//!
//! Gate event hashing, snapshot output, and registry schema digests all
//! require the same logical value to produce the same byte sequence. The
//! canonical form is compact JSON with object keys sorted lexicographically
//! at every nesting level; arrays keep their element order.

use serde_json::Value;

/// Produce a canonical JSON string from a [`serde_json::Value`].
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use gatehouse_core::event::canonical::canonicalize_json;
///
/// let val = json!({"token": "rik010220261015", "extra": {"b": 2, "a": 1}});
/// assert_eq!(
///     canonicalize_json(&val),
///     r#"{"extra":{"a":1,"b":2},"token":"rik010220261015"}"#
/// );
/// ```
#[must_use]
pub fn canonicalize_json(value: &Value) -> String {
    let mut buf = String::new();
    append_canonical(value, &mut buf);
    buf
}

/// Produce canonical JSON from a JSON string.
///
/// # Errors
///
/// Returns `serde_json::Error` if the input string is not valid JSON.
pub fn canonicalize_json_str(json: &str) -> Result<String, serde_json::Error> {
    let value: Value = serde_json::from_str(json)?;
    Ok(canonicalize_json(&value))
}

fn append_canonical(value: &Value, buf: &mut String) {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(true) => buf.push_str("true"),
        Value::Bool(false) => buf.push_str("false"),
        Value::Number(n) => buf.push_str(&n.to_string()),
        Value::String(s) => append_escaped(s, buf),
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                append_canonical(item, buf);
            }
            buf.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            buf.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                append_escaped(key, buf);
                buf.push(':');
                if let Some(val) = map.get(key) {
                    append_canonical(val, buf);
                }
            }
            buf.push('}');
        }
    }
}

/// Append a JSON-escaped string literal. Delegates escaping to serde_json
/// for correctness.
fn append_escaped(s: &str, buf: &mut String) {
    buf.push_str(&serde_json::to_string(s).expect("string serialization cannot fail"));
}
