//! Canonical JSON rendering
//!
//! Produces one stable string per JSON value regardless of the order in
//! which object keys were inserted, so two argument maps that mean the same
//! thing compare equal as strings. Used as a deduplication key.
//!
//! `Value::to_string` only sorts keys while serde_json's `preserve_order`
//! feature is off, and any crate in the build graph can switch that feature
//! on. Sorting here keeps the key independent of feature unification.

use serde_json::Value;

/// Render `value` as compact JSON with object keys sorted recursively.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use vkrelay_common::canonical_json;
///
/// let a = json!({"b": 1, "a": [true, {"y": null, "x": "s"}]});
/// let b = json!({"a": [true, {"x": "s", "y": null}], "b": 1});
/// assert_eq!(canonical_json(&a), canonical_json(&b));
/// assert_eq!(canonical_json(&a), r#"{"a":[true,{"x":"s","y":null}],"b":1}"#);
/// ```
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                // Strings serialize infallibly; Value's Display does the escaping
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_scalars_render_as_json() {
        assert_eq!(canonical_json(&json!(null)), "null");
        assert_eq!(canonical_json(&json!(42)), "42");
        assert_eq!(canonical_json(&json!("a\"b")), r#""a\"b""#);
    }

    #[test]
    fn test_array_order_is_preserved() {
        assert_ne!(canonical_json(&json!([1, 2])), canonical_json(&json!([2, 1])));
    }

    #[test]
    fn test_insertion_order_does_not_leak() {
        let mut forward = serde_json::Map::new();
        forward.insert("z".into(), json!(1));
        forward.insert("a".into(), json!({"n": 2, "m": 3}));
        let mut backward = serde_json::Map::new();
        backward.insert("a".into(), json!({"m": 3, "n": 2}));
        backward.insert("z".into(), json!(1));

        let expected = r#"{"a":{"m":3,"n":2},"z":1}"#;
        assert_eq!(canonical_json(&Value::Object(forward)), expected);
        assert_eq!(canonical_json(&Value::Object(backward)), expected);
    }

    #[test]
    fn test_keys_are_escaped() {
        assert_eq!(canonical_json(&json!({"q\"k": 1})), r#"{"q\"k":1}"#);
    }
}
