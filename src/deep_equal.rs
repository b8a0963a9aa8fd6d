//! Structural equality for JSON values.
//!
//! Numbers compare by numeric value, so `1` and `1.0` are equal the way they
//! are once a document has been through any JSON round trip.

use serde_json::Value;

/// Structural equality used by state matching and state-conditional responses.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| deep_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, l)| y.get(key).is_some_and(|r| deep_equal(l, r)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primitives() {
        assert!(deep_equal(&json!(null), &json!(null)));
        assert!(deep_equal(&json!("a"), &json!("a")));
        assert!(deep_equal(&json!(1), &json!(1.0)));
        assert!(!deep_equal(&json!(null), &json!(0)));
        assert!(!deep_equal(&json!(null), &json!({})));
        assert!(!deep_equal(&json!("1"), &json!(1)));
        assert!(!deep_equal(&json!(false), &json!(0)));
    }

    #[test]
    fn test_arrays() {
        assert!(deep_equal(&json!([1, [2, 3]]), &json!([1, [2, 3]])));
        assert!(!deep_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!deep_equal(&json!([1]), &json!([1, 1])));
        assert!(!deep_equal(&json!([]), &json!({})));
    }

    #[test]
    fn test_objects() {
        assert!(deep_equal(
            &json!({"a": 1, "b": {"c": [true]}}),
            &json!({"b": {"c": [true]}, "a": 1})
        ));
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!deep_equal(&json!({"a": 1}), &json!({"b": 1})));
        assert!(!deep_equal(&json!({"a": null}), &json!({})));
    }
}
