//! Safe property access over untrusted JSON values.
//!
//! Every component that walks a caller-supplied path (request extraction,
//! template resolution, state writes) goes through these helpers so the
//! segment denylist lives in exactly one place.

use serde_json::Value;

/// Path segments that are never traversed or written.
pub const DANGEROUS_SEGMENTS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Returns true if the segment is on the denylist.
pub fn is_dangerous(segment: &str) -> bool {
    DANGEROUS_SEGMENTS.contains(&segment)
}

/// Returns true if any segment of a dotted path is on the denylist.
pub fn has_dangerous_segment(path: &str) -> bool {
    path.split('.').any(is_dangerous)
}

/// Read one own member of a value.
///
/// Objects are indexed by key, arrays by decimal index. Anything else
/// (null, primitives, unknown keys, denylisted segments) yields `None`.
pub fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    if is_dangerous(segment) {
        return None;
    }
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Walk a sequence of segments from `root`, aborting on the first miss.
pub fn walk<'a, 'b, I>(root: &'a Value, segments: I) -> Option<&'a Value>
where
    I: IntoIterator<Item = &'b str>,
{
    let mut current = root;
    for segment in segments {
        current = child(current, segment)?;
    }
    Some(current)
}

/// Walk a dotted path from `root`.
pub fn walk_dotted<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    walk(root, path.split('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_walk_objects_and_arrays() {
        let value = json!({"user": {"tags": ["a", "b"], "name": "Ada"}});
        assert_eq!(walk_dotted(&value, "user.name"), Some(&json!("Ada")));
        assert_eq!(walk_dotted(&value, "user.tags.1"), Some(&json!("b")));
        assert_eq!(walk_dotted(&value, "user.tags.9"), None);
        assert_eq!(walk_dotted(&value, "user.name.length"), None);
    }

    #[test]
    fn test_denylist_at_any_depth() {
        let value = json!({"a": {"__proto__": {"x": 1}, "constructor": 2, "prototype": 3}});
        assert_eq!(walk_dotted(&value, "a.__proto__.x"), None);
        assert_eq!(walk_dotted(&value, "a.constructor"), None);
        assert_eq!(walk_dotted(&value, "a.prototype"), None);
        assert!(has_dangerous_segment("a.b.constructor"));
        assert!(!has_dangerous_segment("a.b.constructors"));
    }

    #[test]
    fn test_null_and_primitive_intermediates() {
        let value = json!({"a": null, "b": 3});
        assert_eq!(walk_dotted(&value, "a.x"), None);
        assert_eq!(walk_dotted(&value, "b.x"), None);
    }
}
