//! Reads values out of a request by dotted path (`body.user.id`,
//! `headers.x-user-id`, `query.page`).

use crate::request::HttpRequestContext;
use crate::safe_path;
use serde_json::Value;

/// Extract the value at `path` from the request.
///
/// The first segment selects the source (`body`, `headers` or `query`).
/// Header names are matched case-insensitively. Returns `None` for unknown
/// sources, missing keys, traversal through null or primitives, and any path
/// containing a denylisted segment.
pub fn extract(context: &HttpRequestContext, path: &str) -> Option<Value> {
    if safe_path::has_dangerous_segment(path) {
        return None;
    }

    let mut segments = path.split('.');
    let source = segments.next()?;

    match source {
        "body" => {
            let body = context.body.as_ref()?;
            safe_path::walk(body, segments).cloned()
        }
        "headers" => {
            let name = segments.next()?;
            let value = context.header(name)?;
            leaf(Value::String(value.to_string()), segments)
        }
        "query" => {
            let name = segments.next()?;
            let value = context.query.get(name)?;
            leaf(Value::String(value.clone()), segments)
        }
        _ => None,
    }
}

/// Headers and query values are flat strings; any further segment misses.
fn leaf<'a>(value: Value, mut rest: impl Iterator<Item = &'a str>) -> Option<Value> {
    match rest.next() {
        None => Some(value),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> HttpRequestContext {
        HttpRequestContext::new("POST", "/api/cart?step=2")
            .with_header("X-Tenant", "acme")
            .with_body(json!({
                "user": {"id": 7, "tags": ["a", "b"], "nothing": null},
                "items": [{"sku": "X1"}]
            }))
    }

    #[test]
    fn test_extract_body_paths() {
        let ctx = request();
        assert_eq!(extract(&ctx, "body.user.id"), Some(json!(7)));
        assert_eq!(extract(&ctx, "body.items.0.sku"), Some(json!("X1")));
        assert_eq!(extract(&ctx, "body.user"), Some(json!({"id": 7, "tags": ["a", "b"], "nothing": null})));
        assert_eq!(extract(&ctx, "body.user.missing"), None);
        assert_eq!(extract(&ctx, "body.user.nothing.deeper"), None);
        assert_eq!(extract(&ctx, "body.user.id.deeper"), None);
    }

    #[test]
    fn test_extract_headers_and_query() {
        let ctx = request();
        assert_eq!(extract(&ctx, "headers.x-tenant"), Some(json!("acme")));
        assert_eq!(extract(&ctx, "headers.X-TENANT"), Some(json!("acme")));
        assert_eq!(extract(&ctx, "query.step"), Some(json!("2")));
        assert_eq!(extract(&ctx, "query.step.more"), None);
        assert_eq!(extract(&ctx, "cookies.session"), None);
    }

    #[test]
    fn test_missing_body() {
        let ctx = HttpRequestContext::new("GET", "/");
        assert_eq!(extract(&ctx, "body.anything"), None);
    }

    #[test]
    fn test_dangerous_segments_blocked() {
        let ctx = HttpRequestContext::new("POST", "/")
            .with_body(json!({"a": {"constructor": {"prototype": 1}, "__proto__": 2}}));
        assert_eq!(extract(&ctx, "body.a.constructor"), None);
        assert_eq!(extract(&ctx, "body.a.constructor.prototype"), None);
        assert_eq!(extract(&ctx, "body.a.__proto__"), None);
        assert_eq!(extract(&ctx, "body.__proto__.a"), None);
        assert_eq!(extract(&ctx, "__proto__.body"), None);
    }

    #[test]
    fn test_inherited_members_unreachable() {
        let ctx = request();
        assert_eq!(extract(&ctx, "body.toString"), None);
        assert_eq!(extract(&ctx, "body.hasOwnProperty"), None);
        assert_eq!(extract(&ctx, "body.items.length"), None);
    }
}
