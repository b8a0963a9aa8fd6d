//! The materialized request handed over by the interception boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// An intercepted outbound HTTP request.
///
/// All fields are fully materialized before selection runs; the engine never
/// performs I/O.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRequestContext {
    /// HTTP method
    pub method: String,
    /// Full request URL (may be absolute or a bare path)
    pub url: String,
    /// Parsed request body, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Query parameters
    #[serde(default)]
    pub query: HashMap<String, String>,
}

impl HttpRequestContext {
    /// Create a context for `method url`, parsing any query string in the URL.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let query = url
            .split_once('?')
            .map(|(_, q)| parse_query_string(strip_fragment(q)))
            .unwrap_or_default();
        Self {
            method: method.into(),
            url,
            body: None,
            headers: HashMap::new(),
            query,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Headers with lower-cased names.
    pub fn normalized_headers(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect()
    }

    /// The URL without its query string or fragment.
    pub fn url_without_query(&self) -> &str {
        without_query(&self.url)
    }

    /// The path component of the URL.
    pub fn path(&self) -> &str {
        url_path(&self.url)
    }
}

fn strip_fragment(s: &str) -> &str {
    s.split_once('#').map_or(s, |(head, _)| head)
}

/// Strip query string and fragment from a URL.
pub(crate) fn without_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Extract the path from an absolute URL or a bare path.
pub(crate) fn url_path(url: &str) -> &str {
    let url = without_query(url);
    match url.find("://") {
        Some(scheme_end) => {
            let after_scheme = &url[scheme_end + 3..];
            match after_scheme.find('/') {
                Some(slash) => &after_scheme[slash..],
                None => "/",
            }
        }
        None => url,
    }
}

/// Parse a query string into key-value pairs.
pub(crate) fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        if let Some((key, value)) = part.split_once('=') {
            params.insert(urlencoding_decode(key), urlencoding_decode(value));
        } else {
            params.insert(urlencoding_decode(part), String::new());
        }
    }

    params
}

/// Percent-decoding with `+` as space. Invalid escapes are kept verbatim.
fn urlencoding_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_string() {
        let params = parse_query_string("foo=bar&baz=qux");
        assert_eq!(params.get("foo"), Some(&"bar".to_string()));
        assert_eq!(params.get("baz"), Some(&"qux".to_string()));

        let params = parse_query_string("name=John%20Doe&city=New+York&flag");
        assert_eq!(params.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(params.get("city"), Some(&"New York".to_string()));
        assert_eq!(params.get("flag"), Some(&String::new()));
    }

    #[test]
    fn test_decode_multibyte_and_invalid() {
        let params = parse_query_string("q=caf%C3%A9&bad=100%&worse=%zz");
        assert_eq!(params.get("q"), Some(&"café".to_string()));
        assert_eq!(params.get("bad"), Some(&"100%".to_string()));
        assert_eq!(params.get("worse"), Some(&"%zz".to_string()));
    }

    #[test]
    fn test_new_parses_query_from_url() {
        let ctx = HttpRequestContext::new("GET", "https://api.test/items?page=2&sort=asc#top");
        assert_eq!(ctx.query.get("page"), Some(&"2".to_string()));
        assert_eq!(ctx.query.get("sort"), Some(&"asc".to_string()));
        assert_eq!(ctx.path(), "/items");
        assert_eq!(ctx.url_without_query(), "https://api.test/items");
    }

    #[test]
    fn test_url_path() {
        assert_eq!(url_path("/api/users?x=1"), "/api/users");
        assert_eq!(url_path("http://localhost:3001"), "/");
        assert_eq!(url_path("http://localhost:3001/a/b"), "/a/b");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let ctx = HttpRequestContext::new("GET", "/").with_header("X-User-Tier", "gold");
        assert_eq!(ctx.header("x-user-tier"), Some("gold"));
        assert_eq!(
            ctx.normalized_headers().get("x-user-tier"),
            Some(&"gold".to_string())
        );
    }
}
