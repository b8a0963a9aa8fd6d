//! URL patterns on mock definitions.

use crate::request::{url_path, without_query};
use crate::value_matcher::RegexPattern;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;

/// A compiled mock URL pattern.
///
/// Written as a string (`/api/users`, `/api/users/:id`, `/api/*`,
/// `https://api.test/v1/*`) or a regex object (`{ regex: "^/v\\d+/" }`).
/// Relative string patterns are compared against the request path; absolute
/// ones against the URL without its query string. Regexes are tested against
/// the full URL and their named groups become path params.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct UrlPattern {
    raw: String,
    compiled: CompiledUrlPattern,
}

#[derive(Clone)]
enum CompiledUrlPattern {
    Exact(String),
    Template(PathTemplate),
    Glob(globset::GlobMatcher),
    Regex(RegexPattern),
}

#[derive(Debug, Clone)]
struct PathTemplate {
    segments: Vec<TemplateSegment>,
}

#[derive(Debug, Clone)]
enum TemplateSegment {
    Literal(String),
    Param(String),
}

impl PathTemplate {
    fn parse(template: &str) -> Self {
        let segments = template
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => TemplateSegment::Param(name.to_string()),
                _ => TemplateSegment::Literal(segment.to_string()),
            })
            .collect();
        Self { segments }
    }

    fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path = trim_trailing_slash(path);
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                TemplateSegment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                TemplateSegment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

fn is_absolute(pattern: &str) -> bool {
    pattern.starts_with("http://") || pattern.starts_with("https://")
}

impl UrlPattern {
    /// Parse a string pattern.
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let path_part = url_path(pattern);
        let compiled = if pattern.contains('*') {
            let glob = globset::Glob::new(pattern)
                .map_err(|e| format!("invalid glob '{}': {}", pattern, e))?;
            CompiledUrlPattern::Glob(glob.compile_matcher())
        } else if path_part.split('/').any(|s| s.starts_with(':') && s.len() > 1) {
            CompiledUrlPattern::Template(PathTemplate::parse(trim_trailing_slash(pattern)))
        } else {
            CompiledUrlPattern::Exact(trim_trailing_slash(pattern).to_string())
        };
        Ok(Self {
            raw: pattern.to_string(),
            compiled,
        })
    }

    /// Build a regex pattern.
    pub fn regex(source: &str, flags: &str) -> Result<Self, String> {
        Ok(Self {
            raw: source.to_string(),
            compiled: CompiledUrlPattern::Regex(RegexPattern::new(source, flags)?),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request URL, returning extracted path params on success.
    pub fn matches(&self, url: &str) -> Option<HashMap<String, String>> {
        let target = if is_absolute(&self.raw) {
            without_query(url)
        } else {
            url_path(url)
        };

        match &self.compiled {
            CompiledUrlPattern::Exact(value) => {
                (trim_trailing_slash(target) == value).then(HashMap::new)
            }
            CompiledUrlPattern::Template(template) => template.matches(target),
            CompiledUrlPattern::Glob(glob) => glob.is_match(target).then(HashMap::new),
            CompiledUrlPattern::Regex(pattern) => {
                let captures = pattern.regex().captures(url)?;
                let mut params = HashMap::new();
                for name in pattern.regex().capture_names().flatten() {
                    if let Some(m) = captures.name(name) {
                        params.insert(name.to_string(), m.as_str().to_string());
                    }
                }
                Some(params)
            }
        }
    }
}

impl TryFrom<Value> for UrlPattern {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Self::parse(&s),
            Value::Object(map) => {
                let source = map
                    .get("regex")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "url object requires a string 'regex'".to_string())?;
                let flags = map.get("flags").and_then(Value::as_str).unwrap_or("");
                Self::regex(source, flags)
            }
            _ => Err("url must be a string or { regex, flags }".to_string()),
        }
    }
}

impl From<UrlPattern> for Value {
    fn from(pattern: UrlPattern) -> Self {
        match &pattern.compiled {
            CompiledUrlPattern::Regex(regex) if regex.flags().is_empty() => {
                json!({ "regex": regex.source() })
            }
            CompiledUrlPattern::Regex(regex) => {
                json!({ "regex": regex.source(), "flags": regex.flags() })
            }
            _ => Value::String(pattern.raw),
        }
    }
}

impl fmt::Debug for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.compiled {
            CompiledUrlPattern::Regex(regex) => write!(f, "UrlPattern({:?})", regex),
            _ => write!(f, "UrlPattern({:?})", self.raw),
        }
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        Value::from(self.clone()) == Value::from(other.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_path_matching() {
        let pattern = UrlPattern::parse("/api/users").unwrap();
        assert!(pattern.matches("/api/users").is_some());
        assert!(pattern.matches("/api/users/").is_some());
        assert!(pattern.matches("http://localhost:3001/api/users?page=1").is_some());
        assert!(pattern.matches("/api/posts").is_none());
    }

    #[test]
    fn test_absolute_pattern() {
        let pattern = UrlPattern::parse("https://api.stripe.com/v1/charges").unwrap();
        assert!(pattern.matches("https://api.stripe.com/v1/charges?x=1").is_some());
        assert!(pattern.matches("https://api.other.com/v1/charges").is_none());
        assert!(pattern.matches("/v1/charges").is_none());
    }

    #[test]
    fn test_template_path_matching() {
        let pattern = UrlPattern::parse("/users/:id/orders/:orderId").unwrap();
        let params = pattern.matches("http://api.test/users/42/orders/7").unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));
        assert_eq!(params.get("orderId"), Some(&"7".to_string()));

        assert!(pattern.matches("/users/42/orders").is_none());
        assert!(pattern.matches("/users//orders/7").is_none());
    }

    #[test]
    fn test_absolute_template_with_port() {
        let pattern = UrlPattern::parse("http://localhost:3001/items/:id").unwrap();
        let params = pattern.matches("http://localhost:3001/items/9").unwrap();
        assert_eq!(params.get("id"), Some(&"9".to_string()));

        let exact = UrlPattern::parse("http://localhost:3001/items").unwrap();
        assert!(exact.matches("http://localhost:3001/items").is_some());
    }

    #[test]
    fn test_glob_matching() {
        let pattern = UrlPattern::parse("/api/*").unwrap();
        assert!(pattern.matches("/api/users").is_some());
        assert!(pattern.matches("/api/users/1").is_some());
        assert!(pattern.matches("/other").is_none());
    }

    #[test]
    fn test_regex_matching() {
        let pattern: UrlPattern =
            serde_json::from_value(json!({"regex": "/users/(?P<id>[0-9]+)$"})).unwrap();
        let params = pattern.matches("https://api.test/users/55").unwrap();
        assert_eq!(params.get("id"), Some(&"55".to_string()));
        assert!(pattern.matches("https://api.test/users/abc").is_none());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(UrlPattern::try_from(json!({"regex": "("})).is_err());
        assert!(UrlPattern::try_from(json!(42)).is_err());
        assert!(UrlPattern::parse("/a/[*").is_err());
    }
}
