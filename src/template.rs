//! Template substitution for response bodies.
//!
//! String values may contain `{{state.key}}` or `{{params.id}}` tokens.
//! A string that is exactly one token is replaced by the resolved value with
//! its JSON type intact; tokens embedded in longer strings are spliced in as
//! text.

use crate::safe_path;
use crate::value_matcher::coerce_to_string;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Longest token path that will be resolved.
pub const MAX_TOKEN_PATH_LEN: usize = 256;

/// Containers nested deeper than this are returned unchanged.
const MAX_DEPTH: usize = 512;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").unwrap());
static PURE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\{\{([^{}]*)\}\}$").unwrap());

/// Data available to templates.
#[derive(Debug, Clone)]
pub struct TemplateData {
    /// Current per-test state
    pub state: Value,
    /// Path parameters extracted from the URL pattern
    pub params: Value,
}

impl TemplateData {
    pub fn new(state: Value, params: &HashMap<String, String>) -> Self {
        let params = params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<_, _>>();
        Self {
            state,
            params: Value::Object(params),
        }
    }

    fn root(&self, prefix: &str) -> Option<&Value> {
        match prefix {
            "state" => Some(&self.state),
            "params" => Some(&self.params),
            _ => None,
        }
    }
}

/// Outcome of resolving one token path.
enum Resolution<'a> {
    /// Path resolved to a value.
    Value(&'a Value),
    /// Known root, but the path did not resolve.
    Missing,
    /// Not a resolvable token; leave the text alone.
    Literal,
}

fn resolve<'a>(path: &str, data: &'a TemplateData) -> Resolution<'a> {
    let path = path.trim();
    if path.is_empty() || path.len() > MAX_TOKEN_PATH_LEN {
        return Resolution::Literal;
    }

    let mut segments = path.split('.');
    let Some(root) = segments.next().and_then(|prefix| data.root(prefix)) else {
        return Resolution::Literal;
    };

    match safe_path::walk(root, segments) {
        Some(value) => Resolution::Value(value),
        None => Resolution::Missing,
    }
}

/// Apply template substitution to a JSON value.
pub fn apply_templates(value: &Value, data: &TemplateData) -> Value {
    apply_at_depth(value, data, 0)
}

fn apply_at_depth(value: &Value, data: &TemplateData, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return value.clone();
    }

    match value {
        Value::String(s) => render_string(s, data),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| apply_at_depth(v, data, depth + 1))
                .collect(),
        ),
        Value::Object(obj) => {
            let mut rendered = Map::new();
            for (k, v) in obj {
                rendered.insert(k.clone(), apply_at_depth(v, data, depth + 1));
            }
            Value::Object(rendered)
        }
        _ => value.clone(),
    }
}

fn render_string(s: &str, data: &TemplateData) -> Value {
    if !s.contains("{{") {
        return Value::String(s.to_string());
    }

    if let Some(captures) = PURE_TOKEN.captures(s) {
        return match resolve(&captures[1], data) {
            Resolution::Value(value) => value.clone(),
            Resolution::Missing => Value::Null,
            Resolution::Literal => Value::String(s.to_string()),
        };
    }

    let rendered = TOKEN.replace_all(s, |caps: &Captures| match resolve(&caps[1], data) {
        Resolution::Value(value) => coerce_to_string(value),
        Resolution::Missing | Resolution::Literal => caps[0].to_string(),
    });
    Value::String(rendered.into_owned())
}
