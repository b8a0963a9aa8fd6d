//! Match values: the predicates a mock applies to one request field.
//!
//! A match value is written in scenario files as either
//!
//! - a scalar (`"premium"`, `42`, `true`, `null`) compared for exact equality
//!   against the stringified request value,
//! - a regular expression object (`{ source: "^v\\d+$", flags: "i" }`),
//! - or a strategy object with exactly one of `equals`, `contains`,
//!   `startsWith`, `endsWith`, `regex`.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Upper bound on compiled regex program size.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

const STRATEGY_KEYS: [&str; 5] = ["equals", "contains", "startsWith", "endsWith", "regex"];

/// Coerce a JSON value to the string form used for comparisons.
///
/// Strings are taken verbatim, null becomes the empty string, integral
/// floats drop their fractional part, and containers serialize as compact
/// JSON.
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        return format!("{}", f as i64);
                    }
                }
            }
            n.to_string()
        }
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// A compiled regular expression together with its source and flags.
#[derive(Clone)]
pub struct RegexPattern {
    source: String,
    flags: String,
    regex: Regex,
}

impl RegexPattern {
    /// Compile a pattern.
    ///
    /// Supported flags: `i` (case-insensitive), `m` (multi-line), `s` (dot
    /// matches newline). `g`, `u`, `y` and `d` are accepted and have no
    /// effect on a single test.
    pub fn new(source: &str, flags: &str) -> Result<Self, String> {
        let mut builder = RegexBuilder::new(source);
        builder.size_limit(REGEX_SIZE_LIMIT);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'g' | 'u' | 'y' | 'd' => {}
                other => return Err(format!("unsupported regex flag '{}'", other)),
            }
        }
        let regex = builder
            .build()
            .map_err(|e| format!("invalid regex '{}': {}", source, e))?;
        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// Parse either a bare source string or a `{ source, flags }` object.
    fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(source) => Self::new(source, ""),
            Value::Object(map) => {
                let source = map
                    .get("source")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "regex object requires a string 'source'".to_string())?;
                let flags = map.get("flags").and_then(Value::as_str).unwrap_or("");
                Self::new(source, flags)
            }
            _ => Err("regex must be a string or { source, flags }".to_string()),
        }
    }

    fn to_json(&self) -> Value {
        if self.flags.is_empty() {
            json!({ "source": self.source })
        } else {
            json!({ "source": self.source, "flags": self.flags })
        }
    }
}

impl fmt::Debug for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

/// One comparison strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchStrategy {
    Equals(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Regex(RegexPattern),
}

/// A predicate over one extracted request value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum MatchValue {
    /// Exact string equality (scalars are stringified at load time).
    Exact(String),
    /// Regular expression test.
    Pattern(RegexPattern),
    /// Strategy object.
    Strategy(MatchStrategy),
}

impl MatchValue {
    pub fn exact(value: impl Into<String>) -> Self {
        MatchValue::Exact(value.into())
    }

    pub fn regex(source: &str, flags: &str) -> Result<Self, String> {
        RegexPattern::new(source, flags).map(MatchValue::Pattern)
    }

    /// Test the predicate against a request value.
    pub fn matches(&self, request_value: &str) -> bool {
        match self {
            MatchValue::Exact(expected) => request_value == expected,
            MatchValue::Pattern(pattern) => pattern.is_match(request_value),
            MatchValue::Strategy(strategy) => match strategy {
                MatchStrategy::Equals(expected) => request_value == expected,
                MatchStrategy::Contains(needle) => request_value.contains(needle.as_str()),
                MatchStrategy::StartsWith(prefix) => request_value.starts_with(prefix.as_str()),
                MatchStrategy::EndsWith(suffix) => request_value.ends_with(suffix.as_str()),
                MatchStrategy::Regex(pattern) => pattern.is_match(request_value),
            },
        }
    }

    fn strategy_from_object(map: &Map<String, Value>) -> Result<Self, String> {
        let present: Vec<&str> = STRATEGY_KEYS
            .iter()
            .copied()
            .filter(|key| map.contains_key(*key))
            .collect();

        match present.as_slice() {
            [] => {
                if map.contains_key("source") {
                    return RegexPattern::from_json(&Value::Object(map.clone()))
                        .map(MatchValue::Pattern);
                }
                Err(format!(
                    "match object must define one of: {}",
                    STRATEGY_KEYS.join(", ")
                ))
            }
            [key] => {
                let value = &map[*key];
                let strategy = match *key {
                    "equals" => MatchStrategy::Equals(coerce_to_string(value)),
                    "contains" => MatchStrategy::Contains(coerce_to_string(value)),
                    "startsWith" => MatchStrategy::StartsWith(coerce_to_string(value)),
                    "endsWith" => MatchStrategy::EndsWith(coerce_to_string(value)),
                    _ => MatchStrategy::Regex(RegexPattern::from_json(value)?),
                };
                Ok(MatchValue::Strategy(strategy))
            }
            many => Err(format!(
                "match object must define exactly one strategy, found: {}",
                many.join(", ")
            )),
        }
    }
}

impl TryFrom<Value> for MatchValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::Object(map) => Self::strategy_from_object(map),
            Value::Array(_) => Err("match value cannot be an array".to_string()),
            scalar => Ok(MatchValue::Exact(coerce_to_string(scalar))),
        }
    }
}

impl From<MatchValue> for Value {
    fn from(value: MatchValue) -> Self {
        match value {
            MatchValue::Exact(s) => Value::String(s),
            MatchValue::Pattern(pattern) => pattern.to_json(),
            MatchValue::Strategy(strategy) => match strategy {
                MatchStrategy::Equals(s) => json!({ "equals": s }),
                MatchStrategy::Contains(s) => json!({ "contains": s }),
                MatchStrategy::StartsWith(s) => json!({ "startsWith": s }),
                MatchStrategy::EndsWith(s) => json!({ "endsWith": s }),
                MatchStrategy::Regex(pattern) => json!({ "regex": pattern.to_json() }),
            },
        }
    }
}

impl From<&str> for MatchValue {
    fn from(value: &str) -> Self {
        MatchValue::Exact(value.to_string())
    }
}
