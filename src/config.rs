//! Configuration and scenario definitions.
//!
//! Scenario files are YAML or JSON. Field names are camelCase so fixtures
//! can be shared with JavaScript test suites.

use crate::error::ConfigError;
use crate::url_pattern::UrlPattern;
use crate::value_matcher::MatchValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ScenaristConfig {
    /// Scenarios to register at startup
    #[serde(default)]
    pub scenarios: Vec<ScenarioDefinition>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl ScenaristConfig {
    /// Load configuration from a YAML or JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate every scenario and reject duplicate ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for scenario in &self.scenarios {
            if !seen.insert(scenario.id.as_str()) {
                return Err(ConfigError::DuplicateScenario(scenario.id.clone()));
            }
            scenario.validate()?;
        }
        Ok(())
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Scenario whose mocks apply to every test
    #[serde(default = "default_scenario_id")]
    pub default_scenario: String,

    /// Header carrying the test id
    #[serde(default = "default_test_id_header")]
    pub test_id_header: String,

    /// Test id used when the header is absent
    #[serde(default = "default_test_id")]
    pub default_test_id: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            default_scenario: default_scenario_id(),
            test_id_header: default_test_id_header(),
            default_test_id: default_test_id(),
        }
    }
}

fn default_scenario_id() -> String {
    "default".to_string()
}

fn default_test_id_header() -> String {
    "x-scenarist-test-id".to_string()
}

fn default_test_id() -> String {
    "default-test".to_string()
}

/// A named bundle of mocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDefinition {
    /// Unique identifier
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Mocks in declaration order
    #[serde(default)]
    pub mocks: Vec<MockDefinition>,
}

impl ScenarioDefinition {
    pub fn new(id: impl Into<String>, mocks: Vec<MockDefinition>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            mocks,
        }
    }

    /// Validate the scenario definition.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::InvalidScenario {
                scenario: self.id.clone(),
                reason: "scenario id cannot be empty".to_string(),
            });
        }
        for (index, mock) in self.mocks.iter().enumerate() {
            mock.validate().map_err(|reason| ConfigError::InvalidScenario {
                scenario: self.id.clone(),
                reason: format!("mock {}: {}", index, reason),
            })?;
        }
        Ok(())
    }
}

/// One mock rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawMockDefinition", into = "RawMockDefinition")]
pub struct MockDefinition {
    /// HTTP method (case-insensitive)
    pub method: String,

    /// URL pattern
    pub url: UrlPattern,

    /// Match criteria; `None` makes this a fallback mock
    pub criteria: Option<MatchCriteria>,

    /// How the response is produced. `None` only for malformed mocks.
    pub source: Option<ResponseSource>,

    /// State key -> request path (`body.x`, `headers.y`, `query.z`)
    pub capture_state: BTreeMap<String, String>,

    /// State merged after the response has been produced
    pub after_response: Option<AfterResponse>,
}

impl MockDefinition {
    /// Create a fallback mock with a static response.
    pub fn new(method: &str, url: UrlPattern, response: ResponseDefinition) -> Self {
        Self {
            method: method.to_string(),
            url,
            criteria: None,
            source: Some(ResponseSource::Static(response)),
            capture_state: BTreeMap::new(),
            after_response: None,
        }
    }

    pub fn with_criteria(mut self, criteria: MatchCriteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_capture(mut self, key: &str, path: &str) -> Self {
        self.capture_state.insert(key.to_string(), path.to_string());
        self
    }

    pub fn with_after_response(mut self, set_state: Map<String, Value>) -> Self {
        self.after_response = Some(AfterResponse { set_state });
        self
    }

    /// True if the mock has no match criteria.
    pub fn is_fallback(&self) -> bool {
        self.criteria.is_none()
    }

    /// True if the mock produces responses from a sequence or from state.
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self.source,
            Some(ResponseSource::Sequence(_)) | Some(ResponseSource::StateConditional(_))
        )
    }

    /// Validate the mock definition.
    pub fn validate(&self) -> Result<(), String> {
        match &self.source {
            None => Err("mock must define one of response, sequence, stateResponse".to_string()),
            Some(ResponseSource::Static(response)) => response.validate(),
            Some(ResponseSource::Sequence(sequence)) => {
                if sequence.responses.is_empty() {
                    return Err("sequence must contain at least one response".to_string());
                }
                sequence.responses.iter().try_for_each(|r| r.validate())
            }
            Some(ResponseSource::StateConditional(state)) => {
                state.default.validate()?;
                state.conditions.iter().try_for_each(|c| c.then.validate())
            }
        }
    }
}

/// The closed set of response-producing shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseSource {
    /// Always the same response
    Static(ResponseDefinition),
    /// Ordered responses consumed one per call
    Sequence(SequenceDefinition),
    /// Default response with state-guarded overrides
    StateConditional(StateResponseDefinition),
}

/// Wire shape of a mock, with the response source as optional fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawMockDefinition {
    #[serde(default = "default_method")]
    method: String,
    url: UrlPattern,
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    criteria: Option<MatchCriteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<ResponseDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sequence: Option<SequenceDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state_response: Option<StateResponseDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    capture_state: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    after_response: Option<AfterResponse>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl TryFrom<RawMockDefinition> for MockDefinition {
    type Error = String;

    fn try_from(raw: RawMockDefinition) -> Result<Self, Self::Error> {
        let mut sources = Vec::new();
        if let Some(response) = raw.response {
            sources.push(ResponseSource::Static(response));
        }
        if let Some(sequence) = raw.sequence {
            sources.push(ResponseSource::Sequence(sequence));
        }
        if let Some(state) = raw.state_response {
            sources.push(ResponseSource::StateConditional(state));
        }
        if sources.len() > 1 {
            return Err(
                "mock must define only one of response, sequence, stateResponse".to_string(),
            );
        }

        Ok(Self {
            method: raw.method,
            url: raw.url,
            criteria: raw.criteria,
            source: sources.pop(),
            capture_state: raw.capture_state,
            after_response: raw.after_response,
        })
    }
}

impl From<MockDefinition> for RawMockDefinition {
    fn from(mock: MockDefinition) -> Self {
        let (mut response, mut sequence, mut state_response) = (None, None, None);
        match mock.source {
            Some(ResponseSource::Static(r)) => response = Some(r),
            Some(ResponseSource::Sequence(s)) => sequence = Some(s),
            Some(ResponseSource::StateConditional(s)) => state_response = Some(s),
            None => {}
        }
        Self {
            method: mock.method,
            url: mock.url,
            criteria: mock.criteria,
            response,
            sequence,
            state_response,
            capture_state: mock.capture_state,
            after_response: mock.after_response,
        }
    }
}

/// Request criteria. Every present category must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchCriteria {
    /// Predicate over the full request URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<MatchValue>,

    /// Body field (dotted path) -> predicate
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub body: HashMap<String, MatchValue>,

    /// Header name (case-insensitive) -> predicate
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, MatchValue>,

    /// Query parameter -> predicate
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub query: HashMap<String, MatchValue>,

    /// State key -> expected value (deep equality)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state: Map<String, Value>,
}

impl MatchCriteria {
    pub fn body(mut self, field: &str, value: impl Into<MatchValue>) -> Self {
        self.body.insert(field.to_string(), value.into());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<MatchValue>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn query(mut self, name: &str, value: impl Into<MatchValue>) -> Self {
        self.query.insert(name.to_string(), value.into());
        self
    }

    pub fn state(mut self, key: &str, value: Value) -> Self {
        self.state.insert(key.to_string(), value);
        self
    }

    pub fn url(mut self, value: impl Into<MatchValue>) -> Self {
        self.url = Some(value.into());
        self
    }
}

/// Response definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response body (JSON); may contain template tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Response headers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Fixed delay in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

fn default_status() -> u16 {
    200
}

impl ResponseDefinition {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            body: None,
            headers: HashMap::new(),
            delay: None,
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(status)
        }
    }

    /// Validate the response definition.
    pub fn validate(&self) -> Result<(), String> {
        if !(100..=599).contains(&self.status) {
            return Err(format!("invalid status code: {}", self.status));
        }
        Ok(())
    }
}

/// How a sequence behaves once its last response has been served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Keep serving the last response
    #[default]
    Last,
    /// Wrap around to the first response
    Cycle,
    /// Stop matching; a later mock must take over
    None,
}

/// Ordered responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceDefinition {
    pub responses: Vec<ResponseDefinition>,

    #[serde(default)]
    pub repeat: RepeatMode,
}

/// Default response plus ordered state-guarded conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateResponseDefinition {
    pub default: ResponseDefinition,

    #[serde(default)]
    pub conditions: Vec<StateCondition>,
}

/// One guarded response: `then` wins when every `when` entry equals state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateCondition {
    pub when: Map<String, Value>,
    pub then: ResponseDefinition,
}

/// Mutations applied after a response is chosen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AfterResponse {
    /// Merged into state after the response is rendered. Keys are state
    /// paths like `captureState` keys: `a.b` writes a nested field and a
    /// trailing `[]` appends to an array.
    #[serde(default)]
    pub set_state: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_scenario() {
        let yaml = r#"
scenarios:
  - id: default
    name: Happy path
    mocks:
      - method: GET
        url: /api/products
        response:
          status: 200
          body:
            products: []
"#;
        let config = ScenaristConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.scenarios.len(), 1);
        let mock = &config.scenarios[0].mocks[0];
        assert!(mock.is_fallback());
        assert!(!mock.is_dynamic());
        match &mock.source {
            Some(ResponseSource::Static(r)) => assert_eq!(r.body, Some(json!({"products": []}))),
            other => panic!("Expected static response, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_sequence_and_state_response() {
        let yaml = r#"
scenarios:
  - id: checkout
    mocks:
      - method: GET
        url: /api/job/:id
        sequence:
          repeat: cycle
          responses:
            - body: { status: pending }
            - body: { status: complete }
      - method: GET
        url: /api/quote
        stateResponse:
          default:
            body: { state: appStarted }
          conditions:
            - when: { phase: quoteAccept }
              then:
                body: { state: quoteAccept }
        captureState:
          lastQuote: query.id
        afterResponse:
          setState:
            phase: quoted
"#;
        let config = ScenaristConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        let mocks = &config.scenarios[0].mocks;

        match &mocks[0].source {
            Some(ResponseSource::Sequence(seq)) => {
                assert_eq!(seq.repeat, RepeatMode::Cycle);
                assert_eq!(seq.responses.len(), 2);
                assert_eq!(seq.responses[0].status, 200);
            }
            other => panic!("Expected sequence, got {:?}", other),
        }

        assert!(mocks[1].is_dynamic());
        assert_eq!(mocks[1].capture_state.get("lastQuote").map(String::as_str), Some("query.id"));
        assert_eq!(
            mocks[1].after_response.as_ref().unwrap().set_state.get("phase"),
            Some(&json!("quoted"))
        );
    }

    #[test]
    fn test_parse_match_criteria() {
        let yaml = r#"
scenarios:
  - id: premium
    mocks:
      - method: POST
        url: /api/checkout
        match:
          body:
            itemType: premium
            amount: { regex: { source: "^[0-9]+$" } }
          headers:
            X-User-Tier: { startsWith: gold }
          query:
            page: 1
          state:
            cart: { open: true }
        response:
          status: 201
"#;
        let config = ScenaristConfig::from_yaml(yaml).unwrap();
        let criteria = config.scenarios[0].mocks[0].criteria.as_ref().unwrap();
        assert_eq!(criteria.body.len(), 2);
        assert_eq!(criteria.body["itemType"], MatchValue::exact("premium"));
        assert_eq!(criteria.query["page"], MatchValue::exact("1"));
        assert_eq!(criteria.state["cart"], json!({"open": true}));
    }

    #[test]
    fn test_multiple_sources_rejected() {
        let yaml = r#"
scenarios:
  - id: broken
    mocks:
      - url: /x
        response: { status: 200 }
        sequence:
          responses: [{ status: 200 }]
"#;
        assert!(ScenaristConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_missing_source_fails_validation() {
        let yaml = r#"
scenarios:
  - id: broken
    mocks:
      - url: /x
"#;
        let config = ScenaristConfig::from_yaml(yaml).unwrap();
        assert!(config.scenarios[0].mocks[0].source.is_none());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidScenario { .. })
        ));
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let empty_sequence = r#"
scenarios:
  - id: s
    mocks:
      - url: /x
        sequence: { responses: [] }
"#;
        let config = ScenaristConfig::from_yaml(empty_sequence).unwrap();
        assert!(config.validate().is_err());

        let bad_status = r#"
scenarios:
  - id: s
    mocks:
      - url: /x
        response: { status: 42 }
"#;
        let config = ScenaristConfig::from_yaml(bad_status).unwrap();
        assert!(config.validate().is_err());

        let bad_strategy = r#"
scenarios:
  - id: s
    mocks:
      - url: /x
        match:
          body: { a: { equals: 1, contains: 2 } }
        response: { status: 200 }
"#;
        let err = ScenaristConfig::from_yaml(bad_strategy).unwrap_err();
        assert!(err
            .to_string()
            .contains("match object must define exactly one strategy, found: equals, contains"));
    }

    #[test]
    fn test_strategy_object_without_known_key_rejected() {
        for body in ["{}", "{ unknown: x }"] {
            let yaml = format!(
                r#"
scenarios:
  - id: s
    mocks:
      - url: /x
        match:
          body: {{ a: {body} }}
        response: {{ status: 200 }}
"#
            );
            let err = ScenaristConfig::from_yaml(&yaml).unwrap_err();
            assert!(err.to_string().contains(
                "match object must define one of: equals, contains, startsWith, endsWith, regex"
            ));
        }
    }

    #[test]
    fn test_duplicate_scenario_ids() {
        let config = ScenaristConfig {
            scenarios: vec![
                ScenarioDefinition::new("a", vec![]),
                ScenarioDefinition::new("a", vec![]),
            ],
            settings: GlobalSettings::default(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateScenario(id)) if id == "a"
        ));
    }

    #[test]
    fn test_default_settings() {
        let config = ScenaristConfig::from_yaml("settings: { defaultScenario: baseline }").unwrap();
        assert_eq!(config.settings.default_scenario, "baseline");
        assert_eq!(config.settings.test_id_header, "x-scenarist-test-id");
        assert_eq!(config.settings.default_test_id, "default-test");
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenarios.json");
        std::fs::write(
            &path,
            r#"{"scenarios":[{"id":"default","mocks":[{"method":"GET","url":"/a","response":{"status":204}}]}]}"#,
        )
        .unwrap();
        let config = ScenaristConfig::from_file(&path).unwrap();
        assert_eq!(config.scenarios[0].mocks[0].method, "GET");
    }

    #[test]
    fn test_missing_file() {
        let err = ScenaristConfig::from_file(Path::new("/nonexistent/scenarios.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }

    #[test]
    fn test_mock_serializes_back_to_wire_shape() {
        let mock = MockDefinition::new(
            "GET",
            UrlPattern::parse("/a").unwrap(),
            ResponseDefinition::new(204),
        );
        let value = serde_json::to_value(&mock).unwrap();
        assert_eq!(value["response"]["status"], json!(204));
        assert!(value.get("sequence").is_none());
    }
}
