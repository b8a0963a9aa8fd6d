//! Candidate evaluation and specificity scoring.
//!
//! Decides whether a mock applies to a request and how specific it is:
//!
//! - criteria match: `100 + one point per matched field`
//! - dynamic fallback (sequence or stateResponse, no criteria): `1`
//! - static fallback: `0`
//!
//! Exhausted `repeat: none` sequences are not candidates at all.

use crate::config::{MatchCriteria, MockDefinition, ResponseSource, ScenarioDefinition};
use crate::deep_equal::deep_equal;
use crate::request::HttpRequestContext;
use crate::safe_path;
use crate::sequence::SequenceTracker;
use crate::state::StateStore;
use crate::value_matcher::coerce_to_string;
use std::collections::HashMap;
use std::sync::Arc;

/// Base score for any mock whose criteria matched.
pub const CRITERIA_SPECIFICITY: u32 = 100;
/// Score for a fallback producing responses from a sequence or state.
pub const DYNAMIC_FALLBACK_SPECIFICITY: u32 = 1;
/// Score for a fallback with a static response.
pub const STATIC_FALLBACK_SPECIFICITY: u32 = 0;

/// A mock that applies to the current request's method and URL.
#[derive(Debug, Clone)]
pub struct ApplicableMock {
    /// Scenario that owns the mock
    pub scenario: Arc<ScenarioDefinition>,
    /// Position of the mock within its scenario
    pub index: usize,
    /// Params extracted from the mock's URL pattern
    pub params: HashMap<String, String>,
}

impl ApplicableMock {
    /// Candidate for mock `index` of `scenario`, or `None` if the scenario
    /// has no such mock.
    pub fn new(
        scenario: Arc<ScenarioDefinition>,
        index: usize,
        params: HashMap<String, String>,
    ) -> Option<Self> {
        if index >= scenario.mocks.len() {
            return None;
        }
        Some(Self {
            scenario,
            index,
            params,
        })
    }

    /// Every mock of a scenario, in declaration order, without params.
    pub fn all(scenario: &Arc<ScenarioDefinition>) -> Vec<Self> {
        (0..scenario.mocks.len())
            .map(|index| Self {
                scenario: Arc::clone(scenario),
                index,
                params: HashMap::new(),
            })
            .collect()
    }

    pub fn mock(&self) -> &MockDefinition {
        &self.scenario.mocks[self.index]
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario.id
    }
}

/// Outcome of evaluating one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Matched with the given specificity.
    Matched { specificity: u32 },
    /// Criteria did not match.
    NotMatched,
    /// Exhausted sequence; skipped.
    Exhausted,
}

impl Evaluation {
    pub fn matched(&self) -> bool {
        matches!(self, Evaluation::Matched { .. })
    }

    pub fn specificity(&self) -> u32 {
        match self {
            Evaluation::Matched { specificity } => *specificity,
            _ => 0,
        }
    }
}

/// Evaluates candidates against a request for one test scope.
pub struct CandidateEvaluator<'a> {
    sequences: &'a dyn SequenceTracker,
    state: &'a dyn StateStore,
}

impl<'a> CandidateEvaluator<'a> {
    pub fn new(sequences: &'a dyn SequenceTracker, state: &'a dyn StateStore) -> Self {
        Self { sequences, state }
    }

    /// Evaluate one candidate.
    pub fn evaluate(
        &self,
        request: &HttpRequestContext,
        candidate: &ApplicableMock,
        test_id: &str,
    ) -> Evaluation {
        let mock = candidate.mock();

        let evaluation = match &mock.criteria {
            Some(criteria) => match self.criteria_score(criteria, request, test_id) {
                Some(points) => Evaluation::Matched {
                    specificity: CRITERIA_SPECIFICITY + points,
                },
                None => Evaluation::NotMatched,
            },
            None if mock.is_dynamic() => Evaluation::Matched {
                specificity: DYNAMIC_FALLBACK_SPECIFICITY,
            },
            None => Evaluation::Matched {
                specificity: STATIC_FALLBACK_SPECIFICITY,
            },
        };

        // Only a mock that would otherwise match counts as exhausted.
        if evaluation.matched() && self.is_exhausted(candidate, test_id) {
            return Evaluation::Exhausted;
        }
        evaluation
    }

    fn is_exhausted(&self, candidate: &ApplicableMock, test_id: &str) -> bool {
        matches!(candidate.mock().source, Some(ResponseSource::Sequence(_)))
            && self
                .sequences
                .get_position(test_id, candidate.scenario_id(), candidate.index)
                .exhausted
    }

    /// Number of matched fields, or `None` if any present criterion fails.
    fn criteria_score(
        &self,
        criteria: &MatchCriteria,
        request: &HttpRequestContext,
        test_id: &str,
    ) -> Option<u32> {
        let mut points = 0u32;

        if let Some(url) = &criteria.url {
            if !url.matches(&request.url) {
                return None;
            }
            points += 1;
        }

        if !criteria.body.is_empty() {
            let body = request.body.as_ref()?;
            for (field, expected) in &criteria.body {
                let actual = safe_path::walk_dotted(body, field)?;
                if !expected.matches(&coerce_to_string(actual)) {
                    return None;
                }
                points += 1;
            }
        }

        if !criteria.headers.is_empty() {
            let headers = request.normalized_headers();
            for (name, expected) in &criteria.headers {
                let actual = headers.get(&name.to_ascii_lowercase())?;
                if !expected.matches(actual) {
                    return None;
                }
                points += 1;
            }
        }

        for (name, expected) in &criteria.query {
            let actual = request.query.get(name)?;
            if !expected.matches(actual) {
                return None;
            }
            points += 1;
        }

        for (key, expected) in &criteria.state {
            let actual = self.state.get(test_id, key)?;
            if !deep_equal(&actual, expected) {
                return None;
            }
            points += 1;
        }

        Some(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        MatchCriteria, RepeatMode, ResponseDefinition, SequenceDefinition,
        StateResponseDefinition,
    };
    use crate::sequence::InMemorySequenceTracker;
    use crate::state::InMemoryStateStore;
    use crate::url_pattern::UrlPattern;
    use crate::value_matcher::MatchValue;
    use serde_json::json;

    fn make_mock(criteria: Option<MatchCriteria>) -> MockDefinition {
        let mut mock = MockDefinition::new(
            "POST",
            UrlPattern::parse("/api/checkout").unwrap(),
            ResponseDefinition::new(200),
        );
        mock.criteria = criteria;
        mock
    }

    fn candidate(mock: MockDefinition) -> ApplicableMock {
        let scenario = Arc::new(ScenarioDefinition::new("s", vec![mock]));
        ApplicableMock::all(&scenario).remove(0)
    }

    fn request() -> HttpRequestContext {
        HttpRequestContext::new("POST", "/api/checkout?coupon=SAVE10")
            .with_header("X-User-Tier", "gold")
            .with_body(json!({"itemType": "premium", "amount": 10000, "meta": {"channel": "web"}}))
    }

    struct Fixture {
        sequences: InMemorySequenceTracker,
        state: InMemoryStateStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                sequences: InMemorySequenceTracker::new(),
                state: InMemoryStateStore::new(),
            }
        }

        fn evaluate(&self, mock: MockDefinition, request: &HttpRequestContext) -> Evaluation {
            CandidateEvaluator::new(&self.sequences, &self.state).evaluate(
                request,
                &candidate(mock),
                "t",
            )
        }
    }

    #[test]
    fn test_static_fallback_scores_zero() {
        let f = Fixture::new();
        assert_eq!(
            f.evaluate(make_mock(None), &request()),
            Evaluation::Matched { specificity: 0 }
        );
    }

    #[test]
    fn test_dynamic_fallback_scores_one() {
        let f = Fixture::new();
        let seq = make_mock(None).with_source(ResponseSource::Sequence(SequenceDefinition {
            responses: vec![ResponseDefinition::new(200)],
            repeat: RepeatMode::Last,
        }));
        assert_eq!(f.evaluate(seq, &request()).specificity(), 1);

        let state = make_mock(None).with_source(ResponseSource::StateConditional(
            StateResponseDefinition {
                default: ResponseDefinition::new(200),
                conditions: vec![],
            },
        ));
        assert_eq!(f.evaluate(state, &request()).specificity(), 1);
    }

    #[test]
    fn test_body_criteria() {
        let f = Fixture::new();
        let criteria = MatchCriteria::default()
            .body("itemType", "premium")
            .body("amount", MatchValue::exact("10000"))
            .body("meta.channel", "web");
        assert_eq!(
            f.evaluate(make_mock(Some(criteria)), &request()),
            Evaluation::Matched { specificity: 103 }
        );

        let criteria = MatchCriteria::default().body("itemType", "standard");
        assert_eq!(
            f.evaluate(make_mock(Some(criteria)), &request()),
            Evaluation::NotMatched
        );
    }

    #[test]
    fn test_body_criteria_without_body() {
        let f = Fixture::new();
        let criteria = MatchCriteria::default().body("itemType", "premium");
        let req = HttpRequestContext::new("POST", "/api/checkout");
        assert!(!f.evaluate(make_mock(Some(criteria)), &req).matched());
    }

    #[test]
    fn test_headers_are_case_insensitive_on_names_only() {
        let f = Fixture::new();
        let criteria = MatchCriteria::default().header("x-USER-tier", "gold");
        assert_eq!(
            f.evaluate(make_mock(Some(criteria)), &request()).specificity(),
            101
        );

        let criteria = MatchCriteria::default().header("x-user-tier", "GOLD");
        assert!(!f.evaluate(make_mock(Some(criteria)), &request()).matched());
    }

    #[test]
    fn test_query_and_url_criteria() {
        let f = Fixture::new();
        let criteria = MatchCriteria::default()
            .query("coupon", MatchValue::try_from(json!({"startsWith": "SAVE"})).unwrap())
            .url(MatchValue::try_from(json!({"contains": "/checkout"})).unwrap());
        assert_eq!(
            f.evaluate(make_mock(Some(criteria)), &request()).specificity(),
            102
        );

        let criteria = MatchCriteria::default().query("missing", "x");
        assert!(!f.evaluate(make_mock(Some(criteria)), &request()).matched());
    }

    #[test]
    fn test_state_criteria_use_deep_equality() {
        let f = Fixture::new();
        let criteria = MatchCriteria::default().state("cart", json!({"open": true, "items": 2}));
        assert!(!f.evaluate(make_mock(Some(criteria.clone())), &request()).matched());

        f.state.set("t", "cart", json!({"items": 2.0, "open": true}));
        assert_eq!(
            f.evaluate(make_mock(Some(criteria)), &request()).specificity(),
            101
        );
    }

    #[test]
    fn test_all_categories_must_match() {
        let f = Fixture::new();
        let criteria = MatchCriteria::default()
            .body("itemType", "premium")
            .header("x-user-tier", "silver");
        assert!(!f.evaluate(make_mock(Some(criteria)), &request()).matched());
    }

    #[test]
    fn test_empty_criteria_still_outrank_fallbacks() {
        let f = Fixture::new();
        assert_eq!(
            f.evaluate(make_mock(Some(MatchCriteria::default())), &request()),
            Evaluation::Matched { specificity: 100 }
        );
    }

    #[test]
    fn test_exhausted_sequence_is_skipped() {
        let f = Fixture::new();
        let seq = make_mock(None).with_source(ResponseSource::Sequence(SequenceDefinition {
            responses: vec![ResponseDefinition::new(200)],
            repeat: RepeatMode::None,
        }));
        f.sequences.advance("t", "s", 0, 1, RepeatMode::None);
        assert_eq!(f.evaluate(seq, &request()), Evaluation::Exhausted);
    }

    #[test]
    fn test_exhausted_sequence_with_failing_criteria_is_not_matched() {
        let f = Fixture::new();
        let seq = make_mock(Some(MatchCriteria::default().body("itemType", "standard")))
            .with_source(ResponseSource::Sequence(SequenceDefinition {
                responses: vec![ResponseDefinition::new(200)],
                repeat: RepeatMode::None,
            }));
        f.sequences.advance("t", "s", 0, 1, RepeatMode::None);
        assert_eq!(f.evaluate(seq, &request()), Evaluation::NotMatched);
    }

    #[test]
    fn test_candidate_index_is_bounds_checked() {
        let scenario = Arc::new(ScenarioDefinition::new("s", vec![make_mock(None)]));
        assert!(ApplicableMock::new(Arc::clone(&scenario), 0, HashMap::new()).is_some());
        assert!(ApplicableMock::new(scenario, 1, HashMap::new()).is_none());
    }
}
