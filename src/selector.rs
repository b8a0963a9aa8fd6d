//! Response resolution: picks one mock for a request and produces its
//! response.
//!
//! Order of effects within one call is fixed: candidate evaluation, sequence
//! read and advance, state capture, template substitution, then
//! `afterResponse.setState`. The selector takes no locks of its own; callers
//! serialize requests that share a test id.

use crate::config::{MockDefinition, ResponseDefinition, ResponseSource};
use crate::deep_equal::deep_equal;
use crate::error::SelectionError;
use crate::extract::extract;
use crate::logging::{LogCategory, LogContext, LogLevel, Logger, TracingLogger};
use crate::matcher::{ApplicableMock, CandidateEvaluator, Evaluation, CRITERIA_SPECIFICITY};
use crate::request::HttpRequestContext;
use crate::safe_path;
use crate::sequence::SequenceTracker;
use crate::state::StateStore;
use crate::template::{apply_templates, TemplateData};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A resolved mock response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Delay in milliseconds to apply before responding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

/// Picks and resolves responses.
pub struct ResponseSelector {
    sequences: Arc<dyn SequenceTracker>,
    state: Arc<dyn StateStore>,
    logger: Arc<dyn Logger>,
}

impl ResponseSelector {
    pub fn new(
        sequences: Arc<dyn SequenceTracker>,
        state: Arc<dyn StateStore>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            sequences,
            state,
            logger,
        }
    }

    /// Selector logging through `tracing`.
    pub fn with_tracing(sequences: Arc<dyn SequenceTracker>, state: Arc<dyn StateStore>) -> Self {
        Self::new(sequences, state, Arc::new(TracingLogger))
    }

    /// Select and resolve the response for `request` among `mocks`.
    ///
    /// Highest specificity wins. Between equal-scoring fallbacks the later
    /// mock wins, so a scenario's fallback overrides one registered before
    /// it; between equal-scoring criteria matches the first one is kept.
    pub fn select_response(
        &self,
        test_id: &str,
        scenario_id: &str,
        request: &HttpRequestContext,
        mocks: &[ApplicableMock],
    ) -> Result<MockResponse, SelectionError> {
        let log_ctx = LogContext::new(test_id, scenario_id);
        let evaluator = CandidateEvaluator::new(self.sequences.as_ref(), self.state.as_ref());

        let mut best: Option<(&ApplicableMock, u32)> = None;
        let mut skipped_exhausted = 0usize;

        for candidate in mocks {
            let evaluation = evaluator.evaluate(request, candidate, test_id);
            self.log(
                LogLevel::Debug,
                LogCategory::Matching,
                "Evaluated mock candidate",
                &log_ctx,
                json!({
                    "mockScenario": candidate.scenario_id(),
                    "mockIndex": candidate.index,
                    "matched": evaluation.matched(),
                    "exhausted": evaluation == Evaluation::Exhausted,
                    "specificity": evaluation.specificity(),
                }),
            );

            let specificity = match evaluation {
                Evaluation::Matched { specificity } => specificity,
                Evaluation::Exhausted => {
                    skipped_exhausted += 1;
                    continue;
                }
                Evaluation::NotMatched => continue,
            };

            let replace = match best {
                None => true,
                Some((_, best_score)) => {
                    specificity > best_score
                        || (specificity == best_score && specificity < CRITERIA_SPECIFICITY)
                }
            };
            if replace {
                best = Some((candidate, specificity));
            }
        }

        let Some((winner, specificity)) = best else {
            return Err(self.no_match(request, skipped_exhausted, &log_ctx));
        };

        self.log(
            LogLevel::Info,
            LogCategory::Matching,
            "Selected mock",
            &log_ctx,
            json!({
                "mockScenario": winner.scenario_id(),
                "mockIndex": winner.index,
                "specificity": specificity,
                "method": request.method,
                "url": request.url,
            }),
        );

        self.resolve(test_id, request, winner, &log_ctx)
    }

    fn no_match(
        &self,
        request: &HttpRequestContext,
        skipped_exhausted: usize,
        log_ctx: &LogContext,
    ) -> SelectionError {
        let method = request.method.clone();
        let url = request.url.clone();

        if skipped_exhausted > 0 {
            self.log(
                LogLevel::Warn,
                LogCategory::Sequence,
                "Sequence exhausted and no fallback mock matched",
                log_ctx,
                json!({ "method": method, "url": url, "exhaustedMocks": skipped_exhausted }),
            );
            SelectionError::SequenceExhausted { method, url }
        } else {
            self.log(
                LogLevel::Warn,
                LogCategory::Matching,
                "No mock matched request",
                log_ctx,
                json!({ "method": method, "url": url }),
            );
            SelectionError::NoMockMatched { method, url }
        }
    }

    /// Produce the winner's response and apply its state effects.
    fn resolve(
        &self,
        test_id: &str,
        request: &HttpRequestContext,
        winner: &ApplicableMock,
        log_ctx: &LogContext,
    ) -> Result<MockResponse, SelectionError> {
        let mock = winner.mock();

        let chosen = match &mock.source {
            Some(ResponseSource::Static(response)) => response.clone(),
            Some(ResponseSource::Sequence(sequence)) => {
                let total = sequence.responses.len();
                if total == 0 {
                    return Err(malformed(winner));
                }
                let scenario_id = winner.scenario_id();
                let position = self
                    .sequences
                    .get_position(test_id, scenario_id, winner.index)
                    .position;
                let response = sequence.responses[position.min(total - 1)].clone();
                self.sequences
                    .advance(test_id, scenario_id, winner.index, total, sequence.repeat);
                self.log(
                    LogLevel::Debug,
                    LogCategory::Sequence,
                    "Served sequence response",
                    log_ctx,
                    json!({
                        "mockIndex": winner.index,
                        "position": position,
                        "total": total,
                        "repeat": sequence.repeat,
                    }),
                );
                response
            }
            Some(ResponseSource::StateConditional(state_response)) => {
                let state = self.state.get_all(test_id);
                let matched = state_response
                    .conditions
                    .iter()
                    .position(|condition| state_satisfies(&state, &condition.when));
                self.log(
                    LogLevel::Debug,
                    LogCategory::State,
                    "Resolved state-conditional response",
                    log_ctx,
                    json!({ "mockIndex": winner.index, "condition": matched }),
                );
                match matched {
                    Some(i) => state_response.conditions[i].then.clone(),
                    None => state_response.default.clone(),
                }
            }
            None => return Err(malformed(winner)),
        };

        self.capture_state(test_id, request, mock, log_ctx);

        let data = TemplateData::new(self.state.get_all(test_id), &winner.params);
        let response = render(chosen, &data);

        if let Some(after) = &mock.after_response {
            if !after.set_state.is_empty() {
                self.state.merge(test_id, &after.set_state);
                self.log(
                    LogLevel::Debug,
                    LogCategory::State,
                    "Applied afterResponse.setState",
                    log_ctx,
                    Value::Object(after.set_state.clone()),
                );
            }
        }

        Ok(response)
    }

    fn capture_state(
        &self,
        test_id: &str,
        request: &HttpRequestContext,
        mock: &MockDefinition,
        log_ctx: &LogContext,
    ) {
        for (key, path) in &mock.capture_state {
            let Some(value) = extract(request, path) else {
                continue;
            };
            self.log(
                LogLevel::Debug,
                LogCategory::State,
                "Captured state from request",
                log_ctx,
                json!({ "key": key, "path": path, "value": value }),
            );
            self.state.set(test_id, key, value);
        }
    }

    fn log(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: &str,
        context: &LogContext,
        data: Value,
    ) {
        self.logger.log(level, category, message, context, Some(&data));
    }
}

fn malformed(winner: &ApplicableMock) -> SelectionError {
    SelectionError::MalformedMock {
        scenario_id: winner.scenario_id().to_string(),
        mock_index: winner.index,
    }
}

/// True if every `when` entry deep-equals the value at that state path.
fn state_satisfies(state: &Value, when: &serde_json::Map<String, Value>) -> bool {
    when.iter().all(|(key, expected)| {
        safe_path::walk_dotted(state, key).is_some_and(|actual| deep_equal(actual, expected))
    })
}

fn render(response: ResponseDefinition, data: &TemplateData) -> MockResponse {
    MockResponse {
        status: response.status,
        body: response.body.map(|body| apply_templates(&body, data)),
        headers: response.headers,
        delay: response.delay,
    }
}
