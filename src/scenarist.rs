//! Test-scope management on top of the response selector.
//!
//! Each test id owns an active scenario, its sequence positions and its
//! state. Requests are resolved against the default scenario's mocks
//! followed by the active scenario's mocks, so an active scenario's
//! fallback overrides the default one.

use crate::config::{GlobalSettings, ScenarioDefinition, ScenaristConfig};
use crate::error::{ConfigError, ScenaristError};
use crate::logging::{LogCategory, LogContext, LogLevel, Logger, TracingLogger};
use crate::matcher::ApplicableMock;
use crate::registry::{InMemoryScenarioRegistry, ScenarioRegistry};
use crate::request::HttpRequestContext;
use crate::selector::{MockResponse, ResponseSelector};
use crate::sequence::{InMemorySequenceTracker, SequenceTracker};
use crate::state::{InMemoryStateStore, StateStore};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Scenario-driven mock resolution with per-test isolation.
pub struct Scenarist {
    settings: GlobalSettings,
    registry: Arc<dyn ScenarioRegistry>,
    sequences: Arc<dyn SequenceTracker>,
    state: Arc<dyn StateStore>,
    logger: Arc<dyn Logger>,
    selector: ResponseSelector,
    /// Active scenario per test id
    active: RwLock<HashMap<String, String>>,
    /// Total requests resolved.
    requests_total: AtomicU64,
    /// Requests that produced a response.
    requests_matched: AtomicU64,
    /// Requests that produced a selection error.
    requests_unmatched: AtomicU64,
}

impl Scenarist {
    /// Create from configuration using in-memory stores and `tracing` logs.
    pub fn new(config: ScenaristConfig) -> Result<Self, ConfigError> {
        let scenarist = Self::with_components(
            config.settings,
            Arc::new(InMemoryScenarioRegistry::new()),
            Arc::new(InMemorySequenceTracker::new()),
            Arc::new(InMemoryStateStore::new()),
            Arc::new(TracingLogger),
        );
        for scenario in config.scenarios {
            scenarist.register_scenario(scenario)?;
        }

        info!(
            scenarios = scenarist.registry.list().len(),
            default_scenario = %scenarist.settings.default_scenario,
            "Scenarist initialized"
        );
        Ok(scenarist)
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::new(ScenaristConfig::from_yaml(yaml)?)
    }

    /// Assemble from explicit components.
    pub fn with_components(
        settings: GlobalSettings,
        registry: Arc<dyn ScenarioRegistry>,
        sequences: Arc<dyn SequenceTracker>,
        state: Arc<dyn StateStore>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let selector = ResponseSelector::new(
            Arc::clone(&sequences),
            Arc::clone(&state),
            Arc::clone(&logger),
        );
        Self {
            settings,
            registry,
            sequences,
            state,
            logger,
            selector,
            active: RwLock::new(HashMap::new()),
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn registry(&self) -> &dyn ScenarioRegistry {
        self.registry.as_ref()
    }

    pub fn state(&self) -> &dyn StateStore {
        self.state.as_ref()
    }

    pub fn sequences(&self) -> &dyn SequenceTracker {
        self.sequences.as_ref()
    }

    /// Register a scenario.
    pub fn register_scenario(&self, scenario: ScenarioDefinition) -> Result<(), ConfigError> {
        let id = scenario.id.clone();
        let mocks = scenario.mocks.len();
        self.registry.register(scenario)?;
        debug!(scenario_id = %id, mocks, "Registered scenario");
        Ok(())
    }

    /// Test id carried by the request headers, or the configured default.
    pub fn test_id_for(&self, headers: &HashMap<String, String>) -> String {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&self.settings.test_id_header))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.settings.default_test_id)
            .to_string()
    }

    /// Make `scenario_id` active for `test_id`.
    ///
    /// Resets the test's state. Sequence positions are kept; call
    /// [`Scenarist::reset_sequences`] to rewind them.
    pub fn switch_scenario(&self, test_id: &str, scenario_id: &str) -> Result<(), ScenaristError> {
        if !self.registry.contains(scenario_id) {
            return Err(ScenaristError::ScenarioNotFound(scenario_id.to_string()));
        }

        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(test_id.to_string(), scenario_id.to_string());
        self.state.reset(test_id);

        self.logger.log(
            LogLevel::Info,
            LogCategory::Scenario,
            "Switched scenario",
            &LogContext::new(test_id, scenario_id),
            None,
        );
        Ok(())
    }

    /// Active scenario for `test_id`, or the default scenario.
    pub fn active_scenario(&self, test_id: &str) -> String {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(test_id)
            .cloned()
            .unwrap_or_else(|| self.settings.default_scenario.clone())
    }

    /// Rewind every sequence for `test_id`.
    pub fn reset_sequences(&self, test_id: &str) {
        self.sequences.reset(test_id);
    }

    /// Forget everything about `test_id`.
    pub fn clear_test(&self, test_id: &str) {
        let previous = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(test_id);
        self.state.reset(test_id);
        self.sequences.reset(test_id);

        let scenario_id = previous.unwrap_or_else(|| self.settings.default_scenario.clone());
        self.logger.log(
            LogLevel::Info,
            LogCategory::Scenario,
            "Cleared test scope",
            &LogContext::new(test_id, &scenario_id),
            None,
        );
    }

    /// Mocks applicable to `method url` for `test_id`: default scenario
    /// first, then the active scenario.
    pub fn applicable_mocks(&self, test_id: &str, method: &str, url: &str) -> Vec<ApplicableMock> {
        let default_id = &self.settings.default_scenario;
        let active_id = self.active_scenario(test_id);

        let mut scenario_ids = vec![default_id.as_str()];
        if &active_id != default_id {
            scenario_ids.push(active_id.as_str());
        }

        let mut mocks = Vec::new();
        for id in scenario_ids {
            let Some(scenario) = self.registry.get(id) else {
                continue;
            };
            for (index, mock) in scenario.mocks.iter().enumerate() {
                if !mock.method.eq_ignore_ascii_case(method) {
                    continue;
                }
                let Some(params) = mock.url.matches(url) else {
                    continue;
                };
                if let Some(candidate) = ApplicableMock::new(Arc::clone(&scenario), index, params) {
                    mocks.push(candidate);
                }
            }
        }
        mocks
    }

    /// Resolve a request for `test_id`.
    pub fn resolve(
        &self,
        test_id: &str,
        request: &HttpRequestContext,
    ) -> Result<MockResponse, ScenaristError> {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let scenario_id = self.active_scenario(test_id);
        let mocks = self.applicable_mocks(test_id, &request.method, &request.url);

        self.logger.log(
            LogLevel::Debug,
            LogCategory::Request,
            "Resolving request",
            &LogContext::new(test_id, &scenario_id),
            Some(&json!({
                "method": request.method,
                "url": request.url,
                "candidates": mocks.len(),
            })),
        );

        match self
            .selector
            .select_response(test_id, &scenario_id, request, &mocks)
        {
            Ok(response) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                Ok(response)
            }
            Err(e) => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    /// Resolve a request and wait out the response's declared delay.
    pub async fn respond(
        &self,
        test_id: &str,
        request: &HttpRequestContext,
    ) -> Result<MockResponse, ScenaristError> {
        let response = self.resolve(test_id, request)?;

        if let Some(delay_ms) = response.delay.filter(|ms| *ms > 0) {
            debug!(test_id, delay_ms, "Applying delay");
            tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
        }

        Ok(response)
    }

    /// Get total requests processed.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests matched.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests unmatched.
    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }
}
