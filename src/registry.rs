//! Scenario catalog.

use crate::config::ScenarioDefinition;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Read-mostly catalog of scenarios keyed by id.
pub trait ScenarioRegistry: Send + Sync {
    /// Validate and register a scenario. Ids are unique; registered
    /// scenarios are never replaced.
    fn register(&self, scenario: ScenarioDefinition) -> Result<(), ConfigError>;

    fn get(&self, id: &str) -> Option<Arc<ScenarioDefinition>>;

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Registered ids, sorted.
    fn list(&self) -> Vec<String>;
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct InMemoryScenarioRegistry {
    scenarios: RwLock<HashMap<String, Arc<ScenarioDefinition>>>,
}

impl InMemoryScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScenarioRegistry for InMemoryScenarioRegistry {
    fn register(&self, scenario: ScenarioDefinition) -> Result<(), ConfigError> {
        scenario.validate()?;
        let mut scenarios = self
            .scenarios
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if scenarios.contains_key(&scenario.id) {
            return Err(ConfigError::DuplicateScenario(scenario.id));
        }
        scenarios.insert(scenario.id.clone(), Arc::new(scenario));
        Ok(())
    }

    fn get(&self, id: &str) -> Option<Arc<ScenarioDefinition>> {
        self.scenarios
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .scenarios
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
