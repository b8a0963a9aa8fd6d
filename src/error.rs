//! Error types.

use std::path::PathBuf;

/// Why no response could be selected for a request.
///
/// These are ordinary outcomes of selection, returned to the interception
/// boundary rather than raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("No mock matched {method} {url}")]
    NoMockMatched { method: String, url: String },

    #[error(
        "Sequence exhausted for {method} {url}: add a fallback mock or use repeat 'last' or 'cycle'"
    )]
    SequenceExhausted { method: String, url: String },

    #[error("Mock {mock_index} in scenario '{scenario_id}' defines none of response, sequence, stateResponse")]
    MalformedMock {
        scenario_id: String,
        mock_index: usize,
    },
}

/// Configuration and registration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Scenario '{0}' is already registered")]
    DuplicateScenario(String),

    #[error("Invalid scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },
}

/// Errors surfaced by [`crate::Scenarist`].
#[derive(Debug, thiserror::Error)]
pub enum ScenaristError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Scenario '{0}' not found")]
    ScenarioNotFound(String),
}
