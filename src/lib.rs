//! Scenarist
//!
//! Scenario-based HTTP mock selection with per-test isolation. Given an
//! intercepted request, the test it belongs to and the scenario active for
//! that test, picks the single best mock and produces its response.
//!
//! # Features
//!
//! - **Specificity Matching**: Body, header, query, URL and state criteria; the most specific mock wins
//! - **Sequences**: Ordered responses with `last`, `cycle` or `none` repeat modes
//! - **State**: Capture request values, branch on state, set state after responding
//! - **Templates**: `{{state.*}}` and `{{params.*}}` tokens in response bodies
//! - **Test Isolation**: Scenario, sequence positions and state are keyed by test id
//!
//! # Example Configuration
//!
//! ```yaml
//! scenarios:
//!   - id: default
//!     mocks:
//!       - method: GET
//!         url: /api/users/:id
//!         response:
//!           status: 200
//!           body:
//!             id: "{{params.id}}"
//!   - id: premium
//!     mocks:
//!       - method: POST
//!         url: /api/checkout
//!         match:
//!           body:
//!             tier: premium
//!         response:
//!           status: 200
//!           body:
//!             discount: 20
//! ```

pub mod config;
pub mod deep_equal;
pub mod error;
pub mod extract;
pub mod logging;
pub mod matcher;
pub mod registry;
pub mod request;
pub mod safe_path;
pub mod scenarist;
pub mod selector;
pub mod sequence;
pub mod state;
pub mod template;
pub mod url_pattern;
pub mod value_matcher;

pub use config::{
    GlobalSettings, MatchCriteria, MockDefinition, RepeatMode, ResponseDefinition,
    ResponseSource, ScenarioDefinition, ScenaristConfig,
};
pub use error::{ConfigError, ScenaristError, SelectionError};
pub use logging::{LogCategory, LogContext, LogLevel, Logger, NoOpLogger, TracingLogger};
pub use matcher::ApplicableMock;
pub use registry::{InMemoryScenarioRegistry, ScenarioRegistry};
pub use request::HttpRequestContext;
pub use scenarist::Scenarist;
pub use selector::{MockResponse, ResponseSelector};
pub use sequence::{InMemorySequenceTracker, SequenceTracker};
pub use state::{InMemoryStateStore, StateStore};
pub use url_pattern::UrlPattern;
pub use value_matcher::MatchValue;
