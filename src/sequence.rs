//! Per-test cursors into sequence mocks.

use crate::config::RepeatMode;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Cursor for one sequence mock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencePosition {
    /// Index of the next response to serve
    pub position: usize,
    /// Set once a `repeat: none` sequence has served every response
    pub exhausted: bool,
}

/// Tracks sequence positions keyed by (test id, scenario id, mock index).
pub trait SequenceTracker: Send + Sync {
    /// Current cursor; a sequence never seen starts at position 0.
    fn get_position(&self, test_id: &str, scenario_id: &str, mock_index: usize)
        -> SequencePosition;

    /// Move the cursor forward by one call.
    fn advance(
        &self,
        test_id: &str,
        scenario_id: &str,
        mock_index: usize,
        total_responses: usize,
        repeat: RepeatMode,
    );

    /// Forget every cursor belonging to `test_id`.
    fn reset(&self, test_id: &str);
}

type TestSequences = HashMap<(String, usize), SequencePosition>;

/// In-memory tracker. Each test id owns its own table.
#[derive(Debug, Default)]
pub struct InMemorySequenceTracker {
    tests: Mutex<HashMap<String, TestSequences>>,
}

impl InMemorySequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TestSequences>> {
        self.tests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Compute the cursor after one more call.
pub fn next_position(
    current: SequencePosition,
    total_responses: usize,
    repeat: RepeatMode,
) -> SequencePosition {
    if total_responses == 0 || current.exhausted {
        return current;
    }

    match repeat {
        RepeatMode::Last => SequencePosition {
            position: (current.position + 1).min(total_responses - 1),
            exhausted: false,
        },
        RepeatMode::Cycle => SequencePosition {
            position: (current.position + 1) % total_responses,
            exhausted: false,
        },
        RepeatMode::None => {
            let position = current.position + 1;
            SequencePosition {
                position,
                exhausted: position >= total_responses,
            }
        }
    }
}

impl SequenceTracker for InMemorySequenceTracker {
    fn get_position(
        &self,
        test_id: &str,
        scenario_id: &str,
        mock_index: usize,
    ) -> SequencePosition {
        self.lock()
            .get(test_id)
            .and_then(|table| table.get(&(scenario_id.to_string(), mock_index)))
            .copied()
            .unwrap_or_default()
    }

    fn advance(
        &self,
        test_id: &str,
        scenario_id: &str,
        mock_index: usize,
        total_responses: usize,
        repeat: RepeatMode,
    ) {
        let mut tests = self.lock();
        let entry = tests
            .entry(test_id.to_string())
            .or_default()
            .entry((scenario_id.to_string(), mock_index))
            .or_default();
        *entry = next_position(*entry, total_responses, repeat);
    }

    fn reset(&self, test_id: &str) {
        self.lock().remove(test_id);
    }
}
