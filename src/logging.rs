//! Structured logging port.
//!
//! The selection engine reports what it does through a [`Logger`] so test
//! harnesses can observe decisions without the engine depending on a
//! particular subscriber. Logging never influences selection.

use serde_json::Value;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, trace, warn};

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Fixed set of log categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Scenario,
    Matching,
    State,
    Sequence,
    Request,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Scenario => "scenario",
            LogCategory::Matching => "matching",
            LogCategory::State => "state",
            LogCategory::Sequence => "sequence",
            LogCategory::Request => "request",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context attached to every log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContext {
    pub test_id: String,
    pub scenario_id: String,
}

impl LogContext {
    pub fn new(test_id: &str, scenario_id: &str) -> Self {
        Self {
            test_id: test_id.to_string(),
            scenario_id: scenario_id.to_string(),
        }
    }
}

/// Sink for engine log events.
pub trait Logger: Send + Sync {
    fn log(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: &str,
        context: &LogContext,
        data: Option<&Value>,
    );
}

/// Forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

macro_rules! emit {
    ($macro:ident, $category:ident, $test_id:ident, $scenario_id:ident, $data:ident, $message:ident) => {
        match $data {
            Some(data) => $macro!(
                category = %$category,
                test_id = %$test_id,
                scenario_id = %$scenario_id,
                data = %data,
                "{}",
                $message
            ),
            None => $macro!(
                category = %$category,
                test_id = %$test_id,
                scenario_id = %$scenario_id,
                "{}",
                $message
            ),
        }
    };
}

impl Logger for TracingLogger {
    fn log(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: &str,
        context: &LogContext,
        data: Option<&Value>,
    ) {
        let test_id = context.test_id.as_str();
        let scenario_id = context.scenario_id.as_str();
        match level {
            LogLevel::Trace => emit!(trace, category, test_id, scenario_id, data, message),
            LogLevel::Debug => emit!(debug, category, test_id, scenario_id, data, message),
            LogLevel::Info => emit!(info, category, test_id, scenario_id, data, message),
            LogLevel::Warn => emit!(warn, category, test_id, scenario_id, data, message),
            LogLevel::Error => emit!(error, category, test_id, scenario_id, data, message),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _: LogLevel, _: LogCategory, _: &str, _: &LogContext, _: Option<&Value>) {}
}

/// One captured record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    pub context: LogContext,
    pub data: Option<Value>,
}

/// Keeps records in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records at `level` in `category`.
    pub fn count(&self, level: LogLevel, category: LogCategory) -> usize {
        self.records()
            .iter()
            .filter(|r| r.level == level && r.category == category)
            .count()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Logger for RecordingLogger {
    fn log(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: &str,
        context: &LogContext,
        data: Option<&Value>,
    ) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                level,
                category,
                message: message.to_string(),
                context: context.clone(),
                data: data.cloned(),
            });
    }
}
