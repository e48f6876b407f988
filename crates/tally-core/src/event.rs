//! Event data model.
//!
//! Two kinds of event flow through the pipeline. Each committed event is a
//! [`StoredEvent`]: the producer's fields plus the identity the store assigned.
//! The committed form serializes flat, e.g.
//! `{"id": 3, "type": "unit", "timestamp": "...", "result": {...}}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The storage partition an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TestResult,
    UsageLog,
}

impl EventKind {
    /// Every kind, in a stable order.
    pub const ALL: [EventKind; 2] = [EventKind::TestResult, EventKind::UsageLog];

    /// Name of the sled tree holding this kind.
    pub fn partition(self) -> &'static str {
        match self {
            EventKind::TestResult => "test_results",
            EventKind::UsageLog => "usage_logs",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            EventKind::TestResult => 0,
            EventKind::UsageLog => 1,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::TestResult => f.write_str("test_result"),
            EventKind::UsageLog => f.write_str("usage_log"),
        }
    }
}

/// Outcome of a test run reported by a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Free-form tag, e.g. "unit" or "integration".
    #[serde(rename = "type")]
    pub kind: String,
    /// Producer-supplied timestamp. Not parsed.
    pub timestamp: String,
    /// Arbitrary structured result.
    #[serde(rename = "result")]
    pub payload: Map<String, Value>,
}

/// Time spent on a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLog {
    pub domain: String,
    pub timestamp: String,
    /// Seconds.
    pub duration: i64,
}

/// A validated event that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    TestResult(TestResult),
    UsageLog(UsageLog),
}

impl Event {
    /// The partition this event is stored in.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::TestResult(_) => EventKind::TestResult,
            Event::UsageLog(_) => EventKind::UsageLog,
        }
    }
}

impl From<TestResult> for Event {
    fn from(result: TestResult) -> Self {
        Event::TestResult(result)
    }
}

impl From<UsageLog> for Event {
    fn from(log: UsageLog) -> Self {
        Event::UsageLog(log)
    }
}

/// A committed event with its store-assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Identity, unique and increasing within the event's kind.
    pub id: u64,
    #[serde(flatten)]
    pub event: Event,
}

impl StoredEvent {
    pub fn new(id: u64, event: Event) -> Self {
        Self { id, event }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// Canonical JSON form, used both for list responses and broadcast frames.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
