//! Per-message verdicts and the final report.

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

use lorhammer_config::CheckSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    #[serde(rename = "mismatch")]
    Mismatch,
    #[serde(rename = "no messages received")]
    NoMessagesReceived,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Mismatch => f.write_str("mismatch"),
            FailureReason::NoMessagesReceived => f.write_str("no messages received"),
        }
    }
}

/// A message matched `check`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckSuccess {
    pub check: CheckSpec,
}

impl CheckSuccess {
    pub fn details(&self) -> Value {
        json!({ "success": self.check.description })
    }
}

/// A message matched nothing, or nothing was observed at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFailure {
    pub reason: FailureReason,
    pub value: String,
}

impl CheckFailure {
    pub fn mismatch(value: impl Into<String>) -> Self {
        Self {
            reason: FailureReason::Mismatch,
            value: value.into(),
        }
    }

    pub fn no_messages() -> Self {
        Self {
            reason: FailureReason::NoMessagesReceived,
            value: String::new(),
        }
    }

    pub fn details(&self) -> Value {
        json!({ "reason": self.reason.to_string(), "value": self.value })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Success(CheckSuccess),
    Failure(CheckFailure),
}

/// Outcomes accumulated by one consumer. Appended to, never pruned.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub successes: Vec<CheckSuccess>,
    pub failures: Vec<CheckFailure>,
}

impl CheckReport {
    pub fn record(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Success(success) => self.successes.push(success),
            CheckOutcome::Failure(failure) => self.failures.push(failure),
        }
    }

    pub fn merge(&mut self, other: CheckReport) {
        self.successes.extend(other.successes);
        self.failures.extend(other.failures);
    }

    pub fn is_empty(&self) -> bool {
        self.successes.is_empty() && self.failures.is_empty()
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty() && !self.successes.is_empty()
    }
}
