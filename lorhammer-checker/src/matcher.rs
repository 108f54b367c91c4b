//! Normalizes observed messages and compares them with the expected texts.

use regex::{NoExpand, Regex};
use tracing::trace;

use lorhammer_config::CheckSpec;

use crate::outcome::{CheckFailure, CheckOutcome, CheckSuccess};
use crate::CheckerError;

struct CompiledCheck {
    spec: CheckSpec,
    remove: Vec<Regex>,
}

impl CompiledCheck {
    /// Strips every dynamic fragment (generated ids, counters) from `raw`.
    fn normalize(&self, raw: &str) -> String {
        self.remove.iter().fold(raw.to_owned(), |text, re| {
            re.replace_all(&text, NoExpand("")).into_owned()
        })
    }
}

/// Ordered checks with their patterns compiled once.
pub struct Matcher {
    checks: Vec<CompiledCheck>,
}

impl Matcher {
    pub fn new(checks: &[CheckSpec]) -> Result<Self, CheckerError> {
        let checks = checks
            .iter()
            .map(|spec| {
                let remove = spec
                    .remove
                    .iter()
                    .map(|pattern| {
                        Regex::new(pattern).map_err(|source| CheckerError::InvalidPattern {
                            pattern: pattern.clone(),
                            source,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledCheck {
                    spec: spec.clone(),
                    remove,
                })
            })
            .collect::<Result<Vec<_>, CheckerError>>()?;
        Ok(Self { checks })
    }

    /// First matching check wins; no match is a mismatch carrying the raw text.
    pub fn evaluate(&self, payload: &[u8]) -> CheckOutcome {
        let raw = String::from_utf8_lossy(payload);
        for check in &self.checks {
            let normalized = check.normalize(&raw);
            trace!(description = %check.spec.description, %normalized, "Comparing message");
            if normalized == check.spec.text {
                return CheckOutcome::Success(CheckSuccess {
                    check: check.spec.clone(),
                });
            }
        }
        CheckOutcome::Failure(CheckFailure::mismatch(raw.into_owned()))
    }
}
