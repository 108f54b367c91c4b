//! Declarative result-checker configuration.
//!
//! A scenario lists checkers as `{type, config}` pairs; the body is kept raw
//! until the checker registry picks a backend for `type`.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;
use crate::ConfigError;

/// Backend a checker consumes results from.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckerKind {
    /// NATS JetStream stream, one consumer per subject.
    Nats,
    /// In-process broker.
    Memory,
}

/// One `{type, config}` entry of a scenario.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct CheckerEntry {
    #[serde(rename = "type")]
    pub kind: CheckerKind,
    pub config: serde_json::Value,
}

impl CheckerEntry {
    /// Parses and validates the stream checker body.
    pub fn stream_config(&self) -> Result<CheckerConfig, ConfigError> {
        CheckerConfig::from_json(self.config.clone())
    }
}

/// Stream checker settings: where to read and what to expect.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct CheckerConfig {
    #[validate(length(min = 1), custom(function = validation::validate_addresses))]
    pub address: Vec<String>,

    #[validate(length(min = 1))]
    pub topic: String,

    #[serde(default)]
    #[validate(nested)]
    pub checks: Vec<CheckSpec>,
}

impl CheckerConfig {
    pub fn from_json(raw: serde_json::Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(raw)?;
        config.validated()
    }

    /// Returns the configuration if every field passes validation.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }
}

/// One expected message.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct CheckSpec {
    pub description: String,

    /// Regular expressions stripped from every observed message before it
    /// is compared with `text`.
    #[serde(default)]
    #[validate(custom(function = validation::validate_regex_list))]
    pub remove: Vec<String>,

    pub text: String,
}
