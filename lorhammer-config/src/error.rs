//! Failures while loading a load-test scenario: missing files, figment
//! extraction, validation of the gateway and checker sections.

use std::fmt::{self, Write};
use std::path::PathBuf;

use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Scenario file not found: {0}")]
    FileNotFound(PathBuf),

    /// One line per offending field, keyed by its dotted path
    /// (`gateway.rxpk_date`, `checks[0].remove`).
    #[error("Invalid scenario:\n{}", describe(.0))]
    Validation(#[source] ValidationErrors),

    #[error("Invalid node range: min_nb_node {min} is greater than max_nb_node {max}")]
    NodeRange { min: usize, max: usize },

    #[error("Failed to read scenario: {0}")]
    Parsing(#[from] Box<figment::Error>),

    /// Checker body that does not match its declared type.
    #[error("Invalid checker configuration: {0}")]
    Checker(#[from] serde_json::Error),
}

fn describe(errors: &ValidationErrors) -> String {
    let mut out = String::new();
    match write_errors(&mut out, "", errors) {
        Ok(()) => out,
        Err(_) => "unprintable validation errors".into(),
    }
}

fn write_errors(out: &mut String, prefix: &str, errors: &ValidationErrors) -> fmt::Result {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    match &error.message {
                        Some(message) => writeln!(out, "  {path}: {message}")?,
                        None => writeln!(out, "  {path}: {}", error.code)?,
                    }
                }
            }
            ValidationErrorsKind::Struct(nested) => write_errors(out, &path, nested)?,
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    write_errors(out, &format!("{path}[{index}]"), nested)?;
                }
            }
        }
    }
    Ok(())
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::Parsing(Box::new(error))
    }
}
