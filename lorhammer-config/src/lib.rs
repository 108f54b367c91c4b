//! # Lorhammer Configuration System
//!
//! Layered configuration for the load generator and its result checkers.
//!
//! Hierarchy:
//! 1. Default values
//! 2. `config/lorhammer.yaml`
//! 3. `config/<LORHAMMER_ENV>.yaml`
//! 4. `LORHAMMER_*` environment variables (`__` separates nested keys)

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Json, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod checker;
mod error;
mod gateway;
mod validation;

pub use checker::{CheckSpec, CheckerConfig, CheckerEntry, CheckerKind};
pub use error::ConfigError;
pub use gateway::GatewayConfig;

const BASE_FILE: &str = "config/lorhammer.yaml";
const ENV_PREFIX: &str = "LORHAMMER_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct LorhammerConfig {
    /// Simulated gateway fleet.
    #[serde(default)]
    #[validate(nested)]
    pub gateway: GatewayConfig,

    /// Result checkers evaluated at the end of a run.
    #[serde(default)]
    #[validate(nested)]
    pub checkers: Vec<CheckerEntry>,
}

impl LorhammerConfig {
    /// Load configuration from default files and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(LorhammerConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("LORHAMMER_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific YAML or JSON file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment = Figment::from(Serialized::defaults(LorhammerConfig::default()));
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Yaml::file(path)),
        };
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        config.gateway.check_node_range()?;
        Ok(config)
    }
}
