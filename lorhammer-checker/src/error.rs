use thiserror::Error;

use lorhammer_config::{CheckerKind, ConfigError};

/// Failures reported by a shard backend.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Unknown topic '{0}'")]
    UnknownTopic(String),

    #[error("Topic '{topic}' has no shard '{shard}'")]
    UnknownShard { topic: String, shard: String },

    #[error("Shard '{shard}' of topic '{topic}' is already being consumed")]
    ShardBusy { topic: String, shard: String },

    #[error("Backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid remove pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to connect to {addresses:?}: {source}")]
    Connect {
        addresses: Vec<String>,
        #[source]
        source: SourceError,
    },

    #[error("Failed to resolve shards of topic '{topic}': {source}")]
    Shards {
        topic: String,
        #[source]
        source: SourceError,
    },

    #[error("Failed to open shard '{shard}' of topic '{topic}': {source}")]
    OpenShard {
        topic: String,
        shard: String,
        #[source]
        source: SourceError,
    },

    #[error("Checker already started")]
    AlreadyStarted,

    #[error("Checker already finalized")]
    AlreadyFinalized,

    #[error("No connector registered for checker type {0:?}")]
    UnsupportedKind(CheckerKind),
}
