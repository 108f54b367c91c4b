use std::io;
use std::net::AddrParseError;

use thiserror::Error;

use lorhammer_checker::CheckerError;
use lorhammer_config::ConfigError;
use lorhammer_protocols::SemtechError;

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid network server address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddrParseError,
    },

    #[error("UDP socket error: {0}")]
    Socket(#[from] io::Error),

    #[error("Frame encoding failed: {0}")]
    Encode(#[from] SemtechError),

    #[error("Checker error: {0}")]
    Checker(#[from] CheckerError),

    #[error("Load test already running")]
    AlreadyRunning,
}
