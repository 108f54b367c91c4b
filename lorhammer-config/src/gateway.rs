//! Simulated gateway fleet configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;
use crate::ConfigError;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Number of gateways to launch.
    #[serde(default = "default_nb_gateway")]
    #[validate(range(min = 1, max = 100_000))]
    pub nb_gateway: usize,

    /// Minimal number of nodes behind each gateway.
    #[serde(default = "default_nb_node")]
    #[validate(range(min = 1))]
    pub min_nb_node: usize,

    /// Maximal number of nodes behind each gateway.
    #[serde(default = "default_nb_node")]
    #[validate(range(min = 1))]
    pub max_nb_node: usize,

    /// Network server `ip:port`.
    #[serde(default = "default_ns_address")]
    #[validate(custom(function = validation::validate_socket_addr))]
    pub ns_address: String,

    /// Delay between two uplinks of the same node.
    #[serde(default = "default_send_interval_ms")]
    #[validate(range(min = 1))]
    pub send_interval_ms: u64,

    /// Fixed reception time (unix seconds) stamped on uplinks; 0 means now.
    /// Capped at 9999-12-31T23:59:59Z, the last instant RFC 3339 can express.
    #[serde(default)]
    #[validate(range(min = 0i64, max = 253_402_300_799i64))]
    pub rxpk_date: i64,

    /// Size of the random PHY payload sent by each node.
    #[serde(default = "default_payload_len")]
    #[validate(range(max = 255))]
    pub payload_len: usize,
}

fn default_nb_gateway() -> usize {
    1
}

fn default_nb_node() -> usize {
    1
}

fn default_ns_address() -> String {
    "127.0.0.1:1700".into()
}

fn default_send_interval_ms() -> u64 {
    1000
}

fn default_payload_len() -> usize {
    16
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            nb_gateway: default_nb_gateway(),
            min_nb_node: default_nb_node(),
            max_nb_node: default_nb_node(),
            ns_address: default_ns_address(),
            send_interval_ms: default_send_interval_ms(),
            rxpk_date: 0,
            payload_len: default_payload_len(),
        }
    }
}

impl GatewayConfig {
    /// Checks the cross-field node bounds the derive cannot express.
    pub fn check_node_range(&self) -> Result<(), ConfigError> {
        if self.min_nb_node > self.max_nb_node {
            return Err(ConfigError::NodeRange {
                min: self.min_nb_node,
                max: self.max_nb_node,
            });
        }
        Ok(())
    }
}
