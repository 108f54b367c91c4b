//! Custom validation functions for configuration.

use std::net::SocketAddr;

use regex::Regex;
use validator::ValidationError;

/// Validate that every `remove` fragment compiles as a regular expression.
pub fn validate_regex_list(patterns: &[String]) -> Result<(), ValidationError> {
    for pattern in patterns {
        if Regex::new(pattern).is_err() {
            let mut error = ValidationError::new("invalid_regex");
            error.add_param("pattern".into(), pattern);
            return Err(error);
        }
    }
    Ok(())
}

/// Validate a `host:port` network server address.
pub fn validate_socket_addr(addr: &str) -> Result<(), ValidationError> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_socket_addr"))
}

/// Validate that no broker address is blank.
pub fn validate_addresses(addresses: &[String]) -> Result<(), ValidationError> {
    if addresses.iter().any(|a| a.trim().is_empty()) {
        return Err(ValidationError::new("blank_address"));
    }
    Ok(())
}
