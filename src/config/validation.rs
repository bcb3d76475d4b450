//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every server address parses and appears once
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::fmt;

use crate::cluster::ServerAddress;
use crate::config::schema::ClientConfig;
use crate::observability::logging::LOG_LEVELS;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NoServers,
    InvalidAddress { address: String, reason: String },
    DuplicateAddress(String),
    ZeroConnectTimeout,
    ZeroResponseLimit,
    ZeroWorkerThreads,
    UnknownLogLevel(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoServers => write!(f, "no servers configured"),
            ValidationError::InvalidAddress { address, reason } => {
                write!(f, "invalid server address '{}': {}", address, reason)
            }
            ValidationError::DuplicateAddress(address) => {
                write!(f, "server '{}' is listed more than once", address)
            }
            ValidationError::ZeroConnectTimeout => write!(f, "dispatch.connect_timeout_ms must be > 0"),
            ValidationError::ZeroResponseLimit => write!(f, "dispatch.max_response_bytes must be > 0"),
            ValidationError::ZeroWorkerThreads => write!(f, "runtime.worker_threads must be > 0"),
            ValidationError::UnknownLogLevel(level) => write!(f, "unknown log level '{}'", level),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.servers.is_empty() {
        errors.push(ValidationError::NoServers);
    }

    let mut seen = HashSet::new();
    for server in &config.servers {
        match server.address.parse::<ServerAddress>() {
            Ok(address) => {
                if !seen.insert(address.clone()) {
                    errors.push(ValidationError::DuplicateAddress(address.to_string()));
                }
            }
            Err(e) => errors.push(ValidationError::InvalidAddress {
                address: server.address.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if config.dispatch.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }
    if config.dispatch.max_response_bytes == 0 {
        errors.push(ValidationError::ZeroResponseLimit);
    }
    if config.runtime.worker_threads == 0 {
        errors.push(ValidationError::ZeroWorkerThreads);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
