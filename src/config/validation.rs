//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, URLs and value ranges
//! - Make sure every prefix pattern compiles
//! - Detect conflicting targets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), ValidationErrors>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use axum::http::Method;
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("backend.base_url: {0}")]
    InvalidBackendUrl(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("normalization.volatile_keys: empty key name")]
    EmptyVolatileKey,
    #[error("normalization.prefix_patterns: {pattern:?} does not compile: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("targets.{name}: path {path:?} must start with '/'")]
    InvalidTargetPath { name: String, path: String },
    #[error("targets.{name}: invalid method {method:?}")]
    InvalidTargetMethod { name: String, method: String },
    #[error("targets.{name}: no methods configured")]
    NoTargetMethods { name: String },
    #[error("targets: path {0:?} configured more than once")]
    DuplicateTarget(String),
    #[error("status.path: {0:?} must be a literal path below '/'")]
    InvalidStatusPath(String),
}

/// Every validation error found in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &ProxyConfig) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    match Url::parse(&config.backend.base_url) {
        Ok(url) if url.scheme() != "http" => errors.push(ValidationError::InvalidBackendUrl(format!(
            "unsupported scheme {:?}, only http is supported",
            url.scheme()
        ))),
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::InvalidBackendUrl("missing host".to_string()))
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::InvalidBackendUrl(e.to_string())),
    }

    let positive = [
        ("backend.max_connections", config.backend.max_connections as u64),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("normalization.max_body_bytes", config.normalization.max_body_bytes as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    let normalization = &config.normalization;
    if normalization.volatile_keys.iter().any(|k| k.is_empty()) {
        errors.push(ValidationError::EmptyVolatileKey);
    }
    for pattern in &normalization.prefix_patterns {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }

    let mut seen = HashSet::new();
    for target in &config.targets {
        if !target.path.starts_with('/') {
            errors.push(ValidationError::InvalidTargetPath {
                name: target.name.clone(),
                path: target.path.clone(),
            });
        }
        if target.methods.is_empty() {
            errors.push(ValidationError::NoTargetMethods { name: target.name.clone() });
        }
        for method in &target.methods {
            if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
                errors.push(ValidationError::InvalidTargetMethod {
                    name: target.name.clone(),
                    method: method.clone(),
                });
            }
        }
        if !seen.insert(target.path.as_str()) {
            errors.push(ValidationError::DuplicateTarget(target.path.clone()));
        }
    }

    if let Some(path) = &config.status.path {
        if !path.starts_with('/') || path == "/" || path.contains(['{', '}', '*']) {
            errors.push(ValidationError::InvalidStatusPath(path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
