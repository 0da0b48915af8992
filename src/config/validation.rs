//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, URL parses)
//! - Check catalog integrity (unique aliases, parsable ABIs, declared core events)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use alloy::json_abi::JsonAbi;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.chain.rpc_url.trim().is_empty() {
        errors.push(ValidationError::new("chain.rpc_url", "must not be empty"));
    } else if let Err(e) = url::Url::parse(&config.chain.rpc_url) {
        errors.push(ValidationError::new("chain.rpc_url", format!("invalid URL: {}", e)));
    }
    if config.chain.private_key_env.trim().is_empty() {
        errors.push(ValidationError::new("chain.private_key_env", "must not be empty"));
    }
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be greater than 0"));
    }

    let tx = &config.transactions;
    if tx.default_confirmations == 0 {
        errors.push(ValidationError::new(
            "transactions.default_confirmations",
            "must be at least 1",
        ));
    }
    if tx.confirmation_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "transactions.confirmation_timeout_ms",
            "must be greater than 0",
        ));
    }
    if tx.receipt_poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "transactions.receipt_poll_interval_ms",
            "must be greater than 0",
        ));
    }

    if config.events.poll_interval_ms == 0 {
        errors.push(ValidationError::new("events.poll_interval_ms", "must be greater than 0"));
    }
    if config.events.max_block_range == 0 {
        errors.push(ValidationError::new("events.max_block_range", "must be greater than 0"));
    }
    if config.events.channel_capacity == 0 {
        errors.push(ValidationError::new("events.channel_capacity", "must be greater than 0"));
    }

    let mut aliases = HashSet::new();
    for (i, entry) in config.contracts.iter().enumerate() {
        let field = format!("contracts[{}]", i);
        if entry.alias.trim().is_empty() {
            errors.push(ValidationError::new(&field, "alias must not be empty"));
        } else if !aliases.insert(entry.alias.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate alias '{}'", entry.alias),
            ));
        }

        match JsonAbi::parse(entry.abi.iter().map(String::as_str)) {
            Ok(abi) => {
                for event in &entry.core_events {
                    if abi.event(event).is_none() {
                        errors.push(ValidationError::new(
                            &field,
                            format!("core event '{}' is not declared in the ABI", event),
                        ));
                    }
                }
            }
            Err(e) => {
                errors.push(ValidationError::new(&field, format!("invalid ABI: {}", e)));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
