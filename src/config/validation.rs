//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, buffers >= 100%)
//! - Check that the selected KMS provider has its parameters
//! - Detect duplicate chain ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PayoutConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{PayoutConfig, SignerProvider};

/// One semantic problem, located by its dotted config path.
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &PayoutConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    let workers = &config.workers;
    for (field, value) in [
        ("workers.count", workers.count as u64),
        ("workers.queue_capacity", workers.queue_capacity as u64),
        ("workers.max_batch_items", workers.max_batch_items as u64),
        ("workers.job_timeout_secs", workers.job_timeout_secs),
        ("workers.nonce_acquire_timeout_secs", workers.nonce_acquire_timeout_secs),
        ("workers.rpc_timeout_secs", workers.rpc_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }

    let gas = &config.gas;
    if gas.price_buffer_percent < 100 {
        errors.push(ValidationError::new("gas.price_buffer_percent", "must be >= 100"));
    }
    if gas.limit_buffer_percent < 100 {
        errors.push(ValidationError::new("gas.limit_buffer_percent", "must be >= 100"));
    }
    if gas.fee_cap_multiplier < 1 {
        errors.push(ValidationError::new("gas.fee_cap_multiplier", "must be >= 1"));
    }
    if gas.native_fallback_gas == 0 || gas.token_fallback_gas == 0 {
        errors.push(ValidationError::new("gas", "fallback gas limits must be > 0"));
    }

    if config.tron.trc20_fee_limit <= 0 {
        errors.push(ValidationError::new("tron.trc20_fee_limit", "must be > 0"));
    }

    validate_kms(config, &mut errors);

    let mut seen = HashSet::new();
    for (i, chain) in config.chains.iter().enumerate() {
        let field = format!("chains[{}]", i);
        if chain.chain_id == 0 {
            errors.push(ValidationError::new(&field, "chain_id must be > 0"));
        }
        if !seen.insert(chain.chain_id) {
            errors.push(ValidationError::new(&field, format!("duplicate chain_id {}", chain.chain_id)));
        }
        if chain.rpc_url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(&field, format!("invalid rpc_url '{}'", chain.rpc_url)));
        }
        for url in &chain.failover_urls {
            if url.parse::<url::Url>().is_err() {
                errors.push(ValidationError::new(&field, format!("invalid failover url '{}'", url)));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_kms(config: &PayoutConfig, errors: &mut Vec<ValidationError>) {
    let kms = &config.kms;
    let mut require = |field: &str, value: &str| {
        if value.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("kms.{}", field),
                format!("required for provider '{}'", kms.provider),
            ));
        }
    };

    match kms.provider {
        // Checked when the signer is built, so config-only tooling works without a key.
        SignerProvider::Local => {}
        SignerProvider::Aws => {
            require("aws_region", &kms.aws_region);
            require("aws_key_id", &kms.aws_key_id);
        }
        SignerProvider::Gcp => {
            require("gcp_project_id", &kms.gcp_project_id);
            require("gcp_location_id", &kms.gcp_location_id);
            require("gcp_key_ring_id", &kms.gcp_key_ring_id);
            require("gcp_key_id", &kms.gcp_key_id);
        }
        SignerProvider::Vault => {
            require("vault_address", &kms.vault_address);
            require("vault_token", kms.vault_token.as_deref().unwrap_or_default());
            require("vault_mount_path", &kms.vault_mount_path);
            require("vault_key_name", &kms.vault_key_name);
        }
    }
}
