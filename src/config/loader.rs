//! Configuration loading from disk and environment.
//!
//! Order: built-in defaults, then the TOML file (if any), then environment
//! variables, then validation. Empty environment values count as unset.

use std::fs;
use std::path::Path;

use crate::config::schema::{PayoutConfig, SignerProvider, DEFAULT_TRC20_FEE_LIMIT};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "PAYOUT_ENGINE_CONFIG";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: String, reason: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, reason } => write!(f, "Invalid {}: {}", var, reason),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a TOML file, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<PayoutConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: PayoutConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load from `PAYOUT_ENGINE_CONFIG` when set, otherwise start from defaults.
pub fn load_from_env() -> Result<PayoutConfig, ConfigError> {
    if let Some(path) = env_lookup(CONFIG_PATH_ENV) {
        return load_config(Path::new(&path));
    }

    let mut config = PayoutConfig::default();
    apply_env_overrides(&mut config)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut PayoutConfig) -> Result<(), ConfigError> {
    apply_overrides(config, env_lookup)
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Apply overrides from an arbitrary key lookup.
pub fn apply_overrides<F>(config: &mut PayoutConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = get("ENVIRONMENT") {
        config.environment = v;
    }
    if let Some(v) = get("API_SECRET") {
        config.api_secret = Some(v);
    }
    if let Some(v) = get("PAYOUT_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = get("PAYOUT_WORKERS") {
        config.workers.count = v.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
            var: "PAYOUT_WORKERS".to_string(),
            reason: e.to_string(),
        })?;
    }

    let kms = &mut config.kms;
    if let Some(v) = get("KMS_PROVIDER") {
        kms.provider = v
            .parse::<SignerProvider>()
            .map_err(|reason| ConfigError::Env { var: "KMS_PROVIDER".to_string(), reason })?;
    }
    if let Some(v) = get("PAYOUT_PRIVATE_KEY") {
        kms.local_private_key = Some(v);
    }
    if let Some(v) = get("AWS_REGION") {
        kms.aws_region = v;
    }
    if let Some(v) = get("AWS_KMS_KEY_ID") {
        kms.aws_key_id = v;
    }
    if let Some(v) = get("GCP_PROJECT_ID") {
        kms.gcp_project_id = v;
    }
    if let Some(v) = get("GCP_LOCATION_ID") {
        kms.gcp_location_id = v;
    }
    if let Some(v) = get("GCP_KEY_RING_ID") {
        kms.gcp_key_ring_id = v;
    }
    if let Some(v) = get("GCP_KEY_ID") {
        kms.gcp_key_id = v;
    }
    if let Some(v) = get("GCP_KEY_VERSION") {
        kms.gcp_key_version = v.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
            var: "GCP_KEY_VERSION".to_string(),
            reason: e.to_string(),
        })?;
    }
    if let Some(v) = get("VAULT_ADDR") {
        kms.vault_address = v;
    }
    if let Some(v) = get("VAULT_TOKEN") {
        kms.vault_token = Some(v);
    }
    if let Some(v) = get("VAULT_MOUNT_PATH") {
        kms.vault_mount_path = v;
    }
    if let Some(v) = get("VAULT_KEY_NAME") {
        kms.vault_key_name = v;
    }

    if let Some(v) = get("TRON_PRIVATE_KEY") {
        config.tron.private_key = Some(v);
    }
    if let Some(v) = get("TRC20_FEE_LIMIT") {
        // Unparsable or non-positive values fall back to the default ceiling.
        config.tron.trc20_fee_limit = match v.trim().parse::<i64>() {
            Ok(limit) if limit > 0 => limit,
            _ => {
                tracing::warn!(value = %v, "Ignoring invalid TRC20_FEE_LIMIT, using default");
                DEFAULT_TRC20_FEE_LIMIT
            }
        };
    }

    for chain in &mut config.chains {
        if let Some(url) = chain.rpc_url_env.as_deref().and_then(&get) {
            chain.rpc_url = url;
        }
    }

    Ok(())
}
