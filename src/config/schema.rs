//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the payout
//! engine. All types derive Serde traits for deserialization from config files;
//! every section has defaults so an empty file is a valid configuration.
//!
//! Types holding secrets implement `Debug` by hand and print `<redacted>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default TRC20 fee ceiling: 100 TRX in SUN.
pub const DEFAULT_TRC20_FEE_LIMIT: i64 = 100_000_000;

/// Root configuration for the payout engine.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PayoutConfig {
    /// Deployment environment label (development, staging, production).
    pub environment: String,

    /// Bearer secret required on `/v1/*` when set.
    pub api_secret: Option<String>,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Key signer backend selection.
    pub kms: KmsConfig,

    /// TRON-specific signing and fee settings.
    pub tron: TronConfig,

    /// Gas pricing policy for EVM chains.
    pub gas: GasConfig,

    /// Worker pool and queue settings.
    pub workers: WorkerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Supported chains.
    pub chains: Vec<ChainConfig>,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            api_secret: None,
            listener: ListenerConfig::default(),
            kms: KmsConfig::default(),
            tron: TronConfig::default(),
            gas: GasConfig::default(),
            workers: WorkerConfig::default(),
            observability: ObservabilityConfig::default(),
            chains: default_chains(),
        }
    }
}

impl PayoutConfig {
    /// Look up a configured chain by id.
    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}

impl fmt::Debug for PayoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayoutConfig")
            .field("environment", &self.environment)
            .field("api_secret", &redact(&self.api_secret))
            .field("listener", &self.listener)
            .field("kms", &self.kms)
            .field("tron", &self.tron)
            .field("gas", &self.gas)
            .field("workers", &self.workers)
            .field("observability", &self.observability)
            .field("chains", &self.chains)
            .finish()
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    match secret {
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum accepted request body.
    pub max_body_bytes: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 30,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Which backend holds the payout signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerProvider {
    #[default]
    Local,
    Aws,
    Gcp,
    Vault,
}

impl SignerProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignerProvider::Local => "local",
            SignerProvider::Aws => "aws",
            SignerProvider::Gcp => "gcp",
            SignerProvider::Vault => "vault",
        }
    }
}

impl fmt::Display for SignerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignerProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "local" => Ok(SignerProvider::Local),
            "aws" => Ok(SignerProvider::Aws),
            "gcp" => Ok(SignerProvider::Gcp),
            "vault" => Ok(SignerProvider::Vault),
            other => Err(format!("unknown KMS provider '{}'", other)),
        }
    }
}

/// Key signer configuration. Only the fields of the selected provider are read.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KmsConfig {
    pub provider: SignerProvider,

    /// Hex-encoded secp256k1 key for the `local` provider.
    pub local_private_key: Option<String>,

    pub aws_region: String,
    pub aws_key_id: String,

    pub gcp_project_id: String,
    pub gcp_location_id: String,
    pub gcp_key_ring_id: String,
    pub gcp_key_id: String,
    pub gcp_key_version: u64,

    /// Vault server, e.g. "https://vault.internal:8200".
    pub vault_address: String,
    pub vault_token: Option<String>,
    /// Mount path of the Transit secrets engine.
    pub vault_mount_path: String,
    pub vault_key_name: String,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            provider: SignerProvider::Local,
            local_private_key: None,
            aws_region: String::new(),
            aws_key_id: String::new(),
            gcp_project_id: String::new(),
            gcp_location_id: String::new(),
            gcp_key_ring_id: String::new(),
            gcp_key_id: String::new(),
            gcp_key_version: 1,
            vault_address: String::new(),
            vault_token: None,
            vault_mount_path: "transit".to_string(),
            vault_key_name: String::new(),
        }
    }
}

impl fmt::Debug for KmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsConfig")
            .field("provider", &self.provider)
            .field("local_private_key", &redact(&self.local_private_key))
            .field("aws_region", &self.aws_region)
            .field("aws_key_id", &self.aws_key_id)
            .field("gcp_project_id", &self.gcp_project_id)
            .field("gcp_location_id", &self.gcp_location_id)
            .field("gcp_key_ring_id", &self.gcp_key_ring_id)
            .field("gcp_key_id", &self.gcp_key_id)
            .field("gcp_key_version", &self.gcp_key_version)
            .field("vault_address", &self.vault_address)
            .field("vault_token", &redact(&self.vault_token))
            .field("vault_mount_path", &self.vault_mount_path)
            .field("vault_key_name", &self.vault_key_name)
            .finish()
    }
}

/// TRON signing and fee settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TronConfig {
    /// Dedicated TRON key; the EVM local key is used when unset.
    pub private_key: Option<String>,

    /// Energy fee ceiling for TRC20 transfers, in SUN.
    pub trc20_fee_limit: i64,
}

impl Default for TronConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            trc20_fee_limit: DEFAULT_TRC20_FEE_LIMIT,
        }
    }
}

impl fmt::Debug for TronConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TronConfig")
            .field("private_key", &redact(&self.private_key))
            .field("trc20_fee_limit", &self.trc20_fee_limit)
            .finish()
    }
}

/// Gas policy for EVM chains. Percentages are applied as `x * pct / 100`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GasConfig {
    pub price_buffer_percent: u64,
    pub limit_buffer_percent: u64,
    /// Fee cap = buffered price * multiplier.
    pub fee_cap_multiplier: u64,
    /// Gas limit used when estimating a native transfer fails.
    pub native_fallback_gas: u64,
    /// Gas limit used when estimating a token transfer fails.
    pub token_fallback_gas: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            price_buffer_percent: 120,
            limit_buffer_percent: 120,
            fee_cap_multiplier: 2,
            native_fallback_gas: 21_000,
            token_fallback_gas: 100_000,
        }
    }
}

/// Worker pool, queue and deadline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent job workers.
    pub count: usize,

    /// Maximum jobs waiting in the queue.
    pub queue_capacity: usize,

    /// Maximum items accepted in a single batch.
    pub max_batch_items: usize,

    /// Deadline for build + sign + submit of one job.
    pub job_timeout_secs: u64,

    /// How long a job may wait for the nonce lease of its sender.
    pub nonce_acquire_timeout_secs: u64,

    /// Deadline of each individual chain RPC call.
    pub rpc_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 4,
            queue_capacity: 10_000,
            max_batch_items: 500,
            job_timeout_secs: 60,
            nonce_acquire_timeout_secs: 120,
            rpc_timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Chain family; selects client, builder and fee policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Evm,
    Tron,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainType::Evm => "evm",
            ChainType::Tron => "tron",
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one supported chain.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,

    /// Primary RPC endpoint (JSON-RPC for EVM, HTTP wallet API for TRON).
    pub rpc_url: String,

    /// Environment variable that overrides `rpc_url` when set.
    #[serde(default)]
    pub rpc_url_env: Option<String>,

    /// Failover JSON-RPC endpoints, tried in order.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    #[serde(default)]
    pub explorer_url: String,

    pub native_token: String,

    #[serde(default = "default_decimals")]
    pub decimals: u8,

    #[serde(rename = "type")]
    pub chain_type: ChainType,
}

fn default_decimals() -> u8 {
    18
}

#[allow(clippy::too_many_arguments)]
fn chain(
    chain_id: u64,
    name: &str,
    rpc_url: &str,
    env: &str,
    explorer_url: &str,
    native_token: &str,
    decimals: u8,
    chain_type: ChainType,
) -> ChainConfig {
    ChainConfig {
        chain_id,
        name: name.to_string(),
        rpc_url: rpc_url.to_string(),
        rpc_url_env: Some(env.to_string()),
        failover_urls: Vec::new(),
        explorer_url: explorer_url.to_string(),
        native_token: native_token.to_string(),
        decimals,
        chain_type,
    }
}

/// Built-in chain table used when the config file lists no chains.
pub fn default_chains() -> Vec<ChainConfig> {
    use ChainType::{Evm, Tron};
    vec![
        chain(1, "Ethereum", "https://eth.llamarpc.com", "ETH_RPC_URL", "https://etherscan.io", "ETH", 18, Evm),
        chain(137, "Polygon", "https://polygon-rpc.com", "POLYGON_RPC_URL", "https://polygonscan.com", "MATIC", 18, Evm),
        chain(42161, "Arbitrum", "https://arb1.arbitrum.io/rpc", "ARBITRUM_RPC_URL", "https://arbiscan.io", "ETH", 18, Evm),
        chain(8453, "Base", "https://mainnet.base.org", "BASE_RPC_URL", "https://basescan.org", "ETH", 18, Evm),
        chain(10, "Optimism", "https://mainnet.optimism.io", "OPTIMISM_RPC_URL", "https://optimistic.etherscan.io", "ETH", 18, Evm),
        chain(728126428, "TRON Mainnet", "https://api.trongrid.io", "TRON_RPC_URL", "https://tronscan.org", "TRX", 6, Tron),
        chain(3448148188, "TRON Nile Testnet", "https://nile.trongrid.io", "TRON_TESTNET_RPC_URL", "https://nile.tronscan.org", "TRX", 6, Tron),
    ]
}
