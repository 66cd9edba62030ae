//! EVM JSON-RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to JSON-RPC endpoint (primary + failovers)
//! - Query pending nonce, gas price and gas estimates
//! - Broadcast signed raw transactions
//! - Bound every call by the configured RPC timeout

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::chain::types::{ChainConfig, ChainError, ChainId, ChainResult};

/// The subset of EVM RPC the payout pipeline needs.
///
/// Implemented by [`EvmClient`] against real nodes and by scripted mocks in tests.
#[async_trait]
pub trait EvmRpc: Send + Sync {
    /// Transaction count of `address` at the `pending` block tag.
    async fn pending_nonce(&self, address: Address) -> ChainResult<u64>;

    /// Node's suggested gas price in wei.
    async fn gas_price(&self) -> ChainResult<u128>;

    /// Simulate `request` and return the gas it consumes.
    async fn estimate_gas(&self, request: TransactionRequest) -> ChainResult<u64>;

    /// Broadcast an EIP-2718 encoded signed transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<TxHash>;
}

/// EVM RPC client wrapper with failover support.
#[derive(Clone)]
pub struct EvmClient {
    /// List of providers (primary + failovers).
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    /// Chain this client was configured for.
    chain_id: u64,
    rpc_url: String,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl EvmClient {
    /// Create a new client and verify it talks to the configured chain.
    ///
    /// Fails if the primary URL is invalid, the node cannot be reached, or it
    /// reports a different chain id.
    pub async fn connect(config: &ChainConfig, rpc_timeout: Duration) -> ChainResult<Self> {
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as Arc<dyn Provider + Send + Sync>);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as Arc<dyn Provider + Send + Sync>);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            chain_id: config.chain_id,
            rpc_url: config.rpc_url.clone(),
            timeout_duration: rpc_timeout,
        };

        client.verify_chain_id().await?;
        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id = config.chain_id,
            failovers = config.failover_urls.len(),
            "EVM client connected"
        );

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> ChainResult<ChainId> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_chain_id()).await {
                Ok(Ok(result)) => return Ok(ChainId(result)),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                }
            }
        }
        Err(ChainError::Rpc("All RPC providers failed".to_string()))
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout_duration.as_secs()
    }
}

#[async_trait]
impl EvmRpc for EvmClient {
    async fn pending_nonce(&self, address: Address) -> ChainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.get_transaction_count(address).pending();
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Rpc("All providers failed to get pending nonce".to_string()))
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_gas_price()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Rpc("All providers failed to get gas price".to_string()))
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> ChainResult<u64> {
        // Primary only; a failed estimate falls back to a default limit upstream.
        let fut = self.providers[0].estimate_gas(request);
        match timeout(self.timeout_duration, fut).await {
            Ok(Ok(gas)) => Ok(gas),
            Ok(Err(e)) => Err(ChainError::Rpc(e.to_string())),
            Err(_) => Err(ChainError::Timeout(self.timeout_secs())),
        }
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<TxHash> {
        // Primary only, so node rejections (nonce conflicts included) surface unchanged.
        let fut = self.providers[0].send_raw_transaction(&raw);
        match timeout(self.timeout_duration, fut).await {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) => Err(ChainError::Rejected(e.to_string())),
            Err(_) => Err(ChainError::Timeout(self.timeout_secs())),
        }
    }
}

impl std::fmt::Debug for EvmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmClient")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("providers", &self.providers.len())
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::types::ChainType;

    fn test_config() -> ChainConfig {
        ChainConfig {
            chain_id: 31337, // Anvil default
            name: "Anvil".to_string(),
            rpc_url: "http://127.0.0.1:1".to_string(),
            rpc_url_env: None,
            failover_urls: Vec::new(),
            explorer_url: String::new(),
            native_token: "ETH".to_string(),
            decimals: 18,
            chain_type: ChainType::Evm,
        }
    }

    #[tokio::test]
    async fn test_connect_fails_when_unreachable() {
        let result = EvmClient::connect(&test_config(), Duration::from_secs(2)).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("All RPC providers failed"));
    }

    #[tokio::test]
    async fn test_invalid_primary_url() {
        let mut config = test_config();
        config.rpc_url = "not a url".to_string();
        let err = EvmClient::connect(&config, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("Invalid RPC URL"));
    }
}
