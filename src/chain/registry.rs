//! Chain registry: one client per configured chain id.
//!
//! Populated once at startup. A chain whose node cannot be reached (or
//! reports another chain id) is logged and omitted; only that chain is
//! affected. The registry is never mutated afterwards, so it is shared
//! behind an `Arc` without locking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use crate::chain::evm::{EvmClient, EvmRpc};
use crate::chain::tron::{TronClient, TronRpc};
use crate::chain::types::{ChainConfig, ChainResult, ChainType};

/// Client for one chain, tagged by family.
#[derive(Clone)]
pub enum ChainClient {
    Evm(Arc<dyn EvmRpc>),
    Tron(Arc<dyn TronRpc>),
}

impl ChainClient {
    pub fn chain_type(&self) -> ChainType {
        match self {
            ChainClient::Evm(_) => ChainType::Evm,
            ChainClient::Tron(_) => ChainType::Tron,
        }
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChainClient::{}", self.chain_type())
    }
}

/// A reachable chain and its client.
#[derive(Debug, Clone)]
pub struct RegisteredChain {
    pub config: ChainConfig,
    pub client: ChainClient,
}

#[derive(Debug, Default)]
pub struct ChainRegistry {
    chains: HashMap<u64, RegisteredChain>,
}

impl ChainRegistry {
    /// Connect every configured chain concurrently, dropping the unreachable ones.
    pub async fn connect(configs: &[ChainConfig], rpc_timeout: Duration) -> Self {
        let attempts = configs.iter().map(|config| async move {
            (config, connect_client(config, rpc_timeout).await)
        });

        let mut chains = HashMap::new();
        for (config, result) in join_all(attempts).await {
            match result {
                Ok(client) => {
                    chains.insert(
                        config.chain_id,
                        RegisteredChain {
                            config: config.clone(),
                            client,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        chain_id = config.chain_id,
                        chain = %config.name,
                        error = %e,
                        "Chain unreachable, omitting from registry"
                    );
                }
            }
        }

        tracing::info!(
            registered = chains.len(),
            configured = configs.len(),
            "Chain registry ready"
        );
        Self { chains }
    }

    /// Build a registry from already-constructed clients.
    pub fn from_clients(entries: impl IntoIterator<Item = (ChainConfig, ChainClient)>) -> Self {
        let chains = entries
            .into_iter()
            .map(|(config, client)| (config.chain_id, RegisteredChain { config, client }))
            .collect();
        Self { chains }
    }

    pub fn get(&self, chain_id: u64) -> Option<&RegisteredChain> {
        self.chains.get(&chain_id)
    }

    pub fn client(&self, chain_id: u64) -> Option<&ChainClient> {
        self.chains.get(&chain_id).map(|c| &c.client)
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.chains.contains_key(&chain_id)
    }

    /// Registered chains sorted by id.
    pub fn chains(&self) -> Vec<&RegisteredChain> {
        let mut chains: Vec<_> = self.chains.values().collect();
        chains.sort_by_key(|c| c.config.chain_id);
        chains
    }

    /// EVM clients keyed by chain id, as nonce sources.
    pub fn evm_clients(&self) -> HashMap<u64, Arc<dyn EvmRpc>> {
        self.chains
            .iter()
            .filter_map(|(id, chain)| match &chain.client {
                ChainClient::Evm(client) => Some((*id, Arc::clone(client))),
                ChainClient::Tron(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

async fn connect_client(config: &ChainConfig, rpc_timeout: Duration) -> ChainResult<ChainClient> {
    match config.chain_type {
        ChainType::Evm => {
            let client = EvmClient::connect(config, rpc_timeout).await?;
            Ok(ChainClient::Evm(Arc::new(client)))
        }
        ChainType::Tron => {
            let client = TronClient::connect(config, rpc_timeout).await?;
            Ok(ChainClient::Tron(Arc::new(client)))
        }
    }
}
