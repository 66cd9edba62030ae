//! Shared mocks and fixtures for the integration tests.
//!
//! Nothing here touches the network: EVM and TRON nodes are scripted in
//! memory and the signer is either the well-known Anvil dev key or a stub
//! that always refuses.

#![allow(dead_code)]

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{address, hex, keccak256, Address, Bytes, Signature, TxHash, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use payout_engine::chain::registry::{ChainClient, ChainRegistry};
use payout_engine::chain::tron::{encode_tron_address, TronRpc, TronTransaction};
use payout_engine::chain::types::{ChainError, ChainResult};
use payout_engine::chain::EvmRpc;
use payout_engine::config::schema::{ChainConfig, ChainType, PayoutConfig, SignerProvider};
use payout_engine::payout::types::{BatchPayoutRequest, PayoutItem};
use payout_engine::payout::SignerSet;
use payout_engine::signer::{KeySigner, LocalSigner, SigningError};

/// Anvil account #0.
pub const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_ADDRESS: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

/// Anvil account #1, used as a recipient.
pub const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

pub const ETH_CHAIN: u64 = 1;
pub const POLYGON_CHAIN: u64 = 137;
pub const TRON_CHAIN: u64 = 728126428;

/// Scripted EVM node.
///
/// The pending nonce starts at `base` and advances with every accepted
/// transaction, as a real mempool would. Broadcast outcomes are taken from a
/// script, defaulting to success once the script runs out.
pub struct MockEvmRpc {
    pending: AtomicU64,
    pub nonce_queries: AtomicUsize,
    gas_price: u128,
    estimate: Option<u64>,
    send_delay: Mutex<Duration>,
    script: Mutex<VecDeque<Result<(), String>>>,
    sent: Mutex<Vec<TxEnvelope>>,
}

impl MockEvmRpc {
    pub fn new(base_nonce: u64) -> Self {
        Self {
            pending: AtomicU64::new(base_nonce),
            nonce_queries: AtomicUsize::new(0),
            gas_price: 1_000_000_000,
            estimate: Some(21_000),
            send_delay: Mutex::new(Duration::ZERO),
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Make every `estimate_gas` call fail.
    pub fn without_estimates(mut self) -> Self {
        self.estimate = None;
        self
    }

    pub fn with_send_delay(self, delay: Duration) -> Self {
        *self.send_delay.lock().unwrap() = delay;
        self
    }

    /// Queue broadcast outcomes; `Err(msg)` is returned as a node rejection.
    pub fn script(&self, outcomes: impl IntoIterator<Item = Result<(), String>>) {
        self.script.lock().unwrap().extend(outcomes);
    }

    pub fn sent(&self) -> Vec<TxEnvelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_nonces(&self) -> Vec<u64> {
        self.sent().iter().map(|tx| tx.nonce()).collect()
    }

    pub fn queries(&self) -> usize {
        self.nonce_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvmRpc for MockEvmRpc {
    async fn pending_nonce(&self, _address: Address) -> ChainResult<u64> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.pending.load(Ordering::SeqCst))
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        Ok(self.gas_price)
    }

    async fn estimate_gas(&self, _request: TransactionRequest) -> ChainResult<u64> {
        self.estimate
            .ok_or_else(|| ChainError::Rpc("execution reverted".to_string()))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<TxHash> {
        let delay = *self.send_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if let Err(message) = outcome {
            return Err(ChainError::Rejected(message));
        }

        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| ChainError::MalformedResponse(e.to_string()))?;
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(envelope);
        Ok(keccak256(&raw))
    }
}

/// Scripted TRON full node: builds transactions with a correct id and
/// records whatever gets broadcast.
#[derive(Default)]
pub struct MockTronNode {
    counter: AtomicU64,
    pub broadcasts: Mutex<Vec<TronTransaction>>,
    pub trc20_calls: Mutex<Vec<(String, Address, U256, i64)>>,
    pub reject_broadcast: Option<String>,
}

impl MockTronNode {
    pub fn rejecting(message: &str) -> Self {
        Self {
            reject_broadcast: Some(message.to_string()),
            ..Default::default()
        }
    }

    fn unsigned(&self, seed: &str) -> TronTransaction {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let raw = format!("{}:{}", seed, n).into_bytes();
        TronTransaction {
            tx_id: hex::encode(Sha256::digest(&raw)),
            raw_data: json!({ "seed": seed }),
            raw_data_hex: hex::encode(&raw),
            signature: Vec::new(),
            visible: true,
        }
    }
}

#[async_trait]
impl TronRpc for MockTronNode {
    async fn create_transfer(&self, owner: &str, to: &str, amount: i64) -> ChainResult<TronTransaction> {
        Ok(self.unsigned(&format!("transfer:{}:{}:{}", owner, to, amount)))
    }

    async fn trigger_trc20_transfer(
        &self,
        owner: &str,
        contract: &str,
        to: Address,
        amount: U256,
        fee_limit: i64,
    ) -> ChainResult<TronTransaction> {
        self.trc20_calls
            .lock()
            .unwrap()
            .push((contract.to_string(), to, amount, fee_limit));
        Ok(self.unsigned(&format!("trc20:{}:{}", owner, contract)))
    }

    async fn broadcast(&self, tx: &TronTransaction) -> ChainResult<String> {
        if let Some(message) = &self.reject_broadcast {
            return Err(ChainError::Rejected(message.clone()));
        }
        self.broadcasts.lock().unwrap().push(tx.clone());
        Ok(tx.tx_id.clone())
    }
}

/// Signer that controls `address` but refuses every signature.
pub struct RefusingSigner {
    pub address: Address,
    pub message: String,
}

#[async_trait]
impl KeySigner for RefusingSigner {
    fn provider(&self) -> SignerProvider {
        SignerProvider::Vault
    }

    async fn address(&self) -> Result<Address, SigningError> {
        Ok(self.address)
    }

    async fn sign_hash(&self, _hash: B256) -> Result<Signature, SigningError> {
        Err(SigningError::Refused(self.message.clone()))
    }

    async fn close(&self) -> Result<(), SigningError> {
        Ok(())
    }
}

pub fn local_signer() -> Arc<dyn KeySigner> {
    Arc::new(LocalSigner::from_private_key(TEST_PRIVATE_KEY).unwrap())
}

pub fn local_signers() -> SignerSet {
    SignerSet::new(local_signer())
}

pub fn tron_sender() -> String {
    encode_tron_address(TEST_ADDRESS)
}

pub fn chain_config(chain_id: u64, chain_type: ChainType) -> ChainConfig {
    ChainConfig {
        chain_id,
        name: format!("test-{}", chain_id),
        rpc_url: "http://127.0.0.1:1".to_string(),
        rpc_url_env: None,
        failover_urls: Vec::new(),
        explorer_url: String::new(),
        native_token: match chain_type {
            ChainType::Evm => "ETH".to_string(),
            ChainType::Tron => "TRX".to_string(),
        },
        decimals: match chain_type {
            ChainType::Evm => 18,
            ChainType::Tron => 6,
        },
        chain_type,
    }
}

pub fn evm_registry(chains: Vec<(u64, Arc<MockEvmRpc>)>) -> Arc<ChainRegistry> {
    Arc::new(ChainRegistry::from_clients(chains.into_iter().map(|(id, rpc)| {
        (
            chain_config(id, ChainType::Evm),
            ChainClient::Evm(rpc as Arc<dyn EvmRpc>),
        )
    })))
}

/// Config with short deadlines suitable for tests.
pub fn test_config() -> PayoutConfig {
    let mut config = PayoutConfig::default();
    config.chains = Vec::new();
    config.workers.count = 4;
    config.workers.queue_capacity = 100;
    config.workers.job_timeout_secs = 2;
    config.workers.nonce_acquire_timeout_secs = 5;
    config
}

pub fn item(id: &str, recipient: &str, amount: &str) -> PayoutItem {
    PayoutItem {
        id: id.to_string(),
        recipient_address: recipient.to_string(),
        amount: amount.to_string(),
        token_address: None,
        token_symbol: "ETH".to_string(),
        token_decimals: 18,
    }
}

/// A native-token batch of `count` items paying [`RECIPIENT`].
pub fn evm_batch(batch_id: &str, chain_id: u64, count: usize) -> BatchPayoutRequest {
    BatchPayoutRequest {
        batch_id: batch_id.to_string(),
        user_id: "user-1".to_string(),
        from_address: format!("{:#x}", TEST_ADDRESS),
        chain_id,
        items: (0..count)
            .map(|i| item(&format!("{}-item-{}", batch_id, i), RECIPIENT, "1000000000000000"))
            .collect(),
    }
}
