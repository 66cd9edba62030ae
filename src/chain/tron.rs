//! TRON full-node client (HTTP wallet API).
//!
//! TRON has no account nonce: the node builds the transaction (reference
//! block + expiration) and returns it unsigned together with its id, the
//! SHA-256 of `raw_data_hex`. We sign that id and broadcast the result.
//!
//! All calls use `visible: true`, so addresses travel in Base58Check form.

use alloy::primitives::{hex, Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::chain::types::{ChainConfig, ChainError, ChainResult};

/// Version byte prefixed to every mainnet/testnet TRON address.
pub const TRON_ADDRESS_PREFIX: u8 = 0x41;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// An unsigned (or signed) transaction as returned by the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TronTransaction {
    #[serde(rename = "txID")]
    pub tx_id: String,
    pub raw_data: Value,
    pub raw_data_hex: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature: Vec<String>,
    #[serde(default)]
    pub visible: bool,
}

/// The subset of the TRON wallet API the payout pipeline needs.
#[async_trait]
pub trait TronRpc: Send + Sync {
    /// Build a native TRX transfer of `amount` SUN.
    async fn create_transfer(&self, owner: &str, to: &str, amount: i64) -> ChainResult<TronTransaction>;

    /// Build a TRC20 `transfer(address,uint256)` call capped at `fee_limit` SUN.
    async fn trigger_trc20_transfer(
        &self,
        owner: &str,
        contract: &str,
        to: Address,
        amount: U256,
        fee_limit: i64,
    ) -> ChainResult<TronTransaction>;

    /// Broadcast a signed transaction, returning its id.
    async fn broadcast(&self, tx: &TronTransaction) -> ChainResult<String>;
}

/// HTTP client for a TRON full node.
#[derive(Debug, Clone)]
pub struct TronClient {
    http: reqwest::Client,
    base_url: String,
    chain_id: u64,
    timeout_secs: u64,
}

impl TronClient {
    /// Create a client and probe the node with `getnowblock`.
    pub async fn connect(config: &ChainConfig, rpc_timeout: Duration) -> ChainResult<Self> {
        let base: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;

        let http = reqwest::Client::builder()
            .timeout(rpc_timeout)
            .build()
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        let client = Self {
            http,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            chain_id: config.chain_id,
            timeout_secs: rpc_timeout.as_secs(),
        };

        let block = client.post("getnowblock", json!({})).await?;
        let height = block
            .pointer("/block_header/raw_data/number")
            .and_then(Value::as_u64)
            .ok_or_else(|| ChainError::MalformedResponse("getnowblock without block number".into()))?;

        tracing::info!(
            rpc_url = %client.base_url,
            chain_id = client.chain_id,
            block = height,
            "TRON client connected"
        );
        Ok(client)
    }

    async fn post(&self, method: &str, body: Value) -> ChainResult<Value> {
        let url = format!("{}/wallet/{}", self.base_url, method);
        let response = self.http.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ChainError::Timeout(self.timeout_secs)
            } else {
                ChainError::Rpc(format!("{}: {}", method, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Rpc(format!("{} returned HTTP {}", method, status)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ChainError::MalformedResponse(format!("{}: {}", method, e)))?;

        // The node reports most failures as HTTP 200 with an "Error" field.
        if let Some(err) = value.get("Error").and_then(Value::as_str) {
            return Err(ChainError::Rejected(err.to_string()));
        }
        Ok(value)
    }
}

#[async_trait]
impl TronRpc for TronClient {
    async fn create_transfer(&self, owner: &str, to: &str, amount: i64) -> ChainResult<TronTransaction> {
        let value = self
            .post(
                "createtransaction",
                json!({
                    "owner_address": owner,
                    "to_address": to,
                    "amount": amount,
                    "visible": true,
                }),
            )
            .await?;
        parse_transaction(value)
    }

    async fn trigger_trc20_transfer(
        &self,
        owner: &str,
        contract: &str,
        to: Address,
        amount: U256,
        fee_limit: i64,
    ) -> ChainResult<TronTransaction> {
        let value = self
            .post(
                "triggersmartcontract",
                json!({
                    "owner_address": owner,
                    "contract_address": contract,
                    "function_selector": "transfer(address,uint256)",
                    "parameter": encode_transfer_parameter(to, amount),
                    "fee_limit": fee_limit,
                    "call_value": 0,
                    "visible": true,
                }),
            )
            .await?;

        check_return(value.get("result"))?;
        let tx = value
            .get("transaction")
            .cloned()
            .ok_or_else(|| ChainError::MalformedResponse("node returned no transaction".into()))?;
        parse_transaction(tx)
    }

    async fn broadcast(&self, tx: &TronTransaction) -> ChainResult<String> {
        let body = serde_json::to_value(tx).map_err(|e| ChainError::MalformedResponse(e.to_string()))?;
        let value = self.post("broadcasttransaction", body).await?;

        if value.get("result").and_then(Value::as_bool) == Some(true) {
            let txid = value
                .get("txid")
                .and_then(Value::as_str)
                .unwrap_or(&tx.tx_id)
                .to_string();
            return Ok(txid);
        }

        let code = value.get("code").and_then(Value::as_str).unwrap_or("UNKNOWN");
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(decode_node_message)
            .unwrap_or_default();
        Err(ChainError::Rejected(format!("broadcast rejected (code={}): {}", code, message)))
    }
}

fn parse_transaction(value: Value) -> ChainResult<TronTransaction> {
    if value.get("txID").is_none() {
        return Err(ChainError::MalformedResponse("node returned nil transaction".into()));
    }
    serde_json::from_value(value).map_err(|e| ChainError::MalformedResponse(e.to_string()))
}

/// Fail on a `{"result": {"code": ..., "message": ...}}` return block.
fn check_return(result: Option<&Value>) -> ChainResult<()> {
    let Some(result) = result else {
        return Ok(());
    };
    if result.get("result").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    match result.get("code").and_then(Value::as_str) {
        None | Some("SUCCESS") => Ok(()),
        Some(code) => {
            let message = result
                .get("message")
                .and_then(Value::as_str)
                .map(decode_node_message)
                .unwrap_or_default();
            Err(ChainError::Rejected(format!("{}: {}", code, message)))
        }
    }
}

/// Node messages are hex-encoded UTF-8; fall back to the raw text.
fn decode_node_message(message: &str) -> String {
    match hex::decode(message) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => message.to_string(),
    }
}

/// ABI-encode `(address, uint256)` as the hex `parameter` of a TRC20 transfer.
pub fn encode_transfer_parameter(to: Address, amount: U256) -> String {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(to.as_slice());
    out.extend_from_slice(&amount.to_be_bytes::<32>());
    hex::encode(out)
}

/// Syntactic TRON address check: Base58, 34 characters, leading `T`.
pub fn is_tron_address(address: &str) -> bool {
    address.len() == 34
        && address.starts_with('T')
        && address.chars().all(|c| BASE58_ALPHABET.contains(c))
}

/// Decode a Base58Check TRON address into its 20-byte account id.
pub fn decode_tron_address(address: &str) -> ChainResult<Address> {
    let bytes = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| ChainError::MalformedResponse(format!("invalid TRON address '{}': {}", address, e)))?;

    if bytes.len() != 21 || bytes[0] != TRON_ADDRESS_PREFIX {
        return Err(ChainError::MalformedResponse(format!(
            "invalid TRON address '{}': unexpected payload",
            address
        )));
    }
    Ok(Address::from_slice(&bytes[1..]))
}

/// Encode a 20-byte account id as a Base58Check TRON address.
pub fn encode_tron_address(address: Address) -> String {
    let mut bytes = Vec::with_capacity(21);
    bytes.push(TRON_ADDRESS_PREFIX);
    bytes.extend_from_slice(address.as_slice());
    bs58::encode(bytes).with_check().into_string()
}
