//! TRON transaction building.
//!
//! The node assembles the transaction; we only pick the call, bound the fee
//! and check that the returned id really is SHA-256 of the raw data, so the
//! signer never signs a digest it cannot account for.

use alloy::primitives::{hex, B256, U256};
use sha2::{Digest, Sha256};

use crate::builder::{is_native_token, BuildError};
use crate::chain::tron::{decode_tron_address, TronRpc, TronTransaction};
use crate::payout::types::Job;

#[derive(Debug, Clone)]
pub struct TronTxBuilder {
    fee_limit: i64,
}

impl TronTxBuilder {
    /// `fee_limit` is the TRC20 energy ceiling in SUN.
    pub fn new(fee_limit: i64) -> Self {
        Self { fee_limit }
    }

    pub fn fee_limit(&self) -> i64 {
        self.fee_limit
    }

    /// Ask the node to build the transfer described by `job`, owned by `owner`.
    ///
    /// Returns the unsigned transaction and the digest to sign.
    pub async fn build(
        &self,
        client: &dyn TronRpc,
        job: &Job,
        owner: &str,
    ) -> Result<(TronTransaction, B256), BuildError> {
        let tx = if is_native_token(job.token_address.as_deref()) {
            let amount = sun_amount(job.amount)?;
            client
                .create_transfer(owner, &job.to_address, amount)
                .await
                .map_err(BuildError::Node)?
        } else {
            let contract = job.token_address.as_deref().unwrap_or_default();
            let recipient = decode_tron_address(&job.to_address).map_err(|_| BuildError::InvalidAddress {
                field: "recipient_address",
                value: job.to_address.clone(),
            })?;
            client
                .trigger_trc20_transfer(owner, contract, recipient, job.amount, self.fee_limit)
                .await
                .map_err(BuildError::Node)?
        };

        let digest = verify_tx_id(&tx)?;
        tracing::debug!(job_id = %job.id, chain_id = job.chain_id, tx_id = %tx.tx_id, "TRON transaction built");
        Ok((tx, digest))
    }
}

/// Native TRX amounts are signed 64-bit SUN values on the wire.
fn sun_amount(amount: U256) -> Result<i64, BuildError> {
    if amount > U256::from(i64::MAX as u64) {
        return Err(BuildError::AmountOutOfRange(amount.to_string()));
    }
    Ok(amount.to::<u64>() as i64)
}

/// Check `txID == sha256(raw_data_hex)` and return the id as a digest.
pub fn verify_tx_id(tx: &TronTransaction) -> Result<B256, BuildError> {
    let raw = hex::decode(&tx.raw_data_hex).map_err(|e| BuildError::TxIdMismatch {
        reported: tx.tx_id.clone(),
        computed: format!("<undecodable raw_data_hex: {}>", e),
    })?;
    let computed = B256::from_slice(&Sha256::digest(&raw));

    let reported = hex::decode(&tx.tx_id).ok().filter(|b| b.len() == 32).map(|b| B256::from_slice(&b));
    if reported != Some(computed) {
        return Err(BuildError::TxIdMismatch {
            reported: tx.tx_id.clone(),
            computed: hex::encode(computed),
        });
    }
    Ok(computed)
}
