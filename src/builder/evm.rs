//! EVM transaction building.
//!
//! # Responsibilities
//! - Pick native vs. ERC20 transfer from the job's token address
//! - Query gas price and estimate gas, falling back to per-kind defaults
//! - Produce an unsigned EIP-1559 transaction with the leased nonce

use alloy::consensus::TxEip1559;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::builder::gas::{GasEstimate, GasPolicy, GasQuote, TransferKind};
use crate::builder::{is_native_token, BuildError};
use crate::chain::evm::EvmRpc;
use crate::observability::metrics;
use crate::payout::types::Job;

sol! {
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// An unsigned transaction and how its fees were derived.
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub tx: TxEip1559,
    pub quote: GasQuote,
    pub kind: TransferKind,
}

#[derive(Debug, Clone, Default)]
pub struct EvmTxBuilder {
    policy: GasPolicy,
}

impl EvmTxBuilder {
    pub fn new(policy: GasPolicy) -> Self {
        Self { policy }
    }

    /// Build the transfer described by `job`, sent from `from` with `nonce`.
    pub async fn build(
        &self,
        client: &dyn EvmRpc,
        job: &Job,
        from: Address,
        nonce: u64,
    ) -> Result<BuiltTransaction, BuildError> {
        let recipient = parse_address("recipient_address", &job.to_address)?;

        let (kind, to, value, input) = if is_native_token(job.token_address.as_deref()) {
            (TransferKind::Native, recipient, job.amount, Bytes::new())
        } else {
            let token = parse_address("token_address", job.token_address.as_deref().unwrap_or_default())?;
            let call = IERC20::transferCall {
                to: recipient,
                amount: job.amount,
            };
            (TransferKind::Token, token, U256::ZERO, Bytes::from(call.abi_encode()))
        };

        let gas_price = client.gas_price().await.map_err(BuildError::GasPrice)?;

        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value)
            .with_input(input.clone());

        let estimate = match client.estimate_gas(request).await {
            Ok(gas) => GasEstimate::Estimated(gas),
            Err(e) => {
                let fallback = self.policy.fallback_gas(kind);
                tracing::warn!(
                    job_id = %job.id,
                    chain_id = job.chain_id,
                    kind = kind.as_str(),
                    fallback,
                    error = %e,
                    "Gas estimation failed, using default limit"
                );
                metrics::record_gas_estimation_fallback(job.chain_id, kind.as_str());
                GasEstimate::Fallback(fallback)
            }
        };

        let quote = self.policy.quote(gas_price, estimate);
        let tx = TxEip1559 {
            chain_id: job.chain_id,
            nonce,
            gas_limit: quote.gas_limit,
            max_fee_per_gas: quote.max_fee_per_gas,
            max_priority_fee_per_gas: quote.max_priority_fee_per_gas,
            to: TxKind::Call(to),
            value,
            input,
            ..Default::default()
        };

        tracing::debug!(
            job_id = %job.id,
            chain_id = job.chain_id,
            nonce,
            kind = kind.as_str(),
            gas_limit = quote.gas_limit,
            max_fee_per_gas = quote.max_fee_per_gas,
            "Transaction built"
        );

        Ok(BuiltTransaction { tx, quote, kind })
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, BuildError> {
    value.trim().parse().map_err(|_| BuildError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}
