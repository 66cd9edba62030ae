//! Batch intake: validate a request, turn items into jobs, enqueue atomically.
//!
//! Validation runs entirely before the queue is touched, and the jobs are
//! pushed with a single `push_batch`, so a batch is either queued whole or
//! not at all.

use alloy::primitives::U256;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chain::registry::ChainRegistry;
use crate::chain::tron::is_tron_address;
use crate::chain::types::ChainType;
use crate::observability::metrics;
use crate::payout::queue::JobQueue;
use crate::payout::types::{
    BatchPayoutRequest, BatchPayoutResponse, BatchStatus, Job, PayoutError, ValidationError,
};

pub struct BatchIntake {
    registry: Arc<ChainRegistry>,
    queue: Arc<dyn JobQueue>,
    max_batch_items: usize,
}

impl BatchIntake {
    pub fn new(registry: Arc<ChainRegistry>, queue: Arc<dyn JobQueue>, max_batch_items: usize) -> Self {
        Self {
            registry,
            queue,
            max_batch_items,
        }
    }

    /// Validate and enqueue a batch.
    pub async fn submit(&self, request: BatchPayoutRequest) -> Result<BatchPayoutResponse, PayoutError> {
        tracing::info!(
            batch_id = %request.batch_id,
            chain_id = request.chain_id,
            items = request.items.len(),
            "Submitting batch payout"
        );

        let jobs = match self.validate(&request) {
            Ok(jobs) => jobs,
            Err(e) => {
                metrics::record_batch_rejected(rejection_reason(&e));
                tracing::warn!(batch_id = %request.batch_id, error = %e, "Batch rejected");
                return Err(e);
            }
        };

        let count = jobs.len();
        if let Err(e) = self.queue.push_batch(jobs).await {
            metrics::record_batch_rejected("queue");
            tracing::warn!(batch_id = %request.batch_id, error = %e, "Batch could not be queued");
            return Err(e.into());
        }

        metrics::record_batch_accepted(request.chain_id, count);
        tracing::info!(batch_id = %request.batch_id, jobs = count, "Batch queued");

        Ok(BatchPayoutResponse {
            batch_id: request.batch_id,
            status: BatchStatus::Queued,
            message: format!("Queued {} payments for processing", count),
        })
    }

    /// Check the whole request and build its jobs without side effects.
    pub fn validate(&self, request: &BatchPayoutRequest) -> Result<Vec<Job>, PayoutError> {
        if request.batch_id.trim().is_empty() {
            return Err(ValidationError::batch("batch_id is required").into());
        }
        if request.user_id.trim().is_empty() {
            return Err(ValidationError::batch("user_id is required").into());
        }
        if request.from_address.trim().is_empty() {
            return Err(ValidationError::batch("from_address is required").into());
        }
        if request.items.is_empty() {
            return Err(ValidationError::batch("at least one item is required").into());
        }
        if request.items.len() > self.max_batch_items {
            return Err(ValidationError::batch(format!(
                "too many items: {} (max {})",
                request.items.len(),
                self.max_batch_items
            ))
            .into());
        }

        let chain = self
            .registry
            .get(request.chain_id)
            .ok_or(PayoutError::UnsupportedChain(request.chain_id))?;
        let chain_type = chain.config.chain_type;

        if !is_valid_address(chain_type, &request.from_address) {
            return Err(ValidationError::batch(format!("invalid {} from_address", chain_label(chain_type))).into());
        }

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut seen = HashSet::with_capacity(request.items.len());
        let mut jobs = Vec::with_capacity(request.items.len());

        for (i, item) in request.items.iter().enumerate() {
            if item.id.trim().is_empty() {
                return Err(ValidationError::item(i, "id is required").into());
            }
            if !seen.insert(item.id.as_str()) {
                return Err(ValidationError::item(i, format!("duplicate item id '{}'", item.id)).into());
            }
            if item.recipient_address.trim().is_empty() {
                return Err(ValidationError::item(i, "recipient_address is required").into());
            }
            if item.amount.trim().is_empty() {
                return Err(ValidationError::item(i, "amount is required").into());
            }
            if !is_valid_address(chain_type, &item.recipient_address) {
                let reason = match chain_type {
                    ChainType::Tron => "invalid TRON recipient_address (expected Base58 starting with 'T')",
                    ChainType::Evm => "invalid EVM recipient_address",
                };
                return Err(ValidationError::item(i, reason).into());
            }

            let amount = parse_amount(&item.amount).map_err(|reason| ValidationError::item(i, reason))?;

            let token_address = item
                .token_address
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if let Some(token) = token_address.as_deref() {
                if !crate::builder::is_native_token(Some(token)) && !is_valid_address(chain_type, token) {
                    return Err(ValidationError::item(
                        i,
                        format!("invalid {} token_address", chain_label(chain_type)),
                    )
                    .into());
                }
            }

            jobs.push(Job {
                id: item.id.clone(),
                batch_id: request.batch_id.clone(),
                user_id: request.user_id.clone(),
                from_address: request.from_address.clone(),
                to_address: item.recipient_address.clone(),
                amount,
                token_address,
                token_symbol: item.token_symbol.clone(),
                token_decimals: item.token_decimals,
                chain_id: request.chain_id,
                retry_count: 0,
                created_at,
            });
        }

        Ok(jobs)
    }
}

fn rejection_reason(error: &PayoutError) -> &'static str {
    match error {
        PayoutError::UnsupportedChain(_) => "unsupported_chain",
        _ => "validation",
    }
}

fn chain_label(chain_type: ChainType) -> &'static str {
    match chain_type {
        ChainType::Evm => "EVM",
        ChainType::Tron => "TRON",
    }
}

fn is_valid_address(chain_type: ChainType, address: &str) -> bool {
    match chain_type {
        ChainType::Evm => is_evm_address(address),
        ChainType::Tron => is_tron_address(address),
    }
}

/// `0x` followed by 40 hex digits, any case.
pub fn is_evm_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Base-10 unsigned integer string, non-zero, fitting in 256 bits.
pub fn parse_amount(amount: &str) -> Result<U256, String> {
    let amount = amount.trim();
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("amount '{}' is not a base-10 integer", amount));
    }
    let value = U256::from_str_radix(amount, 10).map_err(|_| format!("amount '{}' exceeds 256 bits", amount))?;
    if value.is_zero() {
        return Err("amount must be greater than zero".to_string());
    }
    Ok(value)
}
