//! EVM gas policy.
//!
//! Deterministic buffers, integer arithmetic only:
//! - tip cap   = price * price_buffer% / 100
//! - fee cap   = tip cap * fee_cap_multiplier
//! - gas limit = estimate (or per-kind fallback) * limit_buffer% / 100

use crate::config::schema::GasConfig;

/// What is being transferred; selects the fallback gas limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Native,
    Token,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Native => "native",
            TransferKind::Token => "token",
        }
    }
}

/// Source of the unbuffered gas limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasEstimate {
    Estimated(u64),
    /// Estimation failed; the per-kind default was substituted.
    Fallback(u64),
}

impl GasEstimate {
    pub fn gas(&self) -> u64 {
        match self {
            GasEstimate::Estimated(gas) | GasEstimate::Fallback(gas) => *gas,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, GasEstimate::Fallback(_))
    }
}

/// Final fee fields of a dynamic-fee transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasQuote {
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub estimate: GasEstimate,
}

#[derive(Debug, Clone)]
pub struct GasPolicy {
    config: GasConfig,
}

impl GasPolicy {
    pub fn new(config: GasConfig) -> Self {
        Self { config }
    }

    pub fn fallback_gas(&self, kind: TransferKind) -> u64 {
        match kind {
            TransferKind::Native => self.config.native_fallback_gas,
            TransferKind::Token => self.config.token_fallback_gas,
        }
    }

    /// Buffered gas price, used as the priority fee.
    pub fn buffered_price(&self, suggested: u128) -> u128 {
        suggested.saturating_mul(self.config.price_buffer_percent as u128) / 100
    }

    pub fn buffered_limit(&self, gas: u64) -> u64 {
        let buffered = (gas as u128) * (self.config.limit_buffer_percent as u128) / 100;
        u64::try_from(buffered).unwrap_or(u64::MAX)
    }

    pub fn quote(&self, suggested_price: u128, estimate: GasEstimate) -> GasQuote {
        let tip = self.buffered_price(suggested_price);
        GasQuote {
            gas_limit: self.buffered_limit(estimate.gas()),
            max_fee_per_gas: tip.saturating_mul(self.config.fee_cap_multiplier as u128),
            max_priority_fee_per_gas: tip,
            estimate,
        }
    }
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self::new(GasConfig::default())
    }
}
