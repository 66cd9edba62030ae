//! Transaction construction.
//!
//! # Data Flow
//! ```text
//! Job + leased nonce
//!     → evm.rs  (native or ERC20 transfer, gas price + estimate → gas.rs quote)
//!     → TxEip1559 ready for the key signer
//!
//! Job (TRON)
//!     → tron.rs (node builds TRX / TRC20 transfer, tx id verified locally)
//! ```

pub mod evm;
pub mod gas;
pub mod tron;

use alloy::primitives::Address;
use thiserror::Error;

use crate::chain::types::ChainError;

pub use evm::{BuiltTransaction, EvmTxBuilder};
pub use gas::{GasEstimate, GasPolicy, GasQuote, TransferKind};
pub use tron::TronTxBuilder;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to get gas price: {0}")]
    GasPrice(ChainError),

    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("amount {0} out of range for this chain")]
    AmountOutOfRange(String),

    #[error("node failed to build transaction: {0}")]
    Node(ChainError),

    #[error("transaction id mismatch: node sent {reported}, raw data hashes to {computed}")]
    TxIdMismatch { reported: String, computed: String },
}

/// Absent, empty or zero token address means a native-asset transfer.
pub fn is_native_token(token_address: Option<&str>) -> bool {
    match token_address.map(str::trim) {
        None | Some("") | Some("0") | Some("0x") => true,
        Some(value) => value.parse::<Address>().map(|a| a == Address::ZERO).unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_native_token() {
        assert!(is_native_token(None));
        assert!(is_native_token(Some("")));
        assert!(is_native_token(Some("0x0000000000000000000000000000000000000000")));
        assert!(!is_native_token(Some("0xdAC17F958D2ee523a2206206994597C13D831ec7")));
        assert!(!is_native_token(Some("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t")));
    }
}
