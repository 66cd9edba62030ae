//! Chain-specific types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export ChainConfig from config module to avoid duplication
pub use crate::config::schema::{ChainConfig, ChainType};

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur while talking to a chain node.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// The node answered but the payload could not be understood.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The node refused the request (e.g. broadcast rejected).
    #[error("Node rejected request: {0}")]
    Rejected(String),
}

impl ChainError {
    /// Whether the node's message points at a nonce problem
    /// (stale cache, external nonce bump, reorg).
    pub fn is_nonce_error(&self) -> bool {
        is_nonce_message(&self.to_string())
    }
}

/// Case-insensitive check for nonce-related error text.
pub fn is_nonce_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("nonce")
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
