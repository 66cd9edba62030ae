//! Chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! PayoutConfig.chains
//!     → registry.rs (connect once at startup, omit unreachable chains)
//!     → evm.rs  (JSON-RPC: pending nonce, gas price, estimate, broadcast)
//!     → tron.rs (wallet HTTP API: node-built transactions, broadcast)
//! ```
//!
//! # Constraints
//! - All RPC calls are bounded by the configured timeout
//! - Clients are read-only after construction and shared across workers

pub mod evm;
pub mod registry;
pub mod tron;
pub mod types;

pub use evm::{EvmClient, EvmRpc};
pub use registry::{ChainClient, ChainRegistry, RegisteredChain};
pub use tron::{TronClient, TronRpc, TronTransaction};
pub use types::{ChainError, ChainId, ChainResult};
