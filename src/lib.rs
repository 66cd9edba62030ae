//! Multi-chain batch payout engine.

pub mod builder;
pub mod chain;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod nonce;
pub mod observability;
pub mod payout;
pub mod signer;

pub use config::schema::PayoutConfig;
pub use http::HttpServer;
pub use lifecycle::{PayoutService, Shutdown};
