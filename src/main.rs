//! Payout engine (v1)
//!
//! Accepts batch payout requests over HTTP and executes each item as a
//! signed transaction on its chain.
//!
//! # Architecture Overview
//!
//! ```text
//!   POST /v1/payouts/batch
//!          │
//!          ▼
//!   ┌─────────────┐    ┌─────────┐    ┌──────────────────────────────────────┐
//!   │ http + auth │───▶│ intake  │───▶│ queue ──▶ workers ──▶ processor       │
//!   └─────────────┘    └─────────┘    │             │                        │
//!                                     │             ├─▶ nonce coordinator    │
//!                                     │             ├─▶ builder (gas policy) │
//!                                     │             ├─▶ key signer           │
//!                                     │             └─▶ chain registry ──────┼──▶ RPC nodes
//!                                     └──────────────────────────────────────┘
//!                                                   │
//!                                                   ▼
//!                                              result sink
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use payout_engine::config::load_from_env;
use payout_engine::lifecycle::signals::wait_for_signal;
use payout_engine::lifecycle::{PayoutService, Shutdown};
use payout_engine::observability::{logging, metrics};
use payout_engine::payout::LogResultSink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_from_env()?;
    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        bind_address = %config.listener.bind_address,
        signer = %config.kms.provider,
        workers = config.workers.count,
        chains = config.chains.len(),
        "payout-engine starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let service = PayoutService::build(config).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    service.run(shutdown, Arc::new(LogResultSink)).await?;
    Ok(())
}
