//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! intake, nonce, builder, processor, queue
//!     → logging.rs (structured events keyed by batch_id / job_id / chain_id)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! Key material never appears in either stream.

pub mod logging;
pub mod metrics;
