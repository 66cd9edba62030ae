//! Metrics collection and Prometheus exposition.
//!
//! # Metrics
//! - `payout_batches_total` (counter): batches by outcome
//! - `payout_batch_jobs_total` (counter): jobs queued per chain
//! - `payout_jobs_total` (counter): finished jobs by chain and outcome
//! - `payout_job_duration_seconds` (histogram): time spent per job
//! - `payout_queue_depth` (gauge): jobs waiting
//! - `payout_nonce_resets_total` (counter): nonce cache resets by reason
//! - `payout_gas_fallbacks_total` (counter): estimates replaced by fallback limits
//! - `payout_chain_up` (gauge): 1 when a configured chain connected at startup

use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the global recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_batch_accepted(chain_id: u64, jobs: usize) {
    counter!("payout_batches_total", "outcome" => "accepted").increment(1);
    counter!("payout_batch_jobs_total", "chain_id" => chain_id.to_string()).increment(jobs as u64);
}

pub fn record_batch_rejected(reason: &str) {
    counter!("payout_batches_total", "outcome" => "rejected", "reason" => reason.to_string()).increment(1);
}

/// `outcome` is `success` or a job error kind.
pub fn record_job_result(chain_id: u64, outcome: &str) {
    counter!(
        "payout_jobs_total",
        "chain_id" => chain_id.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_job_duration(chain_id: u64, elapsed: Duration) {
    histogram!("payout_job_duration_seconds", "chain_id" => chain_id.to_string()).record(elapsed.as_secs_f64());
}

pub fn record_queue_depth(depth: usize) {
    gauge!("payout_queue_depth").set(depth as f64);
}

pub fn record_nonce_reset(chain_id: u64, reason: &str) {
    counter!(
        "payout_nonce_resets_total",
        "chain_id" => chain_id.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

pub fn record_gas_estimation_fallback(chain_id: u64, kind: &str) {
    counter!(
        "payout_gas_fallbacks_total",
        "chain_id" => chain_id.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

pub fn record_chain_up(chain_id: u64, up: bool) {
    gauge!("payout_chain_up", "chain_id" => chain_id.to_string()).set(if up { 1.0 } else { 0.0 });
}
