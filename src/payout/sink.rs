//! Result sinks: where finished jobs report their outcome.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::payout::types::JobResult;

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish(&self, result: JobResult);
}

/// Forwards results into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelResultSink {
    tx: mpsc::UnboundedSender<JobResult>,
}

impl ChannelResultSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResultSink for ChannelResultSink {
    async fn publish(&self, result: JobResult) {
        if self.tx.send(result).is_err() {
            tracing::warn!("Result receiver dropped, discarding job result");
        }
    }
}

/// Writes each result as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogResultSink;

#[async_trait]
impl ResultSink for LogResultSink {
    async fn publish(&self, result: JobResult) {
        match &result.error {
            None => tracing::info!(
                job_id = %result.job_id,
                batch_id = %result.batch_id,
                chain_id = result.chain_id,
                tx_hash = result.tx_hash.as_deref().unwrap_or_default(),
                "Payout job succeeded"
            ),
            Some(error) => tracing::warn!(
                job_id = %result.job_id,
                batch_id = %result.batch_id,
                chain_id = result.chain_id,
                kind = error.kind.as_str(),
                error = %error.message,
                "Payout job failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str) -> JobResult {
        JobResult {
            job_id: id.to_string(),
            batch_id: "b1".into(),
            chain_id: 1,
            success: true,
            tx_hash: Some("0xabc".into()),
            nonce: Some(0),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelResultSink::new();
        sink.publish(result("a")).await;
        sink.publish(result("b")).await;
        assert_eq!(rx.recv().await.unwrap().job_id, "a");
        assert_eq!(rx.recv().await.unwrap().job_id, "b");
    }

    #[tokio::test]
    async fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelResultSink::new();
        drop(rx);
        sink.publish(result("a")).await;
    }
}
