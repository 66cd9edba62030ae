//! Worker pool draining the job queue.
//!
//! Each worker loops `pop → process → publish`. Shutdown stops workers from
//! taking new jobs; a job already in hand runs to completion first. Whatever
//! is still queued afterwards is reported through [`fail_abandoned`].

use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::payout::processor::JobProcessor;
use crate::payout::queue::JobQueue;
use crate::payout::sink::ResultSink;
use crate::payout::types::{JobResult, PayoutError};

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        count: usize,
        processor: Arc<JobProcessor>,
        queue: Arc<dyn JobQueue>,
        sink: Arc<dyn ResultSink>,
        shutdown: &Shutdown,
    ) -> Self {
        let handles = (0..count)
            .map(|worker_id| {
                let processor = processor.clone();
                let queue = queue.clone();
                let sink = sink.clone();
                let shutdown_rx = shutdown.subscribe();
                tokio::spawn(run_worker(worker_id, processor, queue, sink, shutdown_rx))
            })
            .collect();

        tracing::info!(workers = count, "Worker pool started");
        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    processor: Arc<JobProcessor>,
    queue: Arc<dyn JobQueue>,
    sink: Arc<dyn ResultSink>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            job = queue.pop() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let result = processor.process(&job).await;
        sink.publish(result).await;
    }

    tracing::debug!(worker_id, "Worker stopped");
}

/// Publish an `abandoned` failure for every job left in `queue`.
///
/// Call once the queue is closed and the workers have stopped. Returns the
/// number of jobs reported.
pub async fn fail_abandoned(queue: &dyn JobQueue, sink: &dyn ResultSink) -> usize {
    let jobs = queue.drain().await;
    for job in &jobs {
        metrics::record_job_result(job.chain_id, PayoutError::Abandoned.kind().as_str());
        sink.publish(JobResult::failed(job, &PayoutError::Abandoned, None)).await;
    }
    if !jobs.is_empty() {
        tracing::warn!(jobs = jobs.len(), "Queued jobs abandoned at shutdown");
    }
    jobs.len()
}
