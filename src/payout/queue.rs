//! Work queue between intake and the worker pool.
//!
//! `push_batch` is all-or-nothing: a batch that does not fit in the remaining
//! capacity is rejected whole, so intake never leaves a partial batch queued.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};

use crate::observability::metrics;
use crate::payout::types::{Job, QueueError};

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue every job or none of them.
    async fn push_batch(&self, jobs: Vec<Job>) -> Result<(), QueueError>;

    /// Wait for the next job. `None` once the queue is closed and drained.
    async fn pop(&self) -> Option<Job>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove and return every queued job.
    async fn drain(&self) -> Vec<Job>;

    /// Reject further pushes and wake idle consumers.
    fn close(&self);
}

/// Bounded FIFO queue held in process memory.
pub struct InMemoryJobQueue {
    jobs: Mutex<VecDeque<Job>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryJobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn push_batch(&self, jobs: Vec<Job>) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        let depth = {
            let mut queue = self.jobs.lock().await;
            let available = self.capacity.saturating_sub(queue.len());
            if jobs.len() > available {
                return Err(QueueError::Full {
                    capacity: self.capacity,
                    requested: jobs.len(),
                    available,
                });
            }
            queue.extend(jobs);
            queue.len()
        };

        metrics::record_queue_depth(depth);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn pop(&self) -> Option<Job> {
        loop {
            // Register interest before checking, so a push between the check
            // and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut queue = self.jobs.lock().await;
                if let Some(job) = queue.pop_front() {
                    metrics::record_queue_depth(queue.len());
                    return Some(job);
                }
            }
            if self.is_closed() {
                return None;
            }

            notified.await;
        }
    }

    async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    async fn drain(&self) -> Vec<Job> {
        let jobs: Vec<Job> = self.jobs.lock().await.drain(..).collect();
        metrics::record_queue_depth(0);
        jobs
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}
