//! Batch payout pipeline.
//!
//! # Data Flow
//! ```text
//! BatchPayoutRequest
//!     → intake.rs (validate whole batch, build jobs, enqueue atomically)
//!     → queue.rs (bounded FIFO)
//!     → worker.rs (N workers pulling jobs)
//!     → processor.rs (resolve chain → nonce lease → build → sign → submit)
//!     → sink.rs (JobResult per job)
//! ```
//!
//! # Ordering
//! Jobs for the same sender on the same chain get nonces in the order they
//! reach the nonce coordinator. Nothing is promised across senders or chains.

pub mod intake;
pub mod processor;
pub mod queue;
pub mod sink;
pub mod types;
pub mod worker;

pub use intake::BatchIntake;
pub use processor::{JobProcessor, SignerSet};
pub use queue::{InMemoryJobQueue, JobQueue};
pub use sink::{ChannelResultSink, LogResultSink, ResultSink};
pub use types::{
    BatchPayoutRequest, BatchPayoutResponse, BatchStatus, Job, JobError, JobErrorKind, JobResult,
    PayoutError, PayoutItem, QueueError, SubmissionError, ValidationError,
};
pub use worker::{fail_abandoned, WorkerPool};
