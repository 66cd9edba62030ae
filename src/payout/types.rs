//! Payout request, job and result types, plus the pipeline error taxonomy.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::builder::BuildError;
use crate::chain::types::ChainError;
use crate::nonce::NonceError;
use crate::signer::SigningError;

/// One batch: a single sender on a single chain paying many recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPayoutRequest {
    pub batch_id: String,
    pub user_id: String,
    pub from_address: String,
    pub chain_id: u64,
    #[serde(default)]
    pub items: Vec<PayoutItem>,
}

/// One recipient instruction. `amount` is a base-10 integer in the token's smallest unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutItem {
    pub id: String,
    pub recipient_address: String,
    pub amount: String,
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub token_symbol: String,
    #[serde(default)]
    pub token_decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Acknowledgement of acceptance; job outcomes arrive separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPayoutResponse {
    pub batch_id: String,
    pub status: BatchStatus,
    pub message: String,
}

/// A queued unit of work, derived 1:1 from a [`PayoutItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub batch_id: String,
    pub user_id: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: U256,
    pub token_address: Option<String>,
    pub token_symbol: String,
    pub token_decimals: u8,
    pub chain_id: u64,
    pub retry_count: u32,
    /// Unix seconds.
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    InvalidJob,
    UnsupportedChain,
    NonceAcquisition,
    Build,
    Signing,
    Submission,
    NonceConflict,
    Timeout,
    Abandoned,
}

impl JobErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobErrorKind::InvalidJob => "invalid_job",
            JobErrorKind::UnsupportedChain => "unsupported_chain",
            JobErrorKind::NonceAcquisition => "nonce_acquisition",
            JobErrorKind::Build => "build",
            JobErrorKind::Signing => "signing",
            JobErrorKind::Submission => "submission",
            JobErrorKind::NonceConflict => "nonce_conflict",
            JobErrorKind::Timeout => "timeout",
            JobErrorKind::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    pub batch_id: String,
    pub chain_id: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Nonce leased on EVM chains, set on failures after the lease too.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl JobResult {
    pub fn succeeded(job: &Job, tx_hash: String, nonce: Option<u64>) -> Self {
        Self {
            job_id: job.id.clone(),
            batch_id: job.batch_id.clone(),
            chain_id: job.chain_id,
            success: true,
            tx_hash: Some(tx_hash),
            nonce,
            error: None,
        }
    }

    pub fn failed(job: &Job, error: &PayoutError, nonce: Option<u64>) -> Self {
        Self {
            job_id: job.id.clone(),
            batch_id: job.batch_id.clone(),
            chain_id: job.chain_id,
            success: false,
            tx_hash: None,
            nonce,
            error: Some(JobError {
                kind: error.kind(),
                message: error.to_string(),
            }),
        }
    }
}

/// A rejected batch, located at the offending item when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub item_index: Option<usize>,
    pub reason: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.item_index {
            Some(i) => write!(f, "item[{}]: {}", i, self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn batch(reason: impl Into<String>) -> Self {
        Self {
            item_index: None,
            reason: reason.into(),
        }
    }

    pub fn item(index: usize, reason: impl Into<String>) -> Self {
        Self {
            item_index: Some(index),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,

    #[error("queue full: {requested} jobs requested, {available} of {capacity} slots free")]
    Full {
        capacity: usize,
        requested: usize,
        available: usize,
    },
}

/// Broadcast failures. Nonce conflicts are split out because they reset the sender's nonce cache.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("nonce conflict: {0}")]
    NonceConflict(ChainError),

    #[error("broadcast failed: {0}")]
    Rejected(ChainError),
}

impl From<ChainError> for SubmissionError {
    fn from(e: ChainError) -> Self {
        if e.is_nonce_error() {
            SubmissionError::NonceConflict(e)
        } else {
            SubmissionError::Rejected(e)
        }
    }
}

/// Every way a batch or a job can fail.
#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("unsupported chain_id: {0}")]
    UnsupportedChain(u64),

    #[error("failed to queue jobs: {0}")]
    Queue(#[from] QueueError),

    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("nonce acquisition failed: {0}")]
    NonceAcquisition(#[from] NonceError),

    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("job deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("service shut down before the job was processed")]
    Abandoned,
}

impl PayoutError {
    pub fn kind(&self) -> JobErrorKind {
        match self {
            PayoutError::Validation(_) | PayoutError::Queue(_) | PayoutError::InvalidJob(_) => {
                JobErrorKind::InvalidJob
            }
            PayoutError::UnsupportedChain(_) => JobErrorKind::UnsupportedChain,
            PayoutError::NonceAcquisition(_) => JobErrorKind::NonceAcquisition,
            PayoutError::Build(_) => JobErrorKind::Build,
            PayoutError::Signing(_) => JobErrorKind::Signing,
            PayoutError::Submission(SubmissionError::NonceConflict(_)) => JobErrorKind::NonceConflict,
            PayoutError::Submission(SubmissionError::Rejected(_)) => JobErrorKind::Submission,
            PayoutError::Timeout(_) => JobErrorKind::Timeout,
            PayoutError::Abandoned => JobErrorKind::Abandoned,
        }
    }

    /// Whether the failure text points at a nonce problem.
    pub fn is_nonce_related(&self) -> bool {
        match self {
            PayoutError::Submission(SubmissionError::NonceConflict(_)) => true,
            PayoutError::Signing(e) => crate::chain::types::is_nonce_message(&e.to_string()),
            _ => false,
        }
    }
}
