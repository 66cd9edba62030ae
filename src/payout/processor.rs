//! Job processor: one job through resolve → lease → build → sign → submit.
//!
//! # State machine (EVM)
//! ```text
//! received → nonce-acquired → built → signed → submitted → succeeded | failed
//! ```
//! The lease is released on every path and the optimistic increment stays,
//! failures included. Only a signing or broadcast error that names a nonce
//! problem discards the sender's cached nonce, so the next job re-reads the
//! chain's pending count.
//!
//! TRON has no account nonce, so its path skips the coordinator.

use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{hex, Address};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::builder::{EvmTxBuilder, TronTxBuilder};
use crate::chain::evm::EvmRpc;
use crate::chain::registry::{ChainClient, ChainRegistry};
use crate::chain::tron::{decode_tron_address, encode_tron_address, TronRpc};
use crate::nonce::{NonceCoordinator, NonceLease, ResetReason};
use crate::observability::metrics;
use crate::payout::types::{Job, JobResult, PayoutError, SubmissionError};
use crate::signer::{tron_signature_bytes, KeySigner, SigningError};

/// Signers per chain family. TRON falls back to the EVM signer.
#[derive(Clone)]
pub struct SignerSet {
    pub evm: Arc<dyn KeySigner>,
    pub tron: Option<Arc<dyn KeySigner>>,
}

impl SignerSet {
    pub fn new(evm: Arc<dyn KeySigner>) -> Self {
        Self { evm, tron: None }
    }

    pub fn with_tron(mut self, tron: Arc<dyn KeySigner>) -> Self {
        self.tron = Some(tron);
        self
    }

    pub fn tron(&self) -> &Arc<dyn KeySigner> {
        self.tron.as_ref().unwrap_or(&self.evm)
    }
}

pub struct JobProcessor {
    registry: Arc<ChainRegistry>,
    nonces: NonceCoordinator,
    signers: SignerSet,
    evm_builder: EvmTxBuilder,
    tron_builder: TronTxBuilder,
    job_timeout: Duration,
}

impl JobProcessor {
    pub fn new(
        registry: Arc<ChainRegistry>,
        nonces: NonceCoordinator,
        signers: SignerSet,
        evm_builder: EvmTxBuilder,
        tron_builder: TronTxBuilder,
        job_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            nonces,
            signers,
            evm_builder,
            tron_builder,
            job_timeout,
        }
    }

    pub fn nonces(&self) -> &NonceCoordinator {
        &self.nonces
    }

    /// Process one job. Never fails: every outcome becomes a [`JobResult`].
    pub async fn process(&self, job: &Job) -> JobResult {
        let started = Instant::now();
        tracing::info!(
            job_id = %job.id,
            batch_id = %job.batch_id,
            chain_id = job.chain_id,
            to = %job.to_address,
            amount = %job.amount,
            "Processing payout job"
        );

        let (nonce, outcome) = self.execute(job).await;
        let result = match outcome {
            Ok(tx_hash) => {
                tracing::info!(
                    job_id = %job.id,
                    batch_id = %job.batch_id,
                    chain_id = job.chain_id,
                    nonce = ?nonce,
                    tx_hash = %tx_hash,
                    "Payout transaction submitted"
                );
                JobResult::succeeded(job, tx_hash, nonce)
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %job.id,
                    batch_id = %job.batch_id,
                    chain_id = job.chain_id,
                    nonce = ?nonce,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Payout job failed"
                );
                JobResult::failed(job, &e, nonce)
            }
        };

        let outcome = result.error.as_ref().map(|e| e.kind.as_str()).unwrap_or("success");
        metrics::record_job_result(job.chain_id, outcome);
        metrics::record_job_duration(job.chain_id, started.elapsed());
        result
    }

    /// The leased nonce, if any, and the outcome.
    async fn execute(&self, job: &Job) -> (Option<u64>, Result<String, PayoutError>) {
        match self.registry.client(job.chain_id) {
            Some(ChainClient::Evm(client)) => self.process_evm(job, client.as_ref()).await,
            Some(ChainClient::Tron(client)) => (None, self.process_tron(job, client.as_ref()).await),
            None => (None, Err(PayoutError::UnsupportedChain(job.chain_id))),
        }
    }

    async fn process_evm(&self, job: &Job, client: &dyn EvmRpc) -> (Option<u64>, Result<String, PayoutError>) {
        let lease = match self.lease(job).await {
            Ok(lease) => lease,
            Err(e) => return (None, Err(e)),
        };
        let nonce = lease.nonce();
        tracing::debug!(job_id = %job.id, chain_id = job.chain_id, nonce, "Nonce acquired");

        let outcome = tokio::time::timeout(
            self.job_timeout,
            self.build_sign_submit(job, client, lease.address(), nonce),
        )
        .await
        .unwrap_or(Err(PayoutError::Timeout(self.job_timeout)));

        match &outcome {
            Err(e) if e.is_nonce_related() => lease.invalidate(ResetReason::NonceError),
            _ => lease.release(),
        }

        (Some(nonce), outcome)
    }

    /// Check the sender against the signer, then lease its next nonce.
    async fn lease(&self, job: &Job) -> Result<NonceLease, PayoutError> {
        let signer = &self.signers.evm;
        let from = signer.address().await?;
        let requested: Address = job
            .from_address
            .parse()
            .map_err(|_| PayoutError::InvalidJob(format!("invalid from_address '{}'", job.from_address)))?;
        if requested != from {
            return Err(SigningError::SenderMismatch {
                requested: job.from_address.clone(),
                controlled: from,
            }
            .into());
        }

        Ok(self.nonces.get_nonce(job.chain_id, from).await?)
    }

    async fn build_sign_submit(
        &self,
        job: &Job,
        client: &dyn EvmRpc,
        from: Address,
        nonce: u64,
    ) -> Result<String, PayoutError> {
        let built = self.evm_builder.build(client, job, from, nonce).await?;
        let envelope = self.signers.evm.sign_transaction(built.tx, job.chain_id).await?;
        tracing::debug!(job_id = %job.id, nonce, tx_hash = %envelope.tx_hash(), "Transaction signed");

        let tx_hash = client
            .send_raw_transaction(envelope.encoded_2718().into())
            .await
            .map_err(SubmissionError::from)?;
        Ok(tx_hash.to_string())
    }

    async fn process_tron(&self, job: &Job, client: &dyn TronRpc) -> Result<String, PayoutError> {
        let signer = self.signers.tron();
        let controlled = signer.address().await?;
        let requested = decode_tron_address(&job.from_address)
            .map_err(|_| PayoutError::InvalidJob(format!("invalid from_address '{}'", job.from_address)))?;
        if requested != controlled {
            return Err(SigningError::SenderMismatch {
                requested: job.from_address.clone(),
                controlled,
            }
            .into());
        }
        let owner = encode_tron_address(controlled);

        let work = async {
            let (mut tx, digest) = self.tron_builder.build(client, job, &owner).await?;
            let signature = signer.sign_hash(digest).await?;
            tx.signature = vec![hex::encode(tron_signature_bytes(&signature))];
            tracing::debug!(job_id = %job.id, tx_id = %tx.tx_id, "TRON transaction signed");

            let tx_id = client.broadcast(&tx).await.map_err(SubmissionError::from)?;
            Ok::<_, PayoutError>(tx_id)
        };

        tokio::time::timeout(self.job_timeout, work)
            .await
            .unwrap_or(Err(PayoutError::Timeout(self.job_timeout)))
    }
}
