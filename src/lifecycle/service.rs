//! Service assembly and the run/shutdown sequence.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::builder::{EvmTxBuilder, GasPolicy, TronTxBuilder};
use crate::chain::registry::ChainRegistry;
use crate::config::schema::PayoutConfig;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::nonce::NonceCoordinator;
use crate::observability::metrics;
use crate::payout::intake::BatchIntake;
use crate::payout::processor::{JobProcessor, SignerSet};
use crate::payout::queue::{InMemoryJobQueue, JobQueue};
use crate::payout::sink::ResultSink;
use crate::payout::worker::{fail_abandoned, WorkerPool};
use crate::signer::{build_signer, build_tron_signer, SigningError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("signer initialization failed: {0}")]
    Signer(#[from] SigningError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Every long-lived component, wired together.
pub struct PayoutService {
    config: PayoutConfig,
    registry: Arc<ChainRegistry>,
    queue: Arc<InMemoryJobQueue>,
    intake: Arc<BatchIntake>,
    processor: Arc<JobProcessor>,
    signers: SignerSet,
}

impl PayoutService {
    /// Build the signers and connect every configured chain.
    pub async fn build(config: PayoutConfig) -> Result<Self, ServiceError> {
        let signer = build_signer(&config.kms).await?;
        let tron_signer = build_tron_signer(&config.tron, signer.clone())?;
        let signers = SignerSet::new(signer).with_tron(tron_signer);

        let rpc_timeout = Duration::from_secs(config.workers.rpc_timeout_secs);
        let registry = Arc::new(ChainRegistry::connect(&config.chains, rpc_timeout).await);
        for chain in &config.chains {
            metrics::record_chain_up(chain.chain_id, registry.contains(chain.chain_id));
        }
        if registry.is_empty() {
            tracing::warn!("No chain is reachable; every batch will be rejected");
        }

        Ok(Self::from_parts(config, registry, signers))
    }

    /// Wire the pipeline around an existing registry and signers.
    pub fn from_parts(config: PayoutConfig, registry: Arc<ChainRegistry>, signers: SignerSet) -> Self {
        let workers = &config.workers;
        let queue = Arc::new(InMemoryJobQueue::new(workers.queue_capacity));
        let intake = Arc::new(BatchIntake::new(
            registry.clone(),
            queue.clone(),
            workers.max_batch_items,
        ));

        let nonces = NonceCoordinator::new(
            registry.evm_clients(),
            Duration::from_secs(workers.nonce_acquire_timeout_secs),
        );
        let processor = Arc::new(JobProcessor::new(
            registry.clone(),
            nonces,
            signers.clone(),
            EvmTxBuilder::new(GasPolicy::new(config.gas.clone())),
            TronTxBuilder::new(config.tron.trc20_fee_limit),
            Duration::from_secs(workers.job_timeout_secs),
        ));

        Self {
            config,
            registry,
            queue,
            intake,
            processor,
            signers,
        }
    }

    pub fn registry(&self) -> &Arc<ChainRegistry> {
        &self.registry
    }

    pub fn intake(&self) -> &Arc<BatchIntake> {
        &self.intake
    }

    pub fn processor(&self) -> &Arc<JobProcessor> {
        &self.processor
    }

    pub fn queue(&self) -> Arc<dyn JobQueue> {
        self.queue.clone()
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            intake: self.intake.clone(),
            registry: self.registry.clone(),
            queue: self.queue.clone(),
            api_secret: self.config.api_secret.as_deref().map(Arc::from),
        }
    }

    /// Run workers and the HTTP API until `shutdown` fires.
    ///
    /// Order on the way out: stop accepting requests, close the queue, let
    /// workers finish the job in hand, fail whatever is still queued, close
    /// the signers.
    pub async fn run(self, shutdown: Shutdown, sink: Arc<dyn ResultSink>) -> Result<(), ServiceError> {
        let workers = WorkerPool::spawn(
            self.config.workers.count,
            self.processor.clone(),
            self.queue.clone(),
            sink.clone(),
            &shutdown,
        );

        let server = HttpServer::new(self.app_state(), self.config.listener.clone());
        let served = server.run(shutdown.clone()).await;
        if let Err(e) = &served {
            tracing::error!(error = %e, "HTTP server failed");
        }

        shutdown.trigger();
        self.queue.close();
        workers.join().await;

        fail_abandoned(self.queue.as_ref(), sink.as_ref()).await;

        for signer in [Some(&self.signers.evm), self.signers.tron.as_ref()].into_iter().flatten() {
            if let Err(e) = signer.close().await {
                tracing::warn!(error = %e, "Failed to close signer");
            }
        }

        tracing::info!("Shutdown complete");
        served.map_err(ServiceError::from)
    }
}
