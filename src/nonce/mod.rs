//! Nonce coordinator: per (chain, sender) exclusive nonce leasing.
//!
//! Each key owns a `tokio::sync::Mutex<Option<u64>>` holding the last nonce
//! handed out, or `None` when the value must be (re)fetched from the chain's
//! `pending` transaction count. A [`NonceLease`] owns that mutex guard, so
//! jobs for the same key are serialized in arrival order (tokio mutexes are
//! FIFO) while unrelated keys never contend.
//!
//! Allocation is optimistic: the cached value advances as soon as a lease is
//! granted, before the transaction outcome is known. Releasing a lease never
//! rolls the value back; only a reset does.

use alloy::primitives::Address;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::chain::evm::EvmRpc;
use crate::chain::types::ChainError;
use crate::observability::metrics;

type NonceKey = (u64, Address);

#[derive(Debug, Error)]
pub enum NonceError {
    #[error("timed out after {0:?} waiting for the nonce lease")]
    AcquireTimeout(Duration),

    #[error("failed to refresh nonce from chain: {0}")]
    Refresh(#[from] ChainError),

    #[error("no nonce source for chain {0}")]
    UnknownChain(u64),
}

/// Why a cached nonce was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Signing or broadcast reported a nonce problem.
    NonceError,
    /// Explicit operator or caller request.
    Manual,
}

impl ResetReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetReason::NonceError => "nonce_error",
            ResetReason::Manual => "manual",
        }
    }
}

#[derive(Clone)]
pub struct NonceCoordinator {
    slots: Arc<DashMap<NonceKey, Arc<Mutex<Option<u64>>>>>,
    sources: Arc<HashMap<u64, Arc<dyn EvmRpc>>>,
    acquire_timeout: Duration,
}

impl NonceCoordinator {
    pub fn new(sources: HashMap<u64, Arc<dyn EvmRpc>>, acquire_timeout: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            sources: Arc::new(sources),
            acquire_timeout,
        }
    }

    fn slot(&self, key: NonceKey) -> Arc<Mutex<Option<u64>>> {
        // Hold the shard lock only long enough to clone the Arc.
        let entry = self.slots.entry(key).or_insert_with(|| Arc::new(Mutex::new(None)));
        Arc::clone(entry.value())
    }

    /// Lease the next nonce for `address` on `chain_id`.
    ///
    /// Waits (up to the acquire timeout) for any earlier lease on the same key.
    /// The first lease for a key, and the first after a reset, queries the
    /// chain; later leases return the cached value + 1.
    pub async fn get_nonce(&self, chain_id: u64, address: Address) -> Result<NonceLease, NonceError> {
        let source = self
            .sources
            .get(&chain_id)
            .cloned()
            .ok_or(NonceError::UnknownChain(chain_id))?;

        let slot = self.slot((chain_id, address));
        let mut guard = tokio::time::timeout(self.acquire_timeout, slot.lock_owned())
            .await
            .map_err(|_| NonceError::AcquireTimeout(self.acquire_timeout))?;

        let nonce = match *guard {
            Some(last) => last + 1,
            None => {
                let pending = source.pending_nonce(address).await?;
                tracing::info!(chain_id, %address, nonce = pending, "Nonce fetched from chain");
                pending
            }
        };
        *guard = Some(nonce);

        tracing::debug!(chain_id, %address, nonce, "Nonce leased");
        Ok(NonceLease {
            guard,
            chain_id,
            address,
            nonce,
        })
    }

    /// Discard the cached value so the next lease re-queries the chain.
    ///
    /// Waits for the current lease holder; a holder must use
    /// [`NonceLease::invalidate`] instead.
    pub async fn reset_nonce(&self, chain_id: u64, address: Address) {
        let slot = self.slot((chain_id, address));
        *slot.lock().await = None;
        metrics::record_nonce_reset(chain_id, ResetReason::Manual.as_str());
        tracing::info!(chain_id, %address, "Nonce cache reset");
    }

    /// The nonce the next lease would return without a chain query, if cached.
    ///
    /// Returns `None` while a lease is held or when nothing is cached.
    pub fn next_nonce(&self, chain_id: u64, address: Address) -> Option<u64> {
        let slot = self.slots.get(&(chain_id, address)).map(|e| Arc::clone(e.value()))?;
        let last = (*slot.try_lock().ok()?)?;
        Some(last + 1)
    }
}

impl std::fmt::Debug for NonceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceCoordinator")
            .field("keys", &self.slots.len())
            .field("chains", &self.sources.len())
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// Exclusive ownership of one allocated nonce.
///
/// Dropping the lease releases it; the optimistic increment stays in place.
#[must_use = "a lease holds the sender's nonce slot until released"]
pub struct NonceLease {
    guard: OwnedMutexGuard<Option<u64>>,
    chain_id: u64,
    address: Address,
    nonce: u64,
}

impl NonceLease {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Release the slot, keeping the cached value.
    pub fn release(self) {
        tracing::trace!(chain_id = self.chain_id, address = %self.address, nonce = self.nonce, "Nonce lease released");
    }

    /// Reset the cached value, then release. The next lease re-queries the chain.
    pub fn invalidate(mut self, reason: ResetReason) {
        *self.guard = None;
        metrics::record_nonce_reset(self.chain_id, reason.as_str());
        tracing::info!(
            chain_id = self.chain_id,
            address = %self.address,
            nonce = self.nonce,
            reason = reason.as_str(),
            "Nonce cache reset"
        );
    }
}

impl std::fmt::Debug for NonceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceLease")
            .field("chain_id", &self.chain_id)
            .field("address", &self.address)
            .field("nonce", &self.nonce)
            .finish()
    }
}
