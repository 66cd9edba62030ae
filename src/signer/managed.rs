//! Adapter from any alloy [`Signer`] to [`KeySigner`].
//!
//! Used for the local key and the AWS/GCP KMS signers shipped with alloy.
//! `close` drops the inner signer; later calls fail with [`SigningError::Closed`].

use alloy::primitives::{Address, Signature, B256};
use alloy::signers::Signer;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::schema::SignerProvider;
use crate::signer::{KeySigner, SigningError};

pub struct ManagedSigner<S> {
    inner: RwLock<Option<S>>,
    address: Address,
    provider: SignerProvider,
}

impl<S: Signer + Send + Sync> ManagedSigner<S> {
    pub fn new(inner: S, provider: SignerProvider) -> Self {
        let address = inner.address();
        Self {
            inner: RwLock::new(Some(inner)),
            address,
            provider,
        }
    }
}

#[async_trait]
impl<S: Signer + Send + Sync + 'static> KeySigner for ManagedSigner<S> {
    fn provider(&self) -> SignerProvider {
        self.provider
    }

    async fn address(&self) -> Result<Address, SigningError> {
        if self.inner.read().await.is_none() {
            return Err(SigningError::Closed);
        }
        Ok(self.address)
    }

    async fn sign_hash(&self, hash: B256) -> Result<Signature, SigningError> {
        let guard = self.inner.read().await;
        let signer = guard.as_ref().ok_or(SigningError::Closed)?;
        Ok(signer.sign_hash(&hash).await?)
    }

    async fn close(&self) -> Result<(), SigningError> {
        if self.inner.write().await.take().is_some() {
            tracing::info!(provider = %self.provider, address = %self.address, "Key signer closed");
        }
        Ok(())
    }
}

impl<S> std::fmt::Debug for ManagedSigner<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedSigner")
            .field("provider", &self.provider)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
