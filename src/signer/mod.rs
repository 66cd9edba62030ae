//! Key signer subsystem.
//!
//! # Data Flow
//! ```text
//! KmsConfig.provider
//!     → build_signer (once, at startup)
//!     → Arc<dyn KeySigner> shared by all workers
//!     → sign_transaction (EVM) / sign_hash (TRON)
//! ```
//!
//! # Security Constraints
//! - Raw key material stays inside the signer instance
//! - Never log private keys or sensitive data
//! - Managed backends (AWS, GCP, Vault) never expose the key to this process

pub mod local;
pub mod managed;
pub mod vault;

#[cfg(feature = "kms-aws")]
pub mod aws;
#[cfg(feature = "kms-gcp")]
pub mod gcp;

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::primitives::{Address, Signature, B256};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::schema::{KmsConfig, SignerProvider, TronConfig};

pub use local::LocalSigner;
pub use managed::ManagedSigner;
pub use vault::VaultSigner;

/// Errors raised by a key signer backend.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signer configuration error: {0}")]
    Config(String),

    #[error("signing backend unreachable: {0}")]
    Unreachable(String),

    #[error("signing backend refused: {0}")]
    Refused(String),

    #[error("signer is closed")]
    Closed,

    #[error("transaction chain id {actual} does not match requested chain {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("sender {requested} is not controlled by this signer ({controlled})")]
    SenderMismatch { requested: String, controlled: Address },
}

impl From<alloy::signers::Error> for SigningError {
    fn from(e: alloy::signers::Error) -> Self {
        match e {
            // Remote backends wrap transport/SDK failures here.
            alloy::signers::Error::Other(inner) => SigningError::Unreachable(inner.to_string()),
            other => SigningError::Refused(other.to_string()),
        }
    }
}

/// A signing capability whose backend is chosen once at construction.
#[async_trait]
pub trait KeySigner: Send + Sync {
    fn provider(&self) -> SignerProvider;

    /// The address this signer controls.
    async fn address(&self) -> Result<Address, SigningError>;

    /// Sign a raw 32-byte digest.
    async fn sign_hash(&self, hash: B256) -> Result<Signature, SigningError>;

    /// Sign an EIP-1559 transaction for `chain_id`.
    async fn sign_transaction(&self, tx: TxEip1559, chain_id: u64) -> Result<TxEnvelope, SigningError> {
        if tx.chain_id != chain_id {
            return Err(SigningError::ChainMismatch {
                expected: chain_id,
                actual: tx.chain_id,
            });
        }
        let signature = self.sign_hash(tx.signature_hash()).await?;
        Ok(TxEnvelope::from(tx.into_signed(signature)))
    }

    /// Release backend resources. Idempotent.
    async fn close(&self) -> Result<(), SigningError>;
}

/// Construct the signer selected by `config.provider`.
pub async fn build_signer(config: &KmsConfig) -> Result<Arc<dyn KeySigner>, SigningError> {
    let signer: Arc<dyn KeySigner> = match config.provider {
        SignerProvider::Local => {
            let key = config
                .local_private_key
                .as_deref()
                .ok_or_else(|| SigningError::Config("private key is required".to_string()))?;
            Arc::new(LocalSigner::from_private_key(key)?)
        }
        SignerProvider::Vault => Arc::new(VaultSigner::connect(config).await?),
        SignerProvider::Aws => build_aws(config).await?,
        SignerProvider::Gcp => build_gcp(config).await?,
    };

    tracing::info!(
        provider = %signer.provider(),
        address = %signer.address().await?,
        "Key signer initialized"
    );
    Ok(signer)
}

/// The TRON signer: a dedicated local key when configured, otherwise `fallback`.
pub fn build_tron_signer(
    config: &TronConfig,
    fallback: Arc<dyn KeySigner>,
) -> Result<Arc<dyn KeySigner>, SigningError> {
    match config.private_key.as_deref() {
        Some(key) => Ok(Arc::new(LocalSigner::from_private_key(key)?)),
        None => Ok(fallback),
    }
}

#[cfg(feature = "kms-aws")]
async fn build_aws(config: &KmsConfig) -> Result<Arc<dyn KeySigner>, SigningError> {
    Ok(Arc::new(aws::connect(config).await?))
}

#[cfg(not(feature = "kms-aws"))]
async fn build_aws(_config: &KmsConfig) -> Result<Arc<dyn KeySigner>, SigningError> {
    Err(SigningError::Config(
        "provider 'aws' requires the kms-aws feature".to_string(),
    ))
}

#[cfg(feature = "kms-gcp")]
async fn build_gcp(config: &KmsConfig) -> Result<Arc<dyn KeySigner>, SigningError> {
    Ok(Arc::new(gcp::connect(config).await?))
}

#[cfg(not(feature = "kms-gcp"))]
async fn build_gcp(_config: &KmsConfig) -> Result<Arc<dyn KeySigner>, SigningError> {
    Err(SigningError::Config(
        "provider 'gcp' requires the kms-gcp feature".to_string(),
    ))
}

/// Encode a signature as TRON expects it: `r ‖ s ‖ v` with v in {0, 1}.
pub fn tron_signature_bytes(signature: &Signature) -> [u8; 65] {
    let mut out = [0u8; 65];
    out[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
    out[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
    out[64] = signature.v() as u8;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, TxKind, U256};

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn test_build_local_signer() {
        let config = KmsConfig {
            local_private_key: Some(TEST_PRIVATE_KEY.to_string()),
            ..Default::default()
        };
        let signer = build_signer(&config).await.unwrap();
        assert_eq!(signer.provider(), SignerProvider::Local);
        assert_eq!(
            signer.address().await.unwrap(),
            address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
    }

    #[tokio::test]
    async fn test_local_signer_requires_key() {
        let err = build_signer(&KmsConfig::default()).await.err().unwrap();
        assert!(matches!(err, SigningError::Config(_)));
    }

    #[cfg(not(feature = "kms-aws"))]
    #[tokio::test]
    async fn test_aws_without_feature() {
        let config = KmsConfig {
            provider: SignerProvider::Aws,
            ..Default::default()
        };
        let err = build_signer(&config).await.err().unwrap();
        assert!(err.to_string().contains("kms-aws"));
    }

    #[tokio::test]
    async fn test_sign_transaction_rejects_chain_mismatch() {
        let signer = LocalSigner::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let tx = TxEip1559 {
            chain_id: 1,
            to: TxKind::Call(Address::ZERO),
            value: U256::from(1u64),
            ..Default::default()
        };
        let err = signer.sign_transaction(tx, 137).await.unwrap_err();
        assert!(matches!(err, SigningError::ChainMismatch { expected: 137, actual: 1 }));
    }

    #[test]
    fn test_tron_signer_fallback() {
        let evm: Arc<dyn KeySigner> = Arc::new(LocalSigner::from_private_key(TEST_PRIVATE_KEY).unwrap());
        let tron = build_tron_signer(&TronConfig::default(), Arc::clone(&evm)).unwrap();
        assert!(Arc::ptr_eq(&evm, &tron));

        let dedicated = TronConfig {
            private_key: Some("59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d".into()),
            ..Default::default()
        };
        let tron = build_tron_signer(&dedicated, evm.clone()).unwrap();
        assert!(!Arc::ptr_eq(&evm, &tron));
    }

    #[tokio::test]
    async fn test_tron_signature_layout() {
        let signer = LocalSigner::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let hash = B256::repeat_byte(0x11);
        let signature = signer.sign_hash(hash).await.unwrap();
        let bytes = tron_signature_bytes(&signature);
        assert!(bytes[64] <= 1);
        assert_eq!(&bytes[..32], &signature.r().to_be_bytes::<32>()[..]);
    }
}
