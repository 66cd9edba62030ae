//! Local private key signer (development and tests).
//!
//! # Security
//! - The key is parsed once and held only inside the signer
//! - Keys are never logged or serialized

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;

use crate::config::schema::SignerProvider;
use crate::signer::managed::ManagedSigner;
use crate::signer::SigningError;

pub type LocalSigner = ManagedSigner<PrivateKeySigner>;

impl ManagedSigner<PrivateKeySigner> {
    /// Create a signer from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    ///
    /// # Security
    /// The error never echoes the input.
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, SigningError> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
        if key_hex.is_empty() {
            return Err(SigningError::Config("private key is required".to_string()));
        }

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|_| SigningError::Config("Invalid private key format".to_string()))?;

        tracing::debug!(address = %signer.address(), "Local signer loaded");
        Ok(ManagedSigner::new(signer, SignerProvider::Local))
    }
}
