//! AWS KMS signer (`kms-aws` feature).
//!
//! The key is an asymmetric `ECC_SECG_P256K1` KMS key; alloy's `AwsSigner`
//! reads its public key once and signs digests remotely.

use alloy::signers::aws::aws_sdk_kms;
use alloy::signers::aws::AwsSigner;
use aws_config::{BehaviorVersion, Region};

use crate::config::schema::{KmsConfig, SignerProvider};
use crate::signer::managed::ManagedSigner;
use crate::signer::SigningError;

pub async fn connect(config: &KmsConfig) -> Result<ManagedSigner<AwsSigner>, SigningError> {
    if config.aws_key_id.is_empty() {
        return Err(SigningError::Config("AWS KMS key id is required".to_string()));
    }

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .load()
        .await;
    let client = aws_sdk_kms::Client::new(&sdk_config);

    let signer = AwsSigner::new(client, config.aws_key_id.clone(), None)
        .await
        .map_err(|e| SigningError::Unreachable(format!("AWS KMS: {}", e)))?;

    Ok(ManagedSigner::new(signer, SignerProvider::Aws))
}
