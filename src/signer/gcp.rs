//! Google Cloud KMS signer (`kms-gcp` feature).
//!
//! Credentials come from the ambient Google environment
//! (`GOOGLE_APPLICATION_CREDENTIALS` or workload identity).

use alloy::signers::gcp::gcloud_sdk::google::cloud::kms::v1::key_management_service_client::KeyManagementServiceClient;
use alloy::signers::gcp::gcloud_sdk::GoogleApi;
use alloy::signers::gcp::{GcpKeyRingRef, GcpSigner, KeySpecifier};

use crate::config::schema::{KmsConfig, SignerProvider};
use crate::signer::managed::ManagedSigner;
use crate::signer::SigningError;

const KMS_ENDPOINT: &str = "https://cloudkms.googleapis.com";

pub async fn connect(config: &KmsConfig) -> Result<ManagedSigner<GcpSigner>, SigningError> {
    let keyring = GcpKeyRingRef::new(
        &config.gcp_project_id,
        &config.gcp_location_id,
        &config.gcp_key_ring_id,
    );
    let specifier = KeySpecifier::new(keyring, &config.gcp_key_id, config.gcp_key_version);

    let client = GoogleApi::from_function(KeyManagementServiceClient::new, KMS_ENDPOINT, None)
        .await
        .map_err(|e| SigningError::Unreachable(format!("GCP KMS: {}", e)))?;

    let signer = GcpSigner::new(client, specifier, None)
        .await
        .map_err(|e| SigningError::Unreachable(format!("GCP KMS: {}", e)))?;

    Ok(ManagedSigner::new(signer, SignerProvider::Gcp))
}
