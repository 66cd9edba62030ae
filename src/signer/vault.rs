//! HashiCorp Vault Transit signer.
//!
//! The key never leaves Vault. At construction the public key of the newest
//! key version is read and turned into an address; each signature is a
//! prehashed `sign` call returning an ASN.1 DER signature, which is
//! normalized to low-S and given the recovery id that reproduces the address.

use alloy::primitives::{hex, Address, Signature, B256, U256};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::pkcs8::DecodePublicKey;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::schema::{KmsConfig, SignerProvider};
use crate::signer::{KeySigner, SigningError};

const VAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct VaultSigner {
    http: reqwest::Client,
    sign_url: String,
    token: String,
    address: Address,
    closed: AtomicBool,
}

impl VaultSigner {
    /// Read the key's public half from Vault and derive the signer address.
    pub async fn connect(config: &KmsConfig) -> Result<Self, SigningError> {
        let token = config
            .vault_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SigningError::Config("vault token is required".to_string()))?;
        if config.vault_key_name.is_empty() {
            return Err(SigningError::Config("vault key name is required".to_string()));
        }

        let base = config.vault_address.trim_end_matches('/');
        let mount = config.vault_mount_path.trim_matches('/');
        let mount = if mount.is_empty() { "transit" } else { mount };

        let http = reqwest::Client::builder()
            .timeout(VAULT_TIMEOUT)
            .build()
            .map_err(|e| SigningError::Config(e.to_string()))?;

        let keys_url = format!("{}/v1/{}/keys/{}", base, mount, config.vault_key_name);
        let body = send(http.get(&keys_url).header("X-Vault-Token", &token)).await?;
        let public_key = latest_public_key(&body)?;
        let address = address_from_public_key(&public_key)?;

        tracing::info!(
            vault = %base,
            key = %config.vault_key_name,
            address = %address,
            "Vault signer initialized"
        );

        Ok(Self {
            http,
            sign_url: format!("{}/v1/{}/sign/{}", base, mount, config.vault_key_name),
            token,
            address,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), SigningError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SigningError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl KeySigner for VaultSigner {
    fn provider(&self) -> SignerProvider {
        SignerProvider::Vault
    }

    async fn address(&self) -> Result<Address, SigningError> {
        self.ensure_open()?;
        Ok(self.address)
    }

    async fn sign_hash(&self, hash: B256) -> Result<Signature, SigningError> {
        self.ensure_open()?;

        let request = self
            .http
            .post(&self.sign_url)
            .header("X-Vault-Token", &self.token)
            .json(&json!({
                "input": BASE64.encode(hash.as_slice()),
                "prehashed": true,
                "marshaling_algorithm": "asn1",
            }));
        let body = send(request).await?;

        let encoded = body
            .pointer("/data/signature")
            .and_then(Value::as_str)
            .ok_or_else(|| SigningError::Refused("signature not found in response".to_string()))?;
        let der = decode_vault_signature(encoded)?;

        recoverable_signature(&der, hash, self.address)
    }

    async fn close(&self) -> Result<(), SigningError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for VaultSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSigner")
            .field("sign_url", &self.sign_url)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<Value, SigningError> {
    let response = request
        .send()
        .await
        .map_err(|e| SigningError::Unreachable(e.to_string()))?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| SigningError::Unreachable(format!("invalid Vault response: {}", e)))?;

    if !status.is_success() {
        let errors = body
            .get("errors")
            .and_then(Value::as_array)
            .map(|e| e.iter().filter_map(Value::as_str).collect::<Vec<_>>().join("; "))
            .unwrap_or_default();
        return Err(SigningError::Refused(format!("Vault returned {}: {}", status, errors)));
    }
    Ok(body)
}

/// Public key of the highest key version in a `keys/<name>` response.
fn latest_public_key(body: &Value) -> Result<String, SigningError> {
    let keys = body
        .pointer("/data/keys")
        .and_then(Value::as_object)
        .ok_or_else(|| SigningError::Config("key not found in Vault".to_string()))?;

    keys.iter()
        .filter_map(|(version, data)| Some((version.parse::<u64>().ok()?, data)))
        .max_by_key(|(version, _)| *version)
        .and_then(|(_, data)| data.get("public_key").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| SigningError::Config("public key not found in key data".to_string()))
}

/// Accepts SEC1 hex (with or without 0x) or a PEM SubjectPublicKeyInfo.
fn address_from_public_key(encoded: &str) -> Result<Address, SigningError> {
    let encoded = encoded.trim();
    let key = if encoded.starts_with("-----BEGIN") {
        k256::PublicKey::from_public_key_pem(encoded)
            .map_err(|e| SigningError::Config(format!("invalid PEM public key: {}", e)))?
    } else {
        let bytes = hex::decode(encoded.strip_prefix("0x").unwrap_or(encoded))
            .map_err(|e| SigningError::Config(format!("invalid public key hex: {}", e)))?;
        k256::PublicKey::from_sec1_bytes(&bytes)
            .map_err(|e| SigningError::Config(format!("invalid public key: {}", e)))?
    };

    let point = key.to_encoded_point(false);
    Ok(Address::from_raw_public_key(&point.as_bytes()[1..]))
}

/// Strip the `vault:v<N>:` prefix and base64-decode.
fn decode_vault_signature(encoded: &str) -> Result<Vec<u8>, SigningError> {
    let payload = encoded
        .rsplit(':')
        .next()
        .filter(|_| encoded.starts_with("vault:"))
        .ok_or_else(|| SigningError::Refused("invalid signature format".to_string()))?;
    BASE64
        .decode(payload)
        .map_err(|e| SigningError::Refused(format!("failed to decode signature: {}", e)))
}

/// DER `(r, s)` to a recoverable signature whose signer is `expected`.
fn recoverable_signature(der: &[u8], hash: B256, expected: Address) -> Result<Signature, SigningError> {
    let parsed = k256::ecdsa::Signature::from_der(der)
        .map_err(|e| SigningError::Refused(format!("failed to parse signature: {}", e)))?;
    let parsed = parsed.normalize_s().unwrap_or(parsed);
    let (r, s) = parsed.split_bytes();
    let (r, s) = (U256::from_be_slice(&r), U256::from_be_slice(&s));

    for parity in [false, true] {
        let candidate = Signature::new(r, s, parity);
        if candidate.recover_address_from_prehash(&hash).ok() == Some(expected) {
            return Ok(candidate);
        }
    }
    Err(SigningError::Refused("could not determine recovery id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::SigningKey;
    use std::sync::Arc;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: Address = alloy::primitives::address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&hex::decode(TEST_PRIVATE_KEY).unwrap()).unwrap()
    }

    async fn keys(State(key): State<Arc<SigningKey>>) -> Json<Value> {
        let public = key.verifying_key().to_encoded_point(false);
        Json(json!({
            "data": {
                "latest_version": 2,
                "keys": {
                    "1": {"public_key": "0x04deadbeef"},
                    "2": {"public_key": hex::encode(public.as_bytes())},
                }
            }
        }))
    }

    async fn sign(State(key): State<Arc<SigningKey>>, Json(body): Json<Value>) -> Json<Value> {
        let input = BASE64.decode(body["input"].as_str().unwrap()).unwrap();
        assert_eq!(body["prehashed"], true);
        let signature: k256::ecdsa::Signature = key.sign_prehash(&input).unwrap();
        let encoded = BASE64.encode(signature.to_der().as_bytes());
        Json(json!({"data": {"signature": format!("vault:v2:{}", encoded)}}))
    }

    async fn spawn_vault() -> String {
        let app = Router::new()
            .route("/v1/transit/keys/payout", get(keys))
            .route("/v1/transit/sign/payout", post(sign))
            .with_state(Arc::new(signing_key()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn vault_config(address: String) -> KmsConfig {
        KmsConfig {
            provider: SignerProvider::Vault,
            vault_address: address,
            vault_token: Some("s.test".to_string()),
            vault_key_name: "payout".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_vault_signer_round_trip() {
        let signer = VaultSigner::connect(&vault_config(spawn_vault().await)).await.unwrap();
        assert_eq!(signer.address().await.unwrap(), TEST_ADDRESS);

        let hash = B256::repeat_byte(0x5a);
        let signature = signer.sign_hash(hash).await.unwrap();
        assert_eq!(signature.recover_address_from_prehash(&hash).unwrap(), TEST_ADDRESS);

        signer.close().await.unwrap();
        signer.close().await.unwrap();
        assert!(matches!(signer.sign_hash(hash).await, Err(SigningError::Closed)));
    }

    #[tokio::test]
    async fn test_vault_unreachable() {
        let err = VaultSigner::connect(&vault_config("http://127.0.0.1:1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::Unreachable(_)));
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let mut config = vault_config("http://127.0.0.1:1".to_string());
        config.vault_token = None;
        let err = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(VaultSigner::connect(&config))
            .unwrap_err();
        assert!(matches!(err, SigningError::Config(_)));
    }

    #[test]
    fn test_decode_vault_signature() {
        assert_eq!(decode_vault_signature("vault:v1:AQID").unwrap(), vec![1, 2, 3]);
        assert!(decode_vault_signature("AQID").is_err());
        assert!(decode_vault_signature("vault:v1:***").is_err());
    }

    #[test]
    fn test_recoverable_signature_only_for_expected_address() {
        let key = signing_key();
        let hash = B256::repeat_byte(0x01);
        let signature: k256::ecdsa::Signature = key.sign_prehash(hash.as_slice()).unwrap();
        let der = signature.to_der();

        assert!(recoverable_signature(der.as_bytes(), hash, TEST_ADDRESS).is_ok());
        assert!(recoverable_signature(der.as_bytes(), hash, Address::ZERO).is_err());
    }

    #[test]
    fn test_public_key_formats() {
        let public = signing_key().verifying_key().to_encoded_point(false);
        let hex_key = format!("0x{}", hex::encode(public.as_bytes()));
        assert_eq!(address_from_public_key(&hex_key).unwrap(), TEST_ADDRESS);

        let compressed = signing_key().verifying_key().to_encoded_point(true);
        assert_eq!(address_from_public_key(&hex::encode(compressed.as_bytes())).unwrap(), TEST_ADDRESS);

        assert!(address_from_public_key("zz").is_err());
    }
}
