use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::chain::types::ChainType;
use crate::http::server::AppState;
use crate::payout::types::{BatchPayoutRequest, BatchPayoutResponse, PayoutError};

/// Error body for every non-2xx response from the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainSummary {
    pub chain_id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub chain_type: ChainType,
    pub native_token: String,
    pub decimals: u8,
    pub explorer_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub chains: usize,
    pub queue_depth: usize,
}

/// HTTP view of a [`PayoutError`].
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl From<PayoutError> for ApiError {
    fn from(error: PayoutError) -> Self {
        let status = match &error {
            PayoutError::Validation(_) | PayoutError::UnsupportedChain(_) => StatusCode::BAD_REQUEST,
            PayoutError::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let item_index = match &error {
            PayoutError::Validation(v) => v.item_index,
            _ => None,
        };
        Self {
            status,
            body: ErrorResponse {
                error: error.to_string(),
                item_index,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            StatusCode::UNSUPPORTED_MEDIA_TYPE => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            body: ErrorResponse {
                error: rejection.body_text(),
                item_index: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub async fn submit_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchPayoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchPayoutResponse>), ApiError> {
    let Json(request) = payload?;
    let response = state.intake.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

pub async fn list_chains(State(state): State<AppState>) -> Json<Vec<ChainSummary>> {
    let chains = state
        .registry
        .chains()
        .into_iter()
        .map(|chain| ChainSummary {
            chain_id: chain.config.chain_id,
            name: chain.config.name.clone(),
            chain_type: chain.config.chain_type,
            native_token: chain.config.native_token.clone(),
            decimals: chain.config.decimals,
            explorer_url: chain.config.explorer_url.clone(),
        })
        .collect();
    Json(chains)
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chains: state.registry.len(),
        queue_depth: state.queue.len().await,
    })
}
