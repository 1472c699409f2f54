use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use banking_transfer::{HealthCheck, RequestContext, StoreError, Transfer, TransferUseCase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

type ApiError = (StatusCode, Json<Value>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransferRequest {
    pub account_origin_id: String,
    pub account_destination_id: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateTransferResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransfersResponse {
    pub transfers: Vec<Transfer>,
}

#[derive(Clone)]
pub struct AppState {
    pub transfers: TransferUseCase,
    pub health: Arc<dyn HealthCheck>,
    pub auth_token: Option<String>,
    pub require_bearer: bool,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        transfers: TransferUseCase,
        health: Arc<dyn HealthCheck>,
        auth_token: Option<String>,
        require_bearer: bool,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transfers,
            health,
            auth_token,
            require_bearer,
            request_timeout,
        }
    }

    fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/v1/transfers", post(post_transfer))
        .route("/v1/accounts/{account_id}/transfers", get(get_account_transfers))
        .with_state(state)
}

async fn health_live() -> impl IntoResponse {
    Json(json!({
        "status": "live",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = state.request_context();
    let ready = match ctx.run(state.health.ping()).await {
        Ok(()) => true,
        Err(error) => {
            warn!(request_id = %ctx.request_id(), error = %error, "readiness check failed");
            false
        }
    };
    let payload = Json(json!({
        "status": if ready { "ready" } else { "degraded" },
        "timestamp": Utc::now().to_rfc3339()
    }));

    if ready {
        (StatusCode::OK, payload).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, payload).into_response()
    }
}

async fn post_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTransferRequest>,
) -> Result<(StatusCode, Json<CreateTransferResponse>), ApiError> {
    authorize(&state, &headers)?;

    let transfer = Transfer::new(
        payload.account_origin_id,
        payload.account_destination_id,
        payload.amount,
    );
    transfer.validate().map_err(|e| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "invalid_transfer", "detail": e.to_string() })),
        )
    })?;

    let ctx = state.request_context();
    let id = state
        .transfers
        .create_transfer(&ctx, &transfer)
        .await
        .map_err(store_error)?;

    info!(
        request_id = %ctx.request_id(),
        transfer_id = %id,
        amount = transfer.amount,
        "transfer created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateTransferResponse {
            id,
            created_at: transfer.created_at,
        }),
    ))
}

async fn get_account_transfers(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<(StatusCode, Json<TransfersResponse>), ApiError> {
    let transfers = state
        .transfers
        .show_transfers(&state.request_context(), &account_id)
        .await
        .map_err(store_error)?;
    Ok((StatusCode::OK, Json(TransfersResponse { transfers })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if !state.require_bearer {
        return Ok(());
    }

    let token = state.auth_token.as_deref().ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error":"auth_token_required_but_not_configured"})),
        )
    })?;

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let expected = format!("Bearer {token}");
    if provided == expected {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"invalid_or_missing_bearer_token"})),
        ))
    }
}

fn store_error(error: StoreError) -> ApiError {
    let (status, code) = match &error {
        StoreError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        StoreError::Invalid(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transfer"),
        StoreError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable"),
        StoreError::DeadlineExceeded => (StatusCode::SERVICE_UNAVAILABLE, "deadline_exceeded"),
        StoreError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
        StoreError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };

    if status.is_server_error() {
        error!(error = %error, retryable = error.is_retryable(), "request failed");
    } else {
        warn!(error = %error, "request rejected");
    }

    (
        status,
        Json(json!({ "error": code, "detail": error.to_string() })),
    )
}
