//! HTTP API server for the Tollgate node.
//!
//! - `POST /verify`: policy checks, then settlement dispatch
//! - `POST /settle`: settlement outcome for a previously verified payment
//! - `GET /supported`: served scheme/network pairs
//! - `GET /workflows/{nonce}`: tracked workflow state
//! - `GET /health`

use alloy_primitives::B256;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use tollgate_core::{
    InvalidReason, PaymentRequest, SettleErrorReason, SettleResponse, SupportedResponse,
    VerifyResponse,
};
use tollgate_settlement::WorkflowTracking;

use crate::state::NodeState;

// --- Response types ---

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

// --- Handlers ---

async fn handle_health(State(state): State<Arc<NodeState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn handle_verify(
    State(state): State<Arc<NodeState>>,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> (StatusCode, Json<VerifyResponse>) {
    match body {
        Ok(Json(req)) => (StatusCode::OK, Json(state.facilitator.verify(&req).await)),
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "malformed verify request");
            (
                rejection.status(),
                Json(VerifyResponse::invalid(InvalidReason::UnexpectedVerifyError, None)),
            )
        }
    }
}

async fn handle_settle(
    State(state): State<Arc<NodeState>>,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> (StatusCode, Json<SettleResponse>) {
    match body {
        Ok(Json(req)) => (StatusCode::OK, Json(state.facilitator.settle(&req).await)),
        Err(rejection) => (
            rejection.status(),
            Json(SettleResponse::failed(
                SettleErrorReason::UnexpectedSettleError,
                Some(rejection.body_text()),
            )),
        ),
    }
}

async fn handle_supported(State(state): State<Arc<NodeState>>) -> Json<SupportedResponse> {
    Json(state.facilitator.supported())
}

async fn handle_workflow(
    State(state): State<Arc<NodeState>>,
    Path(nonce): Path<String>,
) -> Result<Json<WorkflowTracking>, ApiError> {
    let nonce = B256::from_str(&nonce)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid nonce: {e}")))?;
    match state.facilitator.workflow(nonce).await {
        Ok(Some(entry)) => Ok(Json(entry)),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("no workflow tracked for nonce {nonce}"),
        )),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/verify", post(handle_verify))
        .route("/settle", post(handle_settle))
        .route("/supported", get(handle_supported))
        .route("/workflows/{nonce}", get(handle_workflow))
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<NodeState>,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
