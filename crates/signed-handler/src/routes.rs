//! HTTP routes.
//!
//! | Route | Signature |
//! |-------|-----------|
//! | `GET /health` | none |
//! | `POST /rpc/:procedure` | per `require_signature` |
//! | `GET /admin/signing/stats` | always |
//! | `PUT /admin/signing/config` | always |
//! | `DELETE /admin/signing/replay-cache` | always |

use crate::config::SharedSecret;
use crate::error::HandlerError;
use crate::gateway::ProcedureGateway;
use crate::middleware::{SignatureLayer, TracingLayer, VerifiedCall};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use shared_signing::{SigningConfig, SigningConfigOverrides, SigningManager, SigningStats};
use std::sync::Arc;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub signing: Arc<SigningManager>,
    pub gateway: Arc<dyn ProcedureGateway>,
}

/// Router settings that are not part of handler state.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub secret: SharedSecret,
    pub max_body_bytes: usize,
    pub require_signature: bool,
}

pub fn build_router(state: AppState, options: RouterOptions) -> Router {
    let signature = |required: bool| {
        SignatureLayer::new(
            Arc::clone(&state.signing),
            options.secret.clone(),
            options.max_body_bytes,
            required,
        )
    };

    let rpc = Router::new()
        .route("/rpc/:procedure", post(call_procedure))
        .layer(signature(options.require_signature));

    let admin = Router::new()
        .route("/admin/signing/stats", get(signing_stats))
        .route("/admin/signing/config", put(update_signing_config))
        .route("/admin/signing/replay-cache", delete(clear_replay_cache))
        .layer(signature(true));

    Router::new()
        .route("/health", get(health_check))
        .merge(rpc)
        .merge(admin)
        .layer(TracingLayer::new())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn call_procedure(
    State(state): State<AppState>,
    Path(procedure): Path<String>,
    verified: Option<Extension<VerifiedCall>>,
    body: String,
) -> Result<Json<Value>, HandlerError> {
    let args = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).map_err(|e| HandlerError::InvalidArguments(e.to_string()))?
    };

    let correlation_id = verified.and_then(|Extension(call)| call.correlation_id);
    info!(
        procedure = %procedure,
        correlation_id = correlation_id.as_deref().unwrap_or("-"),
        "Calling procedure"
    );

    let result = state.gateway.call(&procedure, args).await?;
    Ok(Json(json!({
        "procedure": procedure,
        "correlation_id": correlation_id,
        "result": result,
    })))
}

async fn signing_stats(State(state): State<AppState>) -> Json<SigningStats> {
    Json(state.signing.stats())
}

async fn update_signing_config(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<SigningConfig>, HandlerError> {
    let overrides: SigningConfigOverrides =
        serde_json::from_str(&body).map_err(|e| HandlerError::InvalidArguments(e.to_string()))?;
    let config = state.signing.configure(overrides)?;
    Ok(Json(config))
}

async fn clear_replay_cache(State(state): State<AppState>) -> Json<Value> {
    let evicted = state.signing.clear_replay_cache();
    Json(json!({ "evicted": evicted }))
}
