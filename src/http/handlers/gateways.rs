use crate::error::OrchestratorError;
use crate::http::middleware::merchant_auth::MerchantIdentity;
use crate::store::GatewayConfigRecord;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct GatewayHealthView {
    pub gateway_name: String,
    pub status: &'static str,
    pub enabled: bool,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub sample_count: usize,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertGatewayConfigRequest {
    pub enabled: bool,
    pub credential_ref: Option<String>,
}

/// Health of the merchant's configured gateways, labelled from the rolling
/// window the router reads.
pub async fn gateway_health(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
) -> Result<Response, OrchestratorError> {
    let configs = state.store.gateway_configs(&merchant.id).await?;
    let views: Vec<GatewayHealthView> = configs
        .iter()
        .map(|c| {
            let snapshot = state.monitor.snapshot(&c.gateway_name);
            GatewayHealthView {
                gateway_name: c.gateway_name.clone(),
                status: snapshot.status_label(),
                enabled: c.enabled,
                success_rate: snapshot.success_rate,
                avg_latency_ms: snapshot.avg_latency_ms,
                sample_count: snapshot.sample_count,
                last_checked_at: snapshot.last_checked_at,
                message: snapshot.message,
            }
        })
        .collect();
    Ok((StatusCode::OK, Json(views)).into_response())
}

pub async fn list_gateway_configs(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
) -> Result<Response, OrchestratorError> {
    let configs = state.store.gateway_configs(&merchant.id).await?;
    let views: Vec<serde_json::Value> = configs
        .iter()
        .map(|c| {
            serde_json::json!({
                "gateway_name": c.gateway_name,
                "enabled": c.enabled,
                "has_credential": c.has_credential(),
            })
        })
        .collect();
    Ok((StatusCode::OK, Json(views)).into_response())
}

pub async fn upsert_gateway_config(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
    Path(gateway_name): Path<String>,
    Json(req): Json<UpsertGatewayConfigRequest>,
) -> Result<Response, OrchestratorError> {
    if !state.registry.contains_key(&gateway_name) {
        return Err(OrchestratorError::InvalidRequest(format!(
            "unknown gateway: {gateway_name}"
        )));
    }
    let config = GatewayConfigRecord {
        merchant_id: merchant.id.clone(),
        gateway_name,
        enabled: req.enabled,
        credential_ref: req.credential_ref,
    };
    state.store.upsert_gateway_config(&config).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "gateway_name": config.gateway_name,
            "enabled": config.enabled,
            "has_credential": config.has_credential(),
        })),
    )
        .into_response())
}
