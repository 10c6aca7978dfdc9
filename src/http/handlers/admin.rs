use crate::error::OrchestratorError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ToggleGatewayRequest {
    /// "up" clears any outage flag, "down" forces one.
    pub status: String,
}

pub async fn toggle_gateway(
    State(state): State<AppState>,
    Path(gateway_name): Path<String>,
    Json(req): Json<ToggleGatewayRequest>,
) -> Result<Response, OrchestratorError> {
    if !state.registry.contains_key(&gateway_name) {
        return Err(OrchestratorError::NotFound("gateway".to_string()));
    }
    match req.status.as_str() {
        "up" => state.monitor.revive(&gateway_name),
        "down" => state.monitor.force_outage(&gateway_name),
        other => {
            return Err(OrchestratorError::InvalidRequest(format!(
                "status must be \"up\" or \"down\", got {other:?}"
            )))
        }
    }
    tracing::info!(gateway = %gateway_name, status = %req.status, "gateway toggled by admin");
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "gateway_name": gateway_name,
            "is_outage": state.monitor.is_outage(&gateway_name),
        })),
    )
        .into_response())
}

pub async fn all_gateway_health(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.monitor.snapshot_all())).into_response()
}
