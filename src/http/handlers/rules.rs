use crate::domain::rule::{RoutingRule, RuleCondition};
use crate::error::OrchestratorError;
use crate::http::middleware::merchant_auth::MerchantIdentity;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    #[serde(flatten)]
    pub condition: RuleCondition,
    pub target_gateway: String,
    pub priority: i32,
}

pub async fn list_rules(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
) -> Result<Response, OrchestratorError> {
    let rules = state.store.routing_rules(&merchant.id).await?;
    Ok((StatusCode::OK, Json(rules)).into_response())
}

pub async fn create_rule(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
    Json(req): Json<CreateRuleRequest>,
) -> Result<Response, OrchestratorError> {
    if !state.registry.contains_key(&req.target_gateway) {
        return Err(OrchestratorError::InvalidRequest(format!(
            "unknown target gateway: {}",
            req.target_gateway
        )));
    }
    let rule = RoutingRule::new(&merchant.id, &req.target_gateway, req.priority, req.condition);
    state.store.insert_rule(&rule).await?;
    Ok((StatusCode::CREATED, Json(rule)).into_response())
}

pub async fn delete_rule(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
    Path(rule_id): Path<String>,
) -> Result<Response, OrchestratorError> {
    if !state.store.delete_rule(&merchant.id, &rule_id).await? {
        return Err(OrchestratorError::NotFound("routing rule".to_string()));
    }
    Ok((StatusCode::OK, Json(serde_json::json!({"deleted": true}))).into_response())
}
