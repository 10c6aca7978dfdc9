use crate::domain::intent::{IntentStatus, PaymentIntent};
use crate::error::OrchestratorError;
use crate::http::middleware::merchant_auth::MerchantIdentity;
use crate::store::{IntentFilter, IntentSort, IntentStats};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub card_token: String,
}

#[derive(Debug, Serialize)]
pub struct IntentListResponse {
    pub data: Vec<PaymentIntent>,
    pub pagination: Pagination,
    pub stats: IntentStats,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub currency: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Missing `X-Idempotency-Key` gets a generated key: the request is still
/// deduplicated at the store, the caller just cannot replay it.
pub async fn create_intent(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
    headers: HeaderMap,
    Json(req): Json<CreateIntentRequest>,
) -> Result<Response, OrchestratorError> {
    let idempotency_key = headers
        .get("X-Idempotency-Key")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = state
        .payment_service
        .create_intent(&merchant, req.amount, &req.currency, &idempotency_key)
        .await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.intent)).into_response())
}

pub async fn process_intent(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
    Path(intent_id): Path<String>,
    Json(req): Json<ProcessRequest>,
) -> Result<Response, OrchestratorError> {
    let outcome = state
        .payment_service
        .process(&merchant, &intent_id, &req.card_token)
        .await?;
    Ok((StatusCode::OK, Json(outcome.intent)).into_response())
}

pub async fn cancel_intent(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
    Path(intent_id): Path<String>,
) -> Result<Response, OrchestratorError> {
    let intent = state.payment_service.cancel(&merchant, &intent_id).await?;
    Ok((StatusCode::OK, Json(intent)).into_response())
}

pub async fn get_intent(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
    Path(intent_id): Path<String>,
) -> Result<Response, OrchestratorError> {
    let intent = state
        .payment_service
        .get_intent(&merchant, &intent_id)
        .await?;
    Ok((StatusCode::OK, Json(intent)).into_response())
}

pub async fn list_intents(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
    Query(query): Query<ListQuery>,
) -> Result<Response, OrchestratorError> {
    let filter = filter_from_query(&query)?;
    let (data, total) = state.store.list_intents(&merchant.id, &filter).await?;
    let stats = state.store.intent_stats(&merchant.id).await?;
    Ok((
        StatusCode::OK,
        Json(IntentListResponse {
            data,
            pagination: Pagination {
                page: filter.page,
                limit: filter.limit,
                total,
            },
            stats,
        }),
    )
        .into_response())
}

pub async fn intent_stats(
    State(state): State<AppState>,
    Extension(MerchantIdentity(merchant)): Extension<MerchantIdentity>,
) -> Result<Response, OrchestratorError> {
    let stats = state.store.intent_stats(&merchant.id).await?;
    Ok((StatusCode::OK, Json(stats)).into_response())
}

fn filter_from_query(query: &ListQuery) -> Result<IntentFilter, OrchestratorError> {
    let status = match &query.status {
        Some(s) => Some(IntentStatus::parse(s).ok_or_else(|| {
            OrchestratorError::InvalidRequest(format!("unknown status filter: {s}"))
        })?),
        None => None,
    };
    let sort = match query.sort.as_deref() {
        None | Some("newest") => IntentSort::Newest,
        Some("amount_desc") => IntentSort::AmountDesc,
        Some("amount_asc") => IntentSort::AmountAsc,
        Some(other) => {
            return Err(OrchestratorError::InvalidRequest(format!(
                "unknown sort: {other}"
            )))
        }
    };
    Ok(IntentFilter {
        status,
        currency: query.currency.clone(),
        sort,
        page: query.page.unwrap_or(1).max(1),
        limit: query.limit.unwrap_or(10).clamp(1, 100),
    })
}
