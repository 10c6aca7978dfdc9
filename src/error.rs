use crate::domain::intent::IntentStatus;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("idempotency key reused with a different payload")]
    Conflict,

    #[error("payment intent is already being processed")]
    ProcessingInProgress,

    #[error("merchant has no enabled gateway")]
    NoGatewayAvailable,

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: IntentStatus, to: IntentStatus },

    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OrchestratorError {
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::Conflict => "IDEMPOTENCY_KEY_REUSED_WITH_DIFFERENT_PAYLOAD",
            OrchestratorError::ProcessingInProgress => "INTENT_ALREADY_PROCESSING",
            OrchestratorError::NoGatewayAvailable => "NO_GATEWAY_AVAILABLE",
            OrchestratorError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            OrchestratorError::NotFound(_) => "NOT_FOUND",
            OrchestratorError::Unauthorized => "UNAUTHORIZED",
            OrchestratorError::InvalidRequest(_) => "INVALID_REQUEST",
            OrchestratorError::Store(_) | OrchestratorError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            OrchestratorError::Conflict | OrchestratorError::ProcessingInProgress => {
                StatusCode::CONFLICT
            }
            OrchestratorError::NoGatewayAvailable => StatusCode::SERVICE_UNAVAILABLE,
            OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::Unauthorized => StatusCode::UNAUTHORIZED,
            OrchestratorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::InvalidStateTransition { .. }
            | OrchestratorError::Store(_)
            | OrchestratorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self);
        }
        let body = ErrorEnvelope {
            error: ErrorPayload {
                code: self.code().to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
