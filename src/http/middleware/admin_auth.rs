use crate::error::OrchestratorError;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

pub async fn require_admin_key(
    State(expected): State<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("X-Admin-Key")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if provided.is_empty() || provided != expected {
        return OrchestratorError::Unauthorized.into_response();
    }

    next.run(request).await
}
