use crate::error::OrchestratorError;
use crate::store::MerchantRecord;
use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

/// The authenticated merchant, inserted as a request extension.
#[derive(Clone)]
pub struct MerchantIdentity(pub MerchantRecord);

pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// Resolves `X-Api-Key` to a merchant. Keys are stored hashed; a disabled
/// merchant is rejected the same way as an unknown key.
pub async fn require_merchant(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("X-Api-Key")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    if provided.is_empty() {
        return OrchestratorError::Unauthorized.into_response();
    }

    let merchant = match state
        .store
        .merchant_by_api_key_hash(&hash_api_key(provided))
        .await
    {
        Ok(Some(m)) if !m.is_disabled => m,
        Ok(_) => return OrchestratorError::Unauthorized.into_response(),
        Err(e) => return OrchestratorError::Store(e).into_response(),
    };

    request.extensions_mut().insert(MerchantIdentity(merchant));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_hash_is_stable_hex() {
        let h = hash_api_key("sk_test_abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_api_key("sk_test_abc"));
        assert_ne!(h, hash_api_key("sk_test_abd"));
    }
}
