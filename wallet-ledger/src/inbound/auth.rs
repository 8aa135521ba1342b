//! Request authentication.
//!
//! End users are identified by the `X-User-ID` header set by the upstream
//! gateway. PSP callbacks carry a shared secret in `X-PSP-API-Key`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use wallet_types::{AppError, LedgerRepository, PspGateway, UserId};

use super::handlers::{ApiError, AppState};

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const PSP_API_KEY_HEADER: &str = "X-PSP-API-Key";

/// Hashes an API key using SHA-256.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Verifies an API key against a stored hash using constant-time comparison.
pub fn verify_api_key(input: &str, stored_hash: &str) -> bool {
    let input_hash = hash_api_key(input);
    input_hash.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

/// The user on whose behalf a request runs.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))?;

        let user_id = raw
            .trim()
            .parse::<UserId>()
            .map_err(|_| AppError::Unauthorized(format!("Invalid {} header", USER_ID_HEADER)))?;

        Ok(Self(user_id))
    }
}

/// Rejects PSP callbacks that do not carry the shared secret.
pub async fn psp_auth_middleware<R: LedgerRepository, P: PspGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(PSP_API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if verify_api_key(key, &state.psp_key_hash) => next.run(request).await,
        _ => {
            tracing::warn!("PSP callback rejected: missing or invalid API key");
            ApiError(AppError::Unauthorized("Invalid PSP API key".into())).into_response()
        }
    }
}
