use hyper::{Request, StatusCode};
use shared::types::Principal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::database::tokens as db_tokens;
use crate::database::users as db_users;
use crate::database::utils::{get_timestamp, hash_api_token};
use crate::handlers::http::utils::headers::{get_bearer_token, get_header_value, get_query_param};

/// Query parameter carrying an API token.
pub const TOKEN_QUERY_PARAM: &str = "api_token";

/// Custom header carrying an API token.
pub const TOKEN_HEADER: &str = "x-api-token";

#[derive(Debug, Error)]
pub enum TokenAuthError {
    #[error("API token required")]
    MissingCredential,

    #[error("Invalid API token")]
    InvalidCredential,

    #[error("API token has expired")]
    ExpiredCredential,

    #[error("Token store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl TokenAuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Pull a candidate credential out of the request.
///
/// Order: `Authorization: Bearer`, then the `api_token` query parameter,
/// then the `X-API-Token` header. Blank values count as absent.
pub fn extract_credential<B>(req: &Request<B>) -> Option<String> {
    if let Some(token) = get_bearer_token(req).filter(|t| !t.trim().is_empty()) {
        debug!("API token taken from Bearer header");
        return Some(token.trim().to_string());
    }

    if let Some(token) = get_query_param(req, TOKEN_QUERY_PARAM).filter(|t| !t.trim().is_empty()) {
        debug!("API token taken from query string");
        return Some(token.trim().to_string());
    }

    if let Some(token) =
        get_header_value(req.headers(), TOKEN_HEADER).filter(|t| !t.trim().is_empty())
    {
        debug!("API token taken from X-API-Token header");
        return Some(token.trim().to_string());
    }

    None
}

/// Resolve a plaintext credential to its owning principal.
///
/// On success the token's `last_used_at` is bumped; a failure to record the
/// use is logged and otherwise ignored.
pub async fn authenticate(state: &AppState, credential: &str) -> Result<Principal, TokenAuthError> {
    let token = db_tokens::find_by_hash(&state.db, &hash_api_token(credential))
        .await?
        .ok_or(TokenAuthError::InvalidCredential)?;

    let now = get_timestamp();
    if token.is_expired_at(now) {
        warn!("Expired API token {} used (user_id={})", token.id, token.user_id);
        return Err(TokenAuthError::ExpiredCredential);
    }

    let principal = db_users::get_principal(&state.db, token.user_id)
        .await?
        .ok_or(TokenAuthError::InvalidCredential)?;

    if let Err(e) = db_tokens::touch_last_used(&state.db, token.id, now).await {
        warn!("Failed to record use of API token {}: {}", token.id, e);
    }

    info!("API token {} authenticated user {}", token.id, principal.id);
    Ok(principal)
}

/// Extract and verify the request's API token.
pub async fn authenticate_request<B>(
    state: &AppState,
    req: &Request<B>,
) -> Result<Principal, TokenAuthError> {
    let credential = extract_credential(req).ok_or(TokenAuthError::MissingCredential)?;
    authenticate(state, &credential).await
}
