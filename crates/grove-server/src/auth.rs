//! Bearer-token authentication for protected routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use grove_auth::TokenKind;
use grove_types::ForestError;

use crate::error::ApiError;
use crate::state::AppState;

/// The principal extracted from a valid session token.
///
/// Handlers take this extractor to mark themselves protected; requests
/// without a verifiable session token never reach them. Refresh tokens
/// are rejected here, whatever their signature says.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Authenticated user id.
    pub user_id: String,
    /// Login name from the token claims.
    pub username: String,
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError(ForestError::Unauthenticated("no token provided".into()))
            })?;

        let token = header.strip_prefix("Bearer ").unwrap_or(header);
        let claims = state
            .validator
            .validate_kind(token, TokenKind::Session)
            .map_err(|e| ApiError(ForestError::Unauthenticated(e.to_string())))?;

        Ok(Self {
            user_id: claims.user_id,
            username: claims.username,
        })
    }
}
