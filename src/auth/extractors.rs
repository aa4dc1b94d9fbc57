//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::bearer::get_bearer_token;
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasTokenService;
use crate::store::UserSummary;

/// Extractor for endpoints that require a valid access token.
///
/// Reads `Authorization: Bearer <token>` and resolves it to the current state
/// of the user. Stateless with respect to refresh tokens.
pub struct Bearer(pub UserSummary);

impl<S> FromRequestParts<S> for Bearer
where
    S: HasTokenService + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = get_bearer_token(&parts.headers)
            .ok_or_else(|| ApiAuthError::new(AuthErrorKind::NotAuthenticated))?;

        state
            .token_service()
            .validate(token)
            .await
            .map(Bearer)
            .map_err(ApiAuthError::from)
    }
}
