//! Authentication error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::bearer::BEARER_SCHEME;
use crate::service::AuthError;

/// Why a request failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    InvalidToken,
    Expired,
    Unavailable,
    Internal,
}

/// API authentication errors (returns JSON with a bearer challenge).
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::Expired => StatusCode::UNAUTHORIZED,
            AuthErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AuthErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::InvalidToken => "Could not validate credentials",
            AuthErrorKind::Expired => "Token has expired",
            AuthErrorKind::Unavailable => "Service temporarily unavailable",
            AuthErrorKind::Internal => "Internal server error",
        }
    }
}

impl From<AuthError> for ApiAuthError {
    fn from(e: AuthError) -> Self {
        let kind = match e {
            AuthError::Expired => AuthErrorKind::Expired,
            AuthError::Unavailable => AuthErrorKind::Unavailable,
            AuthError::Internal(_) => AuthErrorKind::Internal,
            _ => AuthErrorKind::InvalidToken,
        };
        Self::new(kind)
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let status = self.status_code();
        let mut response = (
            status,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BEARER_SCHEME),
            );
        }

        response
    }
}
