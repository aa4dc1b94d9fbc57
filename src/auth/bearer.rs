//! Bearer token parsing for the Authorization header.

use axum::http::{HeaderMap, header};

/// Authorization scheme accepted for access tokens.
pub const BEARER_SCHEME: &str = "Bearer";

/// Extract the token from an `Authorization: Bearer <token>` header.
/// The scheme name is matched case-insensitively.
pub fn get_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}
