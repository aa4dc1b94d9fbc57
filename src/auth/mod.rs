//! Bearer authentication for API routes.
//!
//! Access tokens are stateless and checked against the signing key and the
//! current user record only. Refresh tokens never reach this module.

mod bearer;
mod errors;
mod extractors;
mod state;

pub use bearer::{BEARER_SCHEME, get_bearer_token};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::Bearer;
pub use state::HasTokenService;
