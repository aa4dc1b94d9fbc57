//! Opaque refresh token generation.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

/// Random bytes behind each refresh token (384 bits).
pub const REFRESH_TOKEN_BYTES: usize = 48;

/// Generate a new unguessable refresh token string.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
