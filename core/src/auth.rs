//! `Authorization` header construction.
//!
//! The collection endpoint uses HTTP Basic auth: the identity (account email)
//! and secret (API token) joined by `:` and base64-encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Build the `Authorization` header value for an identity/secret pair.
pub fn build_auth_header(identity: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{identity}:{secret}")))
}
