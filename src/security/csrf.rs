//! CSRF token derivation and validation.
//!
//! # Design Decisions
//! - The token is a signature over the session contents, not a per-request
//!   nonce: it stays the same while the session is unchanged and rotates
//!   whenever any entry changes
//! - Signed input is `secret ‖ keys ‖ values ‖ "csrf"`

use crate::security::signing;
use crate::session::Session;

/// Default hidden form field carrying the token.
pub const CSRF_FORM_FIELD: &str = "_csrf";

/// Header accepted as an alternative to the form field.
pub const CSRF_HEADER: &str = "x-csrf-token";

const CSRF_SUFFIX: &str = "csrf";

fn token_input(session: &Session) -> Vec<u8> {
    let mut input = Vec::new();
    for (key, _) in session.iter() {
        input.extend_from_slice(key.as_bytes());
    }
    for (_, value) in session.iter() {
        input.extend_from_slice(value.as_bytes());
    }
    input.extend_from_slice(CSRF_SUFFIX.as_bytes());
    input
}

/// Derive the token for `session`.
pub fn generate_token(secret: &str, session: &Session) -> String {
    signing::sign_hex(secret.as_bytes(), &token_input(session))
}

/// Check a submitted token against the one derived from `session`.
pub fn validate_token(token: &str, secret: &str, session: &Session) -> bool {
    let expected = generate_token(secret, session);
    signing::constant_time_eq(expected.as_bytes(), token.as_bytes())
}
