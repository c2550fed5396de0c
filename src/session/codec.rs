//! Session cookie encoding and verification.
//!
//! Wire format: `<url-encoded "k=v&k=v...">.<hex-signature>`, where the
//! signature covers `secret ‖ "k=v&k=v..."`. Keys and values are encoded
//! before joining, and the joined payload is encoded again, so the payload
//! half never contains a raw `&`, `=` or `%` from user data. A literal `.`
//! can survive encoding, which is why decoding splits on the last one.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::security::signing;
use crate::session::Session;

/// Everything except alphanumerics and `-_.~` is escaped.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn url_encode(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

/// Inverse of [`url_encode`]; also accepts `+` for space.
pub(crate) fn url_decode(input: &str) -> Option<String> {
    let spaced = input.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

fn payload(session: &Session) -> String {
    session
        .iter()
        .map(|(k, v)| format!("{}={}", url_encode(k), url_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Serialize and sign a session into a cookie value.
pub fn encode(session: &Session, secret: &str) -> String {
    let payload = payload(session);
    let signature = signing::sign_hex(secret.as_bytes(), payload.as_bytes());
    format!("{}.{}", url_encode(&payload), signature)
}

/// Verify and decode a cookie value.
///
/// Anything that does not verify (missing separator, bad signature, bad
/// encoding) decodes to an empty session.
pub fn decode(cookie: &str, secret: &str) -> Session {
    match try_decode(cookie, secret) {
        Some(session) => session,
        None => {
            tracing::debug!(cookie_len = cookie.len(), "Session cookie rejected, starting empty session");
            Session::new()
        }
    }
}

fn try_decode(cookie: &str, secret: &str) -> Option<Session> {
    let (encoded, signature) = cookie.rsplit_once('.')?;
    let payload = url_decode(encoded)?;
    if !signing::verify_hex(secret.as_bytes(), payload.as_bytes(), signature) {
        return None;
    }
    if payload.is_empty() {
        return Some(Session::new());
    }

    let mut entries = Vec::new();
    for pair in payload.split('&') {
        let (key, value) = pair.split_once('=')?;
        entries.push((url_decode(key)?, url_decode(value)?));
    }
    Some(Session::from_entries(entries))
}
