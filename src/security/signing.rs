//! Keyed signing primitive shared by the session codec and CSRF deriver.
//!
//! # Responsibilities
//! - Produce a fixed-length signature over `secret ‖ payload`
//! - Render signatures as lowercase hex
//! - Verify a hex signature without early exit on the first differing byte
//!
//! # Design Decisions
//! - Two rounds of FNV-1a style mixing, the second seeded with the first
//! - 16 raw bytes, 32 hex characters on the wire
//!
//! WARNING: this is a textbook keyed hash, not HMAC. It is not adequate for
//! production integrity guarantees. Replacing it changes the signature
//! length/encoding, so any replacement must version the cookie format or
//! every existing session cookie stops verifying.

/// Length of a raw signature in bytes.
pub const SIGNATURE_LEN: usize = 16;

const ROUND_ONE_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const ROUND_TWO_OFFSET: u64 = 0x6c62_272e_07bb_0142;
const PRIME: u64 = 0x0000_0100_0000_01b3;

fn mix(mut state: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        state ^= u64::from(b);
        state = state.wrapping_mul(PRIME);
    }
    state
}

/// Sign `secret ‖ payload`.
pub fn sign(secret: &[u8], payload: &[u8]) -> [u8; SIGNATURE_LEN] {
    let first = mix(mix(ROUND_ONE_OFFSET, secret), payload);
    let seeded = mix(ROUND_TWO_OFFSET, &first.to_be_bytes());
    let second = mix(mix(seeded, secret), payload);

    let mut out = [0u8; SIGNATURE_LEN];
    out[..8].copy_from_slice(&first.to_be_bytes());
    out[8..].copy_from_slice(&second.to_be_bytes());
    out
}

/// Sign `secret ‖ payload` and hex-encode the result.
pub fn sign_hex(secret: &[u8], payload: &[u8]) -> String {
    hex::encode(sign(secret, payload))
}

/// Check a hex signature against `secret ‖ payload`.
///
/// Only the canonical lowercase encoding verifies.
pub fn verify_hex(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    let expected = sign_hex(secret, payload);
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

/// Byte comparison whose running time does not depend on where inputs differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
