//! Opaque token generation for session identifiers and CSRF secrets.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Length in characters of every generated token (hex-encoded SHA-256).
pub const TOKEN_LEN: usize = 64;

/// Derive a fresh opaque token from process-local entropy.
///
/// Two UUIDv4 values (122 random bits each) are hashed together, so the
/// token never exposes raw generator output and is uniform over 256 bits.
pub fn fresh_token() -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}

pub fn new_session_id() -> String {
    fresh_token()
}

pub fn new_csrf_token() -> String {
    fresh_token()
}

/// Constant-time equality for token comparison.
pub fn tokens_match(expected: &str, presented: &str) -> bool {
    if expected.len() != presented.len() {
        return false;
    }
    expected
        .as_bytes()
        .ct_eq(presented.as_bytes())
        .unwrap_u8()
        == 1
}

/// Quick shape check for identifiers arriving from cookies, so obviously
/// forged values never reach the session store.
pub fn is_well_formed_token(candidate: &str) -> bool {
    candidate.len() == TOKEN_LEN && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_hex_and_fixed_length() {
        let token = fresh_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(is_well_formed_token(&token));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let a = fresh_token();
        let b = fresh_token();
        assert_ne!(a, b);
    }

    #[test]
    fn comparison_is_exact() {
        let token = fresh_token();
        assert!(tokens_match(&token, &token.clone()));
        assert!(!tokens_match(&token, &fresh_token()));
        assert!(!tokens_match(&token, &token[..TOKEN_LEN - 1]));
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        assert!(!is_well_formed_token(""));
        assert!(!is_well_formed_token("short"));
        assert!(!is_well_formed_token(&"g".repeat(TOKEN_LEN)));
    }
}
