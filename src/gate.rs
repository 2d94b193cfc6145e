//! Access gate — shared passphrase check for the weekly export.
//!
//! The configured secret is a hex-encoded SHA-256 digest, loaded once at
//! process start. The supplied code is hashed and compared
//! constant-structure, so the comparison does not leak a match prefix.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Validates the shared export passphrase.
pub struct AccessGate {
    secret_hash: SecretString,
}

impl AccessGate {
    /// `secret_hash` is the hex-encoded SHA-256 digest of the passphrase.
    pub fn new(secret_hash: SecretString) -> Self {
        let normalized = secret_hash.expose_secret().trim().to_ascii_lowercase();
        Self {
            secret_hash: SecretString::from(normalized),
        }
    }

    /// Check a supplied code against the configured digest.
    pub fn verify(&self, code: &str) -> bool {
        let digest = hex::encode(Sha256::digest(code.as_bytes()));
        constant_time_eq(self.secret_hash.expose_secret(), &digest)
    }
}

/// Compare two strings without early exit on the first mismatch.
fn constant_time_eq(expected: &str, presented: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let presented_bytes = presented.as_bytes();
    let max_len = expected_bytes.len().max(presented_bytes.len());
    let mut diff = expected_bytes.len() ^ presented_bytes.len();

    for idx in 0..max_len {
        let left = expected_bytes.get(idx).copied().unwrap_or(0);
        let right = presented_bytes.get(idx).copied().unwrap_or(0);
        diff |= usize::from(left ^ right);
    }

    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_for(passphrase: &str) -> AccessGate {
        let digest = hex::encode(Sha256::digest(passphrase.as_bytes()));
        AccessGate::new(SecretString::from(digest))
    }

    #[test]
    fn correct_code_verifies() {
        let gate = gate_for("open sesame");
        assert!(gate.verify("open sesame"));
    }

    #[test]
    fn wrong_code_fails() {
        let gate = gate_for("open sesame");
        assert!(!gate.verify("open sesam"));
        assert!(!gate.verify(""));
        assert!(!gate.verify("OPEN SESAME"));
    }

    #[test]
    fn uppercase_configured_digest_is_accepted() {
        let digest = hex::encode(Sha256::digest(b"open sesame")).to_uppercase();
        let gate = AccessGate::new(SecretString::from(digest));
        assert!(gate.verify("open sesame"));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("", "a"));
        assert!(constant_time_eq("", ""));
    }
}
