//! Webhook payload HMAC verification.
//!
//! Terminal devices sign the raw request body with a shared secret using
//! HMAC-SHA256 and send the hex digest in a header. Verification goes
//! through [`Mac::verify_slice`], which compares in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the HMAC-SHA256 signature for a webhook payload.
///
/// Returns the hex-encoded digest. Used by tests and by operators to
/// produce valid signatures for replayed deliveries.
pub fn compute_signature(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex-encoded HMAC-SHA256 signature against the raw payload.
///
/// Returns `false` for a digest that does not decode as hex, has the wrong
/// length, or does not match. The comparison itself is constant-time.
pub fn verify_signature(secret: &str, payload: &[u8], provided_hex: &str) -> bool {
    let Some(provided) = hex::decode(provided_hex) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}

// ---------------------------------------------------------------------------
// hex encoding helpers (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string into bytes. Returns `None` on odd length or a
    /// non-hex character.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_hex_string() {
        let sig = compute_signature("secret", br#"{"device_id":"d1"}"#);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_is_deterministic() {
        let a = compute_signature("secret", b"payload");
        let b = compute_signature("secret", b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn signature_differs_with_different_secret() {
        let a = compute_signature("secret_a", b"payload");
        let b = compute_signature("secret_b", b"payload");
        assert_ne!(a, b);
    }

    #[test]
    fn valid_signature_verifies() {
        let sig = compute_signature("secret", b"payload");
        assert!(verify_signature("secret", b"payload", &sig));
    }

    #[test]
    fn wrong_secret_rejected() {
        let sig = compute_signature("secret_a", b"payload");
        assert!(!verify_signature("secret_b", b"payload", &sig));
    }

    #[test]
    fn tampered_payload_rejected() {
        let sig = compute_signature("secret", b"payload");
        assert!(!verify_signature("secret", b"tampered", &sig));
    }

    #[test]
    fn non_hex_signature_rejected() {
        assert!(!verify_signature("secret", b"payload", "not-a-hex-digest"));
    }

    #[test]
    fn odd_length_signature_rejected() {
        assert!(!verify_signature("secret", b"payload", "abc"));
    }

    #[test]
    fn hex_round_trip() {
        let encoded = hex::encode([0x00, 0xff, 0x10]);
        assert_eq!(encoded, "00ff10");
        assert_eq!(hex::decode(&encoded), Some(vec![0x00, 0xff, 0x10]));
    }
}
