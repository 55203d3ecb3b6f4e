//! Webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs the raw request body with a shared secret and carries the
//! result in the `x-hub-signature-256` header as `sha256=<hex>`. The check
//! runs against the exact unparsed body bytes, before any JSON decoding, so
//! a payload whose serialization differs from what was signed can never be
//! accepted.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parse a `sha256=<hex>` header value into raw signature bytes.
///
/// `None` for malformed headers (missing prefix, wrong algorithm, bad hex).
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Compute the HMAC-SHA256 of `payload` under `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Render a signature as a header value, `sha256=<hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verify a signature header against the payload and shared secret.
///
/// Returns `false` (never panics) for any mismatch or malformed header. The
/// comparison is constant-time via the HMAC library.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_valid_header() {
        assert_eq!(
            parse_signature_header("sha256=1234abcd"),
            Some(vec![0x12, 0x34, 0xab, 0xcd])
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(parse_signature_header("1234abcd"), None);
        assert_eq!(parse_signature_header("sha1=1234abcd"), None);
        assert_eq!(parse_signature_header("sha256=xyz"), None);
        assert_eq!(parse_signature_header(""), None);
    }

    #[test]
    fn signs_and_verifies() {
        // The example from GitHub's webhook validation documentation.
        let payload = b"Hello, World!";
        let secret = b"It's a Secret to Everybody";

        let header = format_signature_header(&compute_signature(payload, secret));
        assert!(verify_signature(payload, &header, secret));
    }

    #[test]
    fn flipping_a_payload_byte_fails_verification() {
        let secret = b"secret";
        let header = format_signature_header(&compute_signature(b"original", secret));

        assert!(verify_signature(b"original", &header, secret));
        assert!(!verify_signature(b"Original", &header, secret));
    }

    #[test]
    fn flipping_a_signature_byte_fails_verification() {
        let secret = b"secret";
        let mut signature = compute_signature(b"payload", secret);
        signature[0] ^= 0x01;

        assert!(!verify_signature(
            b"payload",
            &format_signature_header(&signature),
            secret
        ));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let header = format_signature_header(&compute_signature(b"payload", b"right"));
        assert!(!verify_signature(b"payload", &header, b"wrong"));
    }

    #[test]
    fn malformed_headers_verify_false_without_panicking() {
        let secret = b"secret";
        for header in ["", "sha256=", "sha256=zzzz", "sha1=abc123", "garbage"] {
            assert!(!verify_signature(b"payload", header, secret));
        }
    }
}
