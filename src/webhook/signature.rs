use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-weclapp-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing webhook signature")]
    Missing,

    #[error("Malformed webhook signature")]
    Malformed,

    #[error("Webhook secret is not configured")]
    NotConfigured,

    #[error("Invalid webhook signature")]
    Mismatch,
}

/// Hex HMAC-SHA256 of `body` under `secret`
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a signature header against the raw request body.
///
/// The header carries the hex digest, optionally prefixed with `sha256=`.
/// Comparison is constant-time.
pub fn verify(secret: &str, header: Option<&str>, body: &[u8]) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::NotConfigured);
    }
    let header = header.map(str::trim).filter(|h| !h.is_empty()).ok_or(SignatureError::Missing)?;
    let digest = header.strip_prefix("sha256=").unwrap_or(header);
    let expected = hex::decode(digest).map_err(|_| SignatureError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::NotConfigured)?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"event":"task.updated","entityId":"42"}"#;

    #[test]
    fn accepts_plain_and_prefixed_digests() {
        let digest = sign(SECRET, BODY);
        assert_eq!(digest.len(), 64);
        assert_eq!(verify(SECRET, Some(&digest), BODY), Ok(()));
        assert_eq!(verify(SECRET, Some(&format!("sha256={}", digest)), BODY), Ok(()));
        assert_eq!(verify(SECRET, Some(&digest.to_uppercase()), BODY), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let digest = sign(SECRET, BODY);
        assert_eq!(
            verify(SECRET, Some(&digest), br#"{"event":"task.deleted","entityId":"42"}"#),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_missing_malformed_and_unconfigured() {
        assert_eq!(verify(SECRET, None, BODY), Err(SignatureError::Missing));
        assert_eq!(verify(SECRET, Some("  "), BODY), Err(SignatureError::Missing));
        assert_eq!(verify(SECRET, Some("not-hex"), BODY), Err(SignatureError::Malformed));
        assert_eq!(verify("", Some(&sign(SECRET, BODY)), BODY), Err(SignatureError::NotConfigured));
    }

    #[test]
    fn short_digest_is_a_mismatch() {
        assert_eq!(verify(SECRET, Some("abcd"), BODY), Err(SignatureError::Mismatch));
    }
}
