//! Slack request signature verification (`v0` scheme).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_VERSION: &str = "v0";
pub const MAX_REQUEST_AGE_SECS: i64 = 300;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid request timestamp")]
    InvalidTimestamp,
    #[error("invalid request signature")]
    InvalidSignature,
}

fn basestring_mac(secret: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSignature)?;
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    Ok(mac)
}

pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mac = basestring_mac(secret, timestamp, body)?;
    Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(mac.finalize().into_bytes())))
}

/// Checks `X-Slack-Signature` against the body and `X-Slack-Request-Timestamp`.
/// `now` is unix seconds.
pub fn verify(
    secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let sent_at: i64 = timestamp.trim().parse().map_err(|_| SignatureError::InvalidTimestamp)?;
    match now.checked_sub(sent_at).map(i64::unsigned_abs) {
        Some(age) if age <= MAX_REQUEST_AGE_SECS.unsigned_abs() => {}
        _ => return Err(SignatureError::InvalidTimestamp),
    }

    let Some(provided) = signature.strip_prefix("v0=") else {
        return Err(SignatureError::InvalidSignature);
    };
    let provided = hex::decode(provided).map_err(|_| SignatureError::InvalidSignature)?;

    basestring_mac(secret, timestamp, body)?
        .verify_slice(&provided)
        .map_err(|_| SignatureError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::{sign, verify, SignatureError};

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = b"payload=%7B%22type%22%3A%22block_actions%22%7D";

    #[test]
    fn signed_body_verifies() {
        let signature = sign(SECRET, "1531420618", BODY).expect("sign");
        assert!(signature.starts_with("v0="));
        assert_eq!(verify(SECRET, "1531420618", BODY, &signature, 1_531_420_700), Ok(()));
    }

    #[test]
    fn stale_or_malformed_timestamp_is_rejected() {
        let signature = sign(SECRET, "1531420618", BODY).expect("sign");
        assert_eq!(
            verify(SECRET, "1531420618", BODY, &signature, 1_531_420_618 + 301),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            verify(SECRET, "yesterday", BODY, &signature, 1_531_420_618),
            Err(SignatureError::InvalidTimestamp)
        );
    }

    #[test]
    fn extreme_timestamps_are_rejected_without_overflow() {
        assert_eq!(
            verify(SECRET, "-9223372036854775808", b"", "v0=00", 1_700_000_000),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            verify(SECRET, "9223372036854775807", b"", "v0=00", -1_700_000_000),
            Err(SignatureError::InvalidTimestamp)
        );
    }

    #[test]
    fn tampered_body_or_secret_is_rejected() {
        let signature = sign(SECRET, "1531420618", BODY).expect("sign");
        assert_eq!(
            verify(SECRET, "1531420618", b"payload=other", &signature, 1_531_420_618),
            Err(SignatureError::InvalidSignature)
        );
        assert_eq!(
            verify("another-secret", "1531420618", BODY, &signature, 1_531_420_618),
            Err(SignatureError::InvalidSignature)
        );
        assert_eq!(
            verify(SECRET, "1531420618", BODY, "sha256=abc", 1_531_420_618),
            Err(SignatureError::InvalidSignature)
        );
    }
}
