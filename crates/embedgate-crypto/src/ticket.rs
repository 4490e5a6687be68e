//! # Identity Tickets
//!
//! A ticket binds an end-user identity to a bootstrap request without a
//! server round trip. The embedder's backend, which shares the widget
//! secret, computes:
//!
//! ```text
//! signature = hex(HMAC-SHA256(secret, user_id ":" timestamp))
//! ```
//!
//! where `timestamp` is milliseconds since the Unix epoch, exactly as it is
//! sent on the wire. The gateway recomputes the MAC over the same bytes.
//!
//! ## Verification order
//!
//! 1. Any of `user_id`, `timestamp`, `signature` missing or empty: `Absent`.
//! 2. Timestamp not an integer: `Invalid`.
//! 3. `|now - timestamp|` above the freshness window: `Expired`.
//! 4. Signature not hex, or MAC mismatch (constant time): `Invalid`.
//! 5. Otherwise `Verified`.
//!
//! Future-dated tickets fall under the same absolute-difference window.

use embedgate_core::WidgetSecret;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a presented ticket was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TicketError {
    /// The timestamp is not a base-10 integer.
    #[error("ticket timestamp is not an integer")]
    MalformedTimestamp,
    /// The signature is not hex.
    #[error("ticket signature is not hex-encoded")]
    MalformedSignature,
    /// The signature does not match.
    #[error("ticket signature does not match")]
    SignatureMismatch,
    /// The MAC could not be keyed.
    #[error("ticket key rejected by HMAC")]
    InvalidKey,
}

impl TicketError {
    /// Short machine-readable reason for audit metadata.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedTimestamp => "malformed_timestamp",
            Self::MalformedSignature => "malformed_signature",
            Self::SignatureMismatch => "signature_mismatch",
            Self::InvalidKey => "invalid_key",
        }
    }
}

/// The three optional ticket fields as they arrived on the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketParts<'a> {
    /// Claimed end-user identifier.
    pub user_id: Option<&'a str>,
    /// Milliseconds since the epoch, as sent.
    pub timestamp: Option<&'a str>,
    /// Hex-encoded HMAC.
    pub signature: Option<&'a str>,
}

/// Result of checking a ticket. Only `Verified` authenticates the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketOutcome {
    /// No ticket presented; the request is anonymous.
    Absent,
    /// Signature and freshness check out.
    Verified {
        /// Authenticated end-user identifier.
        user_id: String,
    },
    /// Well-formed but outside the freshness window.
    Expired {
        /// `|now - timestamp|` in milliseconds.
        skew_ms: u64,
    },
    /// Malformed or forged.
    Invalid(TicketError),
}

impl TicketOutcome {
    /// The authenticated user, if any.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Verified { user_id } => Some(user_id),
            _ => None,
        }
    }
}

/// Offline ticket verifier with a fixed freshness window.
#[derive(Debug, Clone, Copy)]
pub struct TicketVerifier {
    max_age_ms: u64,
}

impl TicketVerifier {
    /// Default freshness window: five minutes.
    pub const DEFAULT_MAX_AGE_SECS: u64 = 300;

    /// Verifier accepting tickets within `max_age_secs` of now, either side.
    pub fn new(max_age_secs: u64) -> Self {
        Self {
            max_age_ms: max_age_secs.saturating_mul(1000),
        }
    }

    /// Freshness window in milliseconds.
    pub fn max_age_ms(&self) -> u64 {
        self.max_age_ms
    }

    /// Check `parts` against `secret` at instant `now_ms`.
    pub fn verify(&self, secret: &WidgetSecret, parts: TicketParts<'_>, now_ms: i64) -> TicketOutcome {
        let (Some(user_id), Some(ts_raw), Some(sig_hex)) = (
            present(parts.user_id),
            present(parts.timestamp),
            present(parts.signature),
        ) else {
            return TicketOutcome::Absent;
        };

        let Ok(timestamp) = ts_raw.parse::<i64>() else {
            return TicketOutcome::Invalid(TicketError::MalformedTimestamp);
        };

        let skew_ms = now_ms.abs_diff(timestamp);
        if skew_ms > self.max_age_ms {
            return TicketOutcome::Expired { skew_ms };
        }

        let Ok(presented) = hex::decode(sig_hex) else {
            return TicketOutcome::Invalid(TicketError::MalformedSignature);
        };

        let expected = match compute_mac(secret, user_id, ts_raw) {
            Ok(mac) => mac,
            Err(e) => return TicketOutcome::Invalid(e),
        };

        if expected.len() != presented.len() || !bool::from(expected.ct_eq(presented.as_slice())) {
            return TicketOutcome::Invalid(TicketError::SignatureMismatch);
        }

        TicketOutcome::Verified {
            user_id: user_id.to_string(),
        }
    }
}

impl Default for TicketVerifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_AGE_SECS)
    }
}

/// Mint a ticket signature for `user_id` at `timestamp_ms`.
///
/// This is what an embedder's backend runs; the gateway only verifies.
pub fn sign_ticket(
    secret: &WidgetSecret,
    user_id: &str,
    timestamp_ms: i64,
) -> Result<String, TicketError> {
    let mac = compute_mac(secret, user_id, &timestamp_ms.to_string())?;
    Ok(hex::encode(mac))
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn compute_mac(secret: &WidgetSecret, user_id: &str, timestamp: &str) -> Result<Vec<u8>, TicketError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.expose_bytes()).map_err(|_| TicketError::InvalidKey)?;
    mac.update(user_id.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_768_478_400_000;
    const MINUTE: i64 = 60_000;

    fn secret() -> WidgetSecret {
        WidgetSecret::new("s3cr3t-s3cr3t-s3cr3t").unwrap()
    }

    fn parts<'a>(user: &'a str, ts: &'a str, sig: &'a str) -> TicketParts<'a> {
        TicketParts {
            user_id: Some(user),
            timestamp: Some(ts),
            signature: Some(sig),
        }
    }

    #[test]
    fn matches_reference_hmac() {
        // Cross-checked against a standalone HMAC-SHA256 over "alice:1768478400000".
        let mut mac = HmacSha256::new_from_slice(b"s3cr3t-s3cr3t-s3cr3t").unwrap();
        mac.update(b"alice:1768478400000");
        let reference = hex::encode(mac.finalize().into_bytes());
        assert_eq!(sign_ticket(&secret(), "alice", NOW).unwrap(), reference);
        assert_eq!(reference.len(), 64);
    }

    #[test]
    fn fresh_ticket_verifies() {
        let sig = sign_ticket(&secret(), "alice", NOW).unwrap();
        let ts = NOW.to_string();
        let outcome = TicketVerifier::default().verify(&secret(), parts("alice", &ts, &sig), NOW + 1_000);
        assert_eq!(outcome.user_id(), Some("alice"));
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let sig = sign_ticket(&secret(), "alice", NOW).unwrap().to_uppercase();
        let ts = NOW.to_string();
        let outcome = TicketVerifier::default().verify(&secret(), parts("alice", &ts, &sig), NOW);
        assert!(matches!(outcome, TicketOutcome::Verified { .. }));
    }

    #[test]
    fn any_missing_field_is_absent() {
        let v = TicketVerifier::default();
        let s = secret();
        let full = parts("alice", "1", "ab");
        for p in [
            TicketParts { user_id: None, ..full },
            TicketParts { timestamp: None, ..full },
            TicketParts { signature: None, ..full },
            TicketParts { user_id: Some(""), ..full },
            TicketParts::default(),
        ] {
            assert_eq!(v.verify(&s, p, NOW), TicketOutcome::Absent);
        }
    }

    #[test]
    fn flipped_signature_byte_is_invalid() {
        let mut sig = sign_ticket(&secret(), "alice", NOW).unwrap().into_bytes();
        sig[0] = if sig[0] == b'0' { b'1' } else { b'0' };
        let sig = String::from_utf8(sig).unwrap();
        let ts = NOW.to_string();
        let outcome = TicketVerifier::default().verify(&secret(), parts("alice", &ts, &sig), NOW);
        assert_eq!(outcome, TicketOutcome::Invalid(TicketError::SignatureMismatch));
    }

    #[test]
    fn other_user_or_secret_is_invalid() {
        let sig = sign_ticket(&secret(), "alice", NOW).unwrap();
        let ts = NOW.to_string();
        let v = TicketVerifier::default();
        assert_eq!(
            v.verify(&secret(), parts("mallory", &ts, &sig), NOW),
            TicketOutcome::Invalid(TicketError::SignatureMismatch)
        );
        let rotated = WidgetSecret::new("rotated-secret-value").unwrap();
        assert_eq!(
            v.verify(&rotated, parts("alice", &ts, &sig), NOW),
            TicketOutcome::Invalid(TicketError::SignatureMismatch)
        );
    }

    #[test]
    fn truncated_signature_is_invalid() {
        let sig = sign_ticket(&secret(), "alice", NOW).unwrap();
        let ts = NOW.to_string();
        let outcome = TicketVerifier::default().verify(&secret(), parts("alice", &ts, &sig[..62]), NOW);
        assert_eq!(outcome, TicketOutcome::Invalid(TicketError::SignatureMismatch));
    }

    #[test]
    fn ten_minute_old_ticket_is_expired() {
        let issued = NOW - 10 * MINUTE;
        let sig = sign_ticket(&secret(), "alice", issued).unwrap();
        let ts = issued.to_string();
        let outcome = TicketVerifier::default().verify(&secret(), parts("alice", &ts, &sig), NOW);
        assert_eq!(outcome, TicketOutcome::Expired { skew_ms: 600_000 });
    }

    #[test]
    fn future_dated_ticket_uses_same_window() {
        let v = TicketVerifier::default();
        let near = NOW + 4 * MINUTE;
        let sig = sign_ticket(&secret(), "alice", near).unwrap();
        let ts = near.to_string();
        assert!(v.verify(&secret(), parts("alice", &ts, &sig), NOW).user_id().is_some());

        let far = NOW + 6 * MINUTE;
        let sig = sign_ticket(&secret(), "alice", far).unwrap();
        let ts = far.to_string();
        assert!(matches!(
            v.verify(&secret(), parts("alice", &ts, &sig), NOW),
            TicketOutcome::Expired { .. }
        ));
    }

    #[test]
    fn boundary_age_is_still_fresh() {
        let issued = NOW - 5 * MINUTE;
        let sig = sign_ticket(&secret(), "alice", issued).unwrap();
        let ts = issued.to_string();
        let outcome = TicketVerifier::default().verify(&secret(), parts("alice", &ts, &sig), NOW);
        assert!(matches!(outcome, TicketOutcome::Verified { .. }));
    }

    #[test]
    fn malformed_fields_are_invalid_not_errors() {
        let v = TicketVerifier::default();
        assert_eq!(
            v.verify(&secret(), parts("alice", "yesterday", "abcd"), NOW),
            TicketOutcome::Invalid(TicketError::MalformedTimestamp)
        );
        let ts = NOW.to_string();
        assert_eq!(
            v.verify(&secret(), parts("alice", &ts, "not-hex!"), NOW),
            TicketOutcome::Invalid(TicketError::MalformedSignature)
        );
    }

    #[test]
    fn custom_window_is_respected() {
        let v = TicketVerifier::new(30);
        assert_eq!(v.max_age_ms(), 30_000);
        let issued = NOW - 31_000;
        let sig = sign_ticket(&secret(), "alice", issued).unwrap();
        let ts = issued.to_string();
        assert!(matches!(
            v.verify(&secret(), parts("alice", &ts, &sig), NOW),
            TicketOutcome::Expired { skew_ms: 31_000 }
        ));
    }

    #[test]
    fn reasons_are_stable() {
        assert_eq!(TicketError::SignatureMismatch.reason(), "signature_mismatch");
        assert_eq!(TicketError::MalformedTimestamp.reason(), "malformed_timestamp");
    }
}
