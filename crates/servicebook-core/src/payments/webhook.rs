//! Inbound gateway webhooks
//!
//! Header format: `signature: t={unix_ts},v1={hex}` where the signature is
//! HMAC-SHA256 over `"{t}.{raw_body}"` keyed with the shared secret. Several
//! `v1` entries may be present during secret rotation.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

/// Parsed `signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

pub fn parse_signature_header(header: &str) -> CoreResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| CoreError::Signature("malformed timestamp".into()))?,
                )
            }
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| CoreError::Signature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(CoreError::Signature("missing v1 signature".into()));
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Hex HMAC-SHA256 of `"{timestamp}.{body}"`
pub fn compute_signature(secret: &str, timestamp: i64, body: &[u8]) -> CoreResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CoreError::Config(format!("webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a webhook delivery. `tolerance_secs == 0` disables the
/// timestamp age check.
pub fn verify_signature(
    secret: &str,
    header: Option<&str>,
    body: &[u8],
    now: i64,
    tolerance_secs: u64,
) -> CoreResult<SignatureHeader> {
    if secret.is_empty() {
        return Err(CoreError::Config("webhook secret is not configured".into()));
    }
    let header = header.ok_or_else(|| CoreError::Signature("missing signature header".into()))?;
    let parsed = parse_signature_header(header)?;

    if tolerance_secs > 0 && now.abs_diff(parsed.timestamp) > tolerance_secs {
        return Err(CoreError::Signature("timestamp outside tolerance".into()));
    }

    let expected = compute_signature(secret, parsed.timestamp, body)?;
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())));
    if !matched {
        return Err(CoreError::Signature("signature mismatch".into()));
    }
    Ok(parsed)
}

/// Webhook events the engine acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentSucceeded,
    PaymentFailed,
    Other(String),
}

impl WebhookEventKind {
    fn from_type(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => Self::PaymentSucceeded,
            "payment_intent.payment_failed" | "payment_intent.failed" => Self::PaymentFailed,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub kind: WebhookEventKind,
    pub intent_id: String,
    pub failure_message: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawData,
}

#[derive(Deserialize)]
struct RawData {
    object: RawIntent,
}

#[derive(Deserialize)]
struct RawIntent {
    id: String,
    #[serde(default)]
    last_payment_error: Option<RawError>,
}

#[derive(Deserialize)]
struct RawError {
    message: Option<String>,
}

pub fn parse_event(body: &[u8]) -> CoreResult<WebhookEvent> {
    let raw: RawEvent =
        serde_json::from_slice(body).map_err(|e| CoreError::Payload(e.to_string()))?;
    Ok(WebhookEvent {
        kind: WebhookEventKind::from_type(&raw.event_type),
        intent_id: raw.data.object.id,
        failure_message: raw.data.object.last_payment_error.and_then(|e| e.message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_736_503_200;

    fn signed_header(body: &[u8], ts: i64) -> String {
        format!("t={},v1={}", ts, compute_signature(SECRET, ts, body).unwrap())
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let header = signed_header(body, NOW);
        let parsed = verify_signature(SECRET, Some(&header), body, NOW, 300).unwrap();
        assert_eq!(parsed.timestamp, NOW);
    }

    #[test]
    fn test_rotated_secret_second_signature_matches() {
        let body = b"{}";
        let good = compute_signature(SECRET, NOW, body).unwrap();
        let header = format!("t={},v1=deadbeef,v1={}", NOW, good);
        assert!(verify_signature(SECRET, Some(&header), body, NOW, 300).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = signed_header(b"{\"amount\":1}", NOW);
        let err = verify_signature(SECRET, Some(&header), b"{\"amount\":2}", NOW, 300).unwrap_err();
        assert!(matches!(err, CoreError::Signature(_)));
    }

    #[test]
    fn test_missing_or_malformed_header_rejected() {
        assert!(matches!(
            verify_signature(SECRET, None, b"{}", NOW, 300),
            Err(CoreError::Signature(_))
        ));
        assert!(matches!(
            verify_signature(SECRET, Some("v1=abc"), b"{}", NOW, 300),
            Err(CoreError::Signature(_))
        ));
        assert!(matches!(
            verify_signature(SECRET, Some("t=soon,v1=abc"), b"{}", NOW, 300),
            Err(CoreError::Signature(_))
        ));
        assert!(matches!(
            verify_signature(SECRET, Some(&format!("t={}", NOW)), b"{}", NOW, 300),
            Err(CoreError::Signature(_))
        ));
    }

    #[test]
    fn test_timestamp_tolerance() {
        let body = b"{}";
        let header = signed_header(body, NOW - 301);
        assert!(verify_signature(SECRET, Some(&header), body, NOW, 300).is_err());
        // Disabled tolerance accepts stale deliveries
        assert!(verify_signature(SECRET, Some(&header), body, NOW, 0).is_ok());
    }

    #[test]
    fn test_unconfigured_secret() {
        assert!(matches!(
            verify_signature("", Some("t=1,v1=ab"), b"{}", NOW, 0),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_parse_events() {
        let succeeded = parse_event(
            br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_1","status":"succeeded"}}}"#,
        )
        .unwrap();
        assert_eq!(succeeded.kind, WebhookEventKind::PaymentSucceeded);
        assert_eq!(succeeded.intent_id, "pi_1");

        let failed = parse_event(
            br#"{"type":"payment_intent.failed","data":{"object":{"id":"pi_2","last_payment_error":{"message":"insufficient funds"}}}}"#,
        )
        .unwrap();
        assert_eq!(failed.kind, WebhookEventKind::PaymentFailed);
        assert_eq!(failed.failure_message.as_deref(), Some("insufficient funds"));

        let other = parse_event(br#"{"type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#).unwrap();
        assert_eq!(other.kind, WebhookEventKind::Other("charge.refunded".into()));

        assert!(matches!(parse_event(b"not json"), Err(CoreError::Payload(_))));
    }
}
