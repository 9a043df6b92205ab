//! Provider webhook signatures: `t=<unix ts>,v1=<hex hmac-sha256>` over
//! `"<ts>.<raw body>"`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

fn signing_mac(secret: &str, timestamp: &str, body: &[u8]) -> AppResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> AppResult<String> {
    let mac = signing_mac(secret, timestamp, body)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build a signature header for `body`.
pub fn sign_webhook_payload(secret: &str, timestamp: i64, body: &str) -> String {
    let signature = compute_signature(secret, &timestamp.to_string(), body.as_bytes())
        .unwrap_or_default();
    format!("t={},v1={}", timestamp, signature)
}

/// Verify the raw, unparsed body against the signature header.
///
/// Any `v1` entry may match. The timestamp must lie within `tolerance_secs`
/// of `now`.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> AppResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = Some(value),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::SignatureVerification("Missing timestamp in signature".into()))?;

    if signatures.is_empty() {
        return Err(AppError::SignatureVerification("Missing signature".into()));
    }

    let mac = signing_mac(secret, timestamp, payload)?;

    // verify_slice compares in constant time.
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });
    if !matched {
        return Err(AppError::SignatureVerification(
            "No signatures found matching the expected signature for payload".into(),
        ));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| AppError::SignatureVerification("Invalid timestamp".into()))?;
    if (now - ts).abs() > tolerance_secs {
        return Err(AppError::SignatureVerification(
            "Timestamp outside the tolerance zone".into(),
        ));
    }

    Ok(())
}
