use anyhow::{Result, anyhow, bail, ensure};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verifies the provider's `x-signature` header.
///
/// Header format is `ts=<unix>,v1=<hex hmac>`; the signed manifest is
/// `id:<data.id>;request-id:<x-request-id>;ts:<ts>;` with absent parts left out.
/// A signature whose `ts` is further than `tolerance` from `now` is rejected
/// even when the HMAC matches, so captured deliveries cannot be replayed later.
/// https://www.mercadopago.com/developers/en/docs/your-integrations/notifications/webhooks
pub fn verify_webhook_signature(
    secret: &str,
    signature_header: &str,
    request_id: Option<&str>,
    data_id: Option<&str>,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<()> {
    let mut timestamp: Option<&str> = None;
    let mut signature: Option<&str> = None;

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("ts=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signature = Some(rest);
        }
    }

    let timestamp = timestamp.ok_or_else(|| anyhow!("missing ts in x-signature"))?;
    let signature = signature.ok_or_else(|| anyhow!("missing v1 in x-signature"))?;

    let manifest = signature_manifest(timestamp, request_id, data_id);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(manifest.as_bytes());
    let provided = hex::decode(signature)?;

    if mac.verify_slice(&provided).is_err() {
        bail!("invalid webhook signature");
    }

    let signed_at = parse_signature_timestamp(timestamp)?;
    let skew = (now - signed_at).abs();
    ensure!(
        skew <= tolerance,
        "webhook signature timestamp {signed_at} is outside the {}s window",
        tolerance.num_seconds()
    );

    Ok(())
}

/// The provider has sent `ts` both in seconds and in milliseconds.
fn parse_signature_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("ts in x-signature is not a unix timestamp"))?;
    let parsed = if value >= 100_000_000_000 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    };
    parsed.ok_or_else(|| anyhow!("ts in x-signature is out of range"))
}

pub fn signature_manifest(timestamp: &str, request_id: Option<&str>, data_id: Option<&str>) -> String {
    let mut manifest = String::new();
    if let Some(id) = data_id.filter(|v| !v.is_empty()) {
        // Alphanumeric ids are signed lowercased.
        manifest.push_str(&format!("id:{};", id.to_ascii_lowercase()));
    }
    if let Some(request_id) = request_id.filter(|v| !v.is_empty()) {
        manifest.push_str(&format!("request-id:{request_id};"));
    }
    manifest.push_str(&format!("ts:{timestamp};"));
    manifest
}

/// Builds an `x-signature` header value for the given delivery.
pub fn sign_webhook(
    secret: &str,
    timestamp: &str,
    request_id: Option<&str>,
    data_id: Option<&str>,
) -> Result<String> {
    let manifest = signature_manifest(timestamp, request_id, data_id);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(manifest.as_bytes());
    Ok(format!(
        "ts={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}
