use crate::config::PaymentConfig;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Signed events older than this are rejected as replays.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub amount_cents: i64,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// A verified `checkout.session.completed` event, reduced to what the
/// entitlement grant needs.
#[derive(Debug, Clone)]
pub struct CheckoutCompleted {
    pub session_id: String,
    pub user_id: String,
    pub video_id: String,
    pub amount_total_cents: i64,
}

#[derive(Debug, Clone)]
pub enum WebhookEvent {
    CheckoutCompleted(CheckoutCompleted),
    /// Verified but not a kind this platform acts on
    Ignored { kind: String },
}

/// The payment processor boundary. Checkout sessions and webhook semantics
/// are opaque behind this trait; the rest of the system only sees verified
/// events.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn create_checkout_session(&self, req: &CheckoutRequest) -> Result<CheckoutSession>;

    /// Verify the signature over a raw webhook payload and decode the event.
    fn verify_event(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent>;
}

pub struct StripeProvider {
    http: reqwest::Client,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
}

impl StripeProvider {
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    async fn create_checkout_session(&self, req: &CheckoutRequest) -> Result<CheckoutSession> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| anyhow!("payment processing not configured"))?;

        let response = self
            .http
            .post(format!("{API_BASE}/checkout/sessions"))
            .bearer_auth(secret_key)
            .form(&checkout_form(req))
            .send()
            .await
            .context("checkout session request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("checkout session rejected ({status}): {body}");
        }

        let session = response
            .json::<CheckoutSession>()
            .await
            .context("malformed checkout session response")?;
        Ok(session)
    }

    fn verify_event(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent> {
        let webhook_secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| anyhow!("webhook secret not configured"))?;

        verify_signature(payload, signature_header, webhook_secret, Utc::now().timestamp())?;
        decode_event(payload)
    }
}

/// The flattened form encoding the checkout API expects for a one-item
/// card payment.
fn checkout_form(req: &CheckoutRequest) -> Vec<(String, String)> {
    vec![
        ("payment_method_types[0]".into(), "card".into()),
        ("mode".into(), "payment".into()),
        (
            "line_items[0][price_data][currency]".into(),
            "usd".into(),
        ),
        (
            "line_items[0][price_data][product_data][name]".into(),
            req.title.clone(),
        ),
        (
            "line_items[0][price_data][product_data][description]".into(),
            req.description.clone(),
        ),
        (
            "line_items[0][price_data][product_data][images][0]".into(),
            req.thumbnail_url.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".into(),
            req.amount_cents.to_string(),
        ),
        ("line_items[0][quantity]".into(), "1".into()),
        ("metadata[userId]".into(), req.user_id.clone()),
        ("metadata[videoId]".into(), req.video_id.clone()),
        ("success_url".into(), req.success_url.clone()),
        ("cancel_url".into(), req.cancel_url.clone()),
    ]
}

/// Check an `t=...,v1=...` signature header: HMAC-SHA256 over
/// `"{t}.{payload}"`, any matching `v1` accepts, stale timestamps reject.
fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for element in header.split(',') {
        match element.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => {
                if let Ok(sig) = hex::decode(v) {
                    candidates.push(sig);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| anyhow!("signature header missing timestamp"))?;
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        bail!("signature timestamp outside tolerance");
    }
    if candidates.is_empty() {
        bail!("signature header missing v1 signature");
    }

    for candidate in &candidates {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| anyhow!("invalid webhook secret"))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    bail!("no matching signature")
}

fn decode_event(payload: &[u8]) -> Result<WebhookEvent> {
    #[derive(Deserialize)]
    struct Metadata {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "videoId")]
        video_id: String,
    }

    #[derive(Deserialize)]
    struct SessionObject {
        id: String,
        amount_total: Option<i64>,
        metadata: Option<Metadata>,
    }

    #[derive(Deserialize)]
    struct EventData {
        object: SessionObject,
    }

    #[derive(Deserialize)]
    struct Event {
        #[serde(rename = "type")]
        kind: String,
        data: EventData,
    }

    let event: Event = serde_json::from_slice(payload).context("malformed event payload")?;

    if event.kind != "checkout.session.completed" {
        return Ok(WebhookEvent::Ignored { kind: event.kind });
    }

    let metadata = event
        .data
        .object
        .metadata
        .ok_or_else(|| anyhow!("completed checkout event missing metadata"))?;

    Ok(WebhookEvent::CheckoutCompleted(CheckoutCompleted {
        session_id: event.data.object.id,
        user_id: metadata.user_id,
        video_id: metadata.video_id,
        amount_total_cents: event.data.object.amount_total.unwrap_or(0),
    }))
}

/// Build a valid signature header for a payload. Test helper; also handy
/// for local webhook replay tooling.
#[doc(hidden)]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn completed_payload() -> Vec<u8> {
        serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_123",
                "amount_total": 4999,
                "metadata": { "userId": "u1", "videoId": "v1" }
            }}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_valid_signature_accepts() {
        let payload = completed_payload();
        let header = sign_payload(&payload, SECRET, 1_700_000_000);
        assert!(verify_signature(&payload, &header, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejects() {
        let payload = completed_payload();
        let header = sign_payload(&payload, SECRET, 1_700_000_000);
        assert!(verify_signature(b"{}", &header, SECRET, 1_700_000_000).is_err());
    }

    #[test]
    fn test_wrong_secret_rejects() {
        let payload = completed_payload();
        let header = sign_payload(&payload, "whsec_other", 1_700_000_000);
        assert!(verify_signature(&payload, &header, SECRET, 1_700_000_000).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejects() {
        let payload = completed_payload();
        let header = sign_payload(&payload, SECRET, 1_700_000_000);
        assert!(
            verify_signature(&payload, &header, SECRET, 1_700_000_000 + 301).is_err()
        );
        assert!(
            verify_signature(&payload, &header, SECRET, 1_700_000_000 + 299).is_ok()
        );
    }

    #[test]
    fn test_decode_completed_event() {
        let event = decode_event(&completed_payload()).unwrap();
        match event {
            WebhookEvent::CheckoutCompleted(c) => {
                assert_eq!(c.session_id, "cs_test_123");
                assert_eq!(c.user_id, "u1");
                assert_eq!(c.video_id, "v1");
                assert_eq!(c.amount_total_cents, 4999);
            }
            WebhookEvent::Ignored { kind } => panic!("unexpected ignored event: {kind}"),
        }
    }

    #[test]
    fn test_decode_other_event_is_ignored() {
        let payload = serde_json::json!({
            "type": "payment_intent.created",
            "data": { "object": { "id": "pi_1" } }
        })
        .to_string();
        let event = decode_event(payload.as_bytes()).unwrap();
        assert!(matches!(event, WebhookEvent::Ignored { kind } if kind == "payment_intent.created"));
    }

    #[test]
    fn test_checkout_form_shape() {
        let form = checkout_form(&CheckoutRequest {
            user_id: "u1".into(),
            video_id: "v1".into(),
            title: "Faceoff Fundamentals".into(),
            description: "desc".into(),
            thumbnail_url: "https://cdn/thumb.jpg".into(),
            amount_cents: 4999,
            success_url: "https://front/payment-success".into(),
            cancel_url: "https://front/video/v1".into(),
        });
        let get = |k: &str| {
            form.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("4999"));
        assert_eq!(get("metadata[userId]"), Some("u1"));
        assert_eq!(get("metadata[videoId]"), Some("v1"));
    }
}
