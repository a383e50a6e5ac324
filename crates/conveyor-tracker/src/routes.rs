//! Webhook endpoint for the Git provider.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::payload::PushPayload;
use crate::tracker::SourceTracker;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<SourceTracker>,
    /// Shared secret for signature verification. When unset, signatures are
    /// not checked.
    pub webhook_secret: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/github", post(github_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle GitHub webhook events.
async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok());

    info!(event = %event_type, "Received GitHub webhook");

    if let Some(ref secret) = state.webhook_secret {
        if !verify_github_signature(secret, &body, signature) {
            warn!("Invalid webhook signature");
            return StatusCode::UNAUTHORIZED;
        }
    }

    match event_type {
        "push" => {
            let payload: PushPayload = match serde_json::from_slice(&body) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "Invalid push payload");
                    return StatusCode::BAD_REQUEST;
                }
            };
            match state.tracker.ingest(&payload).await {
                Ok(_) => StatusCode::OK,
                Err(e) => {
                    warn!(error = %e, "Failed to emit change event");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
        "ping" => {
            info!("Ping event received - webhook is configured correctly");
            StatusCode::OK
        }
        _ => {
            info!(event = %event_type, "Unhandled event type");
            StatusCode::OK
        }
    }
}

/// Verify GitHub webhook signature.
pub fn verify_github_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };

    // Signature format: "sha256=<hex>"
    let Some(sig_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take any size key");
    mac.update(body);

    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let signature = sign("s3cret", body);
        assert!(verify_github_signature("s3cret", body, Some(&signature)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let signature = sign("other", body);
        assert!(!verify_github_signature("s3cret", body, Some(&signature)));
    }

    #[test]
    fn test_missing_or_malformed_signature_rejected() {
        let body = b"payload";
        assert!(!verify_github_signature("s3cret", body, None));
        assert!(!verify_github_signature("s3cret", body, Some("md5=abcd")));
        assert!(!verify_github_signature("s3cret", body, Some("sha256=zz")));
    }
}
