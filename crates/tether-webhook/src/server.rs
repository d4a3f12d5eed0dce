//! HTTP dispatcher: one POST endpoint, routed by webhook product.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tether_core::SyncOutcome;

use crate::engine::SyncEngine;

const SHORTCUT_USER_AGENT: &str = "Shortcut-Webhook";

/// Response envelope for every webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
}

/// Build the webhook router. Non-POST requests get a 405 from the method
/// router itself.
pub fn router(engine: Arc<SyncEngine>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .with_state(engine)
}

async fn handle_webhook(
    State(engine): State<Arc<SyncEngine>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let user_agent = header_value(&headers, "user-agent");

    let result = if user_agent.as_deref() == Some(SHORTCUT_USER_AGENT) {
        let origin_ip = forwarded_origin_ip(&headers);
        engine
            .handle_shortcut_event(&body, origin_ip.as_deref())
            .await
    } else {
        let signature = header_value(&headers, "x-hub-signature-256").unwrap_or_default();
        let event_name = header_value(&headers, "x-github-event").unwrap_or_default();
        engine
            .handle_github_event(&body, &signature, &event_name)
            .await
    };

    match result {
        Ok(outcome) => {
            let message = outcome.message().to_string();
            match outcome {
                SyncOutcome::Applied(_) => tracing::info!(%message, "webhook applied"),
                SyncOutcome::Skipped(_) => tracing::info!(%message, "webhook skipped"),
            }
            (
                StatusCode::OK,
                Json(WebhookResponse {
                    success: true,
                    message,
                }),
            )
                .into_response()
        }
        Err(error) => {
            let status =
                StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            tracing::warn!(%error, status = status.as_u16(), "webhook failed");
            (
                status,
                Json(WebhookResponse {
                    success: false,
                    message: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
}

/// First hop of `x-forwarded-for`: the address Shortcut delivered from.
fn forwarded_origin_ip(headers: &HeaderMap) -> Option<String> {
    let raw = header_value(headers, "x-forwarded-for")?;
    raw.split(',').next().map(|hop| hop.trim().to_string())
}
