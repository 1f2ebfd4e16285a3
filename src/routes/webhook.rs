use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{debug, error, warn};

use crate::{services::normalizer::normalize, utils::time, AppState};

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Subscription handshake: echo the challenge when the token matches.
pub async fn verify(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> Response {
    let expected = state.config.whatsapp_verify_token.as_bytes();
    let matches = params
        .verify_token
        .as_deref()
        .map(|token| bool::from(token.as_bytes().ct_eq(expected)))
        .unwrap_or(false);
    if matches {
        debug!(mode = ?params.mode, "Webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        warn!("Webhook verification failed");
        (StatusCode::FORBIDDEN, "Invalid verification token").into_response()
    }
}

/// Inbound messages and delivery statuses. Always acknowledged with 200 so
/// the provider does not retry on our failures.
///
/// Processing runs on its own task: if the provider gives up and the
/// request is dropped, the task still finishes and settles the message log.
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let payload = normalize(content_type, &body, time::now());
    if payload.is_empty() {
        debug!("Webhook body carried nothing to process");
        return StatusCode::OK;
    }
    let intake = state.intake_service.clone();
    if let Err(e) = tokio::spawn(async move { intake.handle_payload(payload).await }).await {
        error!(error = %e, "Webhook processing task failed");
    }
    StatusCode::OK
}
