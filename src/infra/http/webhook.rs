//! Push event intake.
//!
//! Verifies the delivery's signature over the raw body bytes, validates the
//! payload shape, and hands the event to the sync orchestrator. Failures on
//! our side of the fetch come back as 5xx so the source system redelivers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::sync::{PushEvent, SyncError};

use super::HttpState;
use super::signature::verify_signature;

const HEADER_SIGNATURE: &str = "x-hub-signature-256";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingSignature(&'static str),
    #[error("signature mismatch")]
    InvalidSignature,
    #[error("invalid push payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingSignature(_) | WebhookError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::InvalidSignature => StatusCode::FORBIDDEN,
            WebhookError::Sync(_) => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}

pub async fn receive_push(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let signature = headers
        .get(HEADER_SIGNATURE)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookError::MissingSignature(HEADER_SIGNATURE))?;

    // Authenticity is decided on the exact bytes that were signed, before
    // any parsing.
    if !verify_signature(&body, signature, state.webhook_secret.as_bytes()) {
        counter!("folio_webhook_rejected_total").increment(1);
        warn!("webhook signature mismatch");
        return Err(WebhookError::InvalidSignature);
    }

    let event: PushEvent = serde_json::from_slice(&body).map_err(|err| {
        counter!("folio_webhook_rejected_total").increment(1);
        WebhookError::InvalidPayload(err)
    })?;

    debug!(
        git_ref = %event.git_ref,
        commits = event.commits.len(),
        "verified push event"
    );

    state.sync.apply_push(&event).await?;

    Ok((StatusCode::OK, "OK"))
}
