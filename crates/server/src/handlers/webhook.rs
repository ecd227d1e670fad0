//! Provider webhook endpoint.

use super::common::parse_json;
use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde_json::{Value, json};
use sigtrack_provider::{WebhookEvent, handle_webhook};

/// `POST /api/skribble/webhook`
///
/// A completion event is resolved to its document id and finalized inline.
/// Finalize failures are logged and left to the next poll cycle; only a
/// failed lookup of the document id turns into an error response.
pub async fn skribble_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let event: WebhookEvent = parse_json(&body)?;
    metrics::record_webhook_event(event.event_type.as_deref());

    let outcome = handle_webhook(state.provider.as_ref(), &event).await?;
    if let (true, Some(document_id)) = (outcome.processed, outcome.document_id.as_deref()) {
        match state.reconciler.finalize(document_id).await {
            Ok(result) => {
                tracing::info!(document_id, outcome = result.label(), "webhook finalize")
            }
            Err(e) => {
                tracing::error!(document_id, error = %e, "webhook finalize failed")
            }
        }
    }

    Ok(Json(json!({ "success": true })))
}
