//! Webhook payload interpretation.

use crate::client::ProviderClient;
use crate::error::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};

/// Event type that carries a finished signature request.
pub const COMPLETED_EVENT: &str = "signature_request.completed";

/// Callback payload posted by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub signature_request: Option<WebhookSignatureRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookSignatureRequest {
    #[serde(default)]
    pub id: Option<String>,
}

impl WebhookEvent {
    /// Signature request id of a completion event, if this is one.
    pub fn completed_request_id(&self) -> Option<&str> {
        if self.event_type.as_deref() != Some(COMPLETED_EVENT) {
            return None;
        }
        self.signature_request
            .as_ref()
            .and_then(|sr| sr.id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// Result of interpreting a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    pub processed: bool,
    /// Document to finalize; set only for completion events that resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub action: Option<String>,
}

/// Interpret a webhook event.
///
/// Completion events are resolved to their document id with one lookup. A
/// completed request without a document mapping is acknowledged without a
/// document id; the poll cycle picks it up later.
pub async fn handle_webhook(
    provider: &dyn ProviderClient,
    event: &WebhookEvent,
) -> ProviderResult<WebhookOutcome> {
    let action = event.event_type.clone();

    let Some(request_id) = event.completed_request_id() else {
        tracing::debug!(event_type = ?action, "acknowledging webhook without action");
        return Ok(WebhookOutcome {
            processed: true,
            document_id: None,
            action,
        });
    };

    let document_id = match provider.resolve_document_id(request_id).await {
        Ok(id) => Some(id),
        Err(ProviderError::MissingMapping(id)) => {
            tracing::warn!(signature_request_id = %id, "completed request has no document_id yet");
            None
        }
        Err(e) => return Err(e),
    };

    Ok(WebhookOutcome {
        processed: true,
        document_id,
        action,
    })
}
