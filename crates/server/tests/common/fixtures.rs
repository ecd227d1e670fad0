//! Test fixtures for signature requests.

use sigtrack_core::{NewSignatureRequest, SigningRequestDraft};

/// A request body as the calling application sends it.
#[allow(dead_code)]
pub fn draft(document_id: &str) -> SigningRequestDraft {
    SigningRequestDraft {
        user_name: Some("Ada Lovelace".to_string()),
        user_email: Some("ada@example.com".to_string()),
        user_id: Some("user-1".to_string()),
        session_id: Some("session-1".to_string()),
        application_document_id: Some(document_id.to_string()),
        signing_url: Some(format!("https://my.skribble.com/view/{document_id}/sign")),
        is_new_to_switzerland: Some(true),
        document_type: Some("permit".to_string()),
        cancellation_signing_url: None,
    }
}

/// Validated request, optionally with a cancellation workflow whose document
/// id is extracted from the signing URL.
#[allow(dead_code)]
pub fn new_request(document_id: &str, cancellation_id: Option<&str>) -> NewSignatureRequest {
    let mut draft = draft(document_id);
    draft.cancellation_signing_url =
        cancellation_id.map(|id| format!("https://my.skribble.com/view/{id}/sign"));
    draft.validate().expect("fixture request is valid")
}
