//! Signing request drafts and validation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Signing request as submitted by the calling application.
///
/// Every field is optional on the wire; [`SigningRequestDraft::validate`]
/// enforces the required ones.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningRequestDraft {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    /// Provider document id of the primary signing workflow.
    pub application_document_id: Option<String>,
    pub signing_url: Option<String>,
    pub is_new_to_switzerland: Option<bool>,
    pub document_type: Option<String>,
    pub cancellation_signing_url: Option<String>,
}

/// A validated request ready to be inserted into the record store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSignatureRequest {
    pub user_name: String,
    pub user_email: String,
    pub user_id: String,
    pub session_id: String,
    pub document_id: String,
    pub signing_url: String,
    pub is_new_to_switzerland: bool,
    pub document_type: Option<String>,
    pub cancellation_signing_url: Option<String>,
    pub cancellation_document_id: Option<String>,
}

impl NewSignatureRequest {
    /// Whether the request tracks a cancellation workflow.
    pub fn has_cancellation(&self) -> bool {
        self.cancellation_signing_url.is_some()
    }
}

fn required(
    value: Option<String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> String {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            missing.push(name);
            String::new()
        }
    }
}

impl SigningRequestDraft {
    /// Validate required fields and derive the cancellation document id.
    pub fn validate(self) -> Result<NewSignatureRequest> {
        let mut missing = Vec::new();
        let user_name = required(self.user_name, "userName", &mut missing);
        let user_email = required(self.user_email, "userEmail", &mut missing);
        let session_id = required(self.session_id, "sessionId", &mut missing);
        let document_id = required(
            self.application_document_id,
            "applicationDocumentId",
            &mut missing,
        );
        let signing_url = required(self.signing_url, "signingUrl", &mut missing);

        if !missing.is_empty() {
            return Err(Error::MissingFields { fields: missing });
        }

        let cancellation_signing_url = self.cancellation_signing_url.filter(|u| !u.is_empty());
        let cancellation_document_id = cancellation_signing_url
            .as_deref()
            .and_then(extract_cancellation_document_id);

        Ok(NewSignatureRequest {
            user_name,
            user_email,
            user_id: self.user_id.unwrap_or_default(),
            session_id,
            document_id,
            signing_url,
            is_new_to_switzerland: self.is_new_to_switzerland.unwrap_or(false),
            document_type: self.document_type,
            cancellation_signing_url,
            cancellation_document_id,
        })
    }
}

/// Extract the provider document id from a signing URL of the form
/// `.../view/<id>/...`, where `<id>` is made of ASCII letters, digits and `-`.
///
/// Matching of the `view/` segment is case-insensitive; the id keeps its
/// original case. Returns `None` when no segment matches.
pub fn extract_cancellation_document_id(url: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `url`.
    let lowered = url.to_ascii_lowercase();

    for (pos, marker) in lowered.match_indices("view/") {
        let start = pos + marker.len();
        let rest = &url[start..];
        let len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-')
            .count();
        if len > 0 && rest.as_bytes().get(len) == Some(&b'/') {
            return Some(rest[..len].to_string());
        }
    }
    None
}
