//! Database models mapping to the record schema.

use serde::Serialize;
use sigtrack_core::{CheckUnit, NewSignatureRequest, SigningStatus, UnitKind};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A tracked signature request.
///
/// One row carries the primary signing unit and, when a cancellation signing
/// URL was supplied at creation, the cancellation unit.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequestRow {
    pub id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub user_id: String,
    pub session_id: String,
    /// Provider id of the primary workflow.
    pub document_id: String,
    pub signing_url: String,
    pub is_new_to_switzerland: bool,
    pub document_type: Option<String>,
    pub status: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub signed_at: Option<OffsetDateTime>,
    pub archive_path: Option<String>,
    pub cancellation_signing_url: Option<String>,
    pub cancellation_document_id: Option<String>,
    pub cancellation_status: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub cancellation_signed_at: Option<OffsetDateTime>,
    pub cancellation_archive_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SignatureRequestRow {
    /// Build the initial row for a validated request.
    pub fn new_pending(request: &NewSignatureRequest, id: Uuid, now: OffsetDateTime) -> Self {
        let cancellation_status = request
            .has_cancellation()
            .then(|| SigningStatus::Pending.as_str().to_string());
        Self {
            id,
            user_name: request.user_name.clone(),
            user_email: request.user_email.clone(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            document_id: request.document_id.clone(),
            signing_url: request.signing_url.clone(),
            is_new_to_switzerland: request.is_new_to_switzerland,
            document_type: request.document_type.clone(),
            status: SigningStatus::Pending.as_str().to_string(),
            signed_at: None,
            archive_path: None,
            cancellation_signing_url: request.cancellation_signing_url.clone(),
            cancellation_document_id: request.cancellation_document_id.clone(),
            cancellation_status,
            cancellation_signed_at: None,
            cancellation_archive_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Parsed status of one unit. `None` for a cancellation unit that was never
    /// requested, or for a value outside the known set.
    pub fn unit_status(&self, kind: UnitKind) -> Option<SigningStatus> {
        let raw = match kind {
            UnitKind::Primary => Some(self.status.as_str()),
            UnitKind::Cancellation => self.cancellation_status.as_deref(),
        };
        raw.and_then(|s| s.parse().ok())
    }

    /// Archive location of one unit, if it has been signed.
    pub fn archive_path_of(&self, kind: UnitKind) -> Option<&str> {
        match kind {
            UnitKind::Primary => self.archive_path.as_deref(),
            UnitKind::Cancellation => self.cancellation_archive_path.as_deref(),
        }
    }

    /// Which unit of this record a provider id refers to.
    ///
    /// The cancellation unit wins when both ids are equal.
    pub fn unit_kind_for(&self, provider_id: &str) -> Option<UnitKind> {
        if self.cancellation_document_id.as_deref() == Some(provider_id) {
            Some(UnitKind::Cancellation)
        } else if self.document_id == provider_id {
            Some(UnitKind::Primary)
        } else {
            None
        }
    }

    /// Build a worklist entry for one unit.
    ///
    /// Returns `None` when the unit has nothing to check: a cancellation unit
    /// without an extracted document id, or an unparseable status.
    pub fn check_unit(&self, kind: UnitKind) -> Option<CheckUnit> {
        let check_id = match kind {
            UnitKind::Primary => Some(self.document_id.clone()),
            UnitKind::Cancellation => self.cancellation_document_id.clone(),
        }?;
        Some(CheckUnit {
            record_id: self.id,
            check_id,
            kind,
            status: self.unit_status(kind)?,
        })
    }
}

/// Event emitted by the store after a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEvent {
    Inserted { id: Uuid },
}
