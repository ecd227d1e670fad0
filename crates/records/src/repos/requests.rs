//! Signature request repository trait.

use crate::error::RecordResult;
use crate::models::SignatureRequestRow;
use async_trait::async_trait;
use sigtrack_core::{NewSignatureRequest, SigningStatus, UnitKind};
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for tracked signature requests.
#[async_trait]
pub trait SignatureRequestRepo: Send + Sync {
    /// Insert a validated request with status `pending` and return the stored row.
    ///
    /// The cancellation unit starts `pending` only when a cancellation signing
    /// URL was supplied.
    async fn insert(&self, request: &NewSignatureRequest) -> RecordResult<SignatureRequestRow>;

    /// List every record, oldest first.
    async fn list_all(&self) -> RecordResult<Vec<SignatureRequestRow>>;

    /// Get a record by id.
    async fn get(&self, id: Uuid) -> RecordResult<Option<SignatureRequestRow>>;

    /// Records whose primary unit is `pending` or `opened`.
    async fn find_pending_primary(&self) -> RecordResult<Vec<SignatureRequestRow>>;

    /// Records with a cancellation signing URL whose cancellation unit is
    /// `pending` or `opened`.
    async fn find_pending_cancellations(&self) -> RecordResult<Vec<SignatureRequestRow>>;

    /// Find the record whose primary or cancellation document id equals `provider_id`.
    async fn find_by_provider_id(&self, provider_id: &str)
    -> RecordResult<Option<SignatureRequestRow>>;

    /// Persist a non-final status for one unit.
    ///
    /// Only applies while the unit is `pending` or `opened`; returns whether a
    /// row was updated.
    async fn update_unit_status(
        &self,
        id: Uuid,
        kind: UnitKind,
        status: SigningStatus,
    ) -> RecordResult<bool>;

    /// Mark one unit `signed` with its archive location.
    ///
    /// Conditional on the unit still being `pending` or `opened`, so of two
    /// racing finalizers exactly one observes `true`.
    async fn mark_unit_signed(
        &self,
        id: Uuid,
        kind: UnitKind,
        signed_at: OffsetDateTime,
        archive_path: &str,
    ) -> RecordResult<bool>;

    /// Delete every record. Returns the number of rows removed.
    async fn delete_all(&self) -> RecordResult<u64>;
}
