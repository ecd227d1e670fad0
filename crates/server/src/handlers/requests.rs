//! Signature request endpoints.

use super::common::{DataResponse, parse_json};
use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use sigtrack_core::SigningRequestDraft;
use sigtrack_records::{SignatureRequestRepo, SignatureRequestRow};

/// `GET /express/api/get-all-documents`
pub async fn list_requests(
    State(state): State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<SignatureRequestRow>>>> {
    let rows = state.records.list_all().await?;
    Ok(Json(DataResponse::new(rows)))
}

/// `POST /express/api/signing-request`
///
/// Stores a new request with status `pending`. The record store's insert
/// notification starts a reconcile cycle.
pub async fn create_request(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<DataResponse<SignatureRequestRow>>)> {
    let draft: SigningRequestDraft = parse_json(&body)?;
    let request = draft.validate()?;
    let row = state.records.insert(&request).await?;

    metrics::REQUESTS_CREATED.inc();
    tracing::info!(
        record_id = %row.id,
        document_id = %row.document_id,
        cancellation = row.cancellation_signing_url.is_some(),
        "saved signing request"
    );
    Ok((StatusCode::CREATED, Json(DataResponse::new(row))))
}
