//! Record store trait and the SQLite implementation.

use crate::error::{RecordError, RecordResult};
use crate::models::{RecordEvent, SignatureRequestRow};
use crate::repos::SignatureRequestRepo;
use async_trait::async_trait;
use sigtrack_core::{NewSignatureRequest, SigningStatus, UnitKind};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the insert event channel. Slow subscribers observe `Lagged`,
/// which the reconcile trigger treats like any other insert signal.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Combined record store trait.
#[async_trait]
pub trait RecordStore: SignatureRequestRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> RecordResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> RecordResult<()>;

    /// Subscribe to insert notifications.
    fn subscribe(&self) -> broadcast::Receiver<RecordEvent>;
}

/// Column names holding one unit's state.
pub(crate) struct UnitColumns {
    pub status: &'static str,
    pub signed_at: &'static str,
    pub archive_path: &'static str,
}

pub(crate) fn unit_columns(kind: UnitKind) -> UnitColumns {
    match kind {
        UnitKind::Primary => UnitColumns {
            status: "status",
            signed_at: "signed_at",
            archive_path: "archive_path",
        },
        UnitKind::Cancellation => UnitColumns {
            status: "cancellation_status",
            signed_at: "cancellation_signed_at",
            archive_path: "cancellation_archive_path",
        },
    }
}

/// `update_unit_status` only writes `opened` or `cancelled`; `signed` needs an
/// archive location and goes through `mark_unit_signed`.
pub(crate) fn check_plain_status(kind: UnitKind, status: SigningStatus) -> RecordResult<()> {
    match status {
        SigningStatus::Opened | SigningStatus::Cancelled => Ok(()),
        other => Err(RecordError::InvalidStateTransition {
            unit: kind.to_string(),
            to: other.to_string(),
        }),
    }
}

/// SQLite-based record store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    events: broadcast::Sender<RecordEvent>,
}

impl SqliteStore {
    /// Open (or create) a SQLite store and run migrations.
    pub async fn new(path: impl AsRef<Path>) -> RecordResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        // Status checks run concurrently; one connection serializes writers
        // instead of surfacing "database is locked".
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = Self { pool, events };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "opened sqlite record store");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn migrate(&self) -> RecordResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> RecordResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl SignatureRequestRepo for SqliteStore {
    async fn insert(&self, request: &NewSignatureRequest) -> RecordResult<SignatureRequestRow> {
        let row = SignatureRequestRow::new_pending(request, Uuid::new_v4(), OffsetDateTime::now_utc());

        sqlx::query(
            "INSERT INTO signature_requests (
                id, user_name, user_email, user_id, session_id, document_id, signing_url,
                is_new_to_switzerland, document_type, status, cancellation_signing_url,
                cancellation_document_id, cancellation_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(row.id)
        .bind(&row.user_name)
        .bind(&row.user_email)
        .bind(&row.user_id)
        .bind(&row.session_id)
        .bind(&row.document_id)
        .bind(&row.signing_url)
        .bind(row.is_new_to_switzerland)
        .bind(&row.document_type)
        .bind(&row.status)
        .bind(&row.cancellation_signing_url)
        .bind(&row.cancellation_document_id)
        .bind(&row.cancellation_status)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        // No receivers is fine: nothing is listening yet.
        let _ = self.events.send(RecordEvent::Inserted { id: row.id });
        Ok(row)
    }

    async fn list_all(&self) -> RecordResult<Vec<SignatureRequestRow>> {
        let rows = sqlx::query_as::<_, SignatureRequestRow>(
            "SELECT * FROM signature_requests ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> RecordResult<Option<SignatureRequestRow>> {
        let row =
            sqlx::query_as::<_, SignatureRequestRow>("SELECT * FROM signature_requests WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn find_pending_primary(&self) -> RecordResult<Vec<SignatureRequestRow>> {
        let rows = sqlx::query_as::<_, SignatureRequestRow>(
            "SELECT * FROM signature_requests
             WHERE status IN ('pending', 'opened')
             ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_pending_cancellations(&self) -> RecordResult<Vec<SignatureRequestRow>> {
        let rows = sqlx::query_as::<_, SignatureRequestRow>(
            "SELECT * FROM signature_requests
             WHERE cancellation_signing_url IS NOT NULL
               AND cancellation_status IN ('pending', 'opened')
             ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_by_provider_id(
        &self,
        provider_id: &str,
    ) -> RecordResult<Option<SignatureRequestRow>> {
        let row = sqlx::query_as::<_, SignatureRequestRow>(
            "SELECT * FROM signature_requests
             WHERE document_id = ? OR cancellation_document_id = ?
             ORDER BY created_at, id
             LIMIT 1",
        )
        .bind(provider_id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_unit_status(
        &self,
        id: Uuid,
        kind: UnitKind,
        status: SigningStatus,
    ) -> RecordResult<bool> {
        check_plain_status(kind, status)?;
        let cols = unit_columns(kind);
        let sql = format!(
            "UPDATE signature_requests SET {status} = ?, updated_at = ?
             WHERE id = ? AND {status} IN ('pending', 'opened')",
            status = cols.status,
        );
        let result = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(OffsetDateTime::now_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_unit_signed(
        &self,
        id: Uuid,
        kind: UnitKind,
        signed_at: OffsetDateTime,
        archive_path: &str,
    ) -> RecordResult<bool> {
        let cols = unit_columns(kind);
        let sql = format!(
            "UPDATE signature_requests
             SET {status} = 'signed', {signed_at} = ?, {archive_path} = ?, updated_at = ?
             WHERE id = ? AND {status} IN ('pending', 'opened')",
            status = cols.status,
            signed_at = cols.signed_at,
            archive_path = cols.archive_path,
        );
        let result = sqlx::query(&sql)
            .bind(signed_at)
            .bind(archive_path)
            .bind(OffsetDateTime::now_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> RecordResult<u64> {
        let result = sqlx::query("DELETE FROM signature_requests")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS signature_requests (
    id BLOB PRIMARY KEY,
    user_name TEXT NOT NULL,
    user_email TEXT NOT NULL,
    user_id TEXT NOT NULL DEFAULT '',
    session_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    signing_url TEXT NOT NULL,
    is_new_to_switzerland INTEGER NOT NULL DEFAULT 0,
    document_type TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    signed_at TEXT,
    archive_path TEXT,
    -- Cancellation unit; all NULL when no cancellation signing URL was supplied.
    cancellation_signing_url TEXT,
    cancellation_document_id TEXT,
    cancellation_status TEXT,
    cancellation_signed_at TEXT,
    cancellation_archive_path TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_signature_requests_status ON signature_requests(status);
CREATE INDEX IF NOT EXISTS idx_signature_requests_cancellation_status ON signature_requests(cancellation_status);
CREATE INDEX IF NOT EXISTS idx_signature_requests_document_id ON signature_requests(document_id);
CREATE INDEX IF NOT EXISTS idx_signature_requests_cancellation_document_id ON signature_requests(cancellation_document_id);
"#;
