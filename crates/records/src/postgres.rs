//! PostgreSQL-based record store implementation.
//!
//! Inserts fire a trigger that publishes the new row id on the
//! `signature_request_inserted` channel. A background listener forwards those
//! notifications to the store's broadcast channel, so rows inserted by other
//! processes wake the reconciler too.

use crate::error::RecordResult;
use crate::models::{RecordEvent, SignatureRequestRow};
use crate::repos::SignatureRequestRepo;
use crate::store::{EVENT_CHANNEL_CAPACITY, RecordStore, check_plain_status, unit_columns};
use async_trait::async_trait;
use sigtrack_core::{NewSignatureRequest, SigningStatus, UnitKind};
use sqlx::postgres::{PgConnectOptions, PgListener, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Notification channel used by the insert trigger.
pub const INSERT_CHANNEL: &str = "signature_request_inserted";

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS signature_requests (
        id UUID PRIMARY KEY,
        user_name TEXT NOT NULL,
        user_email TEXT NOT NULL,
        user_id TEXT NOT NULL DEFAULT '',
        session_id TEXT NOT NULL,
        document_id TEXT NOT NULL,
        signing_url TEXT NOT NULL,
        is_new_to_switzerland BOOLEAN NOT NULL DEFAULT FALSE,
        document_type TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        signed_at TIMESTAMPTZ,
        archive_path TEXT,
        cancellation_signing_url TEXT,
        cancellation_document_id TEXT,
        cancellation_status TEXT,
        cancellation_signed_at TIMESTAMPTZ,
        cancellation_archive_path TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_signature_requests_status ON signature_requests(status)",
    "CREATE INDEX IF NOT EXISTS idx_signature_requests_cancellation_status ON signature_requests(cancellation_status)",
    "CREATE INDEX IF NOT EXISTS idx_signature_requests_document_id ON signature_requests(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_signature_requests_cancellation_document_id ON signature_requests(cancellation_document_id)",
    r#"CREATE OR REPLACE FUNCTION notify_signature_request_inserted() RETURNS trigger AS $$
    BEGIN
        PERFORM pg_notify('signature_request_inserted', NEW.id::text);
        RETURN NEW;
    END;
    $$ LANGUAGE plpgsql"#,
    "DROP TRIGGER IF EXISTS signature_request_inserted ON signature_requests",
    r#"CREATE TRIGGER signature_request_inserted
        AFTER INSERT ON signature_requests
        FOR EACH ROW EXECUTE FUNCTION notify_signature_request_inserted()"#,
];

/// PostgreSQL-based record store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
    events: broadcast::Sender<RecordEvent>,
    listener: JoinHandle<()>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> RecordResult<Self> {
        let mut opts = PgConnectOptions::from_str(url)?;
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(INSERT_CHANNEL).await?;
        let listener = tokio::spawn(forward_notifications(listener, events.clone()));

        let store = Self {
            pool,
            events,
            listener,
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

impl Drop for PostgresStore {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn forward_notifications(mut listener: PgListener, events: broadcast::Sender<RecordEvent>) {
    loop {
        match listener.recv().await {
            Ok(notification) => match Uuid::parse_str(notification.payload()) {
                Ok(id) => {
                    let _ = events.send(RecordEvent::Inserted { id });
                }
                Err(e) => {
                    tracing::warn!(
                        payload = notification.payload(),
                        error = %e,
                        "ignoring malformed insert notification"
                    );
                }
            },
            Err(e) => {
                // PgListener reconnects on the next recv.
                tracing::warn!(error = %e, "insert listener connection lost");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn migrate(&self) -> RecordResult<()> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
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
impl SignatureRequestRepo for PostgresStore {
    async fn insert(&self, request: &NewSignatureRequest) -> RecordResult<SignatureRequestRow> {
        let row = SignatureRequestRow::new_pending(request, Uuid::new_v4(), OffsetDateTime::now_utc());

        sqlx::query(
            "INSERT INTO signature_requests (
                id, user_name, user_email, user_id, session_id, document_id, signing_url,
                is_new_to_switzerland, document_type, status, cancellation_signing_url,
                cancellation_document_id, cancellation_status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
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
        let row = sqlx::query_as::<_, SignatureRequestRow>(
            "SELECT * FROM signature_requests WHERE id = $1",
        )
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
             WHERE document_id = $1 OR cancellation_document_id = $1
             ORDER BY created_at, id
             LIMIT 1",
        )
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
            "UPDATE signature_requests SET {status} = $1, updated_at = $2
             WHERE id = $3 AND {status} IN ('pending', 'opened')",
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
             SET {status} = 'signed', {signed_at} = $1, {archive_path} = $2, updated_at = $3
             WHERE id = $4 AND {status} IN ('pending', 'opened')",
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
