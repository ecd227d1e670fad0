//! PostgreSQL integration tests.
//!
//! These run against the database named by `SIGTRACK_TEST_POSTGRES_URL` and are
//! skipped when it is unset. Document ids are unique per run so tests can share
//! the database.

mod common;

use common::{POSTGRES_URL_ENV, new_request};
use sigtrack_core::UnitKind;
use sigtrack_records::{PostgresStore, RecordEvent, RecordStore, SignatureRequestRepo};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

async fn postgres_or_skip() -> Option<PostgresStore> {
    let Ok(url) = std::env::var(POSTGRES_URL_ENV) else {
        eprintln!("Skipping PostgreSQL test ({POSTGRES_URL_ENV} not set)");
        return None;
    };
    let store = PostgresStore::from_url(&url, 4, Some(5_000))
        .await
        .expect("PostgreSQL test setup failed");
    Some(store)
}

#[tokio::test]
async fn test_postgres_conditional_finalize() {
    let Some(store) = postgres_or_skip().await else {
        return;
    };
    let doc = format!("pg-doc-{}", Uuid::new_v4());
    let can = format!("pg-can-{}", Uuid::new_v4());
    let row = store.insert(&new_request(&doc, Some(&can))).await.unwrap();
    let now = OffsetDateTime::now_utc();

    assert!(
        store
            .mark_unit_signed(row.id, UnitKind::Primary, now, "https://cdn/a")
            .await
            .unwrap()
    );
    assert!(
        !store
            .mark_unit_signed(row.id, UnitKind::Primary, now, "https://cdn/b")
            .await
            .unwrap()
    );

    let stored = store.find_by_provider_id(&can).await.unwrap().unwrap();
    assert_eq!(stored.status, "signed");
    assert_eq!(stored.archive_path.as_deref(), Some("https://cdn/a"));
    assert_eq!(stored.cancellation_status.as_deref(), Some("pending"));
}

#[tokio::test]
async fn test_postgres_insert_notifies_listener() {
    let Some(store) = postgres_or_skip().await else {
        return;
    };
    let mut events = store.subscribe();
    let doc = format!("pg-notify-{}", Uuid::new_v4());
    let row = store.insert(&new_request(&doc, None)).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(RecordEvent::Inserted { id }) if id == row.id => break id,
                Ok(_) => continue,
                Err(e) => panic!("listener closed: {e}"),
            }
        }
    })
    .await
    .expect("insert notification");
    assert_eq!(event, row.id);
}
