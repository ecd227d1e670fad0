//! Integration tests for reconcile triggers.

mod common;

use common::{TestServer, new_request};
use sigtrack_records::SignatureRequestRepo;
use sigtrack_server::trigger::{spawn_driver, spawn_insert_listener};
use std::time::Duration;
use tokio::sync::watch;

/// Poll until the provider saw at least `calls` status checks.
async fn wait_for_status_calls(server: &TestServer, calls: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.provider.status_calls() < calls {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("reconcile cycle did not run");
}

#[tokio::test]
async fn insert_starts_a_cycle() {
    let server = TestServer::new().await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = spawn_insert_listener(
        server.records().as_ref(),
        server.state.trigger.clone(),
        shutdown_rx.clone(),
    );
    let driver = spawn_driver(
        server.state.reconciler.clone(),
        server.state.trigger.clone(),
        Duration::from_secs(3600),
        false,
        shutdown_rx,
    );

    server
        .records()
        .insert(&new_request("doc-1", None))
        .await
        .unwrap();
    wait_for_status_calls(&server, 1).await;

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), driver)
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), listener)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn startup_cycle_runs_immediately() {
    let server = TestServer::new().await;
    server
        .records()
        .insert(&new_request("doc-1", None))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = spawn_driver(
        server.state.reconciler.clone(),
        server.state.trigger.clone(),
        Duration::from_secs(3600),
        true,
        shutdown_rx,
    );

    wait_for_status_calls(&server, 1).await;
    shutdown_tx.send(true).unwrap();
    driver.await.unwrap();
}

#[tokio::test]
async fn explicit_request_starts_a_cycle() {
    let server = TestServer::new().await;
    server
        .records()
        .insert(&new_request("doc-1", None))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = spawn_driver(
        server.state.reconciler.clone(),
        server.state.trigger.clone(),
        Duration::from_secs(3600),
        false,
        shutdown_rx,
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.provider.status_calls(), 0);

    server.state.trigger.request();
    wait_for_status_calls(&server, 1).await;

    drop(shutdown_tx);
    driver.await.unwrap();
}

#[tokio::test]
async fn timer_repeats_cycles() {
    let server = TestServer::new().await;
    server
        .records()
        .insert(&new_request("doc-1", None))
        .await
        .unwrap();
    server.provider.set_status("doc-1", "OPEN");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = spawn_driver(
        server.state.reconciler.clone(),
        server.state.trigger.clone(),
        Duration::from_millis(50),
        false,
        shutdown_rx,
    );

    wait_for_status_calls(&server, 3).await;
    shutdown_tx.send(true).unwrap();
    driver.await.unwrap();
}
