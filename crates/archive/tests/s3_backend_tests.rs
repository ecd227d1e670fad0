//! S3 backend tests against a mock path-style endpoint.

use bytes::Bytes;
use httpmock::Method::PUT;
use httpmock::MockServer;
use sigtrack_archive::{ArtifactArchiver, S3Archiver, S3Settings};
use std::net::TcpListener;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn settings(server: &MockServer) -> S3Settings {
    S3Settings {
        bucket: "signed".to_string(),
        endpoint: Some(server.base_url()),
        region: Some("us-east-1".to_string()),
        prefix: Some("prod".to_string()),
        access_key_id: Some("access".to_string()),
        secret_access_key: Some("secret".to_string()),
        force_path_style: true,
        public_base_url: None,
    }
}

#[tokio::test]
async fn put_object_carries_pdf_metadata() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    let put = server.mock(|when, then| {
        when.method(PUT)
            .path("/signed/prod/skribble_signed_docs/doc-1.pdf")
            .header("content-type", "application/pdf")
            .header("content-disposition", "attachment; filename=\"doc-1.pdf\"");
        then.status(200).header("etag", "\"abc\"");
    });

    let archiver = S3Archiver::new(settings(&server), "skribble_signed_docs", false)
        .await
        .unwrap();
    let artifact = archiver
        .archive(Bytes::from_static(b"%PDF-1.7"), "doc-1")
        .await
        .unwrap();

    put.assert();
    assert_eq!(artifact.key, "skribble_signed_docs/doc-1.pdf");
    assert_eq!(
        artifact.url,
        format!(
            "{}/signed/prod/skribble_signed_docs/doc-1.pdf",
            server.base_url()
        )
    );
}

#[tokio::test]
async fn failed_put_is_an_error() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(PUT);
        then.status(403).body("<Error><Code>AccessDenied</Code></Error>");
    });

    let archiver = S3Archiver::new(settings(&server), "skribble_signed_docs", true)
        .await
        .unwrap();
    assert!(
        archiver
            .archive(Bytes::from_static(b"%PDF"), "doc-1")
            .await
            .is_err()
    );
}
