use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use gale_http_client::prelude::*;
use gale_instruments::ReportConfig;
use stub_service::{BackgroundStub, BooksResponse, StubConfig};

fn client_for(base_url: &str, timeout: Duration) -> HttpClient {
    HttpClient::new(base_url, timeout, Arc::new(ReportConfig::default().init())).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn get_reads_status_and_body() {
    let stub = BackgroundStub::start(StubConfig::default()).unwrap();
    let client = client_for(&stub.base_url(), Duration::from_secs(5));

    let response = client.get("/libros?q=rulfo").await.unwrap();

    assert_eq!(200, response.status());
    assert!(response
        .header("content-type")
        .is_some_and(|v| v.starts_with("application/json")));
    let books: BooksResponse = response.json().unwrap();
    assert_eq!(1, books.books.len());
}

#[tokio::test(flavor = "multi_thread")]
async fn error_status_is_a_response() {
    let stub =
        BackgroundStub::start(StubConfig::failing(StatusCode::INTERNAL_SERVER_ERROR)).unwrap();
    let client = client_for(&stub.base_url(), Duration::from_secs(5));

    let response = client.get("/libros").await.unwrap();

    assert_eq!(500, response.status());
    assert_eq!("Error al cargar libros", response.text().unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_target_times_out() {
    let stub = BackgroundStub::start(StubConfig {
        delay: Duration::from_secs(2),
        ..Default::default()
    })
    .unwrap();
    let client = client_for(&stub.base_url(), Duration::from_millis(100));

    let err = client.get("/libros").await.unwrap_err();

    assert_eq!(RequestErrorKind::Timeout, err.kind());
    assert!(err.to_string().ends_with("/libros failed: timeout"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_target_is_a_request_error() {
    // Bind then drop to find a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let client = client_for(&format!("http://127.0.0.1:{port}"), Duration::from_secs(5));

    let err = client.get("/libros").await.unwrap_err();

    assert_eq!(RequestErrorKind::Connect, err.kind());
}

#[test]
fn rejects_invalid_target() {
    let result = HttpClient::new(
        "not a url",
        Duration::from_secs(1),
        Arc::new(ReportConfig::default().init()),
    );

    assert!(result.is_err());
}
