mod catalogue;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

pub use catalogue::{default_catalogue, search, Book, BooksResponse};

/// How the stub should behave. The default is a healthy, instant service.
#[derive(Debug, Clone)]
pub struct StubConfig {
    /// Status returned by `GET /libros`. Anything other than 200 returns a plain-text error body.
    pub status: StatusCode,
    /// Delay added before answering each request.
    pub delay: Duration,
    pub books: Vec<Book>,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            delay: Duration::ZERO,
            books: default_catalogue(),
        }
    }
}

impl StubConfig {
    pub fn failing(status: StatusCode) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

struct StubState {
    config: StubConfig,
    requests: Arc<AtomicU64>,
}

#[derive(Debug, Deserialize)]
struct BooksQuery {
    #[serde(default)]
    q: String,
}

pub fn router(config: StubConfig, requests: Arc<AtomicU64>) -> Router {
    let state = Arc::new(StubState { config, requests });

    Router::new()
        .route("/libros", get(list_books))
        .with_state(state)
}

async fn list_books(
    State(state): State<Arc<StubState>>,
    Query(query): Query<BooksQuery>,
    headers: HeaderMap,
) -> Response {
    state.requests.fetch_add(1, Ordering::Relaxed);
    if !state.config.delay.is_zero() {
        tokio::time::sleep(state.config.delay).await;
    }

    if state.config.status != StatusCode::OK {
        log::debug!("Answering /libros with {}", state.config.status);
        return (state.config.status, "Error al cargar libros").into_response();
    }

    let books = search(&state.config.books, &query.q)
        .into_iter()
        .cloned()
        .collect();

    Json(BooksResponse {
        books,
        user: cookie(&headers, "usuario").unwrap_or_default(),
        role: cookie(&headers, "rol").unwrap_or_default(),
    })
    .into_response()
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Serve the stub on an already bound listener until the process exits.
pub async fn serve(
    listener: tokio::net::TcpListener,
    config: StubConfig,
    requests: Arc<AtomicU64>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(config, requests))
        .await
        .context("Stub service stopped")
}

/// A stub running on a background thread with its own runtime, for callers that are not async.
///
/// The server lives until the process exits.
pub struct BackgroundStub {
    addr: SocketAddr,
    requests: Arc<AtomicU64>,
}

impl BackgroundStub {
    pub fn start(config: StubConfig) -> anyhow::Result<Self> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(AtomicU64::new(0));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let served_requests = requests.clone();
        std::thread::Builder::new()
            .name("stub-service".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let result = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => serve(listener, config, served_requests).await,
                        Err(e) => Err(e.into()),
                    };
                    if let Err(e) = result {
                        log::error!("Stub service failed: {e:?}");
                    }
                })
            })?;

        Ok(Self { addr, requests })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests answered so far.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}
