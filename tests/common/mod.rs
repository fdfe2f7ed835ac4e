//! Shared helpers for integration tests
//!
//! A local origin server on 127.0.0.1 that serves fixed-size audio payloads
//! and counts the requests it receives.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use audio_cache::config::BackendKind;
use audio_cache::Config;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::StreamExt;

/// Size of every payload served by the origin.
pub const PAYLOAD_SIZE: usize = 1000;

#[derive(Debug, Default)]
pub struct OriginCounts {
    pub gets: AtomicUsize,
    pub heads: AtomicUsize,
}

pub struct Origin {
    pub base_url: String,
    pub counts: Arc<OriginCounts>,
}

impl Origin {
    pub fn url(&self, name: &str) -> String {
        format!("{}/audio/{}", self.base_url, name)
    }

    pub fn gets(&self) -> usize {
        self.counts.gets.load(Ordering::SeqCst)
    }

    pub fn heads(&self) -> usize {
        self.counts.heads.load(Ordering::SeqCst)
    }
}

/// Starts the origin on an ephemeral port. `/audio/:name` serves a payload,
/// except for these names:
/// - `missing` answers 404 to everything
/// - `broken` accepts HEAD but fails GET with 500
/// - `slow` delays GET responses by 150ms
/// - `stalled` sends GET headers and one chunk, then never finishes the body
/// - `unresponsive` never answers HEAD
pub async fn spawn_origin() -> Origin {
    let counts = Arc::new(OriginCounts::default());
    let app = Router::new()
        .route("/audio/:name", get(serve_audio))
        .with_state(counts.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Origin {
        base_url: format!("http://{}", addr),
        counts,
    }
}

async fn serve_audio(
    State(counts): State<Arc<OriginCounts>>,
    method: Method,
    Path(name): Path<String>,
) -> Response {
    let is_get = method == Method::GET;
    if is_get {
        counts.gets.fetch_add(1, Ordering::SeqCst);
    } else {
        counts.heads.fetch_add(1, Ordering::SeqCst);
    }

    match name.as_str() {
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "broken" if is_get => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "slow" if is_get => {
            tokio::time::sleep(Duration::from_millis(150)).await;
            payload()
        }
        "stalled" if is_get => stalled_body(),
        "unresponsive" if !is_get => {
            std::future::pending::<()>().await;
            payload()
        }
        _ => payload(),
    }
}

fn payload() -> Response {
    vec![0x42u8; PAYLOAD_SIZE].into_response()
}

fn stalled_body() -> Response {
    let first = futures::stream::once(async {
        Ok::<_, std::io::Error>(Bytes::from(vec![0x42u8; PAYLOAD_SIZE / 2]))
    });
    Body::from_stream(first.chain(futures::stream::pending())).into_response()
}

/// Configuration with short timeouts, rooted at `cache_dir`.
pub fn test_config(cache_dir: &std::path::Path, backend: BackendKind) -> Config {
    Config {
        cache_dir: cache_dir.to_path_buf(),
        backend,
        fetch_timeout_secs: 5,
        probe_timeout_secs: 2,
        ..Config::default()
    }
}
