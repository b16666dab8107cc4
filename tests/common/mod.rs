//! In-process fake portal backend for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use futures::stream::{self, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use url::Url;

pub const SESSION_COOKIE: &str = "session=valid";

#[derive(Default)]
pub struct Backend {
    /// Requests seen by the search endpoint, keyed by query
    pub search_hits: Mutex<HashMap<String, usize>>,
    /// Releases the second half of the `slow` stream
    pub gate: Notify,
    pub admin_forms: Mutex<Vec<HashMap<String, String>>>,
    pub downloads: AtomicUsize,
}

impl Backend {
    pub fn hits(&self, query: &str) -> usize {
        self.search_hits.lock().unwrap().get(query).copied().unwrap_or(0)
    }
}

pub struct TestServer {
    base_url: Url,
    pub backend: Arc<Backend>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn new() -> Self {
        let backend = Arc::new(Backend::default());
        let router = Router::new()
            .route("/api/v2/search", get(search))
            .route("/api/v2/popular", get(popular))
            .route("/api/v2/getvideo", get(get_video))
            .route("/api/v2/download", post(download))
            .route("/api/v2/user-status", get(user_status))
            .route("/test", get(download_status))
            .route("/logout", get(|| async { "bye" }))
            .route("/admin", post(admin))
            .with_state(Arc::clone(&backend));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });

        tokio::spawn(async move {
            server.await.unwrap();
        });

        Self {
            base_url: Url::parse(&format!("http://{}", addr)).unwrap(),
            backend,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

fn event_stream(chunks: Vec<Vec<u8>>) -> Response {
    let body = Body::from_stream(stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>)));
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

fn frame(payload: serde_json::Value) -> Vec<u8> {
    format!("data: {}\n\n", payload).into_bytes()
}

fn wants_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"))
}

fn unavailable() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"message": "Search service unavailable"})),
    )
        .into_response()
}

async fn search(
    State(backend): State<Arc<Backend>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let q = params.get("q").cloned().unwrap_or_default();
    *backend.search_hits.lock().unwrap().entry(q.clone()).or_default() += 1;

    match q.as_str() {
        "stream" => {
            // one frame per chunk, with the second title split inside a UTF-8 sequence
            let second = frame(json!({"results": [{"id": 2, "title": "Amélie"}]}));
            let cut = second.iter().position(|&b| b == 0xC3).unwrap() + 1;
            event_stream(vec![
                frame(json!({"results": [{"id": 1, "title": "A"}]})),
                second[..cut].to_vec(),
                second[cut..].to_vec(),
                frame(json!({"complete": true})),
            ])
        }
        "json" => Json(json!({
            "message": "OK",
            "data": [{
                "title": "Flushed Away",
                "page_url": "https://x/y",
                "poster_url": "https://p.jpg"
            }]
        }))
        .into_response(),
        "none" => Json(json!({"data": []})).into_response(),
        "unterminated" => event_stream(vec![frame(json!({"results": [{"title": "Only"}]}))]),
        "malformed" => event_stream(vec![
            b"data: {\"results\": [\n\n".to_vec(),
            b"event: ping\n\n".to_vec(),
            frame(json!({"results": [{"title": "Survivor"}]})),
            frame(json!({"complete": 1})),
        ]),
        "broken" => event_stream(vec![
            frame(json!({"results": [{"title": "Partial"}]})),
            frame(json!({"error": "index offline"})),
            frame(json!({"results": [{"title": "Never"}]})),
        ]),
        "fallback" if wants_stream(&headers) => unavailable(),
        "fallback" => Json(json!({"data": [{"title": "Recovered", "page_url": "https://r"}]})).into_response(),
        "down" => unavailable(),
        "slow" => {
            let head = stream::iter(vec![Ok::<_, std::io::Error>(frame(
                json!({"results": [{"title": "Stale"}]}),
            ))]);
            let gated = Arc::clone(&backend);
            let tail = stream::once(async move {
                gated.gate.notified().await;
                let mut rest = frame(json!({"results": [{"title": "Late"}]}));
                rest.extend(frame(json!({"complete": true})));
                Ok(rest)
            });
            let body = Body::from_stream(head.chain(tail));
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        other => event_stream(vec![
            frame(json!({"results": [{"title": format!("Result for {}", other)}]})),
            frame(json!({"complete": true})),
        ]),
    }
}

async fn popular() -> Response {
    Json(json!({
        "data": [
            {"id": 7, "page_url": "https://a", "data": {"title": "Nested", "imdb_score": 7.1}},
            {"filename": "Some.File.2020.mkv", "page_url": "https://b"}
        ]
    }))
    .into_response()
}

async fn get_video(Query(params): Query<HashMap<String, String>>) -> Response {
    let Some(page_url) = params.get("page_url") else {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "page_url required"}))).into_response();
    };
    if page_url.ends_with("missing") {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "Video not found"}))).into_response();
    }
    Json(json!({
        "video_url": format!("{}/stream.mp4", page_url),
        "video_data": {"title": "Flushed Away", "imdb_score": 6.6, "release_year": 2006}
    }))
    .into_response()
}

async fn download(
    State(backend): State<Arc<Backend>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    backend.downloads.fetch_add(1, Ordering::SeqCst);
    let id = params.get("id").and_then(|id| id.parse::<u64>().ok());
    Json(json!({
        "message": "Download started",
        "video_url": params.get("page_url"),
        "id": id
    }))
    .into_response()
}

async fn download_status(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("filename") {
        Some(name) => Json(json!({"filename": name, "status": "downloading"})).into_response(),
        None => Json(json!({"message": "Download service running"})).into_response(),
    }
}

async fn user_status(headers: HeaderMap) -> Response {
    let signed_in = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == SESSION_COOKIE);
    if !signed_in {
        return (StatusCode::FORBIDDEN, Json(json!({"message": "Not logged in"}))).into_response();
    }
    Json(json!({
        "user": {"id": "1", "first_name": "Ada", "last_name": "Admin", "email": "ada@example.com", "banned": false},
        "group": {"role": "Administrators"}
    }))
    .into_response()
}

async fn admin(
    State(backend): State<Arc<Backend>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let message = format!("Action {} applied", fields.get("action").cloned().unwrap_or_default());
    backend.admin_forms.lock().unwrap().push(fields);
    Json(json!({"message": message})).into_response()
}
