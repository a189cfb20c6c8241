//! End-to-end relay behaviour against an in-process upstream.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Semaphore;

use insight_common::RelayConfig;
use insight_relay::{build_router, AppState};

const FIRST: &str = "data: {\"author\":\"search_agent\",\"content\":\"x\",\"is_final\":true}\n\n";
const SECOND: &str = "data: {\"author\":\"fetch_website_agent\",\"content\":\"y\",\"is_final\":true}\n\n";

// ---------------------------------------------------------------------------
// Mock upstream analysis service
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Upstream {
    /// Gate between the first and second chunk of the "gated" stream.
    gate: Arc<Semaphore>,
}

fn event_stream(body: Body) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn upstream_search(State(upstream): State<Upstream>, Json(body): Json<Value>) -> Response {
    let query = body["query"].as_str().unwrap_or_default().to_string();
    match query.as_str() {
        "overloaded" => (StatusCode::SERVICE_UNAVAILABLE, "model overloaded").into_response(),
        "overloaded_stall" => (
            StatusCode::SERVICE_UNAVAILABLE,
            Body::from_stream(
                stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"partial"))])
                    .chain(stream::pending()),
            ),
        )
            .into_response(),
        "empty" => event_stream(Body::empty()),
        "echo" => event_stream(Body::from(format!("data: {body}\n\n"))),
        "stall" => event_stream(Body::from_stream(
            stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(FIRST.as_bytes()))])
                .chain(stream::pending()),
        )),
        "gated" => {
            let gate = upstream.gate.clone();
            let chunks = async_stream::stream! {
                yield Ok::<_, std::io::Error>(Bytes::from_static(FIRST.as_bytes()));
                let _permit = gate.acquire().await;
                yield Ok(Bytes::from_static(SECOND.as_bytes()));
            };
            event_stream(Body::from_stream(chunks))
        }
        _ => event_stream(Body::from_stream(stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(FIRST.as_bytes())),
            Ok(Bytes::from_static(SECOND.as_bytes())),
        ]))),
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

struct Harness {
    relay: SocketAddr,
    gate: Arc<Semaphore>,
    http: reqwest::Client,
}

async fn harness(idle_timeout: Duration) -> Harness {
    harness_with(Duration::from_secs(5), idle_timeout).await
}

async fn harness_with(request_timeout: Duration, idle_timeout: Duration) -> Harness {
    let gate = Arc::new(Semaphore::new(0));
    let upstream = serve(
        Router::new()
            .route("/search", post(upstream_search))
            .with_state(Upstream { gate: gate.clone() }),
    )
    .await;

    let config = RelayConfig {
        server_url: format!("http://{upstream}"),
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout,
        idle_timeout,
    };
    let relay = serve(build_router(AppState::new(config).unwrap())).await;

    Harness {
        relay,
        gate,
        http: reqwest::Client::new(),
    }
}

impl Harness {
    async fn search(&self, query: &str) -> reqwest::Response {
        self.http
            .post(format!("http://{}/api/search", self.relay))
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .unwrap()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stream_passes_through_unchanged() {
    let h = harness(Duration::from_secs(5)).await;
    let resp = h.search("coffee").await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(resp.text().await.unwrap(), format!("{FIRST}{SECOND}"));
}

#[tokio::test]
async fn test_query_forwarded_as_json_body() {
    let h = harness(Duration::from_secs(5)).await;
    let body = h.search("echo").await.text().await.unwrap();
    assert_eq!(body, "data: {\"query\":\"echo\"}\n\n");
}

#[tokio::test]
async fn test_upstream_503_becomes_500_json() {
    let h = harness(Duration::from_secs(5)).await;
    let resp = h.search("overloaded").await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_ne!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));
}

#[tokio::test]
async fn test_upstream_error_with_stalled_body_still_answers_500() {
    let h = harness_with(Duration::from_secs(1), Duration::from_secs(1)).await;
    let resp = tokio::time::timeout(Duration::from_secs(5), h.search("overloaded_stall"))
        .await
        .expect("relay should answer once the error body read times out");

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));
}

#[tokio::test]
async fn test_unreachable_upstream_becomes_500_json() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let config = RelayConfig {
        server_url: format!("http://{dead}"),
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(5),
    };
    let relay = serve(build_router(AppState::new(config).unwrap())).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{relay}/api/search"))
        .json(&serde_json::json!({ "query": "coffee" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_empty_upstream_body_is_empty_stream() {
    let h = harness(Duration::from_secs(5)).await;
    let resp = h.search("empty").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_chunks_forwarded_before_upstream_finishes() {
    let h = harness(Duration::from_secs(5)).await;
    let mut resp = h.search("gated").await;

    // The upstream holds its second chunk until the first has reached us.
    let mut received = Vec::new();
    while received.len() < FIRST.len() {
        let chunk = tokio::time::timeout(Duration::from_secs(5), resp.chunk())
            .await
            .expect("first chunk was buffered by the relay")
            .unwrap()
            .expect("stream ended early");
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, FIRST.as_bytes());

    h.gate.add_permits(1);
    while let Some(chunk) = resp.chunk().await.unwrap() {
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, format!("{FIRST}{SECOND}").as_bytes());
}

#[tokio::test]
async fn test_idle_upstream_aborts_outbound_stream() {
    let h = harness(Duration::from_secs(1)).await;
    let resp = h.search("stall").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let result = tokio::time::timeout(Duration::from_secs(5), resp.bytes()).await;
    assert!(matches!(result, Ok(Err(_))), "stream should end with an error");
}

#[tokio::test]
async fn test_malformed_request_rejected_with_4xx() {
    let h = harness(Duration::from_secs(5)).await;
    let url = format!("http://{}/api/search", h.relay);

    let not_json = h
        .http
        .post(&url)
        .header(header::CONTENT_TYPE, "application/json")
        .body("{query")
        .send()
        .await
        .unwrap();
    assert!(not_json.status().is_client_error());

    let no_query = h
        .http
        .post(&url)
        .json(&serde_json::json!({ "q": "coffee" }))
        .send()
        .await
        .unwrap();
    assert!(no_query.status().is_client_error());
}

#[tokio::test]
async fn test_health() {
    let h = harness(Duration::from_secs(5)).await;
    let resp = h
        .http
        .get(format!("http://{}/health", h.relay))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");
}
