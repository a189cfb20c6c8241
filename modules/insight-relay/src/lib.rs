//! HTTP relay: one inbound search request, one upstream streamed request,
//! bytes piped through unchanged.

pub mod error;
pub mod relay;

pub use error::{Result, UpstreamError};

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use insight_common::RelayConfig;

/// Shared across requests. The HTTP client pools connections but holds no
/// per-request state.
pub struct AppState {
    pub http: reqwest::Client,
    pub config: RelayConfig,
}

impl AppState {
    pub fn new(config: RelayConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(relay::search))
        .route("/health", get(|| async { "ok" }))
        .with_state(Arc::new(state))
        .layer(
            ServiceBuilder::new()
                // method + path only; queries never reach the log
                .layer(TraceLayer::new_for_http().make_span_with(
                    |request: &axum::http::Request<_>| {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            path = %request.uri().path(),
                        )
                    },
                ))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache"),
                )),
        )
}
