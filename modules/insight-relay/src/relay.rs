use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, UpstreamError};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// `POST /api/search`: open one upstream request and forward its body as-is.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Response> {
    let upstream = open_upstream(&state, &req).await?;
    info!(status = %upstream.status(), "Relaying upstream event stream");

    let body = Body::from_stream(pump(upstream.bytes_stream(), state.config.idle_timeout));
    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response())
}

async fn open_upstream(state: &AppState, req: &SearchRequest) -> Result<reqwest::Response> {
    let url = state.config.search_url();
    debug!(url = %url, query_len = req.query.len(), "Opening upstream request");

    let send = state.http.post(&url).json(req).send();
    let resp = tokio::time::timeout(state.config.request_timeout, send)
        .await
        .map_err(|_| UpstreamError::Timeout(state.config.request_timeout.as_secs()))??;

    let status = resp.status();
    if !status.is_success() {
        // The error body gets the same budget as the request itself.
        let message = match tokio::time::timeout(state.config.request_timeout, resp.text()).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                debug!(error = %e, "Upstream error body unreadable");
                String::new()
            }
            Err(_) => {
                warn!(%status, "Upstream error body stalled, dropping it");
                String::new()
            }
        };
        return Err(UpstreamError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp)
}

/// Forward upstream chunks unmodified. Each read is bounded by `idle`; a
/// stalled or failed upstream ends the outbound body with an error, which
/// aborts the client connection.
pub fn pump<S>(upstream: S, idle: Duration) -> impl Stream<Item = Result<Bytes>> + Send + 'static
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    async_stream::stream! {
        let mut upstream = Box::pin(upstream);
        let mut forwarded = 0usize;
        loop {
            match tokio::time::timeout(idle, upstream.next()).await {
                Ok(Some(Ok(chunk))) => {
                    forwarded += chunk.len();
                    yield Ok(chunk);
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, bytes = forwarded, "Upstream stream failed");
                    yield Err(UpstreamError::from(e));
                    break;
                }
                Ok(None) => {
                    info!(bytes = forwarded, "Upstream stream finished");
                    break;
                }
                Err(_) => {
                    warn!(idle_secs = idle.as_secs(), bytes = forwarded, "Upstream stream idle, aborting");
                    yield Err(UpstreamError::Idle(idle.as_secs()));
                    break;
                }
            }
        }
    }
}
