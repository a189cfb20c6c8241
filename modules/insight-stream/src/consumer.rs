//! Drives a run from an HTTP response body.

use std::fmt::Display;
use std::pin::pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use insight_common::RunFailure;

use crate::bridge::PersistenceBridge;
use crate::engine::{Outcome, RunUpdate, StreamEngine};
use crate::reducer::AnalysisState;
use crate::store::SessionStore;

/// Pump `body` into `engine` until the run finishes.
///
/// Each read waits at most `idle_timeout`; a stalled stream fails the run
/// with a transport error. Returning drops `body`, which closes the
/// underlying connection.
pub async fn consume<S, St, B, E>(
    engine: &mut StreamEngine<S>,
    body: St,
    idle_timeout: Duration,
    mut on_update: impl FnMut(RunUpdate),
) -> Outcome
where
    S: SessionStore,
    St: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut body = pin!(body);
    loop {
        if let Some(outcome) = engine.outcome() {
            return outcome.clone();
        }
        let updates = match tokio::time::timeout(idle_timeout, body.next()).await {
            Ok(Some(Ok(chunk))) => engine.feed(chunk.as_ref()),
            Ok(Some(Err(e))) => engine.fail(RunFailure::Transport(e.to_string())),
            Ok(None) => engine.end_of_stream(),
            Err(_) => engine.fail(RunFailure::Transport(format!(
                "no data received for {}s",
                idle_timeout.as_secs()
            ))),
        };
        for update in updates {
            on_update(update);
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: Outcome,
    pub state: AnalysisState,
}

/// Submits queries to the relay and consumes its event stream.
pub struct AnalysisClient {
    http: reqwest::Client,
    relay_url: String,
    idle_timeout: Duration,
}

impl AnalysisClient {
    pub fn new(relay_url: &str, idle_timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            relay_url: relay_url.trim_end_matches('/').to_string(),
            idle_timeout,
        })
    }

    pub fn search_url(&self) -> String {
        format!("{}/api/search", self.relay_url)
    }

    /// Run one analysis to completion.
    pub async fn run<S: SessionStore>(
        &self,
        query: &str,
        bridge: PersistenceBridge<S>,
        mut on_update: impl FnMut(RunUpdate),
    ) -> RunReport {
        let mut engine = StreamEngine::start(query, bridge);
        let run_id = engine.run_id();

        let request = self
            .http
            .post(self.search_url())
            .json(&SearchRequest { query })
            .send();

        let updates = match tokio::time::timeout(self.idle_timeout, request).await {
            Err(_) => engine.fail(RunFailure::Transport(format!(
                "relay did not respond within {}s",
                self.idle_timeout.as_secs()
            ))),
            Ok(Err(e)) => engine.fail(RunFailure::Transport(e.to_string())),
            Ok(Ok(resp)) if !resp.status().is_success() => {
                let status = resp.status();
                let detail = tokio::time::timeout(self.idle_timeout, resp.text())
                    .await
                    .ok()
                    .and_then(Result::ok)
                    .unwrap_or_default();
                warn!(%run_id, %status, detail = %detail, "Relay rejected analysis request");
                engine.fail(RunFailure::UpstreamUnavailable(format!(
                    "analysis service returned {status}"
                )))
            }
            Ok(Ok(resp)) => {
                info!(%run_id, "Streaming analysis events");
                let outcome = consume(
                    &mut engine,
                    resp.bytes_stream(),
                    self.idle_timeout,
                    &mut on_update,
                )
                .await;
                return RunReport {
                    outcome,
                    state: engine.into_state(),
                };
            }
        };

        for update in updates {
            on_update(update);
        }
        let outcome = engine
            .outcome()
            .cloned()
            .unwrap_or(Outcome::Incomplete);
        RunReport {
            outcome,
            state: engine.into_state(),
        }
    }
}
