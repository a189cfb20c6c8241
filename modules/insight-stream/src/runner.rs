//! Owns at most one in-flight analysis run.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bridge::PersistenceBridge;
use crate::consumer::{AnalysisClient, RunReport};
use crate::engine::RunUpdate;
use crate::error::Result;
use crate::store::SessionStore;

pub struct AnalysisRunner<S> {
    client: Arc<AnalysisClient>,
    store: S,
    current: Option<JoinHandle<RunReport>>,
}

impl<S: SessionStore + Clone + 'static> AnalysisRunner<S> {
    pub fn new(client: AnalysisClient, store: S) -> Self {
        Self {
            client: Arc::new(client),
            store,
            current: None,
        }
    }

    pub fn bridge(&self) -> PersistenceBridge<S> {
        PersistenceBridge::new(self.store.clone())
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start a run for `query`, aborting any run still in flight.
    ///
    /// The previous task is awaited after the abort so its stream is dropped
    /// and its connection closed before the new run touches the store.
    pub async fn start(&mut self, query: impl Into<String>) -> mpsc::UnboundedReceiver<RunUpdate> {
        self.cancel().await;

        let query = query.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let bridge = self.bridge();

        self.current = Some(tokio::spawn(async move {
            client
                .run(&query, bridge, move |update| {
                    // Receiver gone just means nobody is watching.
                    let _ = tx.send(update);
                })
                .await
        }));
        rx
    }

    /// Wait for the current run to finish.
    pub async fn wait(&mut self) -> Option<RunReport> {
        let handle = self.current.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                warn!(error = %e, "Analysis task panicked");
                None
            }
        }
    }

    /// Abort the in-flight run, if any. Returns whether one was running.
    pub async fn cancel(&mut self) -> bool {
        let Some(handle) = self.current.take() else {
            return false;
        };
        if handle.is_finished() {
            return false;
        }
        handle.abort();
        let _ = handle.await;
        info!("Previous analysis run aborted");
        true
    }

    /// Abort any run and clear both session keys.
    pub async fn reset(&mut self) -> Result<()> {
        self.cancel().await;
        self.bridge().reset()
    }
}
