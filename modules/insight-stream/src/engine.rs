//! The per-run dispatch loop.
//!
//! bytes → frames → signals → reduce → persist. The engine owns the frame
//! decoder, the run state and the persistence bridge for exactly one run.
//! Once the run has finished every further input is ignored.

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use insight_common::RunFailure;

use crate::bridge::{PersistedResult, PersistenceBridge, ProgressSnapshot};
use crate::frame::{FrameDecoder, StreamSignal};
use crate::reducer::{AnalysisState, ProgressReducer, RunStatus};
use crate::store::SessionStore;
use crate::traits::Reducer;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Terminal event seen; the result is stored and the dashboard can be shown.
    Completed(PersistedResult),
    Failed(RunFailure),
    /// Stream ended without a terminal event. Not a success.
    Incomplete,
}

/// Change notifications for a progress view.
#[derive(Debug, Clone, PartialEq)]
pub enum RunUpdate {
    Event(insight_common::AnalysisEvent),
    Progress(ProgressSnapshot),
    Finished(Outcome),
}

pub struct StreamEngine<S: SessionStore> {
    run_id: Uuid,
    decoder: FrameDecoder,
    reducer: ProgressReducer,
    bridge: PersistenceBridge<S>,
    state: AnalysisState,
    last_snapshot: ProgressSnapshot,
    outcome: Option<Outcome>,
}

impl<S: SessionStore> StreamEngine<S> {
    /// Begin a run. Supersedes whatever the store held for a previous run.
    pub fn start(query: impl Into<String>, bridge: PersistenceBridge<S>) -> Self {
        let state = AnalysisState::new(query);
        let last_snapshot = state.snapshot();
        let run_id = Uuid::new_v4();

        if let Err(e) = bridge.clear_result() {
            warn!(%run_id, error = %e, "Failed to clear previous analysis result");
        }
        if let Err(e) = bridge.save_progress(&last_snapshot) {
            warn!(%run_id, error = %e, "Failed to persist initial progress");
        }
        info!(%run_id, query = %state.query, "Analysis run started");

        Self {
            run_id,
            decoder: FrameDecoder::new(),
            reducer: ProgressReducer,
            bridge,
            state,
            last_snapshot,
            outcome: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn into_state(self) -> AnalysisState {
        self.state
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Feed one chunk of the response body.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RunUpdate> {
        let mut updates = Vec::new();
        if self.is_finished() {
            debug!(run_id = %self.run_id, bytes = chunk.len(), "Ignoring bytes after run ended");
            return updates;
        }
        for frame in self.decoder.push(chunk) {
            for signal in frame.signals() {
                self.dispatch(signal, &mut updates);
            }
            if self.is_finished() {
                break;
            }
        }
        updates
    }

    /// The response body ended. Flushes an unterminated last frame first.
    pub fn end_of_stream(&mut self) -> Vec<RunUpdate> {
        let mut updates = Vec::new();
        if let Some(frame) = self.decoder.finish() {
            for signal in frame.signals() {
                self.dispatch(signal, &mut updates);
            }
        }
        self.dispatch(StreamSignal::EndOfStream, &mut updates);
        updates
    }

    /// Transport-level failure outside the stream's own content.
    pub fn fail(&mut self, failure: RunFailure) -> Vec<RunUpdate> {
        let mut updates = Vec::new();
        self.dispatch(StreamSignal::Failure(failure), &mut updates);
        updates
    }

    fn dispatch(&mut self, signal: StreamSignal, updates: &mut Vec<RunUpdate>) {
        if self.is_finished() {
            return;
        }

        // 1. Reduce (pure state update)
        let logged = self.state.events.len();
        self.reducer.reduce(&mut self.state, &signal);
        for event in &self.state.events[logged..] {
            debug!(run_id = %self.run_id, author = %event.author, is_final = event.is_final, "Event");
            updates.push(RunUpdate::Event(event.clone()));
        }

        // 2. Persist progress on change
        let snapshot = self.state.snapshot();
        if snapshot != self.last_snapshot {
            if let Err(e) = self.bridge.save_progress(&snapshot) {
                warn!(run_id = %self.run_id, error = %e, "Failed to persist progress");
            }
            self.last_snapshot = snapshot.clone();
            updates.push(RunUpdate::Progress(snapshot));
        }

        // 3. Settle the outcome once the run leaves the analyzing state
        let outcome = match &self.state.status {
            RunStatus::Analyzing => return,
            RunStatus::Completed => Outcome::Completed(self.persist_result()),
            RunStatus::Failed(failure) => {
                warn!(run_id = %self.run_id, error = %failure, "Analysis run failed");
                Outcome::Failed(failure.clone())
            }
            RunStatus::Incomplete => {
                warn!(run_id = %self.run_id, events = self.state.events.len(), "Stream ended without final results");
                Outcome::Incomplete
            }
        };
        self.outcome = Some(outcome.clone());
        updates.push(RunUpdate::Finished(outcome));
    }

    fn persist_result(&self) -> PersistedResult {
        let result = self
            .state
            .terminal_event()
            .and_then(|e| e.terminal_result())
            .map(|r| PersistedResult::from_structured(r, Utc::now()))
            .unwrap_or_else(|| PersistedResult {
                summary: String::new(),
                sentiment_score: None,
                sentiment_magnitude: None,
                bigquery_metrics: Vec::new(),
                statista_insights: Vec::new(),
                timestamp: Utc::now(),
            });

        match self.bridge.save_result(&result) {
            Ok(()) => info!(
                run_id = %self.run_id,
                bigquery_metrics = result.bigquery_metrics.len(),
                statista_insights = result.statista_insights.len(),
                "Analysis run completed"
            ),
            Err(e) => error!(run_id = %self.run_id, error = %e, "Failed to persist analysis result"),
        }
        result
    }
}
