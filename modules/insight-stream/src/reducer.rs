//! Run state and the pure reducer that folds stream signals into it.

use insight_common::stages::fallback_milestone;
use insight_common::{
    analysis_stages, milestone, AnalysisEvent, Milestone, RunFailure, StageDescriptor,
    TERMINAL_MILESTONE,
};

use crate::bridge::ProgressSnapshot;
use crate::frame::StreamSignal;
use crate::traits::Reducer;

/// Where a run stands.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Analyzing,
    /// The terminal `final_results` event arrived.
    Completed,
    Failed(RunFailure),
    /// The stream ended without a terminal event.
    Incomplete,
}

/// Everything the progress view needs about the current run.
#[derive(Debug, Clone)]
pub struct AnalysisState {
    pub query: String,
    pub status: RunStatus,
    pub progress: u8,
    pub current_stage: Option<StageDescriptor>,
    pub completed_stages: Vec<String>,
    pub events: Vec<AnalysisEvent>,
    stages: Vec<StageDescriptor>,
}

impl AnalysisState {
    /// Fresh state for a new submission: nothing completed, first stage current.
    pub fn new(query: impl Into<String>) -> Self {
        let stages = analysis_stages();
        Self {
            query: query.into(),
            status: RunStatus::Analyzing,
            progress: 0,
            current_stage: stages.first().cloned(),
            completed_stages: Vec::new(),
            events: Vec::new(),
            stages,
        }
    }

    pub fn analyzing(&self) -> bool {
        self.status == RunStatus::Analyzing
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: self.progress,
            current_stage: self.current_stage.clone(),
            completed_stages: self.completed_stages.clone(),
        }
    }

    /// The terminal event's payload, once the run has completed.
    pub fn terminal_event(&self) -> Option<&AnalysisEvent> {
        self.events.iter().rev().find(|e| e.terminal_result().is_some())
    }

    fn reach(&mut self, m: Milestone) {
        self.progress = self.progress.max(m.progress);
        if let Some(stage) = self.stages.get(m.stage_index) {
            if !self.completed_stages.contains(&stage.id) {
                self.completed_stages.push(stage.id.clone());
            }
        }
        self.current_stage = self
            .stages
            .iter()
            .find(|s| !self.completed_stages.contains(&s.id))
            .cloned();
    }
}

/// Applies the milestone table and terminal detection.
pub struct ProgressReducer;

impl Reducer<StreamSignal, AnalysisState> for ProgressReducer {
    fn reduce(&self, state: &mut AnalysisState, signal: &StreamSignal) {
        if !state.analyzing() {
            return;
        }

        match signal {
            StreamSignal::Event(event) => {
                state.events.push(event.clone());
                if event.terminal_result().is_some() {
                    state.reach(TERMINAL_MILESTONE);
                    state.current_stage = None;
                    state.status = RunStatus::Completed;
                } else if let Some(m) = milestone(&event.author, event.is_final) {
                    state.reach(m);
                }
            }
            StreamSignal::Failure(failure) => {
                if let Some(message) = failure.user_message() {
                    state.events.push(AnalysisEvent::system(message));
                }
                match failure {
                    RunFailure::AgentPartialFailure { author, .. } => {
                        if let Some(m) = fallback_milestone(author) {
                            state.reach(m);
                        }
                    }
                    f if f.is_fatal() => state.status = RunStatus::Failed(f.clone()),
                    _ => {}
                }
            }
            StreamSignal::EndOfStream => state.status = RunStatus::Incomplete,
        }
    }
}
