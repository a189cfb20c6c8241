use thiserror::Error;

use crate::types::Author;

pub const CAPACITY_MESSAGE: &str =
    "The AI model is currently overloaded. Please try again in a few moments.";

/// Ways an analysis run can go wrong, from the client's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    /// The relay or upstream refused the request or could not be reached.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Mid-stream overload / 503 from the analysis service.
    #[error("upstream over capacity: {0}")]
    UpstreamCapacity(String),

    /// Any other mid-stream error payload.
    #[error("upstream error: {0}")]
    UpstreamGeneric(String),

    /// A supplementary agent failed; the run continues with partial data.
    #[error("{author} failed: {message}")]
    AgentPartialFailure { author: Author, message: String },

    /// Local network or decoding failure, including read timeouts.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame whose JSON could not be decoded. Skipped, never shown.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

impl RunFailure {
    /// Whether this failure ends the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RunFailure::AgentPartialFailure { .. } | RunFailure::MalformedFrame(_)
        )
    }

    /// System message appended to the event log, if the failure is surfaced.
    pub fn user_message(&self) -> Option<String> {
        match self {
            RunFailure::UpstreamCapacity(_) => Some(CAPACITY_MESSAGE.to_string()),
            RunFailure::UpstreamGeneric(message) => Some(format!("Analysis failed: {message}")),
            RunFailure::UpstreamUnavailable(message) | RunFailure::Transport(message) => {
                Some(format!(
                    "Connection error: {message}. Please check your internet connection and try again."
                ))
            }
            RunFailure::AgentPartialFailure { author, message } => Some(format!(
                "{} could not finish ({message}). Continuing with the data available.",
                author.profile().name
            )),
            RunFailure::MalformedFrame(_) => None,
        }
    }
}
